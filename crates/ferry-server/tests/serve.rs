//! Serves real connections on an ephemeral port.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ferry_config::{FerryConfig, ServerConfig};
use ferry_core::{Failure, RequestContext};
use ferry_extract::Bind;
use ferry_pipeline::{HandlerOption, TypedHandler};
use ferry_server::{Server, ShutdownSignal};
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone, Default, Bind)]
pub struct Greet {
    #[bind(path)]
    pub name: String,
    #[bind(form, default = "hello")]
    pub greeting: String,
}

#[derive(Debug, Serialize)]
struct Greeting {
    text: String,
}

fn greet_route(stops: &Arc<AtomicUsize>) -> TypedHandler<Greet, Greeting> {
    let stops = Arc::clone(stops);
    let option = HandlerOption::api("/greet/:name").on_shutdown(move |_| {
        stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    TypedHandler::new(option, |_ctx: RequestContext, input: Greet| async move {
        Ok::<_, Failure>(Greeting {
            text: format!("{} {}", input.greeting, input.name),
        })
    })
}

async fn exchange(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8(buf).unwrap()
}

struct Running {
    addr: std::net::SocketAddr,
    shutdown: ShutdownSignal,
    task: tokio::task::JoinHandle<ferry_server::ServerResult>,
}

async fn start(server: Server) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = ShutdownSignal::new();
    let task = tokio::spawn(server.serve_on(listener, shutdown.clone()));
    Running { addr, shutdown, task }
}

#[tokio::test]
async fn test_round_trip_and_shutdown_hooks() {
    let stops = Arc::new(AtomicUsize::new(0));
    let server = Server::builder().route(greet_route(&stops)).build().unwrap();
    let running = start(server).await;

    let body = "greeting=hi";
    let raw = format!(
        "POST /greet/ada HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\
         Content-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let response = exchange(running.addr, &raw).await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with(r#"{"data":{"text":"hi ada"}}"#), "{response}");

    let raw = "GET /greet/bob HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n";
    let response = exchange(running.addr, raw).await;
    assert!(response.ends_with(r#"{"data":{"text":"hello bob"}}"#), "{response}");

    running.shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), running.task)
        .await
        .expect("server stops")
        .expect("task did not panic");
    assert!(result.is_ok());
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let config = FerryConfig::builder()
        .server(ServerConfig {
            max_body_bytes: 8,
            ..Default::default()
        })
        .build();
    let stops = Arc::new(AtomicUsize::new(0));
    let server = Server::builder()
        .config(config)
        .route(greet_route(&stops))
        .build()
        .unwrap();
    let running = start(server).await;

    let body = "greeting=far-too-long";
    let raw = format!(
        "POST /greet/ada HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\
         Content-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let response = exchange(running.addr, &raw).await;
    assert!(response.starts_with("HTTP/1.1 413"), "{response}");

    running.shutdown.trigger();
    let _ = tokio::time::timeout(Duration::from_secs(5), running.task).await;
}

#[tokio::test]
async fn test_unknown_route_over_the_wire() {
    let server = Server::builder().build().unwrap();
    let running = start(server).await;

    let raw = "GET /nowhere HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n";
    let response = exchange(running.addr, raw).await;
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");

    running.shutdown.trigger();
    let _ = tokio::time::timeout(Duration::from_secs(5), running.task).await;
}
