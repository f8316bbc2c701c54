//! CORS preflight responses.

use http::{HeaderName, HeaderValue, StatusCode};

use ferry_pipeline::{Response, ResponseExt};

/// Headers sent when a route enables CORS without a custom set.
pub const DEFAULT_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type, Authorization"),
];

/// An empty `200 OK` carrying either `custom` or [`DEFAULT_HEADERS`].
pub fn preflight(custom: Option<&[(String, String)]>) -> Response {
    let mut response = Response::empty(StatusCode::OK);
    match custom {
        Some(headers) => {
            for (name, value) in headers {
                append(&mut response, name, value);
            }
        }
        None => {
            for (name, value) in DEFAULT_HEADERS {
                append(&mut response, name, value);
            }
        }
    }
    response
}

fn append(response: &mut Response, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            response.headers_mut().append(name, value);
        }
        _ => tracing::warn!(header = name, "skipping invalid CORS header"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preflight() {
        let response = preflight(None);
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );
        assert_eq!(
            response.headers()["access-control-allow-methods"],
            "GET, POST, PUT, DELETE, OPTIONS"
        );
        assert_eq!(
            response.headers()["access-control-allow-headers"],
            "Content-Type, Authorization"
        );
    }

    #[test]
    fn test_custom_headers_replace_defaults() {
        let custom = vec![
            ("Access-Control-Allow-Origin".to_string(), "https://app.example".to_string()),
            ("Bad Header".to_string(), "x".to_string()),
        ];
        let response = preflight(Some(&custom));
        assert_eq!(response.headers().len(), 1);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://app.example"
        );
    }
}
