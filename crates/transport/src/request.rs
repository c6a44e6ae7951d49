//! Request and response value types
//!
//! A `RequestSpec` is a plain description of one logical request. The
//! session materializes it into a fresh reqwest request on every attempt,
//! which is what lets a solved challenge re-issue the identical call without
//! cloning gymnastics.

use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

/// One logical outbound request.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            json: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.json = Some(body);
        self
    }
}

/// The concluded response to one logical request: status, headers and the
/// full body, after any challenge rounds have been absorbed.
#[derive(Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl TransportResponse {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }

    /// The `Location` header, if present and valid UTF-8.
    pub fn location(&self) -> Option<String> {
        self.headers
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_headers_and_body() {
        let spec = RequestSpec::post("https://shop.example/login")
            .header("Accept", "application/json")
            .header("X-CSRF-Token", "tok")
            .json(serde_json::json!({"a": 1}));

        assert_eq!(spec.method, Method::POST);
        assert_eq!(spec.headers.len(), 2);
        assert!(spec.json.is_some());
    }

    #[test]
    fn response_json_decodes_body() {
        let resp = TransportResponse {
            status: 200,
            headers: HeaderMap::new(),
            body: r#"{"id": 7}"#.into(),
        };
        let value: serde_json::Value = resp.json().unwrap();
        assert_eq!(value["id"], 7);
    }

    #[test]
    fn response_location_reads_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::LOCATION,
            "https://pay.example/x".parse().unwrap(),
        );
        let resp = TransportResponse {
            status: 302,
            headers,
            body: String::new(),
        };
        assert_eq!(resp.location().as_deref(), Some("https://pay.example/x"));
    }
}
