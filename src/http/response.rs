use crate::error::ServerError;
use crate::http::{CONTENT_TYPE_HTML, CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    /// Header names are stored lower-cased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16) -> Response {
        Response {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    pub fn body<T: AsRef<[u8]>>(&mut self, body: T) -> &mut Self {
        self.body = body.as_ref().to_vec();
        self
    }

    pub fn header<K: AsRef<str>, V: AsRef<str>>(&mut self, name: K, value: V) -> &mut Self {
        self.headers.insert(
            name.as_ref().to_ascii_lowercase(),
            single_line(value.as_ref()).into_owned(),
        );
        self
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn json<T: Serialize>(&mut self, value: &T) -> Result<&mut Self, ServerError> {
        let json = serde_json::to_vec(value)?;
        self.header("Content-Type", CONTENT_TYPE_JSON);
        self.body(json);
        Ok(self)
    }

    pub fn text<T: AsRef<str>>(content: T) -> Response {
        let mut response = Response::new(200);
        response
            .header("Content-Type", CONTENT_TYPE_TEXT)
            .body(content.as_ref());
        response
    }

    pub fn html<T: AsRef<str>>(content: T) -> Response {
        let mut response = Response::new(200);
        response
            .header("Content-Type", CONTENT_TYPE_HTML)
            .body(content.as_ref());
        response
    }

    /// Converts an error that escaped the middleware chain into a JSON
    /// response.
    pub fn error(err: ServerError) -> Response {
        let status = err.status_code();
        let mut response = Response::new(status);
        if let ServerError::MethodNotAllowed(allowed) = &err {
            let allowed: Vec<&str> = allowed.iter().map(|m| m.as_str()).collect();
            response.header("Allow", allowed.join(", "));
        }
        let body = serde_json::json!({
            "error": {
                "message": err.to_string(),
                "status": status
            }
        });
        response
            .header("Content-Type", CONTENT_TYPE_JSON)
            .body(body.to_string());
        response
    }

    /// Serializes the response as an HTTP/1.1 message. The body is left out
    /// for HEAD requests while `Content-Length` still reports its size.
    pub(crate) fn to_http_bytes(&self, include_body: bool) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, status_text(self.status));
        for (name, value) in &self.headers {
            if name == "content-length" || name == "connection" {
                continue;
            }
            if name.is_empty() || name.contains([':', '\r', '\n', ' ']) {
                tracing::warn!(header = ?name, "dropping response header with an invalid name");
                continue;
            }
            head += &format!("{}: {}\r\n", name, single_line(value));
        }
        head += &format!("content-length: {}\r\nconnection: close\r\n\r\n", self.body.len());

        let mut bytes = head.into_bytes();
        if include_body {
            bytes.extend_from_slice(&self.body);
        }
        bytes
    }
}

/// Header values go out on one line: CR and LF become spaces.
pub(crate) fn single_line(value: &str) -> Cow<'_, str> {
    if value.contains(['\r', '\n']) {
        Cow::Owned(value.replace(['\r', '\n'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

pub fn status_text(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        410 => "Gone",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    #[test]
    fn method_not_allowed_lists_allow_header() {
        let response = Response::error(ServerError::MethodNotAllowed(vec![Method::GET, Method::POST]));
        assert_eq!(response.status, 405);
        assert_eq!(response.get_header("Allow"), Some("GET, POST"));
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["error"]["status"], 405);
    }

    #[test]
    fn head_serialization_keeps_length_drops_body() {
        let response = Response::text("hello");
        let wire = String::from_utf8(response.to_http_bytes(false)).unwrap();
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.contains("content-length: 5\r\n"));
        assert!(wire.ends_with("\r\n\r\n"));
    }

    #[test]
    fn line_breaks_cannot_start_new_headers() {
        let mut response = Response::new(303);
        response.header("Location", "/home\r\nSet-Cookie: admin=1");
        response
            .headers
            .insert("x-raw".to_string(), "a\nb".to_string());
        response
            .headers
            .insert("bad\r\nname".to_string(), "x".to_string());

        let wire = String::from_utf8(response.to_http_bytes(true)).unwrap();
        assert!(wire.contains("location: /home  Set-Cookie: admin=1\r\n"));
        assert!(wire.contains("x-raw: a b\r\n"));
        assert!(!wire.contains("\r\nSet-Cookie"));
        assert!(!wire.contains("bad"));
    }
}
