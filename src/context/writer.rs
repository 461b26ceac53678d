use crate::http::Response;
use std::collections::HashMap;

/// Buffered response under construction.
///
/// Mirrors a streaming writer: the first `write_header` commits the status
/// and later ones are ignored. Body writes do not commit a status; a
/// response that never wrote one goes out as 200.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<u16>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl ResponseWriter {
    pub(crate) fn with_headers(staged: &[(String, String)]) -> Self {
        Self {
            headers: staged.iter().cloned().collect(),
            ..Self::default()
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// CR and LF in `value` are replaced with spaces.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let mut value = value.into();
        if value.contains(['\r', '\n']) {
            value = value.replace(['\r', '\n'], " ");
        }
        self.headers.insert(name.to_ascii_lowercase(), value);
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(&name.to_ascii_lowercase())
    }

    /// Sets `Content-Type` unless the handler already chose one.
    pub fn set_default_content_type(&mut self, value: &str) {
        self.headers
            .entry("content-type".to_string())
            .or_insert_with(|| value.to_string());
    }

    pub fn write_header(&mut self, status: u16) {
        match self.status {
            Some(written) => {
                tracing::debug!(written, ignored = status, "superfluous write_header call");
            }
            None => self.status = Some(status),
        }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn wrote_header(&self) -> bool {
        self.status.is_some()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub(crate) fn clear_body(&mut self) {
        self.body.clear();
    }

    pub(crate) fn into_response(self) -> Response {
        Response {
            status: self.status.unwrap_or(200),
            headers: self.headers,
            body: self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_status_wins() {
        let mut writer = ResponseWriter::default();
        writer.write(b"partial");
        assert!(!writer.wrote_header());
        writer.write_header(500);
        writer.write_header(200);
        let response = writer.into_response();
        assert_eq!(response.status, 500);
        assert_eq!(response.body, b"partial");
    }

    #[test]
    fn default_content_type_keeps_existing() {
        let mut writer = ResponseWriter::with_headers(&[("content-type".into(), "text/csv".into())]);
        writer.set_default_content_type("text/plain");
        assert_eq!(writer.header("Content-Type"), Some("text/csv"));
        assert_eq!(writer.into_response().status, 200);
    }

    #[test]
    fn header_values_stay_on_one_line() {
        let mut writer = ResponseWriter::default();
        writer.set_header("Location", "/home\r\nSet-Cookie: admin=1");
        assert_eq!(writer.header("location"), Some("/home  Set-Cookie: admin=1"));
        assert_eq!(writer.header("set-cookie"), None);
    }
}
