use crate::http::scope::RequestScope;
use std::collections::HashMap;
use std::fmt;

#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
    CONNECT,
    OPTIONS,
    TRACE,
    PATCH,
}

impl Method {
    /// Parses a request-line method token. Tokens are case-sensitive.
    pub fn parse(s: &str) -> Option<Method> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            "CONNECT" => Some(Method::CONNECT),
            "OPTIONS" => Some(Method::OPTIONS),
            "TRACE" => Some(Method::TRACE),
            "PATCH" => Some(Method::PATCH),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::CONNECT => "CONNECT",
            Method::OPTIONS => "OPTIONS",
            Method::TRACE => "TRACE",
            Method::PATCH => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub struct Body {
    pub(crate) content_type: String,
    pub(crate) data: Vec<u8>,
}

impl Body {
    pub fn new() -> Body {
        Body::default()
    }

    pub fn from_bytes(b: Vec<u8>) -> Body {
        Body {
            content_type: "application/octet-stream".to_string(),
            data: b,
        }
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.data).to_string()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn json<T>(&self) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        if media_type(&self.content_type) == "application/json" {
            serde_json::from_slice(&self.data).ok()
        } else {
            None
        }
    }

    /// Decodes an `application/x-www-form-urlencoded` body. Other content
    /// types yield an empty map.
    pub fn form(&self) -> HashMap<String, String> {
        if media_type(&self.content_type) == "application/x-www-form-urlencoded" {
            parse_urlencoded(&String::from_utf8_lossy(&self.data))
        } else {
            HashMap::new()
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Body {
        Body::from_bytes(b)
    }
}

#[derive(Debug)]
pub struct Request {
    pub method: Method,
    /// Request target as received, including the query string.
    pub uri: String,
    pub path: String,
    pub query: HashMap<String, String>,
    /// Values captured by `{name}` segments of the matched pattern.
    pub params: HashMap<String, String>,
    /// Header names are stored lower-cased.
    pub headers: HashMap<String, String>,
    pub body: Body,
    pub(crate) scope: RequestScope,
}

impl Request {
    pub fn new(method: Method, uri: &str) -> Request {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, parse_urlencoded(query)),
            None => (uri, HashMap::new()),
        };
        let path = if path.is_empty() { "/" } else { path };

        Request {
            method,
            uri: uri.to_string(),
            path: path.to_string(),
            query,
            params: HashMap::new(),
            headers: HashMap::new(),
            body: Body::new(),
            scope: RequestScope::default(),
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_ascii_lowercase(), value.to_string());
        if key.eq_ignore_ascii_case("content-type") {
            self.body.content_type = value.to_string();
        }
        self
    }

    pub fn with_body(mut self, content_type: &str, data: impl Into<Vec<u8>>) -> Self {
        self.body = Body {
            content_type: content_type.to_string(),
            data: data.into(),
        };
        self.headers
            .insert("content-type".to_string(), content_type.to_string());
        self
    }

    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn host(&self) -> Option<&str> {
        self.get_header("host")
    }

    pub fn content_type(&self) -> &str {
        self.get_header("content-type").unwrap_or("")
    }

    /// Returns the named cookie from the `Cookie` header.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.get_header("cookie")?
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut RequestScope {
        &mut self.scope
    }
}

/// Strips parameters from a Content-Type value: `text/html; charset=utf-8` → `text/html`.
pub(crate) fn media_type(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or("").trim()
}

pub(crate) fn parse_urlencoded(data: &str) -> HashMap<String, String> {
    data.split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    match urlencoding::decode(&raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw,
    }
}
