pub(crate) mod request;
pub(crate) mod response;
pub(crate) mod scope;

pub use request::{Body, Method, Request};
pub use response::{status_text, Response};
pub use scope::RequestScope;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";
