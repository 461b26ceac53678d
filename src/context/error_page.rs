use crate::context::json::{ErrorType, JsonResponse};
use crate::context::{Context, Trigger};
use crate::error::ServerError;
use crate::http::request::media_type;
use crate::http::CONTENT_TYPE_JSON;
use crate::templates::RenderOpt;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::atomic::Ordering;

/// What went wrong, as passed to [`Context::error`]. Errors are handed back
/// to the caller after the response is written; text is only displayed.
#[derive(Debug)]
pub enum ErrorMessage {
    Text(String),
    Error(anyhow::Error),
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorMessage::Text(text) => f.write_str(text),
            ErrorMessage::Error(err) => write!(f, "{err:#}"),
        }
    }
}

impl From<&str> for ErrorMessage {
    fn from(text: &str) -> Self {
        ErrorMessage::Text(text.to_string())
    }
}

impl From<String> for ErrorMessage {
    fn from(text: String) -> Self {
        ErrorMessage::Text(text)
    }
}

impl From<anyhow::Error> for ErrorMessage {
    fn from(err: anyhow::Error) -> Self {
        ErrorMessage::Error(err)
    }
}

impl From<ServerError> for ErrorMessage {
    fn from(err: ServerError) -> Self {
        ErrorMessage::Error(err.into())
    }
}

/// Extra key/value detail for error pages and envelopes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorArg {
    pub key: String,
    pub value: Value,
}

pub fn arg(key: &str, value: impl Serialize) -> ErrorArg {
    ErrorArg {
        key: key.to_string(),
        value: serde_json::to_value(value).unwrap_or(Value::Null),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorFormat {
    Json,
    Hx,
    Page,
}

pub(crate) const SERVER_CTX_ERROR: &str = "serverCtxError";

impl Context {
    fn error_format(&self) -> ErrorFormat {
        if media_type(self.request().content_type()) == CONTENT_TYPE_JSON {
            ErrorFormat::Json
        } else if self.hx().is_hx_request() {
            ErrorFormat::Hx
        } else {
            ErrorFormat::Page
        }
    }

    /// Turns a failure into the response for this request, once.
    ///
    /// JSON requests get a `server` envelope carrying `msg`, `args` and
    /// `requestID`. Partial-page requests get a `serverCtxError` event in
    /// `HX-Trigger-After-Swap`, replacing any events the handler queued.
    /// Everything else renders the `"<status>.page"` template with `msg`
    /// and `args`. The status line is written in every case.
    ///
    /// Only the first call per request writes; later calls are logged and
    /// return `Ok(())`. When `message` is an error it is returned after the
    /// response is written, unless writing failed, in which case that
    /// failure is returned instead.
    pub fn error(
        &self,
        status: u16,
        message: impl Into<ErrorMessage>,
        args: Vec<ErrorArg>,
    ) -> anyhow::Result<()> {
        let message = message.into();
        let format = self.error_format();

        if self.inner.error_dispatched.swap(true, Ordering::AcqRel) {
            tracing::info!(code = status, error = %message, ?args, "error already dispatched");
            return Ok(());
        }

        let msg = message.to_string();
        let failure = match format {
            ErrorFormat::Json => {
                let mut error = Map::new();
                error.insert("msg".into(), Value::String(msg));
                error.insert("args".into(), json!(args));
                error.insert("requestID".into(), Value::String(self.request_id()));
                let envelope = JsonResponse {
                    status,
                    error: Some(error),
                    error_type: ErrorType::Server,
                    ..JsonResponse::default()
                };
                self.json(status, envelope).err().map(anyhow::Error::from)
            }
            ErrorFormat::Hx => {
                self.override_trigger();
                let mut trigger = Trigger::new();
                trigger.add_event_object(
                    SERVER_CTX_ERROR,
                    json!({"code": status, "msg": msg, "args": args}),
                );
                self.hx().trigger_after_swap(&trigger);
                None
            }
            ErrorFormat::Page => {
                let opts = RenderOpt {
                    template: format!("{status}.page"),
                    data: json!({"msg": msg, "args": args}),
                    ..RenderOpt::default()
                };
                self.render(status, opts).err().map(|err| {
                    tracing::error!(code = status, error = %err, "failed to render error page");
                    anyhow::anyhow!("failed to render error page: {err}")
                })
            }
        };

        self.status(status);

        match (failure, message) {
            (Some(failure), _) => Err(failure),
            (None, ErrorMessage::Error(err)) => Err(err),
            (None, ErrorMessage::Text(_)) => Ok(()),
        }
    }
}
