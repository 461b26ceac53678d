use crate::context::Context;
use serde::Serialize;
use serde_json::{Map, Value};

pub const HX_REQUEST: &str = "HX-Request";
pub const HX_BOOSTED: &str = "HX-Boosted";
pub const HX_TARGET: &str = "HX-Target";
pub const HX_CURRENT_URL: &str = "HX-Current-URL";
pub const HX_REDIRECT: &str = "HX-Redirect";
pub const HX_REFRESH: &str = "HX-Refresh";
pub const HX_TRIGGER: &str = "HX-Trigger";
pub const HX_TRIGGER_AFTER_SWAP: &str = "HX-Trigger-After-Swap";

/// Client-side events to fire, serialized as the JSON form of the
/// `HX-Trigger*` headers.
#[derive(Debug, Clone, Default)]
pub struct Trigger {
    events: Map<String, Value>,
}

impl Trigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&mut self, name: &str) -> &mut Self {
        self.events.insert(name.to_string(), Value::Null);
        self
    }

    pub fn add_event_object(&mut self, name: &str, detail: impl Serialize) -> &mut Self {
        let detail = serde_json::to_value(detail).unwrap_or(Value::Null);
        self.events.insert(name.to_string(), detail);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn header_value(&self) -> String {
        Value::Object(self.events.clone()).to_string()
    }
}

/// Partial-page request helpers bound to one [`Context`].
pub struct Hx<'a> {
    ctx: &'a Context,
}

impl<'a> Hx<'a> {
    pub(crate) fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    pub fn is_hx_request(&self) -> bool {
        self.ctx.request().get_header(HX_REQUEST) == Some("true")
    }

    pub fn is_boosted(&self) -> bool {
        self.ctx.request().get_header(HX_BOOSTED) == Some("true")
    }

    pub fn target(&self) -> Option<&'a str> {
        self.ctx.request().get_header(HX_TARGET)
    }

    pub fn current_url(&self) -> Option<&'a str> {
        self.ctx.request().get_header(HX_CURRENT_URL)
    }

    /// Client-side navigation; partial-page clients do not follow 3xx.
    pub fn redirect(&self, url: &str) {
        self.ctx.response().set_header(HX_REDIRECT, url);
    }

    pub fn refresh(&self) {
        self.ctx.response().set_header(HX_REFRESH, "true");
    }

    pub fn trigger(&self, trigger: &Trigger) {
        self.ctx.response().set_header(HX_TRIGGER, trigger.header_value());
    }

    pub fn trigger_after_swap(&self, trigger: &Trigger) {
        self.ctx
            .response()
            .set_header(HX_TRIGGER_AFTER_SWAP, trigger.header_value());
    }
}
