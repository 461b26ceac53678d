//! Template rendering behind the narrow [`Renderer`] contract.

use anyhow::Context as _;
use minijinja::{path_loader, AutoEscape, Environment, Value};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

/// What to render and how.
#[derive(Debug, Clone, Default)]
pub struct RenderOpt {
    /// Wrapping template; the rendered `template` is available to it as
    /// `content`. Empty for none.
    pub layout: String,
    pub template: String,
    /// Treat `template` as template source instead of a name.
    pub render_as_string: bool,
    /// Templates that must exist for this render to make sense.
    pub others: Vec<String>,
    pub data: JsonValue,
    /// The handler keeps writing after the render: leave the status line
    /// and content type alone.
    pub not_done: bool,
}

impl RenderOpt {
    pub fn template(name: impl Into<String>) -> Self {
        Self {
            template: name.into(),
            ..Self::default()
        }
    }

    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = layout.into();
        self
    }

    pub fn with_data(mut self, data: JsonValue) -> Self {
        self.data = data;
        self
    }
}

pub trait Renderer: Send + Sync {
    fn render(&self, out: &mut dyn io::Write, opts: &RenderOpt) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct TemplateOptions {
    pub root: PathBuf,
    pub ext: String,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./templates"),
            ext: ".html".to_string(),
        }
    }
}

/// minijinja environment loading `<root>/<name><ext>` from disk.
pub struct Templates {
    env: Environment<'static>,
    ext: String,
}

impl Templates {
    pub fn new(options: TemplateOptions) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(options.root));
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        Self {
            env,
            ext: options.ext,
        }
    }

    fn file_name(&self, name: &str) -> String {
        if name.ends_with(&self.ext) {
            name.to_string()
        } else {
            format!("{name}{}", self.ext)
        }
    }

    fn render_named(&self, name: &str, ctx: impl serde::Serialize) -> anyhow::Result<String> {
        let file = self.file_name(name);
        let template = self
            .env
            .get_template(&file)
            .with_context(|| format!("template {file:?}"))?;
        template
            .render(ctx)
            .with_context(|| format!("rendering {file:?}"))
    }
}

impl Renderer for Templates {
    fn render(&self, out: &mut dyn io::Write, opts: &RenderOpt) -> anyhow::Result<()> {
        for other in &opts.others {
            let file = self.file_name(other);
            self.env
                .get_template(&file)
                .with_context(|| format!("template {file:?}"))?;
        }

        let body = if opts.render_as_string {
            self.env
                .render_str(&opts.template, &opts.data)
                .context("rendering inline template")?
        } else {
            self.render_named(&opts.template, &opts.data)?
        };

        let html = if opts.layout.is_empty() {
            body
        } else {
            let mut ctx: BTreeMap<String, Value> = match &opts.data {
                JsonValue::Object(map) => map
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_serialize(v)))
                    .collect(),
                _ => BTreeMap::new(),
            };
            ctx.insert("content".to_string(), Value::from_safe_string(body));
            self.render_named(&opts.layout, Value::from(ctx))?
        };

        out.write_all(html.as_bytes())?;
        Ok(())
    }
}
