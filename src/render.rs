//! Template loading and rendering. The CMS treats the engine as an
//! opaque service: load a template for a target, render it with data.

use crate::adapter::RenderTarget;
use crate::config::Config;
use anyhow::{bail, Result};
use regex::{Captures, Regex};
use serde_json::Value;

/// Read the template for a target, preferring the user-locale file and
/// falling back to the app-locale one. `None` when neither exists.
pub async fn load_template(config: &Config, target: &RenderTarget) -> Result<Option<String>> {
    for locale in [&target.locales.user, &target.locales.app] {
        let path = config.locale_dir(locale).join(&target.name);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => return Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(anyhow::Error::from(e)
                    .context(format!("Failed to read template {}", path.display())))
            }
        }
    }
    Ok(None)
}

/// A rendering backend selected once at startup.
pub trait TemplateEngine: std::fmt::Debug + Send + Sync {
    fn render(&self, template: &str, data: &Value, options: &Value) -> Result<String>;
}

/// Select the engine configured by name.
pub fn engine_for(name: &str) -> Result<Box<dyn TemplateEngine>> {
    match name {
        "simple" => Ok(Box::new(SimpleEngine)),
        other => bail!("Unknown template engine '{other}'"),
    }
}

/// Placeholder substitution: `{{ key }}` and dotted `{{ a.b.c }}` are
/// replaced by values from the data object; unknown keys render empty.
#[derive(Debug)]
pub struct SimpleEngine;

impl TemplateEngine for SimpleEngine {
    fn render(&self, template: &str, data: &Value, _options: &Value) -> Result<String> {
        let re = Regex::new(r"\{\{\s*([A-Za-z0-9_][A-Za-z0-9_.]*)\s*\}\}").expect("valid pattern");
        let rendered = re.replace_all(template, |caps: &Captures<'_>| {
            lookup(data, &caps[1]).unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

fn lookup(data: &Value, dotted: &str) -> Option<String> {
    let mut current = data;
    for key in dotted.split('.') {
        current = current.get(key)?;
    }
    Some(match current {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
