//! The render adapter: turns an incoming request into the context the
//! template renderer consumes, or into an empty context when nothing
//! resolves. The adapter is stateless and safe to call concurrently.

use crate::config::Config;
use crate::files::resolve_template_name;
use crate::routing::resolve_routing;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

/// What kind of target a template resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Web,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLocales {
    /// Locale requested by the user (URL segment or fallback).
    pub user: String,
    /// Base web locale the application renders from.
    pub app: String,
}

/// Resolved identification of the template to render. Immutable once
/// returned; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    pub kind: TargetKind,
    /// Template path relative to a locale directory, no leading slash.
    pub name: String,
    pub locales: TargetLocales,
}

/// Context handed to the rendering service.
///
/// Either all three fields are set or none is: an empty context means
/// "no template found, fall through" and is also what any internal
/// error degrades to.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    pub target: Option<RenderTarget>,
    pub data: Option<Value>,
    pub options: Option<Value>,
}

impl RenderContext {
    pub fn empty() -> Self {
        Self { target: None, data: None, options: None }
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_none()
    }
}

/// Request surface the adapter consumes, decoupled from the HTTP stack.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    /// Path plus optional query string, as received.
    pub url: String,
    pub remote_ip: String,
    pub user_agent: String,
    pub accept_language: String,
    pub host: String,
}

/// Application hook analyzing a request and producing the render context.
#[async_trait]
pub trait RenderAdapter: Send + Sync {
    /// Never fails: any internal error is logged and collapses into an
    /// empty context, so the HTTP layer treats it as a plain miss.
    async fn render_data(&self, req: &RequestInfo) -> RenderContext;
}

/// Default adapter: locale from the first URL segment, template resolved
/// by probing the base-locale directory, canonical/alternate URLs for
/// every allowed locale.
pub struct DefaultAdapter {
    config: Arc<Config>,
}

impl DefaultAdapter {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn site_base(&self, req: &RequestInfo) -> String {
        let base = match &self.config.base_url {
            Some(url) => url.clone(),
            None => format!("http://{}", req.host),
        };
        base.trim_end_matches('/').to_string()
    }

    async fn resolve(&self, req: &RequestInfo) -> Result<RenderContext> {
        let config = &self.config;
        let raw = req.url.split('?').next().unwrap_or("");
        let raw_path = urlencoding::decode(raw)
            .context("Request path is not valid UTF-8 after percent-decoding")?
            .into_owned();

        let routing = resolve_routing(&raw_path, &config.locale_allowed, &config.locale_base_web);

        let base_dir = config.locale_dir(&config.locale_base_web);
        let Some(tmpl_path) = resolve_template_name(&base_dir, &routing.clean_path).await else {
            return Ok(RenderContext::empty());
        };

        let site = self.site_base(req);
        let canonical_url = format!("{site}/{}/{tmpl_path}", config.locale_base_web);
        let alternate_urls: Value = config
            .locale_allowed
            .iter()
            .map(|locale| (locale.clone(), Value::String(format!("{site}/{locale}/{tmpl_path}"))))
            .collect::<serde_json::Map<String, Value>>()
            .into();

        let target = RenderTarget {
            kind: TargetKind::Web,
            name: tmpl_path,
            locales: TargetLocales {
                user: routing.locale.clone(),
                app: config.locale_base_web.clone(),
            },
        };
        let data = json!({
            "ip": req.remote_ip,
            "ua": req.user_agent,
            "lang": req.accept_language,
            "locale": routing.locale,
            "allowed_locales": config.locale_allowed,
            "canonical_url": canonical_url,
            "alternate_urls": alternate_urls,
        });

        Ok(RenderContext {
            target: Some(target),
            data: Some(data),
            options: Some(json!({})),
        })
    }
}

#[async_trait]
impl RenderAdapter for DefaultAdapter {
    async fn render_data(&self, req: &RequestInfo) -> RenderContext {
        match self.resolve(req).await {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!("Render data resolution failed: {e}");
                RenderContext::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use tempfile::TempDir;

    fn write(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn adapter(dir: &TempDir) -> DefaultAdapter {
        DefaultAdapter::new(Arc::new(test_config(dir.path())))
    }

    fn request(url: &str) -> RequestInfo {
        RequestInfo {
            url: url.to_string(),
            remote_ip: "127.0.0.1".to_string(),
            user_agent: "test-agent".to_string(),
            accept_language: "en".to_string(),
            host: "localhost:3000".to_string(),
        }
    }

    // ==================== Resolution Tests ====================

    #[tokio::test]
    async fn test_resolves_index_in_folder_path() {
        let dir = TempDir::new().unwrap();
        write(&dir, "tmpl/web/en/path/to/index.html", "x");
        let ctx = adapter(&dir).render_data(&request("/ru/path/to/")).await;

        let target = ctx.target.unwrap();
        assert_eq!(target.name, "path/to/index.html");
        assert_eq!(target.kind, TargetKind::Web);
        assert_eq!(target.locales.user, "ru");
        assert_eq!(target.locales.app, "en");

        let data = ctx.data.unwrap();
        assert_eq!(data["canonical_url"], "https://cms.example.com/en/path/to/index.html");
        assert_eq!(
            data["alternate_urls"]["en"],
            "https://cms.example.com/en/path/to/index.html"
        );
        assert_eq!(
            data["alternate_urls"]["ru"],
            "https://cms.example.com/ru/path/to/index.html"
        );
        assert_eq!(data["allowed_locales"], serde_json::json!(["en", "ru"]));
    }

    #[tokio::test]
    async fn test_resolves_html_suffix_on_base_locale_url() {
        let dir = TempDir::new().unwrap();
        write(&dir, "tmpl/web/en/about.html", "x");
        let ctx = adapter(&dir).render_data(&request("/about/")).await;

        let target = ctx.target.unwrap();
        assert_eq!(target.name, "about.html");
        assert_eq!(target.locales.user, "en");

        let data = ctx.data.unwrap();
        assert_eq!(data["canonical_url"], "https://cms.example.com/en/about.html");
    }

    #[tokio::test]
    async fn test_request_metadata_flows_into_data() {
        let dir = TempDir::new().unwrap();
        write(&dir, "tmpl/web/en/index.html", "x");
        let mut req = request("/");
        req.remote_ip = "10.0.0.7".to_string();
        req.user_agent = "Mozilla/5.0".to_string();
        req.accept_language = "ru,en;q=0.5".to_string();

        let ctx = adapter(&dir).render_data(&req).await;
        let data = ctx.data.unwrap();
        assert_eq!(data["ip"], "10.0.0.7");
        assert_eq!(data["ua"], "Mozilla/5.0");
        assert_eq!(data["lang"], "ru,en;q=0.5");
        assert_eq!(data["locale"], "en");
    }

    #[tokio::test]
    async fn test_miss_returns_fully_empty_context() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("tmpl/web/en")).unwrap();
        let ctx = adapter(&dir).render_data(&request("/ru/missing/page")).await;

        assert!(ctx.target.is_none());
        assert!(ctx.data.is_none());
        assert!(ctx.options.is_none());
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn test_query_string_is_stripped() {
        let dir = TempDir::new().unwrap();
        write(&dir, "tmpl/web/en/about.html", "x");
        let ctx = adapter(&dir).render_data(&request("/about?utm=1&x=2")).await;
        assert_eq!(ctx.target.unwrap().name, "about.html");
    }

    #[tokio::test]
    async fn test_percent_encoded_path_is_decoded() {
        let dir = TempDir::new().unwrap();
        write(&dir, "tmpl/web/en/my page.html", "x");
        let ctx = adapter(&dir).render_data(&request("/my%20page")).await;
        assert_eq!(ctx.target.unwrap().name, "my page.html");
    }

    #[tokio::test]
    async fn test_host_header_derives_base_url_when_unset() {
        let dir = TempDir::new().unwrap();
        write(&dir, "tmpl/web/en/index.html", "x");
        let mut config = test_config(dir.path());
        config.base_url = None;
        let adapter = DefaultAdapter::new(Arc::new(config));

        let ctx = adapter.render_data(&request("/")).await;
        let data = ctx.data.unwrap();
        assert_eq!(data["canonical_url"], "http://localhost:3000/en/index.html");
    }

    #[tokio::test]
    async fn test_configured_base_url_trailing_slash_is_stripped() {
        let dir = TempDir::new().unwrap();
        write(&dir, "tmpl/web/en/index.html", "x");
        let mut config = test_config(dir.path());
        config.base_url = Some("https://cms.example.com/".to_string());
        let adapter = DefaultAdapter::new(Arc::new(config));

        let ctx = adapter.render_data(&request("/")).await;
        let data = ctx.data.unwrap();
        assert_eq!(data["canonical_url"], "https://cms.example.com/en/index.html");
    }

    #[tokio::test]
    async fn test_adapter_is_idempotent() {
        let dir = TempDir::new().unwrap();
        write(&dir, "tmpl/web/en/about.html", "x");
        let adapter = adapter(&dir);
        let req = request("/ru/about");

        let first = adapter.render_data(&req).await;
        let second = adapter.render_data(&req).await;
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}
