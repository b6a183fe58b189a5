use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Config {
    // Locales
    pub locale_allowed: Vec<String>,
    pub locale_base_web: String,
    pub locale_base_translate: String,

    // Content
    pub root_path: PathBuf,
    pub tmpl_engine: String,
    pub base_url: Option<String>,

    // AI API
    pub ai_api_base_url: String,
    pub ai_api_key: Option<String>,
    pub ai_api_model: String,
    pub ai_api_org: Option<String>,
    pub ai_stream: bool,

    // Web server
    pub port: u16,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // Locales
            locale_allowed: std::env::var("CMS_LOCALE_ALLOWED")
                .unwrap_or_else(|_| "en,es,ru".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            locale_base_web: std::env::var("CMS_LOCALE_BASE_WEB")
                .unwrap_or_else(|_| "en".to_string()),
            locale_base_translate: std::env::var("CMS_LOCALE_BASE_TRANSLATE")
                .unwrap_or_else(|_| "ru".to_string()),

            // Content
            root_path: std::env::var("CMS_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            tmpl_engine: std::env::var("CMS_TMPL_ENGINE")
                .unwrap_or_else(|_| "simple".to_string()),
            base_url: std::env::var("CMS_BASE_URL").ok().filter(|s| !s.is_empty()),

            // AI API
            ai_api_base_url: std::env::var("CMS_AI_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            ai_api_key: std::env::var("CMS_AI_API_KEY").ok().filter(|s| !s.is_empty()),
            ai_api_model: std::env::var("CMS_AI_API_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            ai_api_org: std::env::var("CMS_AI_API_ORG").ok().filter(|s| !s.is_empty()),
            ai_stream: std::env::var("CMS_AI_STREAM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),

            // Web server
            port: std::env::var("CMS_SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            tls_cert: std::env::var("CMS_TLS_CERT").ok().map(PathBuf::from),
            tls_key: std::env::var("CMS_TLS_KEY").ok().map(PathBuf::from),
        })
    }

    /// Directory holding the templates of one locale: `<root>/tmpl/web/<locale>`.
    pub fn locale_dir(&self, locale: &str) -> PathBuf {
        self.root_path.join("tmpl").join("web").join(locale)
    }

    /// Directory served as static files: `<root>/web`.
    pub fn web_root(&self) -> PathBuf {
        self.root_path.join("web")
    }

    /// The API key, required for the translation workflow.
    pub fn require_ai_api_key(&self) -> Result<&str> {
        self.ai_api_key.as_deref().context("CMS_AI_API_KEY not set")
    }
}

/// Build a config rooted at `root` without touching the process environment.
///
/// Shared by unit and integration tests.
pub fn test_config(root: &Path) -> Config {
    Config {
        locale_allowed: vec!["en".to_string(), "ru".to_string()],
        locale_base_web: "en".to_string(),
        locale_base_translate: "en".to_string(),
        root_path: root.to_path_buf(),
        tmpl_engine: "simple".to_string(),
        base_url: Some("https://cms.example.com".to_string()),
        ai_api_base_url: "https://api.openai.com/v1".to_string(),
        ai_api_key: Some("test-key".to_string()),
        ai_api_model: "gpt-4o-mini".to_string(),
        ai_api_org: None,
        ai_stream: true,
        port: 3000,
        tls_cert: None,
        tls_key: None,
    }
}
