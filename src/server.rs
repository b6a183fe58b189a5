//! The web command: static files first, then the locale-aware template
//! handler, everything else falling through to 404.

use crate::adapter::{DefaultAdapter, RenderAdapter, RequestInfo};
use crate::config::Config;
use crate::render::{engine_for, load_template, TemplateEngine};
use crate::routing::extract_locale;
use anyhow::{Context, Result};
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub adapter: Arc<dyn RenderAdapter>,
    pub engine: Arc<dyn TemplateEngine>,
}

/// Build the application router: `<root>/web` as static files, the
/// template handler for everything the static tree does not cover.
pub fn app(state: AppState) -> Router {
    let template = get(handle_template).with_state(state.clone());
    let static_files = ServeDir::new(state.config.web_root()).not_found_service(template);
    Router::new()
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
}

/// Serve until terminated, over HTTPS when TLS material is configured.
pub async fn run(config: Arc<Config>) -> Result<()> {
    let engine: Arc<dyn TemplateEngine> = Arc::from(engine_for(&config.tmpl_engine)?);
    let adapter: Arc<dyn RenderAdapter> = Arc::new(DefaultAdapter::new(config.clone()));
    let state = AppState { config: config.clone(), adapter, engine };
    let router = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    match (&config.tls_cert, &config.tls_key) {
        (Some(cert), Some(key)) => {
            let tls = RustlsConfig::from_pem_file(cert, key)
                .await
                .context("Failed to load TLS certificate or key")?;
            info!("CMS web server starting on https://{addr}");
            axum_server::bind_rustls(addr, tls)
                .serve(router.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .context("Server error")?;
        }
        _ => {
            info!("CMS web server starting on http://{addr}");
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {addr}"))?;
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .context("Server error")?;
        }
    }
    Ok(())
}

async fn handle_template(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let req = request_info(&uri, &headers, connect_info.map(|ConnectInfo(addr)| addr));
    match try_handle(&state, &req).await {
        Ok(Some(response)) => response,
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            // adapter failures never become 500s, only a plain miss
            error!("Template handler failed for '{}': {e}", req.url);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

fn request_info(uri: &Uri, headers: &HeaderMap, addr: Option<SocketAddr>) -> RequestInfo {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };
    RequestInfo {
        url: uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string()),
        remote_ip: addr.map(|a| a.ip().to_string()).unwrap_or_default(),
        user_agent: header("user-agent"),
        accept_language: header("accept-language"),
        host: header("host"),
    }
}

async fn try_handle(state: &AppState, req: &RequestInfo) -> Result<Option<Response>> {
    let ctx = state.adapter.render_data(req).await;
    let (Some(target), Some(data), Some(options)) = (ctx.target, ctx.data, ctx.options) else {
        return Ok(None);
    };
    let Some(template) = load_template(&state.config, &target).await? else {
        return Ok(None);
    };

    // Locale-less URLs get redirected to their localized form before
    // any content is rendered.
    let url = &req.url;
    let has_locale = state
        .config
        .locale_allowed
        .iter()
        .any(|loc| url == &format!("/{loc}") || url.starts_with(&format!("/{loc}/")));
    if !has_locale {
        let locale = extract_locale(
            url,
            &req.accept_language,
            &state.config.locale_allowed,
            &target.locales.user,
        );
        let location = if url.starts_with('/') {
            format!("/{locale}{url}")
        } else {
            format!("/{locale}/{url}")
        };
        return Ok(Some(
            (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        ));
    }

    let content = state.engine.render(&template, &data, &options)?;
    Ok(Some(Html(content).into_response()))
}
