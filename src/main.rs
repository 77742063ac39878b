use forge::prelude::*;
use std::sync::Arc;

mod config;
mod error;
mod functions;
mod schema;
mod services;

#[cfg(test)]
mod test_support;

#[cfg(feature = "embedded-frontend")]
mod embedded {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
        response::{IntoResponse, Response},
    };
    use rust_embed::Embed;
    use std::future::Future;
    use std::pin::Pin;

    #[derive(Embed)]
    #[folder = "frontend"]
    pub struct Assets;

    async fn serve_frontend_inner(req: Request<Body>) -> Response {
        let path = req.uri().path().trim_start_matches('/');
        let path = if path.is_empty() { "index.html" } else { path };

        match Assets::get(path) {
            Some(content) => {
                let mime = mime_guess::from_path(path).first_or_octet_stream();
                ([(header::CONTENT_TYPE, mime.as_ref())], content.data).into_response()
            }
            None => match Assets::get("index.html") {
                Some(content) => {
                    ([(header::CONTENT_TYPE, "text/html")], content.data).into_response()
                }
                None => (StatusCode::NOT_FOUND, "not found").into_response(),
            },
        }
    }

    pub fn serve_frontend(req: Request<Body>) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(serve_frontend_inner(req))
    }
}

static VIDEO_PROVIDER: tokio::sync::OnceCell<Arc<dyn services::VideoProvider>> =
    tokio::sync::OnceCell::const_new();

static APP_CONFIG: tokio::sync::OnceCell<config::AppConfig> = tokio::sync::OnceCell::const_new();

pub fn get_video_provider() -> Result<Arc<dyn services::VideoProvider>> {
    VIDEO_PROVIDER
        .get()
        .cloned()
        .ok_or_else(|| ForgeError::Internal("video provider not initialized".into()))
}

pub fn get_app_config() -> Result<&'static config::AppConfig> {
    APP_CONFIG
        .get()
        .ok_or_else(|| ForgeError::Internal("app config not initialized".into()))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let app_config = config::AppConfig::from_env()?;
    let heygen = services::HeygenClient::new(app_config.heygen.clone())?;
    match heygen.callback_url() {
        Some(url) => tracing::info!(callback_url = %url, "HeyGen push callbacks enabled"),
        None => tracing::info!("PUBLIC_BASE_URL not set, relying on status polling only"),
    }
    VIDEO_PROVIDER.set(Arc::new(heygen)).ok();
    APP_CONFIG.set(app_config).ok();

    let config = ForgeConfig::from_file("forge.toml")?;
    let mut builder = Forge::builder();

    let fns = builder.function_registry_mut();
    fns.register_query::<functions::ListVideosQuery>();
    fns.register_mutation::<functions::GenerateVideoMutation>();
    fns.register_mutation::<functions::CheckStatusMutation>();

    builder
        .daemon_registry_mut()
        .register::<functions::StatusSweeperDaemon>();

    builder
        .webhook_registry_mut()
        .register::<functions::HeygenCallbackWebhook>();

    #[cfg(feature = "embedded-frontend")]
    builder.frontend_handler(embedded::serve_frontend);

    builder.config(config).build()?.run().await
}
