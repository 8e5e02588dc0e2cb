use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use leafcheck::config::{AppConfig, ModelConfig};
use leafcheck::error::ProviderError;
use leafcheck::fetch::ImageFetcher;
use leafcheck::inference::{DecisionEngine, ModelProvider};
use leafcheck::routes::{configure_routes, AppState};
use std::env;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "libtorch")]
fn load_provider(config: &ModelConfig) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    let provider = leafcheck::inference::TorchModelProvider::load(config)?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "libtorch"))]
fn load_provider(_config: &ModelConfig) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    Err(ProviderError::Unavailable(
        "built without a model backend, rebuild with `--features libtorch`".to_string(),
    ))
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, err);
    std::io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(|e| startup_error("Invalid configuration", e))?;

    let provider = load_provider(&config.model).map_err(|e| startup_error("Model loading failed", e))?;
    let (height, width) = provider.target_size();
    log::info!(
        "Loaded {} from {} ({} backend, {}x{} input, classes: {})",
        config.model.name,
        config.model.path,
        provider.backend_name(),
        width,
        height,
        provider.class_labels().join(", ")
    );

    let engine = DecisionEngine::new(provider, config.thresholds)
        .and_then(|engine| engine.with_green_band(config.green_band))
        .map(|engine| engine.with_resize_filter(config.preprocessing.resize_filter))
        .map_err(|e| startup_error("Invalid decision policy", e))?;
    log::info!(
        "Rejection thresholds: confidence < {}, entropy > {}, green ratio <= {}",
        config.thresholds.min_confidence,
        config.thresholds.max_entropy,
        config.thresholds.min_green_ratio
    );

    let server = &config.server;
    let fetcher = ImageFetcher::new(
        Duration::from_secs(server.url_fetch_timeout_secs),
        server.max_upload_bytes,
    )
    .map_err(|e| startup_error("Failed to build HTTP client", e))?;

    let state = AppState::new(
        Arc::new(engine),
        fetcher,
        config.model.name.clone(),
        server.max_upload_bytes,
        server.max_concurrent_inferences,
        Duration::from_secs(server.request_timeout_secs),
    );

    let bind_address = server.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(state.clone()))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
