use std::env;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};

use ricescan_backend::config::AppConfig;
use ricescan_backend::model::LifecycleManager;
use ricescan_backend::model::demo::DemoCatalogue;
use ricescan_backend::routes::{AppState, configure_routes};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Could not read deployment config ({}), using defaults", e);
            AppConfig::default()
        }
    };
    log::info!(
        "Model: {} | input {}x{} | normalization {:?} | policy {:?}",
        config.model_path,
        config.input_size.0,
        config.input_size.1,
        config.normalization,
        config.load_policy
    );

    let taxonomy = config.taxonomy();
    log::info!("Taxonomy: {} classes", taxonomy.len());

    let lifecycle = Arc::new(LifecycleManager::new(&config, taxonomy.len()));
    if config.load_policy.preload_at_startup() {
        match lifecycle.ensure_ready() {
            Ok(_) => log::info!("Startup model loading successful"),
            Err(e) => {
                log::warn!("Startup model loading failed ({}), will retry on first request", e);
                // Startup consumed the attempt budget; hand a fresh one to
                // the first request.
                lifecycle.reload();
            }
        }
    }

    let demo = DemoCatalogue::resolve(&taxonomy);
    let state = web::Data::new(AppState {
        config,
        taxonomy,
        lifecycle,
        demo,
    });

    let port = env::var("PORT").unwrap_or_else(|_| "5000".to_string());
    let bind_address = format!("0.0.0.0:{}", port);
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
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
