use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use std::sync::Arc;

use lungscan_backend::config::AppConfig;
use lungscan_backend::model::TorchScriptModel;
use lungscan_backend::routes::{UploadLimit, configure_routes};
use lungscan_backend::{Analyzer, Classifier};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::load().map_err(|e| {
        log::error!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    // Loaded once; every request shares this handle read-only.
    let model = TorchScriptModel::load(&config.model.path, config.model.device).map_err(|e| {
        log::error!("Failed to load model at startup: {}", e);
        std::io::Error::other(format!("Model loading failed: {}", e))
    })?;
    let analyzer = Analyzer::new(Classifier::new(Arc::new(model)));
    log::info!("Model {} ready", analyzer.classifier().model_name());

    let upload_limit = UploadLimit(config.server.max_upload_bytes);
    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    let mut server = HttpServer::new(move || {
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
            .app_data(web::Data::new(analyzer.clone()))
            .app_data(web::Data::new(upload_limit))
            .configure(configure_routes)
    });
    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server.bind(&bind_address)?.run().await
}
