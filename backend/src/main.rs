mod catalog;
mod config;
mod gateway;
mod inference;
mod routes;
mod storage;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use catalog::labels::LabelCatalog;
use catalog::nutrition::NutritionStore;
use config::AppConfig;
use gateway::InferenceGateway;
use inference::category::FoodCategoryClassifier;
use inference::food::FoodIdentifier;
use inference::model::TorchModel;
use inference::preprocess::PreprocessSpec;
use inference::topk::TopKSelector;
use routes::configure_routes;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use storage::scratch::ScratchStore;

fn startup_error(context: &str, err: impl std::fmt::Debug) -> std::io::Error {
    log::error!("{}: {:?}", context, err);
    std::io::Error::other(format!("{}: {:?}", context, err))
}

/// Loads both models, the catalogs and the nutrition table. Any model
/// failure aborts startup.
fn build_gateway(config: &AppConfig) -> std::io::Result<InferenceGateway> {
    let nutrition = NutritionStore::load(&config.nutrition.path)
        .map_err(|e| startup_error("Failed to load nutrition data", e))?;
    if nutrition.is_empty() {
        log::warn!("Nutrition store is empty; responses will carry the placeholder");
    } else {
        log::info!("Nutrition store holds {} records", nutrition.len());
    }

    let food_config = &config.food_model;
    let food_model = TorchModel::load(&food_config.path, food_config.layout)
        .map_err(|e| startup_error("Food model loading failed", e))?;
    let food_labels =
        LabelCatalog::from_optional_file(food_config.labels.as_deref(), LabelCatalog::food_101)
            .map_err(|e| startup_error("Failed to load food labels", e))?;

    let category_config = config.category_model.model();
    let category_model = TorchModel::load(&category_config.path, category_config.layout)
        .map_err(|e| startup_error("Category model loading failed", e))?;
    let category_labels = LabelCatalog::from_optional_file(
        category_config.labels.as_deref(),
        LabelCatalog::food_categories,
    )
    .map_err(|e| startup_error("Failed to load category labels", e))?;

    let food = FoodIdentifier::new(
        Arc::new(food_model),
        food_labels,
        Arc::new(nutrition),
        PreprocessSpec::from(food_config),
    );
    let category = FoodCategoryClassifier::new(
        Arc::new(category_model),
        category_labels,
        TopKSelector::new(config.category_model.min_secondary_score),
        PreprocessSpec::from(&category_config),
    );
    let scratch = ScratchStore::new(&config.scratch.dir, config.server.max_payload_bytes);
    log::info!("Scratch directory: {}", scratch.dir().display());

    Ok(InferenceGateway::new(
        food,
        category,
        scratch,
        Duration::from_secs(config.server.inference_timeout_secs),
    ))
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

    let config_path = AppConfig::default_path();
    let mut config =
        AppConfig::load(&config_path).map_err(|e| startup_error("Config loading failed", e))?;
    config
        .apply_env_overrides()
        .map_err(|e| startup_error("Invalid environment override", e))?;

    let gateway = web::Data::new(build_gateway(&config)?);
    let max_payload_bytes = config.server.max_payload_bytes;
    let bind_address = config.bind_address();

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(gateway.clone())
            .configure(|cfg| configure_routes(cfg, max_payload_bytes))
    })
    .bind(&bind_address)?
    .run()
    .await
}
