pub mod api;
pub mod config;
pub mod services;
pub mod utils;

use crate::config::CleanerConfig;
use crate::services::dependencies::DependencyReport;
use crate::services::pipeline::PipelineService;
use crate::services::runner::ToolRunner;
use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::index::index,
        api::handlers::upload::upload_pdf,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::upload::UploadForm,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "cleaner", description = "PDF metadata removal"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: CleanerConfig,
    pub dependencies: Arc<DependencyReport>,
    pub pipeline: Arc<PipelineService>,
}

impl AppState {
    pub fn new(
        config: CleanerConfig,
        dependencies: DependencyReport,
        runner: Arc<dyn ToolRunner>,
    ) -> Self {
        let dependencies = Arc::new(dependencies);
        let pipeline = Arc::new(PipelineService::new(
            runner,
            dependencies.clone(),
            config.failure_policy,
        ));
        Self {
            config,
            dependencies,
            pipeline,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(api::handlers::index::index))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/upload",
            post(api::handlers::upload::upload_pdf).layer(axum::extract::DefaultBodyLimit::max(
                state.config.max_file_size,
            )),
        )
        .layer(from_fn(api::middleware::security::security_headers))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .with_state(state)
}
