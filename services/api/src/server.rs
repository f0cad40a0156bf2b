use crate::cli::ServeArgs;
use crate::infra::{AppState, DiskDocumentFiles};
use crate::routes::with_placement_routes;
use axum::{Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use practicum::config::AppConfig;
use practicum::error::AppError;
use practicum::telemetry;
use practicum::workflows::internships::{
    default_rubric, seed_rubric, MemoryRepository, PlacementRepository, PlacementService,
    SqliteRepository,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(database) = args.database.take() {
        config.storage.database_path = Some(database);
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let files = Arc::new(DiskDocumentFiles::new(&config.storage.upload_dir));
    let app = match &config.storage.database_path {
        Some(path) => {
            let repository = SqliteRepository::open(path)?;
            info!(database = %path.display(), "placement records stored in sqlite");
            placement_app(repository, files)
        }
        None => {
            let repository = MemoryRepository::new();
            let seeded = seed_rubric(&repository, &default_rubric()?)?;
            info!(items = seeded, "in-memory placement store seeded with the default rubric");
            placement_app(repository, files)
        }
    };
    let app = app.layer(Extension(app_state)).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "placement service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn placement_app<R>(repository: R, files: Arc<DiskDocumentFiles>) -> Router
where
    R: PlacementRepository + 'static,
{
    let service = Arc::new(PlacementService::new(Arc::new(repository), files));
    with_placement_routes(service)
}
