use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kinoplex::{config::Config, controllers, services::sweep::SweepService, AppState};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Kinoplex checkout API");

    // Состояние приложения с прогретым каталогом
    let state = AppState::new(config);
    info!(
        "Catalog seeded: {} screenings, {} food items",
        state.catalog.screening_count(),
        state.catalog.food_count()
    );

    // --- Фоновая уборка брошенных заказов ---
    let sweep = SweepService::new(state.checkout.clone());
    let sweep_interval = Duration::from_secs(state.config.checkout.sweep_interval_seconds);
    task::spawn(async move {
        loop {
            tokio::time::sleep(sweep_interval).await;
            sweep.run_once().await;
        }
    });

    // --- Веб-сервер ---
    let app = Router::new()
        .route("/", get(|| async { "Kinoplex API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.app.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
