//! Coffee cart server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use api::routes::AppState;
use menu::{
    EnvPropertySource, JsonFilePropertySource, LayeredPropertySource, MenuState,
    RefreshCoordinator, RefreshEvent, RefreshHandle,
};
use metrics_exporter_prometheus::PrometheusHandle;
use points::{HttpPointsSink, OrderService};
use store::{CoffeeStore, InMemoryCartStore, OrderStore, PostgresCartStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Forwards every SIGHUP to the refresh coordinator.
#[cfg(unix)]
async fn forward_reload_signals(refresh: RefreshHandle) {
    let mut hangup = signal::unix::signal(signal::unix::SignalKind::hangup())
        .expect("failed to install SIGHUP handler");
    while hangup.recv().await.is_some() {
        tracing::info!("received SIGHUP, refreshing configuration");
        metrics::counter!("cart_refresh_requests_total", "trigger" => "signal").increment(1);
        if refresh.trigger(RefreshEvent::ConfigRefreshed).await.is_err() {
            break;
        }
    }
}

#[cfg(not(unix))]
async fn forward_reload_signals(_refresh: RefreshHandle) {
    std::future::pending::<()>().await;
}

fn init_tracing(log_level: &str, log_format: LogFormat) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn run<S>(config: Config, store: Arc<S>, metrics_handle: PrometheusHandle)
where
    S: OrderStore + CoffeeStore + 'static,
{
    // 1. Outbound pipeline
    let sink = HttpPointsSink::new(&config.points_sink_url, config.sink_timeout)
        .expect("invalid points sink URL");
    let pipeline =
        api::build_pipeline(sink, &config).expect("invalid resilience configuration");

    // 2. Menu and its refresh coordinator
    let mut properties = LayeredPropertySource::new();
    if let Some(path) = &config.config_file {
        tracing::info!(path = %path.display(), "layering property file over environment");
        properties = properties.with_layer(JsonFilePropertySource::new(path));
    }
    let properties = properties.with_layer(EnvPropertySource::new());

    let menu = Arc::new(MenuState::new());
    let mut coordinator = RefreshCoordinator::new(menu.clone(), Arc::new(properties));
    if config.menu_persist {
        coordinator = coordinator.with_coffee_store(store.clone());
    }
    let (refresh, events) = RefreshHandle::channel(16);
    let coordinator_task = coordinator.spawn(events);
    let reload_task = tokio::spawn(forward_reload_signals(refresh.clone()));

    // 3. Application
    let state = Arc::new(AppState {
        order_service: OrderService::new(store, Arc::new(pipeline)),
        menu,
        refresh: refresh.clone(),
    });
    let app = api::create_app(state, metrics_handle);

    // 4. Start server
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    tracing::info!(%addr, "starting coffee cart server");

    if refresh.trigger(RefreshEvent::ApplicationReady).await.is_err() {
        tracing::error!("refresh coordinator stopped before startup completed");
    }
    drop(refresh);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // Remaining refresh handles go away with the reload task; the coordinator
    // then drains its queue and finishes any pending menu write.
    reload_task.abort();
    let _ = reload_task.await;
    if let Err(err) = coordinator_task.await {
        tracing::error!(error = %err, "refresh coordinator failed");
    }

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing, then load configuration so its warnings are logged
    let (log_level, log_format) = Config::logging_from_env();
    init_tracing(&log_level, log_format);
    let config = Config::from_env().expect("invalid configuration");

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Select the store and serve
    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresCartStore::connect(&url, config.database_max_connections)
                .await
                .expect("failed to connect to database");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL store");
            run(config, Arc::new(store), metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            run(config, Arc::new(InMemoryCartStore::new()), metrics_handle).await;
        }
    }
}
