mod config;
mod control;
mod proxy;
mod upstream;

#[cfg(test)]
mod testing;

use axum::routing::get;
use config::Config;
use control::{metrics_broadcaster, ControlState};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use parking_lot::Mutex;
use proxy::AppState;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sw_cache::clock::SystemClock;
use sw_cache::memory::MemoryStorage;
use sw_cache::metrics::MetricsSnapshot;
use sw_cache::ServiceWorker;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use upstream::HyperFetcher;
use url::Url;

const INSTALL_ATTEMPTS: u32 = 5;
const INSTALL_RETRY_DELAY: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load config
    let config = if Path::new("config.toml").exists() {
        match Config::load(Path::new("config.toml")) {
            Ok(c) => {
                tracing::info!("loaded config from config.toml");
                c
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load config.toml, using defaults");
                Config::default_config()
            }
        }
    } else {
        tracing::info!("no config.toml found, using defaults");
        Config::default_config()
    };

    let (origin, upstream_url) = match (
        Url::parse(&config.worker.origin),
        Url::parse(&config.upstream.url),
    ) {
        (Ok(o), Ok(u)) => (o, u),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "invalid origin or upstream url");
            std::process::exit(1);
        }
    };

    // Install Prometheus metrics recorder
    let prom_handle = match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()
    {
        Ok(h) => h,
        Err(e) => {
            tracing::error!(error = %e, "failed to install prometheus recorder");
            std::process::exit(1);
        }
    };

    let fetcher = Arc::new(HyperFetcher::new(
        origin.clone(),
        upstream_url,
        config.upstream.timeout(),
    ));

    let worker = match ServiceWorker::new(
        config.worker.clone(),
        Arc::new(MemoryStorage::new()),
        fetcher,
        Arc::new(SystemClock),
    ) {
        Ok(w) => w,
        Err(e) => {
            tracing::error!(error = %e, "invalid worker configuration");
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState { worker, origin });

    install_and_activate(&state.worker).await;

    // Shutdown token for graceful shutdown
    let shutdown = CancellationToken::new();

    // Metrics broadcast channel
    let (metrics_tx, _) = broadcast::channel::<MetricsSnapshot>(64);
    tokio::spawn(metrics_broadcaster(
        Arc::clone(&state),
        metrics_tx.clone(),
        shutdown.clone(),
    ));

    tokio::spawn(sweeper(Arc::clone(&state), shutdown.clone()));

    // Control router (separate port)
    let control_router = control::router(ControlState {
        app: Arc::clone(&state),
        tx: metrics_tx,
    })
    .route(
        "/metrics",
        get(move || {
            let h = prom_handle.clone();
            async move { h.render() }
        }),
    );

    let proxy_router = proxy::router(Arc::clone(&state));

    let proxy_addr = config.server.listen_addr.clone();
    let control_addr = config.server.control_addr.clone();

    tracing::info!(
        proxy = %proxy_addr,
        control = %control_addr,
        upstream = %config.upstream.url,
        origin = %config.worker.origin,
        version = %config.worker.version,
        "sw proxy starting"
    );

    let proxy_listener = tokio::net::TcpListener::bind(&proxy_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind proxy to {proxy_addr}: {e}"));

    let control_listener = tokio::net::TcpListener::bind(&control_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind control to {control_addr}: {e}"));

    // Spawn config file watcher
    spawn_config_watcher(PathBuf::from("config.toml"), config, Arc::clone(&state));

    // Spawn shutdown signal handler
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal(shutdown_clone).await;
    });

    let proxy_future = axum::serve(proxy_listener, proxy_router)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());

    let control_future = axum::serve(control_listener, control_router)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());

    tokio::select! {
        result = proxy_future => {
            if let Err(e) = result {
                tracing::error!(error = %e, "proxy server error");
            }
        }
        result = control_future => {
            if let Err(e) = result {
                tracing::error!(error = %e, "control server error");
            }
        }
    }

    tracing::info!("sw proxy shut down");
}

/// Install the shell, retrying while the upstream comes up, then activate.
/// A worker that never installs still serves requests through its strategies.
async fn install_and_activate(worker: &ServiceWorker) {
    for attempt in 1..=INSTALL_ATTEMPTS {
        match worker.install().await {
            Ok(entries) => {
                tracing::info!(entries, attempt, "install complete");
                match worker.activate() {
                    Ok(deleted) => tracing::info!(deleted = deleted.len(), "worker active"),
                    Err(e) => tracing::info!(reason = %e, "activation deferred until SKIP_WAITING"),
                }
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "install failed");
                if attempt < INSTALL_ATTEMPTS {
                    tokio::time::sleep(INSTALL_RETRY_DELAY).await;
                }
            }
        }
    }
    tracing::error!(
        attempts = INSTALL_ATTEMPTS,
        "giving up on install, serving without a pre-cached shell"
    );
}

/// Periodic expiry sweep. Re-reads the interval each round so a config
/// reload takes effect after the current wait.
async fn sweeper(state: Arc<AppState>, shutdown: CancellationToken) {
    loop {
        let interval = state.worker.sweep_interval();
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                state.worker.sweep();
            }
        }
    }
}

/// Listen for SIGINT (Ctrl+C) or SIGTERM and cancel the shutdown token.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }

    tracing::info!("shutdown signal received, draining connections...");
    token.cancel();
}

/// Spawn a filesystem watcher on config.toml that applies safe config changes at runtime.
fn spawn_config_watcher(config_path: PathBuf, initial_config: Config, state: Arc<AppState>) {
    let current_config = Arc::new(Mutex::new(initial_config));

    let config_path_clone = config_path.clone();
    let mut watcher = match notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                match Config::load(&config_path_clone) {
                    Ok(new_config) => {
                        let mut old = current_config.lock();
                        config::diff_and_apply(&old, &new_config, &state.worker);
                        *old = new_config;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to reload config.toml");
                    }
                }
            }
        }
    }) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(error = %e, "failed to start config watcher");
            return;
        }
    };

    if let Err(e) = watcher.watch(&config_path, RecursiveMode::NonRecursive) {
        tracing::warn!(error = %e, "failed to watch config.toml");
        return;
    }

    // Leak the watcher so it lives for the process lifetime
    std::mem::forget(watcher);
    tracing::info!("config file watcher started");
}
