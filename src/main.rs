//! Process entry point (SPEC_FULL.md §A). Loads configuration, wires the
//! component registry, starts the scheduler daemon and the control-plane
//! HTTP server, and exits gracefully on `SIGINT`/`SIGTERM`.

use std::env;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use feedsynth_worker::app::{ComponentRegistry, build_router};
use feedsynth_worker::config::Config;

/// Performs a blocking GET against this process's own `/health/live`
/// endpoint. Used by container orchestrators via `feedsynth-worker
/// healthcheck`. Returns the process exit code.
fn run_healthcheck() -> i32 {
    let bind = env::var("FEEDSYNTH_HTTP_BIND").unwrap_or_else(|_| "0.0.0.0:9090".to_string());
    let port = bind.rsplit(':').next().unwrap_or("9090");
    let url = format!("http://127.0.0.1:{port}/health/live");

    let client = match reqwest::blocking::Client::builder().timeout(Duration::from_secs(5)).build() {
        Ok(client) => client,
        Err(error) => {
            eprintln!("healthcheck failed: failed to build client: {error}");
            return 1;
        }
    };

    match client.get(&url).send() {
        Ok(response) if response.status().is_success() => 0,
        Ok(response) => {
            eprintln!("healthcheck failed: status {}", response.status());
            1
        }
        Err(error) => {
            eprintln!("healthcheck failed: {error}");
            1
        }
    }
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("unknown panic payload");

        if let Some(location) = panic_info.location() {
            error!(
                thread = thread_name,
                file = location.file(),
                line = location.line(),
                column = location.column(),
                message,
                "panic occurred"
            );
        } else {
            error!(thread = thread_name, message, "panic occurred without location information");
        }
    }));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() > 1 && args[1] == "healthcheck" {
        std::process::exit(run_healthcheck());
    }

    install_panic_hook();

    let config = Config::from_env().context("failed to load configuration")?;
    let bind_addr = config.http_bind();

    let registry = ComponentRegistry::build(config)
        .await
        .context("failed to build component registry")?;

    let _daemon = registry.scheduler().spawn_daemon();

    let router = build_router(registry);
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {bind_addr}"))?;

    info!(%bind_addr, "listening");

    let shutdown = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
        };
        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => info!("received SIGINT, shutting down"),
            () = terminate => info!("received SIGTERM, shutting down"),
        }
    };

    if let Err(error) = axum::serve(listener, router).with_graceful_shutdown(shutdown).await {
        warn!(%error, "server exited with error");
    }

    Ok(())
}
