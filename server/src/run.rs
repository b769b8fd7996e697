//! Process bootstrap: config/rule loading, account table construction,
//! router assembly, and graceful shutdown — the server-crate analogue of
//! the teacher's `run()` entrypoint.

use std::net::SocketAddr;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::handlers;
use crate::state::build_state;
use crate::util::SigDown;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    match cli.command {
        Some(Command::Key { action: _ }) => {
            print_new_keypair();
            Ok(())
        }
        Some(Command::Start { port, rule }) => start_server(Some(port), rule).await,
        None => start_server(None, "rule.json".into()).await,
    }
}

fn print_new_keypair() {
    use alloy_signer_local::PrivateKeySigner;
    use rand::RngCore;

    let mut key_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut key_bytes);
    let signer =
        PrivateKeySigner::from_slice(&key_bytes).expect("32 random bytes are a valid secp256k1 key");
    println!("pri key: 0x{}", hex::encode(key_bytes));
    println!("pub key: {}", signer.address());
}

async fn start_server(
    port_override: Option<u16>,
    rule_path: std::path::PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let rules = crate::config::load_rule_file(&rule_path)?;
    // Kept alive for the rest of this function: dropping it would stop
    // flushing the non-blocking file-log writer.
    let _tracing_guard = init_tracing(&config.log.0);

    let port = match port_override {
        Some(p) if p != 80 => p,
        _ => config.listen.port,
    };
    let host = config.listen.host.clone();
    let tls = config.listen.tls.clone();

    let state = build_state(config, rules)?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    let app: Router = handlers::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);
    let service = app.into_make_service_with_connect_info::<SocketAddr>();

    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    let sig_down = SigDown::try_new()?;
    let token = sig_down.cancellation_token();

    // axum_server's `Handle` drives the 5-second graceful drain on both the
    // plain and TLS-terminated listeners (spec §5); a bare `axum::serve`
    // listener would need its own, separate shutdown plumbing per variant.
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        token.cancelled().await;
        tracing::info!("shutdown signal received, draining in-flight requests");
        shutdown_handle.graceful_shutdown(Some(std::time::Duration::from_secs(5)));
    });

    match tls {
        Some(tls) => {
            let rustls_config =
                RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
            tracing::info!(%addr, "evm-signer listening (tls)");
            axum_server::bind_rustls(addr, rustls_config)
                .handle(handle)
                .serve(service)
                .await?;
        }
        None => {
            tracing::info!(%addr, "evm-signer listening");
            axum_server::bind(addr).handle(handle).serve(service).await?;
        }
    }

    sig_down.recv().await;
    Ok(())
}

/// Builds the stdout subscriber and, when `log.file` is set, layers in a
/// rotating file writer alongside it — mirroring
/// `original_source/pkg/logging/logging.go`'s `io.MultiWriter(os.Stdout, f)`
/// (spec §6.3, SPEC_FULL §4.9). Returns the file layer's flush guard, which
/// the caller must hold for the process lifetime.
fn init_tracing(log: &crate::config::LogConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&log.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = tracing_subscriber::fmt::layer();

    match &log.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "evm-signer.log".to_string());
            let rotation = match log.rotation.as_deref() {
                Some("hourly") => tracing_appender::rolling::Rotation::HOURLY,
                Some("never") => tracing_appender::rolling::Rotation::NEVER,
                _ => tracing_appender::rolling::Rotation::DAILY,
            };
            let appender = tracing_appender::rolling::RollingFileAppender::new(rotation, dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .with(file_layer)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .try_init();
            None
        }
    }
}
