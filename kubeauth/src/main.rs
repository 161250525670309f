use clap::Parser;
use kubeauth::{Application, Config, telemetry};
use std::io::IsTerminal;

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before anything else that might build a TLS client
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = kubeauth::config::Args::parse();
    let config = Config::load(&args)?;

    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry(args.debug, config.enable_otel_export)?;
    tracing::debug!("{:?}", args);

    // The bootstrap token is piped in on stdin; an interactive terminal means there is none
    let stdin = std::io::stdin();
    let bootstrap_token = if stdin.is_terminal() {
        String::new()
    } else {
        kubeauth::read_bootstrap_token(stdin.lock())?
    };
    if !bootstrap_token.is_empty() {
        tracing::info!("Bootstrap token read from stdin");
    }

    let app = Application::new(config, &bootstrap_token)?;

    if let Some(token) = &args.evaluate_token {
        let user = kubeauth::evaluate_token(app.provider().as_ref(), token).await?;
        println!("Username {}", user.username);
        println!("Groups {:?}", user.groups);
        return Ok(());
    }

    app.serve(shutdown_signal()).await
}
