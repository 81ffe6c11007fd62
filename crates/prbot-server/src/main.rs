// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! prbot server binary.

use std::future::IntoFuture;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use prbot_server::{build_app, create_router};
use prbot_server_config::{LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// prbot - GitHub App automating pull request housekeeping.
#[derive(Parser, Debug)]
#[command(name = "prbot-server", about = "prbot webhook server", version)]
struct Args {
	/// Configuration file (defaults to /etc/prbot/server.toml)
	#[arg(long, env = "PRBOT_SERVER_CONFIG")]
	config: Option<PathBuf>,

	/// Override the listen host
	#[arg(long)]
	host: Option<String>,

	/// Override the listen port
	#[arg(long)]
	port: Option<u16>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version information
	Version,
}

fn init_tracing(logging: &LoggingConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| logging.level.clone().into());
	let json = logging.format == LogFormat::Json;

	tracing_subscriber::registry()
		.with(filter)
		.with(json.then(|| tracing_subscriber::fmt::layer().json()))
		.with((!json).then(|| tracing_subscriber::fmt::layer()))
		.init();
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "failed to listen for Ctrl-C");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(e) => {
				tracing::error!(error = %e, "failed to listen for SIGTERM");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
	tracing::info!("received shutdown signal");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("prbot-server version: {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let mut config = match &args.config {
		Some(path) => prbot_server_config::load_config_with_file(path)?,
		None => prbot_server_config::load_config()?,
	};
	if let Some(host) = args.host {
		config.http.host = host;
	}
	if let Some(port) = args.port {
		config.http.port = port;
	}

	init_tracing(&config.logging);
	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		"starting prbot-server"
	);

	let app = build_app(&config)?;
	let deferred = app.deferred.clone();
	let router = create_router(app.state);

	let addr = config.socket_addr();
	let listener = tokio::net::TcpListener::bind(&addr).await?;
	tracing::info!("listening on {}", addr);

	let (signalled_tx, mut signalled_rx) = tokio::sync::watch::channel(false);
	let server = axum::serve(listener, router)
		.with_graceful_shutdown(async move {
			shutdown_signal().await;
			let _ = signalled_tx.send(true);
		})
		.into_future();
	let grace = Duration::from_secs(config.http.shutdown_timeout_secs);

	tokio::select! {
		result = server => {
			if let Err(e) = result {
				tracing::error!(error = %e, "server error");
			}
		}
		_ = async {
			let _ = signalled_rx.wait_for(|signalled| *signalled).await;
			tokio::time::sleep(grace).await;
		} => {
			tracing::warn!(timeout_secs = grace.as_secs(), "graceful shutdown timed out");
		}
	}

	tracing::info!("stopping deferred actions");
	deferred.shutdown().await;
	tracing::info!("server shutdown complete");
	Ok(())
}
