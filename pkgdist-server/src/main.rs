// SPDX-FileCopyrightText: The pkgdist authors
// SPDX-License-Identifier: MPL-2.0

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tokio::net::TcpListener;

use pkgdist::{Snapshot, import_snapshot, open_database};

mod error;
mod routes;

const DEFAULT_DB_FILE: &str = "data.db";

const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the JSON API and static files (default).
    Serve,
    /// Export all packages and distributions as JSON.
    Export(ExportArgs),
    /// Import packages and distributions from a JSON file.
    ///
    /// All records are created anew. IDs in the file are ignored.
    Import(ImportArgs),
}

#[derive(Debug, Parser)]
struct ExportArgs {
    /// Output file.
    ///
    /// Writes to stdout if omitted.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ImportArgs {
    /// JSON file with "packages" and "distributions" arrays, e.g. from a previous export.
    file: PathBuf,
}

#[derive(Debug, Parser)]
struct ServeArgs {
    /// Listening address.
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    host: IpAddr,

    /// Listening port.
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Root directory for serving static files.
    #[arg(long, env = "PKGDIST_STATIC_DIR", default_value = ".")]
    static_dir: PathBuf,
}

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// SQLite database file.
    ///
    /// Created if missing.
    #[arg(long, env = "PKGDIST_DB_FILE", default_value = DEFAULT_DB_FILE)]
    db_file: PathBuf,

    #[command(flatten)]
    serve: ServeArgs,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let Args {
        db_file,
        serve,
        command,
    } = Args::parse();

    let pool = match open_database(&db_file).await {
        Ok(pool) => {
            log::info!(
                "Opened database file \"{db_file}\"",
                db_file = db_file.display()
            );
            pool
        }
        Err(err) => {
            log::error!(
                "Failed to open database file \"{db_file}\": {err:#}",
                db_file = db_file.display()
            );
            bail!("aborted");
        }
    };

    let result = match command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(pool.clone(), serve).await,
        Command::Export(ExportArgs { output }) => export(&pool, output.as_deref()).await,
        Command::Import(ImportArgs { file }) => import(&pool, &file).await,
    };
    pool.close().await;
    result
}

async fn run_server(pool: SqlitePool, args: ServeArgs) -> anyhow::Result<()> {
    let ServeArgs {
        host,
        port,
        static_dir,
    } = args;
    let addr = SocketAddr::new(host, port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    log::info!(
        "Serving static files from \"{static_dir}\"",
        static_dir = static_dir.display()
    );
    log::info!("Listening on http://{addr}");
    axum::serve(listener, routes::router(pool, &static_dir))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for shutdown signal: {err}");
        // Keep running until killed.
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down...");
}

async fn export(pool: &SqlitePool, output: Option<&Path>) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    let snapshot = Snapshot::load(&mut tx).await?;
    tx.commit().await?;
    let json = serde_json::to_string_pretty(&snapshot)?;
    if let Some(output) = output {
        std::fs::write(output, json)
            .with_context(|| format!("failed to write \"{}\"", output.display()))?;
        log::info!(
            "Exported {package_count} package(s) and {distribution_count} distribution(s) to \"{output}\"",
            package_count = snapshot.packages.len(),
            distribution_count = snapshot.distributions.len(),
            output = output.display()
        );
    } else {
        println!("{json}");
    }
    Ok(())
}

async fn import(pool: &SqlitePool, file: &Path) -> anyhow::Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("failed to read \"{}\"", file.display()))?;
    // Unlike request bodies, malformed files are rejected.
    let snapshot: serde_json::Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse \"{}\"", file.display()))?;
    let mut tx = pool.begin().await?;
    let outcome = import_snapshot(&mut tx, &snapshot).await?;
    tx.commit().await?;
    log::info!(
        "Imported {packages} package(s) and {distributions} distribution(s) from \"{file}\"",
        packages = outcome.packages,
        distributions = outcome.distributions,
        file = file.display()
    );
    Ok(())
}
