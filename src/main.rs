use std::net::SocketAddr;

use blog_backend::{config, data::Data, db, logging, routes, state::AppState};
use clap::Parser;
use tracing::info;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(name = "blog-backend", version, about = "Blog backend: tags, articles, users and uploads")]
struct Cli {
    /// Configuration file layered over the built-in defaults (also `$BLOG_CONFIG`).
    #[arg(short, long)]
    config: Option<String>,

    /// Run the schema migration and exit.
    #[arg(long)]
    migrate_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Configuration (embedded defaults -> blog.toml -> --config/$BLOG_CONFIG -> BLOG__* env)
    let app_cfg = config::load(cli.config.as_deref())?;

    // Logging; the guards flush the file writers when main returns.
    let (subscriber, _log_guards) = logging::build(&app_cfg.log)?;
    subscriber.init();

    // Creates the SQLite file and its parent directory when missing.
    let (data, release) = Data::new(&app_cfg).await?;

    if app_cfg.database.migrate || cli.migrate_only {
        let opts = db::MigrateOptions { drop_columns: app_cfg.database.drop_columns };
        if let Err(e) = db::migrate(data.db(), opts).await {
            tracing::error!("schema migration failed: {:#}", e);
            release.run().await;
            return Err(e);
        }
    }
    if cli.migrate_only {
        info!("migration finished");
        release.run().await;
        return Ok(());
    }

    let addr: SocketAddr = format!("{}:{}", app_cfg.server.host, app_cfg.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen addr {}:{} - {}", app_cfg.server.host, app_cfg.server.port, e))?;

    let state = AppState::new(data, app_cfg);
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("blog backend listening on http://{}", listener.local_addr()?);
    let served = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;

    let failed = release.run().await;
    if failed > 0 {
        tracing::warn!(failed, "some data resources did not close cleanly");
    }
    served?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping server...");
}
