use clap::Parser;
use recipe_import::{
    api::{handlers::AppState, routes},
    cli::{commands, Cli, Commands},
    config::Settings,
    db,
    search::{self, SearchIndex},
    Error, Result,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,recipe_import=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let settings = Settings::from_env()?;
    settings.validate()?;

    match cli.command {
        Commands::Serve { port, host } => {
            serve(settings, port, host).await?;
        }
        Commands::Migrate => {
            migrate(settings).await?;
        }
        Commands::Import {
            repository_url,
            created_by,
            wait,
        } => {
            commands::import(&server_url(&settings), &repository_url, created_by, wait).await?;
        }
        Commands::Status {
            batch_id,
            watch,
            interval,
        } => {
            commands::status(
                &server_url(&settings),
                batch_id,
                watch,
                Duration::from_secs(interval.max(1)),
            )
            .await?;
        }
        Commands::Search {
            query,
            tags,
            limit,
            page,
        } => {
            commands::search(&server_url(&settings), query, tags, limit, page).await?;
        }
        Commands::Reindex => {
            reindex(settings).await?;
        }
    }

    Ok(())
}

fn server_url(settings: &Settings) -> String {
    settings
        .server
        .external_url
        .clone()
        .unwrap_or_else(|| format!("http://{}:{}", settings.server.host, settings.server.port))
}

async fn serve(mut settings: Settings, port: Option<u16>, host: Option<String>) -> Result<()> {
    // Override settings with CLI arguments
    if let Some(port) = port {
        settings.server.port = port;
    }
    if let Some(host) = host {
        settings.server.host = host;
    }

    info!("Starting recipe import server");
    info!("Database: {}", settings.database.url);
    info!("Server: {}:{}", settings.server.host, settings.server.port);

    let pool = db::init_pool_with_config(&settings.database).await?;
    info!(
        "Database connection established (max_connections: {}, min_connections: {})",
        settings.database.max_connections, settings.database.min_connections
    );

    db::run_migrations(&pool).await?;
    info!("Database migrations completed");

    let index_path = settings.search.index_path.clone();
    let search_index = Arc::new(SearchIndex::new(&index_path)?);
    info!("Search index initialized at {:?}", index_path);

    // A fresh index next to an existing database is rebuilt before serving
    let stored = db::recipes::count_all_recipes(&pool).await?;
    if stored > 0 && search_index.num_docs() == 0 {
        let indexed = search::reindex(&pool, search_index.clone()).await?;
        info!("Rebuilt empty search index with {} recipes", indexed);
    }

    let state = AppState::new(pool, search_index, settings.clone());

    for url in &settings.server.auto_import_urls {
        match state
            .importer
            .start_import(url, Some("auto-import".to_string()))
            .await
        {
            Ok(batch_id) => info!("Auto-import of {} started as batch {}", url, batch_id),
            Err(e) => warn!("Auto-import of {} rejected: {}", url, e.log_safe()),
        }
    }

    let app = routes::create_router(state, &settings);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    println!("\n========================================");
    println!("Recipe Import Server");
    println!("========================================");
    println!("Address: http://{addr}");
    println!("\nAPI Endpoints:");
    println!("  POST /api/imports");
    println!("  GET  /api/imports");
    println!("  GET  /api/imports/:id");
    println!("  GET  /api/search");
    println!("  GET  /api/recipes/:id");
    println!("  GET  /api/tags");
    println!("  GET  /api/stats");
    println!("\nPress Ctrl+C to stop");
    println!("========================================\n");

    info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| Error::Internal(format!("Server error: {e}")))?;

    info!("Shutting down...");
    Ok(())
}

async fn migrate(settings: Settings) -> Result<()> {
    info!("Running database migrations");

    let pool = db::init_pool(&settings.database.url).await?;
    db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed successfully");
    Ok(())
}

async fn reindex(settings: Settings) -> Result<()> {
    let pool = db::init_pool(&settings.database.url).await?;
    db::run_migrations(&pool).await?;

    let search_index = Arc::new(SearchIndex::new(&settings.search.index_path)?);
    let indexed = commands::reindex(&pool, search_index).await?;

    println!("\x1b[32m\u{2713}\x1b[0m Reindex complete: {indexed} recipes indexed");
    Ok(())
}
