use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use soundshelf::config::ServerConfig;
use soundshelf::server::{AppState, create_router};
use soundshelf::store::{SqliteStore, Store};
use soundshelf::views;

#[derive(Parser)]
#[command(name = "soundshelf")]
#[command(about = "A self-hostable audio catalogue server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by every command. Flags override the config file.
#[derive(Args)]
struct ConfigArgs {
    /// TOML config file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Data directory for the database and local media
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

impl ConfigArgs {
    fn load(&self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(data_dir) = &self.data_dir {
            config.data_dir.clone_from(data_dir);
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and database
    Init {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Start the server
    Serve {
        #[command(flatten)]
        config: ConfigArgs,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Public base URL for external access (e.g., "https://audio.example.com").
        /// Used for locally stored media URLs.
        #[arg(long)]
        public_base_url: Option<String>,
    },

    /// Rebuild the per-category curated playlists from the most-liked audio
    RefreshAutoPlaylists {
        #[command(flatten)]
        config: ConfigArgs,

        /// Audio per playlist
        #[arg(long, default_value = "20")]
        per_playlist: usize,
    },
}

fn open_store(config: &ServerConfig) -> anyhow::Result<SqliteStore> {
    let db_path = config.db_path();
    if !db_path.exists() {
        bail!(
            "Database not found at {}. Run 'soundshelf init' first.",
            db_path.display()
        );
    }
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;
    Ok(store)
}

fn run_init(config: &ServerConfig) -> anyhow::Result<()> {
    let data_path: &Path = &config.data_dir;
    fs::create_dir_all(data_path)
        .with_context(|| format!("creating {}", data_path.display()))?;
    fs::create_dir_all(config.media_dir())?;

    let db_path = config.db_path();
    let existed = db_path.exists();
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    if existed {
        println!("Database already initialized at {}", db_path.display());
    } else {
        println!("Initialized database at {}", db_path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("soundshelf=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { config } => {
            run_init(&config.load()?)?;
        }
        Commands::RefreshAutoPlaylists {
            config,
            per_playlist,
        } => {
            let config = config.load()?;
            let store = open_store(&config)?;
            let playlists = views::refresh_auto_playlists(&store, per_playlist)?;
            println!("Refreshed {} auto playlists", playlists.len());
        }
        Commands::Serve {
            config,
            host,
            port,
            public_base_url,
        } => {
            let mut config = config.load()?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if public_base_url.is_some() {
                config.public_base_url = public_base_url;
            }

            let store = open_store(&config)?;
            let addr = config.socket_addr()?;

            let state = Arc::new(AppState::new(Arc::new(store), config)?);
            let app = create_router(state);

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
