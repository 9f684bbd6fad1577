use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use songreviews_server::catalog_store::{CatalogStore, SqliteCatalogStore};
use songreviews_server::config::{AppConfig, CliConfig, FileConfig};
use songreviews_server::server::{self, run_server, RequestsLoggingLevel, ServerConfig};
use songreviews_server::user::{SqliteUserStore, UserManager, UserRole, UserStore};

const ADMIN_PASSWORD_ENV: &str = "SONGREVIEWS_ADMIN_PASSWORD";

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the CLI ones.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding catalog.db and user.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Handle of an admin account to create at startup if missing. The
    /// password is read from SONGREVIEWS_ADMIN_PASSWORD.
    #[clap(long, requires = "admin_mail")]
    pub admin_handle: Option<String>,

    /// Mail of the admin account created with --admin-handle.
    #[clap(long)]
    pub admin_mail: Option<String>,
}

fn ensure_admin(
    user_manager: &UserManager,
    user_store: &dyn UserStore,
    handle: &str,
    mail: &str,
) -> Result<()> {
    if let Some(user_id) = user_store.get_user_id(handle)? {
        if user_store.get_user_role(user_id)? != Some(UserRole::Admin) {
            warn!("User {} exists but is not an admin, leaving it as is", handle);
        }
        return Ok(());
    }
    let password = std::env::var(ADMIN_PASSWORD_ENV).with_context(|| {
        format!(
            "{} must be set to create admin {}",
            ADMIN_PASSWORD_ENV, handle
        )
    })?;
    let user_id = user_manager.add_user(handle, mail, UserRole::Admin)?;
    user_manager.set_password(user_id, &password)?;
    info!("Created admin {}", handle);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        port: cli_args.port,
        metrics_port: cli_args.metrics_port,
        logging_level: cli_args.logging_level.clone(),
        frontend_dir_path: cli_args.frontend_dir_path.clone(),
    };
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    info!(
        "Opening SQLite catalog database at {:?}...",
        app_config.catalog_db_path()
    );
    let catalog_store = Arc::new(SqliteCatalogStore::new(app_config.catalog_db_path())?);

    info!("Initializing metrics...");
    server::metrics::init_metrics();
    server::metrics::set_catalog_metrics(
        catalog_store.get_songs_count(),
        catalog_store.get_categories_count(),
    );

    info!(
        "Opening SQLite user database at {:?}...",
        app_config.user_db_path()
    );
    let user_store = Arc::new(SqliteUserStore::new(app_config.user_db_path())?);

    if let (Some(handle), Some(mail)) = (&cli_args.admin_handle, &cli_args.admin_mail) {
        let user_manager = UserManager::new(catalog_store.clone(), user_store.clone());
        ensure_admin(&user_manager, user_store.as_ref(), handle, mail)?;
    }

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
    };

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);
    run_server(
        server_config,
        catalog_store,
        user_store,
        app_config.stats.clone(),
    )
    .await
}
