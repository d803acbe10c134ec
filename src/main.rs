use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod artists;
mod background_jobs;
mod catalog;
mod config;
mod email;
mod matching;
mod notifications;
mod releases;
mod sqlite_persistence;
mod tracker_store;

use artists::ArtistResolver;
use background_jobs::jobs::{
    DailyNotificationsJob, NotificationLogCleanupJob, ReleaseSyncJob, WeeklyNotificationsJob,
};
use background_jobs::JobScheduler;
use catalog::{DeezerCatalog, PrimaryCatalog, SecondaryCatalog, SpotifyCatalog};
use config::{AppConfig, CliConfig, FileConfig};
use email::{DisabledSender, EmailSender, SendGridSender};
use notifications::{NotificationDispatcher, WeeklyDigest};
use releases::ReleaseSynchronizer;
use tracker_store::{SqliteTrackerStore, TrackerStore, User};

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
#[command(name = "encore-server")]
struct CliArgs {
    /// Directory holding the SQLite database.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. File values override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Spotify client id for the client-credentials flow.
    #[clap(long)]
    pub spotify_client_id: Option<String>,

    /// Spotify client secret.
    #[clap(long)]
    pub spotify_client_secret: Option<String>,

    /// SendGrid API key. Omit to run with email delivery disabled.
    #[clap(long)]
    pub sendgrid_api_key: Option<String>,

    /// Sender address for outgoing notifications.
    #[clap(long)]
    pub from_email: Option<String>,

    /// Sender display name for outgoing notifications.
    #[clap(long)]
    pub from_name: Option<String>,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the background job scheduler until interrupted (the default).
    Serve,
    /// Create a user.
    AddUser { username: String, email: String },
    /// Search the catalog for artists.
    Search { query: String },
    /// Add an artist (by catalog id) to a user's favorites.
    Follow {
        username: String,
        artist_id: String,
    },
    /// Remove an artist (by catalog id) from a user's favorites.
    Unfollow {
        username: String,
        artist_id: String,
    },
    /// List a user's favorite artists.
    Favorites { username: String },
    /// Run one release synchronization pass for all users.
    Sync,
    /// Show a user's recent notification history.
    History { username: String },
}

struct App {
    store: Arc<SqliteTrackerStore>,
    resolver: ArtistResolver,
    synchronizer: Arc<ReleaseSynchronizer>,
    dispatcher: Arc<NotificationDispatcher>,
    digest: Arc<WeeklyDigest>,
}

impl App {
    fn build(config: &AppConfig) -> Result<Self> {
        info!(
            "Opening SQLite tracker database at {:?}...",
            config.tracker_db_path()
        );
        let store = Arc::new(SqliteTrackerStore::new(&config.tracker_db_path())?);

        let primary: Arc<dyn PrimaryCatalog> = Arc::new(SpotifyCatalog::new(
            &config.spotify_client_id,
            &config.spotify_client_secret,
        ));
        let secondary: Arc<dyn SecondaryCatalog> = Arc::new(DeezerCatalog::new());

        let email: Arc<dyn EmailSender> = match &config.email {
            Some(settings) => {
                info!("Email delivery configured (from: {})", settings.from_email);
                Arc::new(SendGridSender::new(
                    &settings.sendgrid_api_key,
                    &settings.from_email,
                    &settings.from_name,
                ))
            }
            None => {
                info!("Email delivery not configured, notifications will be logged as failed");
                Arc::new(DisabledSender)
            }
        };

        let dispatcher = Arc::new(NotificationDispatcher::new(store.clone(), email.clone()));
        let digest = Arc::new(WeeklyDigest::new(store.clone(), email));
        let resolver = ArtistResolver::new(store.clone(), primary.clone(), secondary.clone());
        let synchronizer = Arc::new(ReleaseSynchronizer::new(
            store.clone(),
            primary,
            secondary,
            dispatcher.clone(),
        ));

        Ok(Self {
            store,
            resolver,
            synchronizer,
            dispatcher,
            digest,
        })
    }

    fn user(&self, username: &str) -> Result<User> {
        self.store
            .get_user_by_username(username)?
            .ok_or_else(|| anyhow::anyhow!("No user named '{}'", username))
    }

    async fn serve(&self) -> Result<()> {
        let mut scheduler = JobScheduler::new();
        scheduler.register(Arc::new(ReleaseSyncJob::new(self.synchronizer.clone())))?;
        scheduler.register(Arc::new(DailyNotificationsJob::new(
            self.dispatcher.clone(),
        )))?;
        scheduler.register(Arc::new(WeeklyNotificationsJob::new(
            self.dispatcher.clone(),
            self.digest.clone(),
        )))?;
        scheduler.register(Arc::new(NotificationLogCleanupJob::new(
            self.store.clone(),
        )))?;
        scheduler.init()?;
        info!("Scheduler running with jobs: {:?}", scheduler.job_ids());

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
        ctrlc::set_handler(move || {
            let _ = shutdown_tx.blocking_send(());
        })
        .context("Failed to install Ctrl-C handler")?;

        shutdown_rx.recv().await;
        info!("Shutting down...");
        scheduler.shutdown().await;
        Ok(())
    }

    async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Serve => self.serve().await,
            Command::AddUser { username, email } => {
                let user_id = self.store.create_user(&username, &email)?;
                println!("Created user '{}' (id {})", username, user_id);
                Ok(())
            }
            Command::Search { query } => {
                let results = self.resolver.search(&query, 20).await?;
                if results.is_empty() {
                    println!("No artists found for '{}'", query);
                }
                for artist in results {
                    println!(
                        "{}  {} (popularity {}, {} followers)",
                        artist.id, artist.name, artist.popularity, artist.followers
                    );
                }
                Ok(())
            }
            Command::Follow {
                username,
                artist_id,
            } => {
                let user = self.user(&username)?;
                let (_, artist) = self
                    .resolver
                    .add_favorite(user.id, &artist_id, "default")
                    .await?;
                println!("'{}' now follows {}", username, artist.name);
                Ok(())
            }
            Command::Unfollow {
                username,
                artist_id,
            } => {
                let user = self.user(&username)?;
                let artist = self
                    .store
                    .get_artist_by_primary_id(&artist_id)?
                    .ok_or_else(|| anyhow::anyhow!("Unknown artist '{}'", artist_id))?;
                self.resolver.remove_favorite(user.id, artist.id)?;
                println!("'{}' no longer follows {}", username, artist.name);
                Ok(())
            }
            Command::Favorites { username } => {
                let user = self.user(&username)?;
                let favorites = self.resolver.get_user_favorites(user.id).await?;
                if favorites.is_empty() {
                    println!("'{}' has no favorite artists", username);
                }
                for (favorite, artist) in favorites {
                    println!(
                        "{}  {} [{}] (since {})",
                        artist.primary_id,
                        artist.name,
                        favorite.category,
                        favorite.added_at.format("%Y-%m-%d")
                    );
                }
                Ok(())
            }
            Command::Sync => {
                let created = self.synchronizer.sync_all().await?;
                println!("Stored {} new release(s)", created);
                Ok(())
            }
            Command::History { username } => {
                let user = self.user(&username)?;
                let entries = self.store.get_notification_history(user.id, 50)?;
                if entries.is_empty() {
                    println!("No notifications recorded for '{}'", username);
                }
                for entry in entries {
                    println!(
                        "{}  {:>14}  {:>6}  release={}",
                        entry.sent_at.format("%Y-%m-%d %H:%M:%S"),
                        entry.channel.as_str(),
                        entry.status.as_str(),
                        entry
                            .release_id
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    );
                }
                Ok(())
            }
        }
    }
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
        .try_init()
        .context("Failed to initialize logging")?;

    info!(
        "Starting encore-server {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    let file_config = match &cli_args.config {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {:?}", path);
            }
            Some(FileConfig::load(path)?)
        }
        None => None,
    };

    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        spotify_client_id: cli_args.spotify_client_id.clone(),
        spotify_client_secret: cli_args.spotify_client_secret.clone(),
        sendgrid_api_key: cli_args.sendgrid_api_key.clone(),
        from_email: cli_args.from_email.clone(),
        from_name: cli_args.from_name.clone(),
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    let app = App::build(&config)?;
    app.run(cli_args.command.unwrap_or(Command::Serve)).await
}
