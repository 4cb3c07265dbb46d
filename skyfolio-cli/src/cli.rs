use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};
use skyfolio_core::{
    Config, Database, ErrorKind, FavoritesStore, HistoryStore, LocationQuery, NewFavorite, UserId,
    WeatherService, gateway_from_config,
};
use std::{fs, sync::Arc};
use tracing::debug;

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "skyfolio",
    version,
    about = "Weather lookups with favorites and search history"
)]
pub struct Cli {
    /// User whose favorites and history are used. Defaults to the configured user.
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// A place name or a pair of coordinates.
#[derive(Debug, Args)]
pub struct LocationArgs {
    /// Place name: "City", "City,Country" or "City,State,Country".
    pub place: Option<String>,

    /// Latitude in degrees, used together with --lon when no place is given.
    #[arg(long, allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude in degrees.
    #[arg(long, allow_negative_numbers = true)]
    pub lon: Option<f64>,
}

impl LocationArgs {
    fn query(&self) -> LocationQuery {
        LocationQuery {
            place: self.place.clone(),
            lat: self.lat,
            lon: self.lon,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the API key, provider URL and default user.
    Configure,

    /// Show current weather and the 5-day forecast.
    Show {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Show only the 5-day forecast.
    Forecast {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Manage favorite places.
    Favorites {
        #[command(subcommand)]
        action: FavoritesCommand,
    },

    /// Inspect or clear search history.
    History {
        #[command(subcommand)]
        action: HistoryCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum FavoritesCommand {
    /// List favorites, newest first.
    List,

    /// Look a place up and save it as a favorite.
    Add {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Remove a favorite by id.
    Remove { id: String },

    /// Show the weather for a favorite.
    Open { id: String },
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// List recent searches, newest first.
    List {
        /// Number of entries to show.
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Delete all searches.
    Clear,
}

/// Loaded config plus the storage and identity every command works with.
struct App {
    config: Config,
    user: UserId,
    db: Database,
}

impl App {
    fn open(user: Option<&str>) -> anyhow::Result<Self> {
        let config = Config::load()?;
        let user = config.user_id(user)?;

        let path = config.database_file()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create data directory: {}", parent.display())
            })?;
        }
        let db = Database::open(&path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        Ok(Self { config, user, db })
    }

    fn service(&self) -> anyhow::Result<WeatherService> {
        let gateway = gateway_from_config(&self.config)?;
        Ok(WeatherService::new(Arc::new(gateway), Arc::new(self.db.history())))
    }

    async fn show(&self, query: &LocationQuery) -> anyhow::Result<()> {
        let lookup = self
            .service()?
            .lookup(&self.user, query)
            .await
            .map_err(user_error)?;

        println!("{}", render::current(&lookup.current));
        println!();
        match &lookup.forecast_error {
            Some(err) => println!("Forecast unavailable: {}", err.user_message()),
            None => println!("{}", render::forecast(&lookup.forecast)),
        }
        Ok(())
    }
}

/// Turn a core error into the message shown to the user, keeping details in the log.
fn user_error(err: skyfolio_core::Error) -> anyhow::Error {
    debug!("{err:?}");
    anyhow!(err.user_message())
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { location } => {
                let app = App::open(self.user.as_deref())?;
                app.show(&location.query()).await
            }
            Command::Forecast { location } => {
                let app = App::open(self.user.as_deref())?;
                let forecast = app
                    .service()?
                    .forecast(&location.query())
                    .await
                    .map_err(user_error)?;
                println!("{}, {}", forecast.series.city.name, forecast.series.city.country);
                println!("{}", render::forecast(&forecast.days));
                Ok(())
            }
            Command::Favorites { action } => {
                let app = App::open(self.user.as_deref())?;
                run_favorites(&app, action).await
            }
            Command::History { action } => {
                let app = App::open(self.user.as_deref())?;
                run_history(&app, action)
            }
        }
    }
}

fn run_history(app: &App, action: HistoryCommand) -> anyhow::Result<()> {
    let history = app.db.history();

    match action {
        HistoryCommand::List { limit } => {
            let entries = history.list(&app.user, limit).map_err(user_error)?;
            println!("{}", render::history(&entries));
        }
        HistoryCommand::Clear => {
            let removed = history.clear(&app.user).map_err(user_error)?;
            println!("Search history cleared ({removed} entries)");
        }
    }

    Ok(())
}

async fn run_favorites(app: &App, action: FavoritesCommand) -> anyhow::Result<()> {
    let favorites = app.db.favorites();

    match action {
        FavoritesCommand::List => {
            let list = favorites.list(&app.user).map_err(user_error)?;
            println!("{}", render::favorites(&list));
        }
        FavoritesCommand::Add { location } => {
            let current = app
                .service()?
                .current(&app.user, &location.query())
                .await
                .map_err(user_error)?;

            match favorites.add(&app.user, NewFavorite::from(&current)) {
                Ok(saved) => println!(
                    "Added {}, {} to favorites ({})",
                    saved.city, saved.country, saved.id
                ),
                Err(err) if err.kind() == ErrorKind::Duplicate => {
                    println!("{}", err.user_message())
                }
                Err(err) => return Err(user_error(err)),
            }
        }
        FavoritesCommand::Remove { id } => {
            let removed = favorites.remove(&app.user, &id).map_err(user_error)?;
            println!("Removed {}, {} from favorites", removed.city, removed.country);
        }
        FavoritesCommand::Open { id } => {
            let favorite = favorites
                .list(&app.user)
                .map_err(user_error)?
                .into_iter()
                .find(|f| f.id == id)
                .ok_or_else(|| anyhow!("Favorite {id} not found"))?;
            app.show(&favorite.location_query()).await?;
        }
    }

    Ok(())
}

/// Interactive configuration, saved to the platform config dir.
fn configure() -> anyhow::Result<()> {
    let path = Config::config_file_path()?;
    let mut config = Config::load_from(&path)?;

    let api_key = Password::new("OpenWeatherMap API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    if !api_key.trim().is_empty() {
        config.set_api_key(api_key.trim().to_string());
    }

    config.base_url = Text::new("Provider base URL:")
        .with_default(&config.base_url)
        .prompt()
        .context("Failed to read base URL")?;

    let default_user = Text::new("Default user:")
        .with_default(&config.default_user)
        .prompt()
        .context("Failed to read default user")?;
    config.default_user = UserId::new(default_user)?.to_string();

    config.save_to(&path)?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}
