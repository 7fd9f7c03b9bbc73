mod render;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use weathernow_core::config::{LOCATIONIQ_KEY_ENV, OPENWEATHER_KEY_ENV};
use weathernow_core::{AppError, Config};
use weathernow_weather::{
    CacheTtl, Coordinates, Favorite, FixedPosition, Geocoder, LocalStore, LocationResolver,
    PreferencesUpdate, SearchQuery, SystemClock, TemperatureUnit, Theme, TimeFormat,
    WeatherClient, WeatherReport, DEFAULT_HOURLY_COUNT,
};

#[derive(Parser)]
#[command(name = "weathernow", version, about = "Current conditions and forecasts")]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Current conditions for a city or coordinates
    Current(PlaceArgs),
    /// Daily and hourly forecast
    Forecast {
        #[command(flatten)]
        place: PlaceArgs,
        /// Number of three-hour steps in the hourly strip
        #[arg(long, default_value_t = DEFAULT_HOURLY_COUNT)]
        hours: usize,
    },
    /// Weather for the current position
    Here {
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
    },
    /// Place suggestions for a partial name
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Recently searched cities
    Recent {
        /// Forget the list
        #[arg(long)]
        clear: bool,
    },
    /// Saved places
    Favorites {
        #[command(subcommand)]
        action: Option<FavoriteAction>,
    },
    /// Show or change display preferences
    Prefs {
        #[arg(long, value_enum)]
        unit: Option<UnitArg>,
        #[arg(long, value_enum)]
        time_format: Option<TimeFormatArg>,
        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,
    },
    /// Forget recent searches, favorites, last location and preferences
    Reset,
}

#[derive(Subcommand)]
enum FavoriteAction {
    /// List saved places
    List,
    /// Look up a city and save it
    Add { city: String },
    /// Remove by id
    Remove { id: String },
}

#[derive(Args)]
struct PlaceArgs {
    /// City name; defaults to the last viewed place
    city: Option<String>,
    #[arg(long, requires = "lon", conflicts_with = "city", allow_negative_numbers = true)]
    lat: Option<f64>,
    #[arg(long, requires = "lat", conflicts_with = "city", allow_negative_numbers = true)]
    lon: Option<f64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitArg {
    C,
    F,
}

#[derive(Clone, Copy, ValueEnum)]
enum TimeFormatArg {
    #[value(name = "12h")]
    Twelve,
    #[value(name = "24h")]
    TwentyFour,
}

#[derive(Clone, Copy, ValueEnum)]
enum ThemeArg {
    Light,
    Dark,
    Auto,
}

/// Everything a command may need, built once from configuration
struct App {
    config: Config,
    client: WeatherClient,
    geocoder: Geocoder,
    store: LocalStore,
    json: bool,
}

impl App {
    fn new(config: Config, json: bool) -> Result<Self> {
        let timeout = Duration::from_secs(config.api.request_timeout_secs);
        let ttl = CacheTtl {
            current: Duration::from_secs(u64::from(config.cache.current_ttl_minutes) * 60),
            forecast: Duration::from_secs(u64::from(config.cache.forecast_ttl_minutes) * 60),
        };

        let weather_key = config
            .api
            .has_weather_key()
            .then(|| config.api.openweather_api_key.clone());
        let client = WeatherClient::new(weather_key)
            .map_err(AppError::from)?
            .with_base_url(&config.api.weather_base_url)
            .with_cache_policy(ttl, Arc::new(SystemClock))
            .with_request_timeout(timeout)
            .map_err(AppError::from)?;

        let geocoding_key = config
            .api
            .has_geocoding_key()
            .then(|| config.api.locationiq_api_key.clone());
        let geocoder = Geocoder::new(geocoding_key)
            .map_err(AppError::from)?
            .with_base_url(&config.api.geocoding_base_url);

        let store = LocalStore::new(config.config_dir.clone());

        Ok(Self {
            config,
            client,
            geocoder,
            store,
            json,
        })
    }

    /// City, coordinates, last viewed place, or the configured default city.
    fn query_for(&self, place: &PlaceArgs) -> SearchQuery {
        if let Some(city) = &place.city {
            return SearchQuery::city(city.as_str());
        }
        if let (Some(lat), Some(lon)) = (place.lat, place.lon) {
            return SearchQuery::coords(lat, lon);
        }
        match self.store.last_location() {
            Some(last) => {
                tracing::debug!("Using last location: {}", last.name);
                SearchQuery::coords(last.lat, last.lon)
            }
            None => SearchQuery::city(self.config.location.default_city.as_str()),
        }
    }

    /// Persist what was just shown. Failures here never fail the command.
    fn remember(&self, query: &SearchQuery, report_name: &str, coords: Coordinates) {
        if let SearchQuery::City(city) = query {
            if let Err(e) = self.store.add_recent_search(city) {
                tracing::warn!("Could not record recent search: {:#}", e);
            }
        }
        if let Err(e) = self.store.save_last_location(coords, report_name) {
            tracing::warn!("Could not record last location: {:#}", e);
        }
    }

    fn print_json(&self, value: &serde_json::Value) -> Result<()> {
        let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
        println!("{}", text);
        Ok(())
    }

    fn place_label(report: &WeatherReport) -> String {
        match report.current.sys.country.as_deref() {
            Some(country) if !report.current.name.is_empty() => {
                format!("{}, {}", report.current.name, country)
            }
            _ if !report.current.name.is_empty() => report.current.name.clone(),
            _ => report.current.coord.label(),
        }
    }

    async fn current(&self, place: &PlaceArgs) -> Result<()> {
        let query = self.query_for(place);
        let current = self.client.fetch_current(&query).await.map_err(AppError::from)?;

        let name = if current.name.is_empty() {
            current.coord.label()
        } else {
            current.name.clone()
        };
        self.remember(&query, &name, current.coord);

        if self.json {
            return self.print_json(&serde_json::to_value(&current)?);
        }
        let prefs = self.store.preferences();
        println!("{}", render::current(&prefs, &name, &current));
        Ok(())
    }

    async fn forecast(&self, place: &PlaceArgs, hours: usize) -> Result<()> {
        let query = self.query_for(place);
        let report = self.client.fetch_report(&query).await.map_err(AppError::from)?;
        let label = Self::place_label(&report);
        self.remember(&query, &label, report.current.coord);
        self.show_report(&label, &report, hours)
    }

    async fn here(&self, lat: Option<f64>, lon: Option<f64>) -> Result<()> {
        let location = &self.config.location;
        let coords = match (lat, lon) {
            (Some(lat), Some(lon)) => Coordinates::new(lat, lon),
            _ => Coordinates::new(location.latitude, location.longitude),
        };

        let resolver = LocationResolver::new(Arc::new(FixedPosition(coords)), self.geocoder.clone())
            .with_timeout(Duration::from_secs(location.timeout_secs))
            .with_max_age(Duration::from_secs(u64::from(location.max_age_minutes) * 60));

        let place = resolver
            .resolve_current_place()
            .await
            .map_err(AppError::from)?;

        let query = SearchQuery::coords(place.lat, place.lon);
        let report = self.client.fetch_report(&query).await.map_err(AppError::from)?;
        self.remember(&query, &place.place_name, Coordinates::new(place.lat, place.lon));
        self.show_report(&place.place_name, &report, DEFAULT_HOURLY_COUNT)
    }

    fn show_report(&self, label: &str, report: &WeatherReport, hours: usize) -> Result<()> {
        let daily = report.daily();
        let hourly = report.hourly(hours);

        if self.json {
            return self.print_json(&serde_json::json!({
                "place": label,
                "current": report.current,
                "daily": daily,
                "hourly": hourly,
            }));
        }

        let prefs = self.store.preferences();
        let offset = report
            .forecast
            .city
            .as_ref()
            .and_then(|c| c.timezone)
            .or(report.current.timezone);

        println!("{}", render::current(&prefs, label, &report.current));
        println!("\nNext hours");
        println!("{}", render::hourly(&prefs, &hourly, offset));
        println!("\nNext days");
        println!("{}", render::daily(&prefs, &daily));
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<()> {
        let candidates = self
            .geocoder
            .search(query, limit)
            .await
            .map_err(AppError::from)?;

        if self.json {
            return self.print_json(&serde_json::to_value(&candidates)?);
        }
        println!("{}", render::candidates(&candidates));
        Ok(())
    }

    fn recent(&self, clear: bool) -> Result<()> {
        if clear {
            self.store.clear_recent_searches()?;
        }
        let recent = self.store.recent_searches();

        if self.json {
            return self.print_json(&serde_json::to_value(&recent)?);
        }
        if recent.is_empty() {
            println!("No recent searches.");
        }
        for city in recent {
            println!("  {}", city);
        }
        Ok(())
    }

    async fn favorites(&self, action: Option<FavoriteAction>) -> Result<()> {
        match action.unwrap_or(FavoriteAction::List) {
            FavoriteAction::List => {}
            FavoriteAction::Add { city } => {
                let current = self
                    .client
                    .fetch_current_by_city(&city)
                    .await
                    .map_err(AppError::from)?;
                let mut favorite = Favorite::new(current.name.clone(), current.coord);
                favorite.country = current.sys.country.clone();

                if !self.store.add_favorite(favorite)? {
                    eprintln!("{} is already a favorite.", current.name);
                }
            }
            FavoriteAction::Remove { id } => {
                if !self.store.remove_favorite(&id)? {
                    eprintln!("No favorite with id {}.", id);
                }
            }
        }

        let favorites = self.store.favorites();
        if self.json {
            return self.print_json(&serde_json::to_value(&favorites)?);
        }
        println!("{}", render::favorites(&favorites));
        Ok(())
    }

    fn prefs(
        &self,
        unit: Option<UnitArg>,
        time_format: Option<TimeFormatArg>,
        theme: Option<ThemeArg>,
    ) -> Result<()> {
        let update = PreferencesUpdate {
            temperature_unit: unit.map(|u| match u {
                UnitArg::C => TemperatureUnit::Celsius,
                UnitArg::F => TemperatureUnit::Fahrenheit,
            }),
            time_format: time_format.map(|t| match t {
                TimeFormatArg::Twelve => TimeFormat::TwelveHour,
                TimeFormatArg::TwentyFour => TimeFormat::TwentyFourHour,
            }),
            theme: theme.map(|t| match t {
                ThemeArg::Light => Theme::Light,
                ThemeArg::Dark => Theme::Dark,
                ThemeArg::Auto => Theme::Auto,
            }),
        };

        let prefs = if unit.is_none() && time_format.is_none() && theme.is_none() {
            self.store.preferences()
        } else {
            self.store.update_preferences(update)?
        };

        if self.json {
            return self.print_json(&serde_json::to_value(prefs)?);
        }
        println!("  Unit:        {}", prefs.temperature_unit.symbol());
        println!("  Time format: {}", prefs.time_format.as_str());
        println!("  Theme:       {}", prefs.theme.as_str());
        Ok(())
    }
}

async fn run(cli: Cli) -> Result<()> {
    let (config, _validation) = Config::load_validated()?;
    if !config.api.has_weather_key() {
        tracing::warn!(
            "No OpenWeather API key; set {} or edit {}",
            OPENWEATHER_KEY_ENV,
            config.config_dir.join("config.toml").display()
        );
    }

    let app = App::new(config, cli.json)?;

    match cli.command {
        Command::Current(place) => app.current(&place).await,
        Command::Forecast { place, hours } => app.forecast(&place, hours).await,
        Command::Here { lat, lon } => app.here(lat, lon).await,
        Command::Search { query, limit } => app.search(&query, limit).await,
        Command::Recent { clear } => app.recent(clear),
        Command::Favorites { action } => app.favorites(action).await,
        Command::Prefs {
            unit,
            time_format,
            theme,
        } => app.prefs(unit, time_format, theme),
        Command::Reset => {
            app.store.clear_all()?;
            println!("Local data cleared.");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = weathernow_core::init() {
        eprintln!("Failed to initialize: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            let config_file =
                Config::config_path().unwrap_or_else(|_| PathBuf::from("config.toml"));
            eprintln!("{}", failure_message(&e, &config_file));
            ExitCode::FAILURE
        }
    }
}

/// What the user sees on stderr when a command fails. Configuration problems
/// point at where to fix them.
fn failure_message(e: &anyhow::Error, config_file: &Path) -> String {
    let Some(app_error) = e.downcast_ref::<AppError>() else {
        return format!("Error: {:#}", e);
    };

    if app_error.kind().is_configuration_error() {
        format!(
            "{}\nSet {} / {} or edit {}",
            app_error.user_message(),
            OPENWEATHER_KEY_ENV,
            LOCATIONIQ_KEY_ENV,
            config_file.display()
        )
    } else if let AppError::Config(details) = app_error {
        format!(
            "{}\n{} ({})",
            app_error.user_message(),
            details,
            config_file.display()
        )
    } else {
        app_error.user_message().to_string()
    }
}
