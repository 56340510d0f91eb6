use std::{sync::Arc, time::Duration};

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use homeweather_core::{
    AcquisitionState, AcquisitionStateMachine, Config, FileStore, HomeLocation,
    HomeLocationStore, IpLocationProvider, LocationResolver, OpenWeatherFetcher,
    OpenWeatherGeocoder, PlaceCandidate, PreferenceStore, SearchCoordinator, Units,
    WeatherSession,
};
use inquire::{Confirm, Password, Select, Text};
use tracing::{debug, info, warn};

use crate::render;

/// Upper bound on how long `search` waits for an answer.
const SEARCH_WAIT: Duration = Duration::from_secs(30);

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "homeweather", version, about = "Weather for your home location")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively set the API key, units, language and location access.
    Configure,

    /// Resolve the current location of this machine.
    Locate {
        /// Store the resolved location as the home location.
        #[arg(long)]
        save: bool,
    },

    /// Search places by name.
    Search {
        /// Place name, e.g. "Brno".
        query: String,

        /// Choose one of the results as the home location.
        #[arg(long)]
        pick: bool,
    },

    /// Set the home location explicitly.
    SetHome {
        name: String,
        latitude: String,
        longitude: String,
    },

    /// Forget the home location.
    ClearHome,

    /// Show weather for the home location.
    Show {
        /// Number of hourly entries to print.
        #[arg(long, default_value_t = 12)]
        hours: usize,

        /// Number of daily entries to print.
        #[arg(long, default_value_t = 7)]
        days: usize,

        /// Override the configured units: metric, imperial or standard.
        #[arg(long)]
        units: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Locate { save } => locate(save).await,
            Command::Search { query, pick } => search(&query, pick).await,
            Command::SetHome {
                name,
                latitude,
                longitude,
            } => set_home(name, latitude, longitude).await,
            Command::ClearHome => {
                home_store()?.clear().await?;
                println!("Home location cleared.");
                Ok(())
            }
            Command::Show { hours, days, units } => show(hours, days, units.as_deref()).await,
        }
    }
}

fn preference_store() -> anyhow::Result<Arc<dyn PreferenceStore>> {
    Ok(Arc::new(FileStore::new(Config::preferences_file_path()?)))
}

fn home_store() -> anyhow::Result<HomeLocationStore> {
    Ok(HomeLocationStore::new(preference_store()?))
}

/// Keyless geocoding still resolves locations, only without place names.
fn geocoder(config: &Config) -> Arc<OpenWeatherGeocoder> {
    let api_key = config.api_key();
    if api_key.is_none() {
        warn!("no OpenWeather API key configured, place names are unavailable");
    }
    Arc::new(OpenWeatherGeocoder::new(
        api_key,
        config.weather.language.clone(),
    ))
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_help_message("Leave empty to keep the current key")
        .prompt()?;
    if !api_key.trim().is_empty() {
        config.api_key = Some(api_key.trim().to_string());
    }

    let current_units = Units::all()
        .iter()
        .position(|u| *u == config.weather.units)
        .unwrap_or(0);
    config.weather.units = Select::new("Units:", Units::all().to_vec())
        .with_starting_cursor(current_units)
        .prompt()?;

    config.weather.language = Text::new("Language of weather descriptions:")
        .with_default(&config.weather.language)
        .prompt()?;

    config.location.enabled = Confirm::new("Allow locating this machine by its IP address?")
        .with_default(config.location.enabled)
        .prompt()?;

    config.save()?;
    info!(units = %config.weather.units, language = %config.weather.language, "configuration updated");
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn locate(save: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let store = preference_store()?;

    let device = Arc::new(IpLocationProvider::new(
        config.location.enabled,
        config.location.lookup_url.clone(),
        store.clone(),
    ));
    let resolver = LocationResolver::new(device, geocoder(&config))
        .with_fix_timeout(config.location.fix_timeout());

    let resolved = resolver
        .resolve_current_location()
        .await
        .context("Could not determine the current location")?;

    println!("{} ({})", resolved.display_name, resolved.coordinates);

    if save {
        HomeLocationStore::new(store)
            .save(&HomeLocation::from_resolved(&resolved))
            .await?;
        println!("Saved as home location.");
    }
    Ok(())
}

async fn search(query: &str, pick: bool) -> anyhow::Result<()> {
    let wanted = query.trim().to_string();
    if wanted.is_empty() {
        bail!("Search query is empty");
    }

    let config = Config::load()?;
    let coordinator = SearchCoordinator::with_settings(
        geocoder(&config),
        config.search.debounce(),
        config.search.limit,
    );
    let mut updates = coordinator.subscribe();

    coordinator.on_query_changed(&wanted);

    let results: Vec<PlaceCandidate> = tokio::time::timeout(
        SEARCH_WAIT,
        updates.wait_for(|s| s.resolved_for.as_deref() == Some(wanted.as_str())),
    )
    .await
    .context("Search timed out")?
    .map_err(|_| anyhow!("Search stopped unexpectedly"))?
    .results
    .clone();

    if results.is_empty() {
        println!("No places found for \"{wanted}\".");
        return Ok(());
    }

    if !pick {
        for candidate in &results {
            println!("{}", render::candidate_line(candidate));
        }
        return Ok(());
    }

    let labels: Vec<String> = results.iter().map(render::candidate_line).collect();
    let chosen = Select::new("Home location:", labels.clone()).prompt()?;
    let index = labels
        .iter()
        .position(|l| *l == chosen)
        .ok_or_else(|| anyhow!("Selected place is no longer available"))?;

    let home = HomeLocation::from_candidate(&results[index]);
    home_store()?.save(&home).await?;
    println!("Home location set to {}.", home.name);
    Ok(())
}

async fn set_home(name: String, latitude: String, longitude: String) -> anyhow::Result<()> {
    let home = HomeLocation::new(name, latitude, longitude)
        .ok_or_else(|| anyhow!("Location name must not be empty"))?;
    let coordinates = home.coordinates().context("Invalid coordinates")?;

    home_store()?.save(&home).await?;
    println!("Home location set to {} ({}).", home.name, coordinates);
    Ok(())
}

async fn show(hours: usize, days: usize, units: Option<&str>) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(units) = units {
        config.weather.units = Units::try_from(units)?;
    }
    debug!(units = %config.weather.units, "showing weather");
    let fetcher = Arc::new(OpenWeatherFetcher::new(config.api_key()));
    let machine = AcquisitionStateMachine::new(fetcher, config.acquisition_settings());
    let session = WeatherSession::new(home_store()?, machine);

    let Some(state) = session.show().await? else {
        info!("no home location stored");
        bail!(
            "No home location set.\n\
             Hint: run `homeweather locate --save` or `homeweather search <place> --pick`."
        );
    };

    let options = render::ViewOptions {
        hours,
        days,
        units: config.weather.units,
    };
    match &state {
        AcquisitionState::Success { data } => {
            render::print_snapshot(data, &options);
            Ok(())
        }
        AcquisitionState::Failed { message, previous } => {
            if let Some(previous) = previous {
                render::print_snapshot(previous, &options);
            }
            Err(anyhow!(
                "{message}\nHint: run `homeweather show` again to retry."
            ))
        }
        other => Err(anyhow!("Weather is not available ({other:?})")),
    }
}
