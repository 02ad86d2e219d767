use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password, Text};
use std::sync::Arc;

use weatherboard_core::{
    Config, ConfigProvider, DEFAULT_LEVEL, DEFAULT_LIMIT, FetchClient, FetchError, RecordStore,
    ScoreRecord, StoreError, WeatherRecord, config::DEFAULT_BASE_URL,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherboard", version, about = "Weather lookup and high-score board")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the weather API key and endpoint.
    Configure,

    /// Show current weather for a city.
    Weather {
        /// City name, e.g. "London".
        city: String,

        /// Print the decoded record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Manage the high-score board.
    Scores {
        #[command(subcommand)]
        command: ScoresCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ScoresCommand {
    /// Record a new score.
    Add {
        player: String,
        score: i64,

        #[arg(long, default_value = DEFAULT_LEVEL)]
        level: String,
    },

    /// List the best scores, optionally for one level.
    Top {
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: i64,

        #[arg(long)]
        level: Option<String>,
    },

    /// Print the number of stored scores.
    Count,

    /// Delete every stored score.
    Clear {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(starting_config(Config::load())),
            Command::Weather { city, json } => show_weather(load_config()?, &city, json).await,
            Command::Scores { command } => {
                let config = load_config()?;
                let store = RecordStore::open_default(&config)
                    .map_err(|e| anyhow::anyhow!(store_message(&e)))?;
                let result = run_scores(&store, command);
                store.close().map_err(|e| anyhow::anyhow!(store_message(&e)))?;
                result
            }
        }
    }
}

fn load_config() -> anyhow::Result<Config> {
    Ok(Config::load()?.with_env_overrides())
}

/// `configure` must be able to repair an unreadable config file, so it starts fresh instead.
fn starting_config(loaded: anyhow::Result<Config>) -> Config {
    loaded.unwrap_or_else(|err| {
        eprintln!("Ignoring existing configuration: {err:#}");
        Config::default()
    })
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        bail!("API key cannot be empty");
    }
    config.set_api_key(api_key);

    let base_url = Text::new("Endpoint URL:")
        .with_default(config.base_url())
        .prompt()
        .context("Failed to read endpoint URL")?;
    config.base_url = (base_url.trim() != DEFAULT_BASE_URL).then(|| base_url.trim().to_string());

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn show_weather(config: Config, city: &str, json: bool) -> anyhow::Result<()> {
    if city.trim().is_empty() {
        bail!("Please enter a city name");
    }

    let client = FetchClient::new(Arc::new(config));
    let record = client.fetch(city).await.map_err(|e| anyhow::anyhow!(fetch_message(&e)))?;

    if !record.is_valid() {
        bail!("Received incomplete weather data for '{}'", city.trim());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print!("{}", render_weather(&record));
    }
    Ok(())
}

fn run_scores(store: &RecordStore, command: ScoresCommand) -> anyhow::Result<()> {
    let map = |e: StoreError| anyhow::anyhow!(store_message(&e));

    match command {
        ScoresCommand::Add { player, score, level } => {
            let record = store.add_for_level(&player, score, &level).map_err(map)?;
            println!("Added #{}: {} - {} points ({})", record.id, record.player_name, record.score, record.level_name);
        }
        ScoresCommand::Top { limit, level } => {
            let rows = match &level {
                Some(level) => store.top_scores_for_level(level, limit),
                None => store.top_scores(limit),
            }
            .map_err(map)?;

            if rows.is_empty() {
                println!("No scores recorded yet");
            }
            for (rank, row) in rows.iter().enumerate() {
                println!("{}", render_score(rank + 1, row));
            }
        }
        ScoresCommand::Count => {
            println!("{}", store.count().map_err(map)?);
        }
        ScoresCommand::Clear { yes } => {
            let confirmed = yes
                || Confirm::new("Delete all high scores? This cannot be undone.")
                    .with_default(false)
                    .prompt()
                    .context("Failed to read confirmation")?;
            if confirmed {
                store.clear_all().map_err(map)?;
                println!("All high scores cleared");
            }
        }
    }

    Ok(())
}

fn render_weather(record: &WeatherRecord) -> String {
    let mut out = match &record.country {
        Some(country) => format!("Weather in {}, {}\n", record.city, country),
        None => format!("Weather in {}\n", record.city),
    };

    if let Some(m) = &record.measurements {
        out.push_str(&format!("Temperature: {:.1}°C (feels like {:.1}°C)\n", m.temperature_c, m.feels_like_c));
        out.push_str(&format!("Humidity: {}%\n", m.humidity_pct));
        out.push_str(&format!("Pressure: {} hPa\n", m.pressure_hpa));
    }
    if let Some(speed) = record.wind_speed_mps {
        out.push_str(&format!("Wind: {speed:.1} m/s\n"));
    }
    out.push_str(&format!("Conditions: {}\n", record.primary_description()));
    out
}

fn render_score(rank: usize, row: &ScoreRecord) -> String {
    format!(
        "{rank:>3}. {:<20} {:>8}  {:<12} {}",
        row.player_name,
        row.score,
        row.level_name,
        row.created_at.format("%Y-%m-%d %H:%M")
    )
}

fn fetch_message(err: &FetchError) -> String {
    match err {
        FetchError::InvalidInput => "Please enter a city name".to_string(),
        FetchError::Config(_) => {
            "API key not configured.\nHint: run `weatherboard configure` or set WEATHERBOARD_API_KEY."
                .to_string()
        }
        FetchError::Network(msg) => format!("Network error: check your connection ({msg})"),
        FetchError::Http { status: 401, .. } => "Invalid API key (HTTP 401)".to_string(),
        FetchError::Http { status: 404, .. } => "City not found".to_string(),
        FetchError::Http { status, message } => format!("Weather service error {status}: {message}"),
        FetchError::Transport(msg) => format!("Failed to download weather data: {msg}"),
        FetchError::Decode(msg) => format!("Received unreadable weather data: {msg}"),
    }
}

fn store_message(err: &StoreError) -> String {
    match err {
        StoreError::InvalidInput(msg) => format!("Invalid input: {msg}"),
        StoreError::Unavailable(msg) => format!("High-score database is unavailable: {msg}"),
        StoreError::Io(e) => format!("High-score database error: {e}"),
        StoreError::AlreadyOpen(path) => {
            format!("High-score database {} is already in use", path.display())
        }
    }
}
