use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use crate::sports;
use crate::utils::DisplayOptions;

pub const DEFAULT_HUME_URL: &str = "https://api.hume.ai";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub hume: HumeConfig,
    pub history: HistoryConfig,
    pub formatting: FormattingConfig,
    pub athlete: AthleteConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HumeConfig {
    pub base_url: String,
    pub api_key: String,
    pub secret_key: String,
    pub page_size: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HistoryConfig {
    pub refresh_interval_seconds: u64,
    pub top_emotions: usize,
    #[serde(default)]
    pub collapsed: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FormattingConfig {
    pub decimal_places: usize,
    pub use_utc: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AthleteConfig {
    pub sport: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hume: HumeConfig {
                base_url: DEFAULT_HUME_URL.to_string(),
                api_key: "".to_string(),
                secret_key: "".to_string(),
                page_size: 50,
                timeout_seconds: 30,
            },
            history: HistoryConfig {
                refresh_interval_seconds: 20,
                top_emotions: 3,
                collapsed: Vec::new(),
            },
            formatting: FormattingConfig {
                decimal_places: 3,
                use_utc: false,
            },
            athlete: AthleteConfig {
                sport: sports::DEFAULT_SPORT.to_string(),
            },
        }
    }
}

thread_local! {
    static TEST_CONFIG_PATH: RefCell<Option<PathBuf>> = const { RefCell::new(None) };
}

#[cfg(test)]
pub fn set_test_config_path(path: PathBuf) {
    TEST_CONFIG_PATH.with(|p| *p.borrow_mut() = Some(path));
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(test)]
        {
            if let Some(path) = TEST_CONFIG_PATH.with(|p| p.borrow().clone()) {
                return Ok(path);
            }
        }

        Ok(dirs::home_dir()
            .context("Could not find home directory")?
            .join(".peakform.toml"))
    }

    pub fn load() -> Result<Option<Config>> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Reject values `config set` would refuse, so hand edits can't bypass them.
    pub fn validate(&self) -> Result<()> {
        if self.hume.page_size == 0 || self.hume.page_size > 100 {
            anyhow::bail!("Page size must be between 1 and 100");
        }
        if self.history.refresh_interval_seconds == 0 {
            anyhow::bail!("Refresh interval must be at least 1 second");
        }
        Ok(())
    }

    /// Load the config file (or defaults) and apply environment overrides.
    pub fn load_effective() -> Result<Config> {
        let mut config = Self::load()?.unwrap_or_default();
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("HUME_API_KEY")
            && !key.is_empty()
        {
            self.hume.api_key = key;
        }
        if let Ok(secret) = std::env::var("HUME_SECRET_KEY")
            && !secret.is_empty()
        {
            self.hume.secret_key = secret;
        }
    }

    pub fn save(&self, silent: bool) -> Result<()> {
        let config_path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        if !silent {
            println!("✅ Configuration saved to: {}", config_path.display());
        }

        Ok(())
    }

    pub fn is_api_key_missing(&self) -> bool {
        self.hume.api_key.is_empty()
    }

    pub fn is_secret_key_missing(&self) -> bool {
        self.hume.secret_key.is_empty()
    }

    pub fn display_options(&self) -> DisplayOptions {
        DisplayOptions {
            decimal_places: self.formatting.decimal_places,
            use_utc: self.formatting.use_utc,
        }
    }
}

// CLI helper functions
pub fn create_default_config(overwrite: bool) -> Result<()> {
    let config = Config::default();
    if !std::fs::exists(Config::config_path()?)? || overwrite {
        config.save(true)?;

        println!("📝 Created default configuration file.");
        println!("📍 Add your Hume API credentials:");
        println!("   peakform config set api-key ...");
        println!("   peakform config set secret-key ...");
        println!("or");
        println!("   {}", Config::config_path()?.display());
    } else {
        println!("Configuration already exists.  Pass `--overwrite` to overwrite.");
    }

    Ok(())
}

pub fn show_config() -> Result<()> {
    match Config::load()? {
        Some(config) => {
            let set_or_not = |value: &str| if value.is_empty() { "Not set" } else { "Set" };
            println!("🔧 Current configuration:");
            println!("   Hume URL: {}", config.hume.base_url);
            println!("   API Key: {}", set_or_not(&config.hume.api_key));
            println!("   Secret Key: {}", set_or_not(&config.hume.secret_key));
            println!("   Page Size: {}", config.hume.page_size);
            println!(
                "   Refresh Interval: {}s",
                config.history.refresh_interval_seconds
            );
            println!("   Top Emotions: {}", config.history.top_emotions);
            println!("   Decimal Places: {}", config.formatting.decimal_places);
            println!("   Use UTC: {}", config.formatting.use_utc);
            println!("   Sport: {}", config.athlete.sport);
        }
        None => {
            println!("❌ No configuration file found.");
            println!("   Run 'peakform config init' to create one.");
        }
    }
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool> {
    value
        .parse::<bool>()
        .context("Invalid boolean value. Use 'true' or 'false'")
}

pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?.unwrap_or_default();

    match key {
        "api-key" => config.hume.api_key = value.to_string(),
        "secret-key" => config.hume.secret_key = value.to_string(),
        "hume-url" => config.hume.base_url = value.trim_end_matches('/').to_string(),
        "page-size" => {
            let size = value.parse::<u32>().context("Invalid number value")?;
            if size == 0 || size > 100 {
                anyhow::bail!("Page size must be between 1 and 100");
            }
            config.hume.page_size = size;
        }
        "refresh-interval" => {
            let secs = value.parse::<u64>().context("Invalid number value")?;
            if secs == 0 {
                anyhow::bail!("Refresh interval must be at least 1 second");
            }
            config.history.refresh_interval_seconds = secs;
        }
        "top-emotions" => {
            config.history.top_emotions = value.parse::<usize>().context("Invalid number value")?;
        }
        "decimal-places" => {
            config.formatting.decimal_places =
                value.parse::<usize>().context("Invalid number value")?;
        }
        "use-utc" => config.formatting.use_utc = parse_bool(value)?,
        "sport" => {
            let sport = sports::get_sport(value)
                .with_context(|| format!("Unknown sport: {value}"))?;
            config.athlete.sport = sport.slug.to_string();
        }
        _ => anyhow::bail!("Unknown config key: {}", key),
    }

    config.save(false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_config() -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("tempdir");
        let config_path = dir.path().join(".peakform.toml");
        set_test_config_path(config_path.clone());
        (dir, config_path)
    }

    #[test]
    fn default_config_round_trip() {
        let (_dir, _path) = setup_test_config();
        create_default_config(true).expect("create_default_config");

        let loaded = Config::load()
            .expect("load config")
            .expect("config should exist");

        assert_eq!(loaded.hume.base_url, DEFAULT_HUME_URL);
        assert_eq!(loaded.hume.api_key, "");
        assert_eq!(loaded.hume.page_size, 50);
        assert_eq!(loaded.history.refresh_interval_seconds, 20);
        assert_eq!(loaded.history.top_emotions, 3);
        assert!(loaded.history.collapsed.is_empty());
        assert_eq!(loaded.athlete.sport, "tennis");
    }

    #[test]
    fn load_rejects_hand_edited_zero_refresh_interval() {
        let (_dir, path) = setup_test_config();
        create_default_config(true).expect("create_default_config");

        let content = fs::read_to_string(&path).expect("read config");
        let edited = content.replace(
            "refresh_interval_seconds = 20",
            "refresh_interval_seconds = 0",
        );
        assert_ne!(content, edited);
        fs::write(&path, edited).expect("write config");

        let err = Config::load().expect_err("zero interval should be rejected");
        assert!(format!("{err:#}").contains("Refresh interval must be at least 1 second"));
    }

    #[test]
    fn missing_config_loads_as_none() {
        let (_dir, _path) = setup_test_config();
        assert!(Config::load().expect("load config").is_none());
    }

    #[test]
    fn set_config_value_behaviour() {
        let (_dir, _path) = setup_test_config();
        create_default_config(true).expect("create_default_config");

        set_config_value("api-key", "KEY").expect("set api-key");
        set_config_value("secret-key", "SECRET").expect("set secret-key");
        set_config_value("hume-url", "http://localhost:9999/").expect("set hume-url");
        set_config_value("page-size", "25").expect("set page-size");
        set_config_value("refresh-interval", "5").expect("set refresh-interval");
        set_config_value("top-emotions", "5").expect("set top-emotions");
        set_config_value("decimal-places", "2").expect("set decimal-places");
        set_config_value("use-utc", "true").expect("set use-utc");
        set_config_value("sport", "baseball-pitcher").expect("set sport");

        let cfg = Config::load()
            .expect("load config")
            .expect("config should exist");

        assert_eq!(cfg.hume.api_key, "KEY");
        assert_eq!(cfg.hume.secret_key, "SECRET");
        assert_eq!(cfg.hume.base_url, "http://localhost:9999");
        assert_eq!(cfg.hume.page_size, 25);
        assert_eq!(cfg.history.refresh_interval_seconds, 5);
        assert_eq!(cfg.history.top_emotions, 5);
        assert_eq!(cfg.formatting.decimal_places, 2);
        assert!(cfg.formatting.use_utc);
        assert_eq!(cfg.athlete.sport, "baseball-pitcher");

        let options = cfg.display_options();
        assert_eq!(options.decimal_places, 2);
        assert!(options.use_utc);
    }

    #[test]
    fn set_config_value_rejects_bad_input() {
        let (_dir, _path) = setup_test_config();
        create_default_config(true).expect("create_default_config");

        let err = set_config_value("unknown-key", "value").unwrap_err();
        assert!(format!("{err}").contains("Unknown config key"));

        let err = set_config_value("use-utc", "not-a-bool").unwrap_err();
        assert!(format!("{err}").contains("Invalid boolean value"));

        let err = set_config_value("page-size", "500").unwrap_err();
        assert!(format!("{err}").contains("between 1 and 100"));

        let err = set_config_value("refresh-interval", "0").unwrap_err();
        assert!(format!("{err}").contains("at least 1 second"));

        let err = set_config_value("sport", "curling").unwrap_err();
        assert!(format!("{err}").contains("Unknown sport"));
    }

    #[test]
    fn collapsed_buckets_persist() {
        let (_dir, _path) = setup_test_config();
        let mut config = Config::default();
        config.history.collapsed = vec!["yesterday".to_string(), "2025-01".to_string()];
        config.save(true).expect("save");

        let loaded = Config::load().expect("load").expect("exists");
        assert_eq!(loaded.history.collapsed, vec!["yesterday", "2025-01"]);
    }
}
