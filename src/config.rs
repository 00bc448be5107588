use crate::permit::BetPolicy;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    path::Path,
    time::Duration,
};

pub const DEFAULT_API_BASE: &str = "https://clawsvegas.com";
pub const DEFAULT_API_VERSION: &str = "v3";
pub const DEFAULT_AUTH_NAMESPACE: &str = "ClawsVegas";
pub const CONFIG_FILE: &str = "config.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base: String,
    pub api_version: String,
    pub auth_namespace: String,
    pub currency: String,
    pub min_bet: f64,
    pub max_bet: f64,
    pub request_timeout_secs: u64,
    pub require_signed_requests: bool,
    pub autonomous: AutonomousConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            auth_namespace: DEFAULT_AUTH_NAMESPACE.to_string(),
            currency: "USDC".to_string(),
            min_bet: 1.0,
            max_bet: 100.0,
            request_timeout_secs: 30,
            require_signed_requests: false,
            autonomous: AutonomousConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutonomousConfig {
    pub chat_probability: f64,
    pub play_probability: f64,
    pub min_bet_usdc: f64,
    pub max_bet_usdc: f64,
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for AutonomousConfig {
    fn default() -> Self {
        Self {
            chat_probability: 0.3,
            play_probability: 0.2,
            min_bet_usdc: 1.0,
            max_bet_usdc: 5.0,
            min_delay_secs: 30,
            max_delay_secs: 120,
        }
    }
}

impl Config {
    /// Reads `path` when given, otherwise `config.json` in `home` if it exists.
    pub fn load(explicit: Option<&Path>, home: &Path) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = home.join(CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    tracing::debug!(path = %default_path.display(), "no config file, using defaults");
                    Self::default()
                }
            }
        };
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .wrap_err_with(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_slice::<Config>(&data)
            .wrap_err_with(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn with_api_base(mut self, api_base: Option<String>) -> Self {
        if let Some(api_base) = api_base {
            self.api_base = api_base;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min_bet.is_finite() || !self.max_bet.is_finite() {
            return Err(eyre!("Bet bounds must be finite numbers"));
        }
        if self.min_bet <= 0.0 {
            return Err(eyre!("min_bet must be positive, got {}", self.min_bet));
        }
        if self.min_bet > self.max_bet {
            return Err(eyre!(
                "min_bet ({}) may not exceed max_bet ({})",
                self.min_bet,
                self.max_bet
            ));
        }
        if self.api_base.trim().is_empty() {
            return Err(eyre!("api_base may not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(eyre!("request_timeout_secs must be at least 1"));
        }
        let auto = &self.autonomous;
        for (name, p) in [
            ("chat_probability", auto.chat_probability),
            ("play_probability", auto.play_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(eyre!("{name} must be within [0, 1], got {p}"));
            }
        }
        if auto.min_delay_secs > auto.max_delay_secs {
            return Err(eyre!(
                "min_delay_secs ({}) may not exceed max_delay_secs ({})",
                auto.min_delay_secs,
                auto.max_delay_secs
            ));
        }
        for (name, amount) in [
            ("min_bet_usdc", auto.min_bet_usdc),
            ("max_bet_usdc", auto.max_bet_usdc),
        ] {
            if !amount.is_finite() || amount <= 0.0 {
                return Err(eyre!("{name} must be a positive number, got {amount}"));
            }
        }
        if auto.min_bet_usdc > auto.max_bet_usdc {
            return Err(eyre!(
                "min_bet_usdc ({}) may not exceed max_bet_usdc ({})",
                auto.min_bet_usdc,
                auto.max_bet_usdc
            ));
        }
        Ok(())
    }

    /// `<api_base>/<api_version>` with no trailing slash.
    pub fn api_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            self.api_version.trim_matches('/')
        )
    }

    pub fn policy(&self) -> BetPolicy {
        BetPolicy::new(self.min_bet, self.max_bet)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
