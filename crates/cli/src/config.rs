//! Application configuration, merged from TOML and environment variables.

use std::num::NonZeroU32;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use autoclose_manager::ManagerConfig;
use autoclose_tradier::TradierClientConfig;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub tradier: TradierConfig,
    #[serde(default)]
    pub manager: ManagerConfig,
}

/// Brokerage environment selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Brokerage,
    Sandbox,
}

/// Brokerage connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradierConfig {
    pub environment: Environment,
    pub account_id: String,
    /// Override for the token environment variable; each environment has a
    /// sensible default.
    pub token_env: Option<String>,
    pub requests_per_minute: Option<u32>,
    pub timeout_secs: Option<u64>,
}

impl TradierConfig {
    /// Builds the client configuration from the environment preset plus any
    /// overrides set here.
    pub fn to_client_config(&self) -> Result<TradierClientConfig> {
        let mut config = match self.environment {
            Environment::Brokerage => TradierClientConfig::brokerage(),
            Environment::Sandbox => TradierClientConfig::sandbox(),
        }
        .with_account_id(self.account_id.clone());

        if let Some(token_env) = &self.token_env {
            config = config.with_token_env(token_env.clone());
        }
        if let Some(rpm) = self.requests_per_minute {
            let rpm = NonZeroU32::new(rpm).context("requests_per_minute must be nonzero")?;
            config = config.with_rate_limit(rpm);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout_secs(secs);
        }
        Ok(config)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads application configuration by merging a TOML file with
    /// `AUTOCLOSE_`-prefixed environment variables. Nesting uses a double
    /// underscore: `AUTOCLOSE_TRADIER__ACCOUNT_ID` sets `tradier.account_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read or parsed.
    pub fn load(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("AUTOCLOSE_").split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn loads_toml_with_manager_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "Config.toml",
                r#"
                [tradier]
                environment = "sandbox"
                account_id = "VA000001"
            "#,
            )?;

            let config = ConfigLoader::load("Config.toml").expect("config loads");
            assert_eq!(config.tradier.environment, Environment::Sandbox);
            assert_eq!(config.tradier.account_id, "VA000001");
            assert_eq!(config.manager.profit_threshold, Decimal::new(20, 2));
            assert_eq!(config.manager.loop_limit, 20_000);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "Config.toml",
                r#"
                [tradier]
                environment = "sandbox"
                account_id = "VA000001"
            "#,
            )?;
            jail.set_env("AUTOCLOSE_TRADIER__ACCOUNT_ID", "VA999999");

            let config = ConfigLoader::load("Config.toml").expect("config loads");
            assert_eq!(config.tradier.account_id, "VA999999");
            Ok(())
        });
    }

    #[test]
    fn client_config_applies_overrides() {
        let tradier = TradierConfig {
            environment: Environment::Sandbox,
            account_id: "VA000001".to_string(),
            token_env: Some("MY_TOKEN".to_string()),
            requests_per_minute: Some(120),
            timeout_secs: Some(10),
        };
        let client_config = tradier.to_client_config().unwrap();
        assert_eq!(client_config.token_env, "MY_TOKEN");
        assert_eq!(client_config.requests_per_minute.get(), 120);
        assert_eq!(client_config.timeout_secs, 10);
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let tradier = TradierConfig {
            environment: Environment::Brokerage,
            account_id: "VA000001".to_string(),
            token_env: None,
            requests_per_minute: Some(0),
            timeout_secs: None,
        };
        assert!(tradier.to_client_config().is_err());
    }
}
