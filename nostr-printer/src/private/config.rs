use crate::classifier::SINCE_EPSILON;
use crate::errors::IdentityError;
use crate::filter::RecipientSource;
use crate::identity::{resolve_address, validate_pubkey, LightningAddress};
use crate::request::DEFAULT_SUBSCRIPTION_ID;
use anyhow::{anyhow, Context, Result};
use nostr_printer_common::types::Timestamp;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the recipient filter comes from. Exactly one of the two may be configured.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientConfig {
    /// `name@domain`, resolved to a public key at startup.
    Lnaddress(String),
    Pubkeys(Vec<String>),
}

impl RecipientConfig {
    /// Resolves the lightning address, or validates the listed keys.
    pub async fn into_source(self) -> Result<RecipientSource, IdentityError> {
        match self {
            RecipientConfig::Lnaddress(address) => {
                let address: LightningAddress = address.parse()?;
                Ok(RecipientSource::Resolved(resolve_address(&address).await?))
            }
            RecipientConfig::Pubkeys(keys) => keys
                .iter()
                .map(|key| validate_pubkey(key))
                .collect::<Result<Vec<_>, _>>()
                .map(RecipientSource::Configured),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub relay_url: String,
    pub store_dir: PathBuf,

    #[serde(default = "default_subscription_id")]
    pub subscription_id: String,
    #[serde(default)]
    pub kinds: Vec<u32>,
    #[serde(default)]
    pub recipient: Option<RecipientConfig>,
    #[serde(default)]
    pub until: Option<Timestamp>,
    #[serde(default = "default_since_epsilon")]
    pub since_epsilon: Timestamp,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_blink_ms")]
    pub blink_ms: u64,

    /// Printer device node; stdout when absent.
    #[serde(default)]
    pub printer_device: Option<PathBuf>,
    /// sysfs `brightness` file of the indicator LED.
    #[serde(default)]
    pub led_path: Option<PathBuf>,
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

fn default_subscription_id() -> String {
    DEFAULT_SUBSCRIPTION_ID.to_string()
}

fn default_since_epsilon() -> Timestamp {
    SINCE_EPSILON
}

fn default_reconnect_interval_ms() -> u64 {
    1_000
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_blink_ms() -> u64 {
    250
}

impl Config {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn blink(&self) -> Duration {
        Duration::from_millis(self.blink_ms)
    }

    /// `RELAY_URL` from the environment (or `.env`) wins over the file.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("RELAY_URL") {
            if !url.is_empty() {
                self.relay_url = url;
            }
        }
    }

    pub fn from_value(value: toml::Value) -> Result<Self> {
        let config = Config::deserialize(value)?;
        if config.relay_url.is_empty() {
            return Err(anyhow!("relay_url is empty"));
        }
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P, section: &str) -> Result<Self> {
        Self::from_value(load_config(path, section)?)
    }
}

/// Returns the `section` table of the TOML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P, section: &str) -> Result<toml::Value> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    let mut doc: toml::Table = toml::from_str(&content)
        .with_context(|| format!("cannot parse config file {}", path.display()))?;
    doc.remove(section)
        .ok_or_else(|| anyhow!("no {section} section in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_minimal_config_defaults() {
        let file = write_config(
            r#"
            [printer]
            relay_url = "wss://relay.example.com"
            store_dir = "/tmp/printer"
            "#,
        );
        let config = Config::load(file.path(), "printer").unwrap();

        assert_eq!(config.subscription_id, "query:data");
        assert_eq!(config.since_epsilon, 10);
        assert_eq!(config.reconnect_interval(), Duration::from_secs(1));
        assert_eq!(config.blink(), Duration::from_millis(250));
        assert!(config.kinds.is_empty());
        assert_eq!(config.recipient, None);
        assert_eq!(config.until, None);
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"
            [printer]
            relay_url = "wss://relay.example.com"
            store_dir = "/tmp/printer"
            kinds = [1112]
            until = 2000000000
            since_epsilon = 3
            recipient = { lnaddress = "alice@example.com" }
            "#,
        );
        let config = Config::load(file.path(), "printer").unwrap();

        assert_eq!(config.kinds, vec![1112]);
        assert_eq!(config.until, Some(2_000_000_000));
        assert_eq!(config.since_epsilon, 3);
        assert_eq!(
            config.recipient,
            Some(RecipientConfig::Lnaddress("alice@example.com".to_string()))
        );
    }

    #[test]
    fn test_pubkeys_recipient() {
        let file = write_config(
            r#"
            [printer]
            relay_url = "wss://relay.example.com"
            store_dir = "/tmp/printer"

            [printer.recipient]
            pubkeys = ["aa", "bb"]
            "#,
        );
        let config = Config::load(file.path(), "printer").unwrap();
        assert_eq!(
            config.recipient,
            Some(RecipientConfig::Pubkeys(vec!["aa".to_string(), "bb".to_string()]))
        );
    }

    #[tokio::test]
    async fn test_pubkeys_into_source() {
        let key = "e17feb5f2cf83546bcf7fd9c8237b05275be958bd521543c2285ffc6c2d654b3";
        let source = RecipientConfig::Pubkeys(vec![key.to_ascii_uppercase()])
            .into_source()
            .await
            .unwrap();
        assert_eq!(source, RecipientSource::Configured(vec![key.to_string()]));

        let result = RecipientConfig::Pubkeys(vec!["abc".to_string()])
            .into_source()
            .await;
        assert!(matches!(result, Err(IdentityError::InvalidKey(_))));

        let result = RecipientConfig::Lnaddress("nobody".to_string())
            .into_source()
            .await;
        assert!(matches!(result, Err(IdentityError::InvalidAddress(_))));
    }

    #[test]
    fn test_config_errors() {
        let file = write_config("[other]\nrelay_url = \"x\"\n");
        assert!(load_config(file.path(), "printer").is_err());

        let file = write_config("[printer]\nrelay_url = \"\"\nstore_dir = \"/tmp\"\n");
        assert!(load_config(file.path(), "printer").is_ok());
        assert!(Config::load(file.path(), "printer").is_err());

        assert!(load_config("/definitely/not/here.toml", "printer").is_err());
    }
}
