use std::env;
use std::env::current_dir;
use std::fmt::Display;

use config::Config;
use config::ConfigError;
use secrecy::Secret;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use serde_aux::field_attributes::deserialize_option_number_from_string;

/// Global configuration, loaded from `configuration/*.yaml` and `APP_*` env
/// vars. See `get_configuration`.
///
/// Only `application` is strictly required. Every credential-bearing section
/// may be left (partially) empty; the adapter that depends on it will then
/// refuse to operate instead of preventing startup.
#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    #[serde(default)]
    pub smtp: SmtpSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub mailing_list: MailingListSettings,
}

/// Server configuration
#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    /// Should be localhost on dev machine, 0.0.0.0 on prod
    pub host: String,

    /// 0 lets the OS pick a free port (used by tests)
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
}

/// Outgoing mail server. Usable only when host, port, username and password
/// are all present.
#[derive(Deserialize, Clone, Default)]
pub struct SmtpSettings {
    pub host: Option<String>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<Secret<String>>,

    /// Falls back to `username` when unset
    pub from_address: Option<String>,

    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub timeout_milliseconds: Option<u64>,
}

impl SmtpSettings {
    /// Borrow all four connection parameters at once, or nothing.
    pub fn connection(&self) -> Option<(&str, u16, &str, &Secret<String>)> {
        match (&self.host, self.port, &self.username, &self.password) {
            (Some(host), Some(port), Some(username), Some(password))
                if !host.trim().is_empty() && !username.trim().is_empty() =>
            {
                Some((host.as_str(), port, username.as_str(), password))
            }
            _ => None,
        }
    }

    pub fn sender(&self) -> Option<&str> {
        self.from_address
            .as_deref()
            .or(self.username.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Deserialize, Clone, Default)]
pub struct NotificationSettings {
    /// Operator inbox that receives contact and resource-lead notifications
    pub recipient: Option<String>,
}

/// Mailing-list provider (Mailchimp marketing API)
#[derive(Deserialize, Clone)]
pub struct MailingListSettings {
    pub api_key: Option<Secret<String>>,

    /// Datacenter prefix, e.g. `us21`; determines the API host
    pub server_prefix: Option<String>,

    /// Audience (list) that all leads are written to
    pub audience_id: Option<String>,

    /// Overrides the host derived from `server_prefix`. Used in tests.
    pub base_url: Option<String>,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl Default for MailingListSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            server_prefix: None,
            audience_id: None,
            base_url: None,
            timeout_milliseconds: 10_000,
        }
    }
}

impl MailingListSettings {
    pub fn api_base_url(&self) -> Option<String> {
        match (&self.base_url, &self.server_prefix) {
            (Some(url), _) => Some(url.trim_end_matches('/').to_string()),
            (None, Some(prefix)) if !prefix.trim().is_empty() => {
                Some(format!("https://{}.api.mailchimp.com/3.0", prefix.trim()))
            }
            _ => None,
        }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_milliseconds)
    }
}

pub enum Environment {
    Local,
    Production,
}

impl Display for Environment {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Environment::Local => "local",
                Environment::Production => "production",
            }
        )
    }
}

impl TryFrom<String> for Environment {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            e => Err(format!("Invalid environment: {e}")),
        }
    }
}

/// Load yaml configuration files at `<project_root>/configuration`:
/// `base.yaml`, then `{APP_ENVIRONMENT}.yaml` (default `local`), then `APP_*`
/// env vars.
///
/// Env vars use `__` to descend into sections, e.g.
/// `APP_SMTP__HOST=smtp.example.com`, `APP_MAILING_LIST__API_KEY=...`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let cfg_dir = current_dir()
        .map_err(|e| ConfigError::Message(format!("could not get current dir: {e}")))?
        .join("configuration");

    let env: Environment = env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".to_string())
        .try_into()
        .map_err(ConfigError::Message)?;

    let settings = Config::builder()
        .add_source(config::File::from(cfg_dir.join("base.yaml")))
        .add_source(config::File::from(cfg_dir.join(format!("{env}.yaml"))))
        .add_source(
            // env vars are -always- parsed as String, hence `serde-aux` for numeric fields
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
