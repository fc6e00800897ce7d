//! Configuration system (layered: code > env > config file > credential store).

pub mod credentials;

pub use credentials::{CredentialStore, FileCredentialStore, API_KEY_STORAGE_KEY};

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use strum::{Display, EnumString};

use crate::error::{ConsoleError, Result};

/// Sample rate of every PCM stream the console handles (input, output, artifacts).
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

const DEFAULT_BASE_URL: &str = "wss://api.openai.com/v1/realtime";
const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview-2024-10-01";
const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
const DEFAULT_WEATHER_BASE_URL: &str = "https://api.open-meteo.com";
const DEFAULT_GREETING: &str = "Hello!";
const DEFAULT_INSTRUCTIONS: &str = "You are a helpful voice assistant. \
Speak clearly and keep answers short. \
Use the get_weather tool when asked about the weather somewhere.";

/// How the end of a user turn is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TurnMode {
    /// Push-to-talk: the client commits audio and requests a response.
    #[default]
    Manual,
    /// Server-side voice activity detection ends the turn.
    #[strum(to_string = "server_vad", serialize = "vad")]
    #[serde(alias = "vad")]
    ServerVad,
}

impl TurnMode {
    pub fn push_to_talk(self) -> bool {
        matches!(self, Self::Manual)
    }
}

/// Settings for the console and its realtime session.
#[derive(Clone)]
pub struct ConsoleConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub voice: Option<String>,
    pub instructions: String,
    pub transcription_model: String,
    pub turn_mode: TurnMode,
    pub sample_rate: u32,
    /// First user message sent after connecting.
    pub greeting: String,
    pub heartbeat_interval: Duration,
    pub reconnect_max_attempts: usize,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub weather_base_url: String,
}

impl fmt::Debug for ConsoleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("transcription_model", &self.transcription_model)
            .field("turn_mode", &self.turn_mode)
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            voice: None,
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            turn_mode: TurnMode::Manual,
            sample_rate: DEFAULT_SAMPLE_RATE,
            greeting: DEFAULT_GREETING.to_string(),
            heartbeat_interval: Duration::from_secs(20),
            reconnect_max_attempts: 3,
            reconnect_base_delay: Duration::from_millis(250),
            reconnect_max_delay: Duration::from_secs(5),
            weather_base_url: DEFAULT_WEATHER_BASE_URL.to_string(),
        }
    }
}

/// Optional overlay read from a TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    voice: Option<String>,
    instructions: Option<String>,
    transcription_model: Option<String>,
    turn_mode: Option<TurnMode>,
    greeting: Option<String>,
    heartbeat_interval_ms: Option<u64>,
    reconnect_max_attempts: Option<usize>,
    weather_base_url: Option<String>,
}

impl ConsoleConfig {
    /// Load from environment variables (and `.env` if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("REALTIME_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var("REALTIME_MODEL") {
            config.model = model;
        }
        if let Ok(instructions) = std::env::var("REALTIME_INSTRUCTIONS") {
            config.instructions = instructions;
        }

        config
    }

    /// Overlay values from a TOML file onto this config.
    pub fn load_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&raw).map_err(|error| {
            ConsoleError::Configuration(format!("Invalid config file {}: {error}", path.display()))
        })?;

        if file.api_key.is_some() {
            self.api_key = file.api_key;
        }
        if let Some(base_url) = file.base_url {
            self.base_url = base_url;
        }
        if let Some(model) = file.model {
            self.model = model;
        }
        if file.voice.is_some() {
            self.voice = file.voice;
        }
        if let Some(instructions) = file.instructions {
            self.instructions = instructions;
        }
        if let Some(model) = file.transcription_model {
            self.transcription_model = model;
        }
        if let Some(mode) = file.turn_mode {
            self.turn_mode = mode;
        }
        if let Some(greeting) = file.greeting {
            self.greeting = greeting;
        }
        if let Some(ms) = file.heartbeat_interval_ms {
            self.heartbeat_interval = Duration::from_millis(ms);
        }
        if let Some(attempts) = file.reconnect_max_attempts {
            self.reconnect_max_attempts = attempts;
        }
        if let Some(url) = file.weather_base_url {
            self.weather_base_url = url;
        }
        Ok(self)
    }

    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ConsoleError::Configuration(
                "Sample rate must be greater than zero".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ConsoleError::Configuration("Model must not be empty".into()));
        }
        Ok(())
    }

    /// Resolve the API key: explicit value first, then the credential store.
    ///
    /// A missing key is an authentication error; callers re-prompt.
    pub fn resolve_api_key(&self, store: Option<&dyn CredentialStore>) -> Result<String> {
        if let Some(key) = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
        {
            return Ok(key.to_string());
        }

        if let Some(store) = store {
            if let Some(key) = store.load()?.filter(|key| !key.trim().is_empty()) {
                return Ok(key);
            }
        }

        Err(ConsoleError::Authentication("Missing OPENAI_API_KEY".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn turn_mode_parses_wire_and_short_names() {
        assert_eq!("manual".parse::<TurnMode>().unwrap(), TurnMode::Manual);
        assert_eq!("server_vad".parse::<TurnMode>().unwrap(), TurnMode::ServerVad);
        assert_eq!("vad".parse::<TurnMode>().unwrap(), TurnMode::ServerVad);
        assert!(TurnMode::Manual.push_to_talk());
        assert!(!TurnMode::ServerVad.push_to_talk());
    }

    #[test]
    fn load_file_overlays_only_present_fields() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "model = \"custom-model\"\nturn_mode = \"server_vad\"\nheartbeat_interval_ms = 50"
        )
        .unwrap();

        let config = ConsoleConfig::default().load_file(file.path()).unwrap();

        assert_eq!(config.model, "custom-model");
        assert_eq!(config.turn_mode, TurnMode::ServerVad);
        assert_eq!(config.heartbeat_interval, Duration::from_millis(50));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.sample_rate, 24_000);
    }

    #[test]
    fn validate_rejects_zero_sample_rate() {
        assert!(ConsoleConfig::default().validate().is_ok());
        let config = ConsoleConfig {
            sample_rate: 0,
            ..ConsoleConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConsoleError::Configuration(_)));
    }

    #[test]
    fn load_file_rejects_unknown_fields() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "bogus = 1").unwrap();

        let err = ConsoleConfig::default().load_file(file.path()).unwrap_err();
        assert!(matches!(err, ConsoleError::Configuration(_)));
    }

    #[test]
    fn explicit_key_takes_precedence_over_store() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        store.save("stored-key").unwrap();

        let config = ConsoleConfig {
            api_key: Some("explicit-key".into()),
            ..ConsoleConfig::default()
        };

        assert_eq!(config.resolve_api_key(Some(&store)).unwrap(), "explicit-key");
    }

    #[test]
    fn resolve_falls_back_to_store_then_fails() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        let config = ConsoleConfig {
            api_key: Some("   ".into()),
            ..ConsoleConfig::default()
        };

        let err = config.resolve_api_key(Some(&store)).unwrap_err();
        assert!(matches!(err, ConsoleError::Authentication(_)));

        store.save("stored-key").unwrap();
        assert_eq!(config.resolve_api_key(Some(&store)).unwrap(), "stored-key");
    }

    #[test]
    fn debug_output_hides_api_key() {
        let config = ConsoleConfig {
            api_key: Some("sk-secret".into()),
            ..ConsoleConfig::default()
        };
        assert!(!format!("{config:?}").contains("sk-secret"));
    }
}
