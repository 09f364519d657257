//! Configuration loading and management
//!
//! Word lists and resume timing come from built-in defaults, optionally
//! replaced by a JSON file and then by environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::lexicon::Lexicon;

/// Words that should not interrupt while the agent is speaking
pub const DEFAULT_BACKCHANNEL_WORDS: &[&str] = &[
    "yeah", "ok", "okay", "hmm", "right", "uh-huh", "aha", "mhm", "gotcha", "understood", "yep",
    "sure", "alright", "yup", "uh", "mhmm",
];

/// Words that always interrupt
pub const DEFAULT_COMMAND_WORDS: &[&str] = &[
    "wait", "stop", "no", "hold", "but", "however", "actually", "listen", "hang",
];

/// Default delay before resuming after a false interruption
pub const DEFAULT_RESUME_TIMEOUT: Duration = Duration::from_millis(1000);

pub const ENV_CONFIG_PATH: &str = "ARBITER_CONFIG";
pub const ENV_BACKCHANNEL_WORDS: &str = "ARBITER_BACKCHANNEL_WORDS";
pub const ENV_COMMAND_WORDS: &str = "ARBITER_COMMAND_WORDS";
pub const ENV_RESUME_TIMEOUT_MS: &str = "ARBITER_RESUME_TIMEOUT_MS";
pub const ENV_RESUME_FALSE_INTERRUPTION: &str = "ARBITER_RESUME_FALSE_INTERRUPTION";

/// Arbiter configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Words that never interrupt on their own
    pub backchannel_words: Vec<String>,

    /// Words that always interrupt
    pub command_words: Vec<String>,

    /// How long to wait before resuming after a false interruption
    pub resume_timeout: Duration,

    /// Whether false interruptions schedule a resume at all
    pub resume_false_interruption: bool,
}

/// On-disk shape of a word-list file; every field is optional
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    backchannel_words: Option<Vec<String>>,
    command_words: Option<Vec<String>>,
    resume_timeout_ms: Option<u64>,
    resume_false_interruption: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backchannel_words: DEFAULT_BACKCHANNEL_WORDS.iter().map(|w| w.to_string()).collect(),
            command_words: DEFAULT_COMMAND_WORDS.iter().map(|w| w.to_string()).collect(),
            resume_timeout: DEFAULT_RESUME_TIMEOUT,
            resume_false_interruption: true,
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional file, and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|var| std::env::var(var).ok())
    }

    /// Load configuration using the given variable lookup
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(ENV_CONFIG_PATH) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(words) = lookup(ENV_BACKCHANNEL_WORDS) {
            config.backchannel_words = split_word_list(&words);
        }
        if let Some(words) = lookup(ENV_COMMAND_WORDS) {
            config.command_words = split_word_list(&words);
        }
        if let Some(raw) = lookup(ENV_RESUME_TIMEOUT_MS) {
            let ms = raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidEnv {
                var: ENV_RESUME_TIMEOUT_MS,
                reason: e.to_string(),
            })?;
            config.resume_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup(ENV_RESUME_FALSE_INTERRUPTION) {
            config.resume_false_interruption = parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidEnv {
                    var: ENV_RESUME_FALSE_INTERRUPTION,
                    reason: format!("expected true or false, got {raw:?}"),
                }
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a JSON word-list file layered over the defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: PathBuf::from(path),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from(path),
            source,
        })
    }

    /// Parse JSON configuration layered over the defaults
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let file: ConfigFile = serde_json::from_str(raw)?;
        let defaults = Self::default();

        Ok(Self {
            backchannel_words: file.backchannel_words.unwrap_or(defaults.backchannel_words),
            command_words: file.command_words.unwrap_or(defaults.command_words),
            resume_timeout: file
                .resume_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.resume_timeout),
            resume_false_interruption: file
                .resume_false_interruption
                .unwrap_or(defaults.resume_false_interruption),
        })
    }

    /// Reject settings the arbiter cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resume_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Build the word sets described by this configuration
    pub fn lexicon(&self) -> Result<Lexicon, ConfigError> {
        Lexicon::from_words(&self.backchannel_words, &self.command_words)
    }
}

fn split_word_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::lexicon::Verdict;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::load_with(env(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.resume_timeout, Duration::from_secs(1));
        assert!(config.resume_false_interruption);
    }

    #[test]
    fn test_default_lexicon() {
        let lexicon = Config::default().lexicon().unwrap();
        assert!(lexicon.overlap().is_empty());
        assert_eq!(lexicon.classify_text("Uh-huh, yeah."), Verdict::BackchannelOnly);
        assert_eq!(lexicon.classify_text("yeah but"), Verdict::ContainsCommand);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::load_with(env(&[
            (ENV_BACKCHANNEL_WORDS, "si, vale ,claro"),
            (ENV_COMMAND_WORDS, "espera,para"),
            (ENV_RESUME_TIMEOUT_MS, "250"),
            (ENV_RESUME_FALSE_INTERRUPTION, "off"),
        ]))
        .unwrap();

        assert_eq!(config.backchannel_words, vec!["si", "vale", "claro"]);
        assert_eq!(config.command_words, vec!["espera", "para"]);
        assert_eq!(config.resume_timeout, Duration::from_millis(250));
        assert!(!config.resume_false_interruption);
    }

    #[test]
    fn test_invalid_env() {
        let err = Config::load_with(env(&[(ENV_RESUME_TIMEOUT_MS, "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: ENV_RESUME_TIMEOUT_MS, .. }));

        let err =
            Config::load_with(env(&[(ENV_RESUME_FALSE_INTERRUPTION, "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = Config::load_with(env(&[(ENV_RESUME_TIMEOUT_MS, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout));
    }

    #[test]
    fn test_json_partial_override() {
        let config = Config::from_json(r#"{"command_words":["halt"],"resume_timeout_ms":1500}"#)
            .unwrap();
        assert_eq!(config.command_words, vec!["halt"]);
        assert_eq!(config.resume_timeout, Duration::from_millis(1500));
        assert_eq!(config.backchannel_words, Config::default().backchannel_words);
    }

    #[test]
    fn test_json_unknown_field_rejected() {
        assert!(Config::from_json(r#"{"timeout":3}"#).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load_with(env(&[(ENV_CONFIG_PATH, "/nonexistent/arbiter.json")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
