//! Configuration file support

use duet_stream::StreamSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for duet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transcript file written during a run
    pub transcript: Option<String>,
    /// Speaking rate used to pace playback
    pub chars_per_second: Option<f64>,
    /// Stream settings (agents, topics, pacing)
    pub stream: StreamSettings,
    /// Groq chat completions settings
    pub groq: GroqSettings,
}

/// Groq configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroqSettings {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// API key (alternative to GROQ_API_KEY)
    pub api_key: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("duet")
    }

    /// Get the config file path: explicit path, then DUET_CONFIG_PATH, then the config dir
    pub fn config_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var("DUET_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file, falling back to defaults
    pub fn load(explicit: Option<&Path>) -> Self {
        let path = Self::config_path(explicit);
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse config from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init(explicit: Option<&Path>) -> std::io::Result<PathBuf> {
        let path = Self::config_path(explicit);
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            transcript: Some("transcript.txt".to_string()),
            chars_per_second: Some(15.0),
            stream: StreamSettings::default(),
            groq: GroqSettings::default(),
        };

        default_config.save(&path)?;
        Ok(path)
    }

    /// Get the Groq API key, checking config then env
    pub fn get_api_key(&self) -> Option<String> {
        self.groq
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("GROQ_API_KEY").ok())
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r##"# duet configuration file
# Place at ~/.config/duet/config.toml (Linux/Mac) or %APPDATA%\duet\config.toml (Windows)

# Transcript file appended during a run (optional)
transcript = "transcript.txt"

# Speaking rate used to pace playback between turns
chars_per_second = 15.0

[stream]
default_max_turns = 5
pause_between_turns = 1.0
topic_rotation = 8
context_window = 6
# Spoken by the first agent before turn 1; set to "" to skip
opening_line = "Welcome, everyone! Today we're going to explore a fascinating question: {topic} Let's dive in."
topics = [
    "Why do different organs age at different rates?",
    "Is aging a disease that can be cured?",
]

[[stream.agents]]
id = "agent1"
name = "Dr. Elena"
color = "#00ff88"
system_prompt = "You are Dr. Elena, an optimistic molecular biologist. Keep responses to 1-2 sentences."

[[stream.agents]]
id = "agent2"
name = "Prof. Marcus"
color = "#ff6b6b"
system_prompt = "You are Prof. Marcus, a cautious gerontologist. Keep responses to 1-2 sentences."

[groq]
model = "llama-3.3-70b-versatile"
# It's recommended to use the GROQ_API_KEY environment variable instead
# api_key = "gsk_..."
"##
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config = Config::parse(example_config()).unwrap();
        assert_eq!(config.transcript.as_deref(), Some("transcript.txt"));
        assert_eq!(config.stream.topics.len(), 2);
        assert_eq!(config.stream.agents.len(), 2);
        assert_eq!(config.stream.agents[1].name, "Prof. Marcus");
        assert_eq!(config.groq.model.as_deref(), Some("llama-3.3-70b-versatile"));
        assert!(config.stream.opening_line.contains("{topic}"));
        assert!(config.stream.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.stream, StreamSettings::default());
        assert!(config.transcript.is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.stream.default_max_turns = 9;
        config.groq.model = Some("other-model".into());
        config.save(&path).unwrap();

        let loaded = Config::load(Some(path.as_path()));
        assert_eq!(loaded.stream.default_max_turns, 9);
        assert_eq!(loaded.groq.model.as_deref(), Some("other-model"));
        assert_eq!(loaded.stream.agents, config.stream.agents);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "stream = [not valid").unwrap();

        let config = Config::load(Some(path.as_path()));
        assert_eq!(config.stream, StreamSettings::default());
    }

    #[test]
    fn test_init_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "transcript = \"mine.txt\"\n").unwrap();

        Config::init(Some(path.as_path())).unwrap();
        let config = Config::load(Some(path.as_path()));
        assert_eq!(config.transcript.as_deref(), Some("mine.txt"));
    }

    #[test]
    fn test_api_key_from_config() {
        let config = Config {
            groq: GroqSettings {
                api_key: Some("gsk_test".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(config.get_api_key().as_deref(), Some("gsk_test"));
    }
}
