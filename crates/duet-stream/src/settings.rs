//! Stream settings: agents, topic pool, pacing and buffer limits

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Smallest accepted turn count for a run
pub const MIN_TURNS: u32 = 1;
/// Largest accepted turn count for a run
pub const MAX_TURNS: u32 = 100;
/// Longest accepted pause between turns, in seconds
pub const MAX_PAUSE_SECS: f64 = 10.0;

/// Default opening, spoken before the first generated turn
pub const DEFAULT_OPENING_LINE: &str =
    "Welcome, everyone! Today we're going to explore a fascinating question: {topic} Let's dive in.";

/// A participant in the dialogue with its display metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Stable identifier (e.g. "agent1")
    pub id: String,
    /// Display name shown on the overlay and transcript
    pub name: String,
    /// UI color (hex)
    #[serde(default)]
    pub color: String,
    /// Voice used by the speech collaborator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    /// Personality prompt handed to the turn source
    #[serde(default)]
    pub system_prompt: String,
}

/// Settings that shape a run. Snapshotted when a run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Turn count used by `start_default`
    pub default_max_turns: u32,
    /// Seconds of silence between turns
    pub pause_between_turns: f64,
    /// Topic pool, rotated cyclically
    pub topics: Vec<String>,
    /// Turns per topic before rotating
    pub topic_rotation: u32,
    /// How many past turns the source sees
    pub context_window: usize,
    /// How many errors `recent_errors` keeps
    pub error_history: usize,
    /// Per-subscriber buffered events before the subscriber is dropped
    pub subscriber_buffer: usize,
    /// Generation failures in a row that end the run
    pub max_consecutive_failures: u32,
    /// Line the first agent speaks before turn 1; `{topic}` is replaced by
    /// the starting topic. Empty disables it.
    pub opening_line: String,
    /// Speakers, alternating in this order
    pub agents: Vec<AgentProfile>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            default_max_turns: 5,
            pause_between_turns: 1.0,
            topics: default_topics(),
            agents: default_agents(),
            topic_rotation: 8,
            context_window: 6,
            error_history: 10,
            subscriber_buffer: 64,
            max_consecutive_failures: 5,
            opening_line: DEFAULT_OPENING_LINE.to_string(),
        }
    }
}

impl StreamSettings {
    /// Pause between turns as a `Duration`
    pub fn pause(&self) -> Duration {
        Duration::from_secs_f64(self.pause_between_turns.max(0.0))
    }

    /// Check that a run can be built from these settings
    pub fn validate(&self) -> Result<()> {
        if self.topics.is_empty() {
            return Err(Error::InvalidSettings("at least one topic is required".into()));
        }
        if self.agents.is_empty() {
            return Err(Error::InvalidSettings("at least one agent is required".into()));
        }
        if self.topic_rotation == 0 {
            return Err(Error::InvalidSettings("topic_rotation must be at least 1".into()));
        }
        if self.subscriber_buffer == 0 {
            return Err(Error::InvalidSettings("subscriber_buffer must be at least 1".into()));
        }
        if self.max_consecutive_failures == 0 {
            return Err(Error::InvalidSettings(
                "max_consecutive_failures must be at least 1".into(),
            ));
        }
        check_pause(self.pause_between_turns)?;
        check_max_turns(self.default_max_turns)?;
        Ok(())
    }

    /// Apply a partial update, returning the names of the fields that changed.
    ///
    /// Nothing is applied unless the whole update is valid.
    pub fn apply(&mut self, update: SettingsUpdate) -> Result<Vec<&'static str>> {
        if update.is_empty() {
            return Err(Error::InvalidSettings("no fields provided to update".into()));
        }
        if let Some(turns) = update.default_max_turns {
            check_max_turns(turns)?;
        }
        if let Some(pause) = update.pause_between_turns {
            check_pause(pause)?;
        }
        if let Some(ref topics) = update.topics {
            if topics.is_empty() {
                return Err(Error::InvalidSettings("at least one topic is required".into()));
            }
        }

        let mut updated = Vec::new();
        if let Some(turns) = update.default_max_turns {
            self.default_max_turns = turns;
            updated.push("default_max_turns");
        }
        if let Some(pause) = update.pause_between_turns {
            self.pause_between_turns = pause;
            updated.push("pause_between_turns");
        }
        if let Some(topics) = update.topics {
            self.topics = topics;
            updated.push("topics");
        }
        Ok(updated)
    }

    /// Look up an agent by id
    pub fn agent(&self, id: &str) -> Option<&AgentProfile> {
        self.agents.iter().find(|a| a.id == id)
    }
}

/// Runtime changes to the settings used by the next run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub default_max_turns: Option<u32>,
    pub pause_between_turns: Option<f64>,
    pub topics: Option<Vec<String>>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.default_max_turns.is_none()
            && self.pause_between_turns.is_none()
            && self.topics.is_none()
    }
}

pub(crate) fn check_max_turns(requested: u32) -> Result<()> {
    if !(MIN_TURNS..=MAX_TURNS).contains(&requested) {
        return Err(Error::InvalidMaxTurns {
            requested,
            min: MIN_TURNS,
            max: MAX_TURNS,
        });
    }
    Ok(())
}

fn check_pause(secs: f64) -> Result<()> {
    if !secs.is_finite() || !(0.0..=MAX_PAUSE_SECS).contains(&secs) {
        return Err(Error::InvalidSettings(format!(
            "pause_between_turns must be between 0 and {} seconds, got {}",
            MAX_PAUSE_SECS, secs
        )));
    }
    Ok(())
}

fn default_topics() -> Vec<String> {
    [
        "Why do different organs age at different rates?",
        "Are epigenetic clocks accurate for measuring biological age?",
        "Can caloric restriction really extend lifespan in humans?",
        "What's the role of senescent cells in aging?",
        "Is aging a disease that can be cured?",
        "Do telomeres really determine our lifespan?",
        "Can rapamycin extend human healthspan?",
        "What causes mitochondrial dysfunction in aging?",
    ]
    .iter()
    .map(|t| t.to_string())
    .collect()
}

fn default_agents() -> Vec<AgentProfile> {
    vec![
        AgentProfile {
            id: "agent1".into(),
            name: "Dr. Elena".into(),
            color: "#00ff88".into(),
            voice_id: None,
            system_prompt: "You are Dr. Elena, an optimistic molecular biologist. \
                You believe aging can be reversed with the right interventions. \
                You reference recent research and are enthusiastic about longevity science. \
                Keep responses to 1-2 sentences. Be conversational and natural."
                .into(),
        },
        AgentProfile {
            id: "agent2".into(),
            name: "Prof. Marcus".into(),
            color: "#ff6b6b".into(),
            voice_id: None,
            system_prompt: "You are Prof. Marcus, a cautious gerontologist. \
                You're skeptical of anti-aging hype and always ask for evidence. \
                You point out flaws in reasoning but remain respectful. \
                Keep responses to 1-2 sentences. Be thoughtful and measured."
                .into(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(StreamSettings::default().validate().is_ok());
    }

    #[test]
    fn test_empty_topics_rejected() {
        let settings = StreamSettings {
            topics: vec![],
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(Error::InvalidSettings(_))));
    }

    #[test]
    fn test_zero_rotation_rejected() {
        let settings = StreamSettings {
            topic_rotation: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_apply_reports_updated_fields() {
        let mut settings = StreamSettings::default();
        let updated = settings
            .apply(SettingsUpdate {
                default_max_turns: Some(12),
                topics: Some(vec!["Only topic".into()]),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated, vec!["default_max_turns", "topics"]);
        assert_eq!(settings.default_max_turns, 12);
        assert_eq!(settings.topics, vec!["Only topic".to_string()]);
    }

    #[test]
    fn test_apply_empty_update_rejected() {
        let mut settings = StreamSettings::default();
        let err = settings.apply(SettingsUpdate::default()).unwrap_err();
        assert!(err.to_string().contains("no fields"), "got: {}", err);
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let mut settings = StreamSettings::default();
        let before = settings.clone();
        let result = settings.apply(SettingsUpdate {
            default_max_turns: Some(20),
            pause_between_turns: Some(42.0),
            topics: None,
        });
        assert!(result.is_err());
        assert_eq!(settings, before);
    }

    #[test]
    fn test_max_turns_bounds() {
        assert!(check_max_turns(1).is_ok());
        assert!(check_max_turns(100).is_ok());
        assert_eq!(
            check_max_turns(0),
            Err(Error::InvalidMaxTurns {
                requested: 0,
                min: 1,
                max: 100
            })
        );
        assert!(check_max_turns(101).is_err());
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: StreamSettings =
            serde_json::from_str(r#"{"topic_rotation": 3, "pause_between_turns": 0.5}"#).unwrap();
        assert_eq!(settings.topic_rotation, 3);
        assert_eq!(settings.pause(), Duration::from_millis(500));
        assert_eq!(settings.agents.len(), 2);
        assert_eq!(settings.opening_line, DEFAULT_OPENING_LINE);
    }

    #[test]
    fn test_opening_line_can_be_disabled() {
        let settings: StreamSettings = serde_json::from_str(r#"{"opening_line": ""}"#).unwrap();
        assert!(settings.opening_line.is_empty());
        assert!(settings.validate().is_ok());
    }
}
