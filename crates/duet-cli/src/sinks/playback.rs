//! Paced playback: hold each turn on screen for as long as it takes to say it

use async_trait::async_trait;
use duet_stream::{DeliveryError, Turn, TurnSink};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CHARS_PER_SECOND: f64 = 15.0;

/// Waits roughly as long as speaking the turn aloud would take.
#[derive(Debug, Clone)]
pub struct PacedPlayback {
    chars_per_second: f64,
}

impl PacedPlayback {
    /// Non-positive or non-finite rates fall back to the default
    pub fn new(chars_per_second: f64) -> Self {
        let chars_per_second = if chars_per_second.is_finite() && chars_per_second > 0.0 {
            chars_per_second
        } else {
            DEFAULT_CHARS_PER_SECOND
        };
        Self { chars_per_second }
    }

    /// Estimated speaking time for `text`
    pub fn duration_for(&self, text: &str) -> Duration {
        let chars = text.chars().count() as f64;
        Duration::from_secs_f64(chars / self.chars_per_second)
    }
}

impl Default for PacedPlayback {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_SECOND)
    }
}

#[async_trait]
impl TurnSink for PacedPlayback {
    async fn deliver(&self, turn: &Turn, cancel: CancellationToken) -> Result<(), DeliveryError> {
        let duration = self.duration_for(&turn.text);
        tracing::debug!("Playing turn {} for {:?}", turn.turn_index, duration);
        tokio::select! {
            _ = cancel.cancelled() => Err(DeliveryError::Aborted),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn turn(text: &str) -> Turn {
        Turn {
            timestamp: chrono::Utc::now(),
            agent: "agent1".into(),
            agent_name: "Dr. Elena".into(),
            text: text.to_string(),
            topic: None,
            turn_index: 1,
        }
    }

    #[test]
    fn test_duration_scales_with_length() {
        let playback = PacedPlayback::new(10.0);
        assert_eq!(playback.duration_for(""), Duration::ZERO);
        assert_eq!(playback.duration_for("0123456789"), Duration::from_secs(1));
        assert_eq!(playback.duration_for(&"x".repeat(25)), Duration::from_millis(2500));
    }

    #[test]
    fn test_invalid_rate_uses_default() {
        let playback = PacedPlayback::new(0.0);
        assert_eq!(playback.duration_for(&"x".repeat(15)), Duration::from_secs(1));
        let playback = PacedPlayback::new(f64::NAN);
        assert_eq!(playback.duration_for(&"x".repeat(30)), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cancel_cuts_playback_short() {
        let playback = PacedPlayback::new(1.0);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = playback.deliver(&turn(&"x".repeat(60)), cancel).await;
        assert_eq!(result, Err(DeliveryError::Aborted));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_short_turn_completes() {
        let playback = PacedPlayback::new(1000.0);
        let result = playback.deliver(&turn("Hi"), CancellationToken::new()).await;
        assert!(result.is_ok());
    }
}
