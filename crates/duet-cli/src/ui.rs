//! Console rendering of the live feed

use chrono::Local;
use duet_stream::{StreamEvent, StreamState};

/// Renders stream events for a terminal, either as readable lines or as
/// one JSON object per event.
pub struct FeedPrinter {
    json: bool,
    last_topic: Option<String>,
    errors_seen: u32,
}

impl FeedPrinter {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            last_topic: None,
            errors_seen: 0,
        }
    }

    /// Text to print for `event`, if any
    pub fn render(&mut self, event: &StreamEvent) -> Option<String> {
        if self.json {
            return serde_json::to_string(event).ok();
        }

        match event {
            StreamEvent::Turn(turn) => {
                let clock = turn.timestamp.with_timezone(&Local).format("%H:%M:%S");
                Some(format!(
                    "[{}] {:>2}. {}: {}",
                    clock, turn.turn_index, turn.agent_name, turn.text
                ))
            }
            StreamEvent::Status(state) => self.render_status(state),
        }
    }

    fn render_status(&mut self, state: &StreamState) -> Option<String> {
        let mut lines = Vec::new();

        let topic = state.current_topic.as_str();
        if state.running && !topic.is_empty() && self.last_topic.as_deref() != Some(topic) {
            lines.push(format!("== Topic: {} ==", topic));
            self.last_topic = Some(topic.to_string());
        }

        // recent_errors only keeps the tail, so count new ones by the running total
        if state.total_errors < self.errors_seen {
            self.errors_seen = 0;
        }
        let new_errors = (state.total_errors - self.errors_seen) as usize;
        let skip = state.recent_errors.len().saturating_sub(new_errors);
        for error in &state.recent_errors[skip..] {
            lines.push(format!("!! {}", error));
        }
        self.errors_seen = state.total_errors;

        if !state.running {
            lines.push(format!(
                "-- stream idle after {}/{} turns --",
                state.current_turn, state.max_turns
            ));
        }

        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    pub fn print(&mut self, event: &StreamEvent) {
        if let Some(text) = self.render(event) {
            println!("{}", text);
        }
    }
}
