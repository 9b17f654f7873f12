//! The run loop: produce turns until the limit or a stop signal

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    error::{DeliveryError, Error, GenerationError},
    events::{StreamEvent, Turn},
    handle::RunHandle,
    registry::SubscriberRegistry,
    settings::StreamSettings,
    source::{BoxedSink, BoxedSource, TurnRequest},
    state::{StateCell, StreamState},
};

/// Counters collected over one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub successful_turns: u32,
    pub failed_turns: u32,
    pub delivery_failures: u32,
    pub topic_changes: u32,
    /// Whether the run ended because of a stop request
    pub stopped: bool,
    /// Why the run gave up, if it did
    pub fatal: Option<Error>,
    pub duration: Duration,
}

impl RunSummary {
    /// Percentage of the requested turns that were produced
    pub fn success_rate(&self, max_turns: u32) -> f64 {
        if max_turns == 0 {
            return 0.0;
        }
        f64::from(self.successful_turns) / f64::from(max_turns) * 100.0
    }
}

/// What became of the opening line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opening {
    Skipped,
    Spoken,
    Stopped,
}

/// Everything one run needs. Moved into the spawned task.
pub(crate) struct RunContext {
    pub(crate) run_id: Uuid,
    pub(crate) max_turns: u32,
    pub(crate) settings: Arc<StreamSettings>,
    pub(crate) source: BoxedSource,
    pub(crate) sink: BoxedSink,
    pub(crate) state: Arc<StateCell>,
    pub(crate) registry: Arc<SubscriberRegistry>,
    pub(crate) cancel: CancellationToken,
}

impl RunContext {
    fn publish(&self, event: StreamEvent) {
        let report = self.registry.publish(&event);
        if report.dropped > 0 {
            tracing::debug!(
                "Published to {} subscribers, dropped {}",
                report.delivered,
                report.dropped
            );
        }
    }

    fn record_error(&self, message: String) {
        tracing::warn!("{}", message);
        let state = self.state.record_error(message);
        self.publish(StreamEvent::Status(state));
    }

    /// Deliver the opening line to the sink ahead of the first turn.
    ///
    /// It is spoken by the first agent, is not published and does not count
    /// as a turn.
    async fn open(&self, summary: &mut RunSummary) -> Opening {
        let template = self.settings.opening_line.trim();
        if template.is_empty() {
            return Opening::Skipped;
        }

        let topic = self.state.current_topic();
        let text = template.replace("{topic}", &topic);
        let turn = Turn::new(0, &self.settings.agents[0], text, Some(topic));
        tracing::info!("{}: {}", turn.agent_name, turn.text);

        match self.sink.deliver(&turn, self.cancel.clone()).await {
            Ok(()) => {}
            Err(_) if self.cancel.is_cancelled() => return Opening::Stopped,
            Err(e) => {
                summary.delivery_failures += 1;
                self.record_error(format!("Opening: delivery failed: {}", e));
            }
        }
        if pause(&self.cancel, self.settings.pause()).await {
            Opening::Spoken
        } else {
            Opening::Stopped
        }
    }

    async fn run(self) -> RunSummary {
        let started = Instant::now();
        let settings = Arc::clone(&self.settings);
        let agents = &settings.agents;
        let topics = &settings.topics;
        let rotation = settings.topic_rotation.max(1);

        let mut summary = RunSummary::default();
        let mut history: Vec<Turn> = Vec::new();
        let mut topic_index = 0usize;
        let mut consecutive_failures = 0u32;

        self.publish(StreamEvent::Status(self.state.snapshot()));

        // Once the first agent has opened, the other one answers first
        let speaker_offset = match self.open(&mut summary).await {
            Opening::Skipped => 0,
            Opening::Spoken => 1,
            Opening::Stopped => {
                summary.stopped = true;
                summary.duration = started.elapsed();
                return summary;
            }
        };

        loop {
            if self.cancel.is_cancelled() {
                summary.stopped = true;
                break;
            }

            let completed = self.state.current_turn();
            if completed >= self.max_turns {
                break;
            }
            let turn_index = completed + 1;
            let agent = &agents[(completed as usize + speaker_offset) % agents.len()];
            let topic = self.state.current_topic();
            let window_start = history.len().saturating_sub(settings.context_window);

            tracing::debug!(
                "Turn {}/{}: {} thinking...",
                turn_index,
                self.max_turns,
                agent.name
            );

            let request = TurnRequest {
                history: &history[window_start..],
                agent,
                topic: &topic,
                turn_index,
            };
            let generated = self
                .source
                .generate(request, self.cancel.clone())
                .await
                .and_then(|text| {
                    let text = text.trim();
                    if text.is_empty() {
                        Err(GenerationError::EmptyResponse)
                    } else {
                        Ok(text.to_string())
                    }
                });

            match generated {
                Err(_) if self.cancel.is_cancelled() => {
                    summary.stopped = true;
                    break;
                }
                Err(e) => {
                    summary.failed_turns += 1;
                    consecutive_failures += 1;
                    self.record_error(format!("Turn {}: generation failed: {}", turn_index, e));
                    if consecutive_failures >= settings.max_consecutive_failures {
                        summary.fatal = Some(Error::Unrecoverable(format!(
                            "{} consecutive generation failures",
                            consecutive_failures
                        )));
                        break;
                    }
                }
                Ok(text) => {
                    consecutive_failures = 0;
                    let turn = Turn::new(turn_index, agent, text, Some(topic.clone()));
                    tracing::info!("{}: {}", turn.agent_name, turn.text);

                    // Turn first: a status never runs ahead of the turn it counts
                    self.publish(StreamEvent::Turn(turn.clone()));
                    let state = self.state.complete_turn();
                    self.publish(StreamEvent::Status(state));
                    summary.successful_turns += 1;

                    match self.sink.deliver(&turn, self.cancel.clone()).await {
                        Ok(()) => {}
                        Err(DeliveryError::Aborted) if self.cancel.is_cancelled() => {
                            tracing::debug!("Delivery of turn {} aborted by stop", turn_index);
                        }
                        Err(e) => {
                            summary.delivery_failures += 1;
                            self.record_error(format!(
                                "Turn {}: delivery failed: {}",
                                turn_index, e
                            ));
                        }
                    }
                    history.push(turn);

                    if turn_index % rotation == 0 && turn_index < self.max_turns {
                        topic_index = (topic_index + 1) % topics.len();
                        let next = topics[topic_index].clone();
                        tracing::info!("Topic switched to: {}", next);
                        history.clear();
                        summary.topic_changes += 1;
                        let state = self.state.set_topic(next);
                        self.publish(StreamEvent::Status(state));
                    }

                    if turn_index >= self.max_turns {
                        break;
                    }
                }
            }

            if !pause(&self.cancel, settings.pause()).await {
                summary.stopped = true;
                break;
            }
        }

        summary.duration = started.elapsed();
        summary
    }
}

/// Sleep for `duration` unless `cancel` fires first.
///
/// Returns `false` if the pause was cut short by cancellation.
pub(crate) async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

fn log_summary(run_id: Uuid, max_turns: u32, summary: &RunSummary) {
    tracing::info!(
        "Run {} finished{}: {}/{} turns ({:.1}%), {} failed, {} delivery failures, {} topic changes, {:.1}s",
        run_id,
        if summary.stopped { " (stopped)" } else { "" },
        summary.successful_turns,
        max_turns,
        summary.success_rate(max_turns),
        summary.failed_turns,
        summary.delivery_failures,
        summary.topic_changes,
        summary.duration.as_secs_f64()
    );
}

/// Drive one run to completion and put the stream back to idle.
///
/// The loop itself runs in its own task so a panic inside a collaborator
/// ends the run instead of leaving the state stuck at running. The final
/// state is sent on `finished` once the stream is idle.
pub(crate) async fn supervise(
    ctx: RunContext,
    handle: RunHandle,
    finished: watch::Sender<Option<StreamState>>,
) {
    let run_id = ctx.run_id;
    let max_turns = ctx.max_turns;
    let state = Arc::clone(&ctx.state);
    let registry = Arc::clone(&ctx.registry);

    tracing::info!("Run {} started ({} turns)", run_id, max_turns);

    match tokio::spawn(ctx.run()).await {
        Ok(summary) => {
            log_summary(run_id, max_turns, &summary);
            if let Some(e) = &summary.fatal {
                tracing::error!("Run {} ended: {}", run_id, e);
                state.record_error(format!("Fatal: {}", e));
            }
        }
        Err(join_error) => {
            let reason = if join_error.is_panic() {
                format!("run loop panicked: {}", panic_message(join_error.into_panic()))
            } else {
                "run loop was cancelled".to_string()
            };
            tracing::error!("Run {} ended: {}", run_id, reason);
            state.record_error(format!("Fatal: {}", reason));
        }
    }

    {
        let _lifecycle = handle.lock();
        let final_state = state.finish();
        registry.publish(&StreamEvent::Status(final_state.clone()));
        finished.send_replace(Some(final_state));
    }
    handle.notify_idle();
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
