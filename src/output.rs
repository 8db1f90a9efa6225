// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Plain text for people, JSON lines for scripts; lifecycle events become status lines.

use crate::provider::LifecycleEvent;
use serde::Serialize;
use std::time::Instant;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Only final results
    Quiet,
    /// JSON lines for scripting
    Json,
}

pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    fn elapsed_secs(&self) -> Option<f64> {
        self.start_time.map(|t| t.elapsed().as_secs_f64())
    }

    /// Suppressed in quiet and JSON modes.
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => match self.elapsed_secs() {
                Some(elapsed) => println!("{message} ({elapsed:.1}s)"),
                None => println!("{message}"),
            },
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => self.emit_event("success", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => {
                if let Some(json) = self.event_json("error", message) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print structured data: pretty JSON for people, one line for scripts.
    pub fn data<T: Serialize>(&self, value: &T) {
        let rendered = match self.mode {
            OutputMode::Json => serde_json::to_string(value),
            OutputMode::Normal | OutputMode::Quiet => serde_json::to_string_pretty(value),
        };
        match rendered {
            Ok(text) => println!("{text}"),
            Err(e) => self.error(&format!("could not render output: {e}")),
        }
    }

    /// Report every lifecycle event already delivered to `events`.
    pub fn lifecycle(&self, events: &mut broadcast::Receiver<LifecycleEvent>) {
        loop {
            match events.try_recv() {
                Ok(event) => self.lifecycle_event(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "lifecycle events dropped");
                }
                Err(_) => break,
            }
        }
    }

    fn lifecycle_event(&self, event: LifecycleEvent) {
        if self.mode == OutputMode::Json {
            self.emit_event(&event.to_string(), lifecycle_message(event).unwrap_or(""));
        } else if let Some(message) = lifecycle_message(event) {
            self.progress(message);
        }
    }

    fn emit_event(&self, event: &str, message: &str) {
        if let Some(json) = self.event_json(event, message) {
            println!("{json}");
        }
    }

    fn event_json(&self, event: &str, message: &str) -> Option<String> {
        serde_json::to_string(&JsonEvent {
            event,
            message,
            duration_secs: self.elapsed_secs(),
        })
        .ok()
    }
}

fn lifecycle_message(event: LifecycleEvent) -> Option<&'static str> {
    match event {
        LifecycleEvent::PostUp => Some("Kalabox engine has been activated."),
        LifecycleEvent::PostDown => Some("Kalabox engine has been deactivated."),
        LifecycleEvent::PreUp | LifecycleEvent::PreDown => None,
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_completed_transitions_are_announced() {
        assert_eq!(
            lifecycle_message(LifecycleEvent::PostUp),
            Some("Kalabox engine has been activated.")
        );
        assert_eq!(
            lifecycle_message(LifecycleEvent::PostDown),
            Some("Kalabox engine has been deactivated.")
        );
        assert_eq!(lifecycle_message(LifecycleEvent::PreUp), None);
    }

    #[test]
    fn event_json_omits_duration_without_timer() {
        let output = Output::new(OutputMode::Json);
        let json = output.event_json("post-up", "up").unwrap();
        assert_eq!(json, r#"{"event":"post-up","message":"up"}"#);
    }
}
