// ABOUTME: Consumption of build and pull progress streams.
// ABOUTME: Embedded error records fail the operation, but only once the stream has ended.

use crate::engine::EngineError;
use crate::runtime::{ProgressEvent, ProgressStream};
use futures::StreamExt;
use tracing::{debug, info, warn};

/// Drain `stream`, logging as it goes. Returns the first embedded error, if
/// any, after the stream ends so the full diagnostic output is still logged.
pub async fn consume_progress(mut stream: ProgressStream<'_>, image: &str) -> Result<(), EngineError> {
    let mut first_error: Option<String> = None;

    while let Some(item) = stream.next().await {
        match item? {
            ProgressEvent::Record(record) => {
                if let Some(message) = record.error_message() {
                    warn!(image, error = message, "progress stream reported an error");
                    first_error.get_or_insert_with(|| message.to_string());
                } else if let Some(line) = record.stream.as_deref() {
                    info!(image, "{}", line.trim_end());
                } else if let Some(status) = record.status.as_deref() {
                    debug!(image, status);
                }
            }
            ProgressEvent::Line(line) => debug!(image, "{line}"),
        }
    }

    match first_error {
        Some(message) => Err(EngineError::Progress {
            image: image.to_string(),
            message,
        }),
        None => Ok(()),
    }
}
