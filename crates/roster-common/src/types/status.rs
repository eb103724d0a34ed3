use serde::{Deserialize, Serialize};

/// One progress report for an upload, serialized as a single JSON frame.
///
/// `file_index` is `None` for submission-wide events: the opening heartbeat
/// and a validation rejection. `error` is empty unless something went wrong.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub file_index: Option<usize>,
    pub percent: f64,
    pub seconds_remaining: f64,
    #[serde(default)]
    pub error: String,
}

impl StatusEvent {
    /// Sent to a subscriber as soon as the stream opens.
    pub fn heartbeat() -> Self {
        Self::default()
    }

    /// Submission-wide failure, e.g. a file that failed validation.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }

    pub fn started(file_index: usize) -> Self {
        Self::progress(file_index, 0.0, 0.0)
    }

    pub fn progress(file_index: usize, percent: f64, seconds_remaining: f64) -> Self {
        Self {
            file_index: Some(file_index),
            percent,
            seconds_remaining,
            error: String::new(),
        }
    }

    pub fn completed(file_index: usize) -> Self {
        Self::progress(file_index, 100.0, 0.0)
    }

    pub fn failed(file_index: usize, percent: f64, error: impl Into<String>) -> Self {
        Self {
            file_index: Some(file_index),
            percent,
            seconds_remaining: 0.0,
            error: error.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// True for the last event a file produces, successful or not.
    pub fn is_terminal(&self) -> bool {
        self.is_error() || self.percent >= 100.0
    }
}
