mod moodle;

pub use moodle::MoodleClient;

use crate::models::{Assignment, Grade, Roster, Submission};
use thiserror::Error;

/// Why a web service call produced no usable data.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {function} failed: {source}")]
    Transport {
        function: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{function} returned HTTP {status}: {body}")]
    Status {
        function: String,
        status: u16,
        body: String,
    },

    #[error("Moodle exception from {function} ({errorcode}): {message}")]
    Api {
        function: String,
        errorcode: String,
        message: String,
    },

    #[error("unexpected response from {function}: {detail}")]
    Decode { function: String, detail: String },
}

impl FetchError {
    /// Transport failures (including timeouts) are worth another attempt;
    /// an answer from Moodle, even a bad one, is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transport { .. })
    }
}

/// The remote operations the analyzer depends on.
///
/// `Err` is the failure signal for every call. An empty collection is a
/// successful answer and must not be reported as an error.
#[allow(async_fn_in_trait)]
pub trait GradingSource {
    async fn fetch_assignments(&self, course_id: u64) -> Result<Vec<Assignment>, FetchError>;

    async fn fetch_participants(&self, assignment_id: u64) -> Result<Roster, FetchError>;

    async fn fetch_submissions(&self, assignment_id: u64) -> Result<Vec<Submission>, FetchError>;

    async fn fetch_grades(&self, assignment_id: u64) -> Result<Vec<Grade>, FetchError>;
}
