//! Error taxonomy of the stream session and the classification the session
//! uses to decide between backing off and giving up.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// # Stream Error
///
/// Everything that can end a connection attempt. Partial frames and keep-alive
/// lines never surface as errors; they are handled inside the session.
pub enum StreamError {
    /// The request could not be sent or no response headers arrived.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The response body broke off mid-stream.
    #[error("Stream read failed: {0}")]
    Transport(String),

    /// The server answered with an error object naming a status and a detail.
    #[error("Status: {status} - {detail}")]
    Rejected {
        /// The `status` field of the error object, 0 when absent.
        status: i64,
        /// The `detail` field of the error object.
        detail: String,
    },

    /// The endpoint or credentials could not be turned into a request.
    #[error("Invalid stream endpoint: {0}")]
    Endpoint(String),

    /// Anything else, reported with the underlying error text.
    #[error("{0}")]
    Unclassified(String),
}

/// What the session does with a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Back off and reconnect.
    Transient,
    /// Stop the session and hand the error to the caller.
    Fatal,
}

/// How a `429 Too Many Requests` rejection is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitPolicy {
    /// Stop the session with the rejection.
    #[default]
    Abort,
    /// Back off and reconnect like any transient failure.
    Retry,
}

/// Status code of a rejection that is unrelated to the client request,
/// e.g. the stream being at its connection limit.
pub const STATUS_SERVER_BUSY: i64 = 0;
/// Status code of an authentication failure.
pub const STATUS_UNAUTHORIZED: i64 = 401;
/// Status code of a rate-limit rejection.
pub const STATUS_TOO_MANY_REQUESTS: i64 = 429;

impl StreamError {
    /// Classifies the error under the given rate-limit policy.
    ///
    /// Network failures and the status-0 busy signal are transient. A 401 is
    /// always fatal, a 429 follows `policy`, everything else is fatal.
    pub fn classify(&self, policy: RateLimitPolicy) -> FailureClass {
        match self {
            StreamError::Connect(_) | StreamError::Transport(_) => FailureClass::Transient,
            StreamError::Rejected { status, .. } => match *status {
                STATUS_SERVER_BUSY => FailureClass::Transient,
                STATUS_TOO_MANY_REQUESTS if policy == RateLimitPolicy::Retry => FailureClass::Transient,
                _ => FailureClass::Fatal,
            },
            StreamError::Endpoint(_) | StreamError::Unclassified(_) => FailureClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(status: i64, detail: &str) -> StreamError {
        StreamError::Rejected { status, detail: detail.to_string() }
    }

    #[test]
    fn rejected_message_format() {
        assert_eq!(rejected(429, "Too Many Requests").to_string(), "Status: 429 - Too Many Requests");
        assert_eq!(rejected(401, "Unauthorized").to_string(), "Status: 401 - Unauthorized");
    }

    #[test]
    fn unclassified_keeps_underlying_text() {
        assert_eq!(StreamError::Unclassified("boom".into()).to_string(), "boom");
    }

    #[test]
    fn classification_under_abort() {
        let policy = RateLimitPolicy::Abort;
        assert_eq!(StreamError::Connect("reset".into()).classify(policy), FailureClass::Transient);
        assert_eq!(StreamError::Transport("eof".into()).classify(policy), FailureClass::Transient);
        assert_eq!(rejected(0, "connection limit").classify(policy), FailureClass::Transient);
        assert_eq!(rejected(401, "Unauthorized").classify(policy), FailureClass::Fatal);
        assert_eq!(rejected(429, "Too Many Requests").classify(policy), FailureClass::Fatal);
        assert_eq!(StreamError::Unclassified("x".into()).classify(policy), FailureClass::Fatal);
        assert_eq!(StreamError::Endpoint("x".into()).classify(policy), FailureClass::Fatal);
    }

    #[test]
    fn classification_under_retry() {
        let policy = RateLimitPolicy::Retry;
        assert_eq!(rejected(429, "Too Many Requests").classify(policy), FailureClass::Transient);
        assert_eq!(rejected(401, "Unauthorized").classify(policy), FailureClass::Fatal);
    }
}
