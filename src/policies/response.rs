//! # Error responses.

use std::fmt;

/// What to do with a failed cycle.
///
/// Declared in ascending severity, so `Response::Stop` is the maximum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Response {
    /// Drop the failure silently.
    Ignore,
    /// Count it per classifier.
    Count,
    /// Record its latency per classifier.
    Histogram,
    /// Re-dispatch the same cycle, up to the policy's max tries.
    Retry,
    /// Log it and continue.
    Warn,
    /// Halt the motor (it enters `Errored`).
    Stop,
}

impl Response {
    /// Every response, in ascending severity.
    pub const ALL: [Response; 6] = [
        Response::Ignore,
        Response::Count,
        Response::Histogram,
        Response::Retry,
        Response::Warn,
        Response::Stop,
    ];

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Parses a handler word; `counter` and `histo` are accepted as aliases.
    ///
    /// # Example
    /// ```
    /// use cyclemotor::Response;
    ///
    /// assert_eq!(Response::from_word("retry"), Some(Response::Retry));
    /// assert_eq!(Response::from_word("Counter"), Some(Response::Count));
    /// assert_eq!(Response::from_word("explode"), None);
    /// ```
    pub fn from_word(word: &str) -> Option<Self> {
        match word.trim().to_ascii_lowercase().as_str() {
            "ignore" => Some(Response::Ignore),
            "count" | "counter" => Some(Response::Count),
            "histogram" | "histo" => Some(Response::Histogram),
            "retry" => Some(Response::Retry),
            "warn" => Some(Response::Warn),
            "stop" => Some(Response::Stop),
            _ => None,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            Response::Ignore => "ignore",
            Response::Count => "count",
            Response::Histogram => "histogram",
            Response::Retry => "retry",
            Response::Warn => "warn",
            Response::Stop => "stop",
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
