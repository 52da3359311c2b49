//! # Error policy.
//!
//! An ordered table of [`ErrorRule`]s mapping failure classifiers to a [`Response`]. Built
//! once per activity, shared by every motor.
//!
//! ## Spec string
//! ```text
//! policy   := rule (';' rule)*
//! rule     := [matchers ':'] handlers
//! matchers := regex (',' regex)*          full match on the classifier; omitted = catch-all
//! handlers := handler (',' handler)* [',' code]
//! ```
//! e.g. `"Timeout|Overloaded:retry,warn;Verification.*:count,histogram,-2;stop"`.
//!
//! ## Resolution
//! The handlers of a rule form a chain. On every failed attempt each `count`, `histogram`
//! and `warn` in the chain takes effect; `retry` and the most severe remaining handler decide
//! what happens to the cycle.
//! ```text
//! handle(failure, attempt):
//!   rule = first rule whose matcher matches failure.classifier()
//!        └─ none ─► Stop (code 127)
//!   apply count / histogram / warn from the chain
//!   chain has retry && attempt < max_tries ─► Retry
//!   otherwise the most severe non-retry handler decides (bare retry ─► stop):
//!     stop ─► Verdict::Stop { code }, anything else ─► Verdict::Continue { code }
//! ```

use std::time::Duration;

use regex::Regex;

use super::metrics::ErrorTally;
use super::response::Response;
use crate::error::{ConfigError, OperationFailure};

/// Result code recorded for a failed cycle when its rule names none.
pub const DEFAULT_FAILURE_CODE: i8 = 127;

/// Default number of attempts per cycle before `retry` escalates.
pub const DEFAULT_MAX_TRIES: u32 = 10;

/// One row of the policy table.
#[derive(Clone, Debug)]
pub struct ErrorRule {
    matchers: Vec<Regex>,
    handlers: Vec<Response>,
    code: i8,
}

impl ErrorRule {
    /// Rule matching any classifier that fully matches one of `patterns`.
    ///
    /// # Errors
    /// [`ConfigError::InvalidPattern`] when a pattern is not a valid regex.
    pub fn new<S: AsRef<str>>(patterns: &[S], response: Response) -> Result<Self, ConfigError> {
        let matchers = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref().trim();
                Regex::new(&format!("^(?:{p})$")).map_err(|source| ConfigError::InvalidPattern {
                    pattern: p.to_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            matchers,
            handlers: vec![response],
            code: DEFAULT_FAILURE_CODE,
        })
    }

    /// Rule matching every classifier.
    pub fn catch_all(response: Response) -> Self {
        Self {
            matchers: Vec::new(),
            handlers: vec![response],
            code: DEFAULT_FAILURE_CODE,
        }
    }

    /// Appends `handler` to the chain. Handlers already in the chain are not repeated.
    pub fn with_handler(mut self, handler: Response) -> Self {
        if !self.handlers.contains(&handler) {
            self.handlers.push(handler);
        }
        self
    }

    /// Sets the result code recorded for cycles failing under this rule.
    pub fn with_code(mut self, code: i8) -> Self {
        self.code = code;
        self
    }

    /// True if `classifier` is matched (always true for a catch-all).
    pub fn matches(&self, classifier: &str) -> bool {
        self.matchers.is_empty() || self.matchers.iter().any(|m| m.is_match(classifier))
    }

    /// The handler chain in configured order.
    pub fn handlers(&self) -> &[Response] {
        &self.handlers
    }

    /// Response deciding a first failed attempt: `retry` when the chain has it, otherwise
    /// what the chain settles on.
    pub fn response(&self) -> Response {
        if self.retries() {
            Response::Retry
        } else {
            self.settled()
        }
    }

    /// Response once retrying is over: the most severe non-retry handler, or `stop` for a
    /// bare `retry`.
    pub fn settled(&self) -> Response {
        self.handlers
            .iter()
            .copied()
            .filter(|r| *r != Response::Retry)
            .max()
            .unwrap_or(Response::Stop)
    }

    /// Result code for failed cycles.
    pub fn code(&self) -> i8 {
        self.code
    }

    fn retries(&self) -> bool {
        self.handlers.contains(&Response::Retry)
    }

    fn parse(entry: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidPolicy {
            spec: entry.to_owned(),
            reason,
        };

        let (matchers, words) = match entry.rsplit_once(':') {
            Some((m, h)) => (Some(m), h),
            None => (None, entry),
        };

        let mut handlers: Vec<Response> = Vec::new();
        let mut code = None;
        for word in words.split(',').map(str::trim).filter(|w| !w.is_empty()) {
            if is_numeric(word) {
                let parsed = word
                    .parse::<i8>()
                    .map_err(|_| invalid(format!("result code '{word}' is outside -128..=127")))?;
                if code.replace(parsed).is_some() {
                    return Err(invalid("more than one result code".into()));
                }
                continue;
            }
            let r = Response::from_word(word)
                .ok_or_else(|| invalid(format!("unknown handler '{word}'")))?;
            if handlers.contains(&r) {
                return Err(invalid(format!("handler '{r}' given twice")));
            }
            handlers.push(r);
        }

        let Some(&first) = handlers.first() else {
            return Err(invalid("missing handler".into()));
        };

        let mut rule = match matchers {
            Some(m) => {
                let patterns: Vec<&str> =
                    m.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
                if patterns.is_empty() {
                    Self::catch_all(first)
                } else {
                    Self::new(&patterns, first)?
                }
            }
            None => Self::catch_all(first),
        };
        rule.handlers = handlers;
        if let Some(code) = code {
            rule.code = code;
        }
        Ok(rule)
    }
}

fn is_numeric(word: &str) -> bool {
    let digits = word.strip_prefix('-').unwrap_or(word);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Outcome of handling one failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Dispatch the same cycle again.
    Retry,
    /// Record `code` for the cycle and move on.
    Continue {
        /// Result code to record.
        code: i8,
    },
    /// Record `code` and halt the motor.
    Stop {
        /// Result code to record.
        code: i8,
    },
}

impl Verdict {
    /// Result code to record, if this verdict finishes the cycle.
    pub fn code(&self) -> Option<i8> {
        match self {
            Verdict::Retry => None,
            Verdict::Continue { code } | Verdict::Stop { code } => Some(*code),
        }
    }
}

/// Ordered classifier → response table with retry bookkeeping and metrics.
#[derive(Debug)]
pub struct ErrorPolicy {
    rules: Vec<ErrorRule>,
    max_tries: u32,
    tally: ErrorTally,
}

impl Default for ErrorPolicy {
    /// Stops on every failure.
    fn default() -> Self {
        Self::new(vec![ErrorRule::catch_all(Response::Stop)])
    }
}

impl ErrorPolicy {
    /// Builds a policy from rules in match order.
    pub fn new(rules: Vec<ErrorRule>) -> Self {
        Self {
            rules,
            max_tries: DEFAULT_MAX_TRIES,
            tally: ErrorTally::new(),
        }
    }

    /// Parses a policy spec string.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidPolicy`] for empty specs, unknown responses, bad codes.
    /// - [`ConfigError::InvalidPattern`] for classifier patterns that are not valid regexes.
    ///
    /// # Example
    /// ```
    /// use cyclemotor::{ErrorPolicy, OperationFailure, Response};
    ///
    /// let policy = ErrorPolicy::parse("Overloaded:retry,count;Verification.*:warn;stop").unwrap();
    /// assert_eq!(policy.classify(&OperationFailure::new("Overloaded", "busy")), Response::Retry);
    /// assert_eq!(policy.classify(&OperationFailure::verification("bad")), Response::Warn);
    /// assert_eq!(policy.classify(&OperationFailure::new("Boom", "x")), Response::Stop);
    /// ```
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let rules = spec
            .split(';')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(ErrorRule::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if rules.is_empty() {
            return Err(ConfigError::InvalidPolicy {
                spec: spec.to_owned(),
                reason: "no rules".into(),
            });
        }
        Ok(Self::new(rules))
    }

    /// Sets attempts per cycle before `retry` escalates (min 1).
    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries.max(1);
        self
    }

    /// Attempts per cycle before `retry` escalates.
    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    /// Rules in match order.
    pub fn rules(&self) -> &[ErrorRule] {
        &self.rules
    }

    /// First rule matching `classifier`.
    pub fn rule_for(&self, classifier: &str) -> Option<&ErrorRule> {
        self.rules.iter().find(|r| r.matches(classifier))
    }

    /// Primary response for `failure`; unmatched failures resolve to `stop`.
    pub fn classify(&self, failure: &OperationFailure) -> Response {
        self.rule_for(failure.classifier())
            .map_or(Response::Stop, ErrorRule::response)
    }

    /// Resolves a failed attempt (1-based `attempt`) into a verdict, applying the matched
    /// handler chain along the way.
    pub fn handle(
        &self,
        failure: &OperationFailure,
        cycle: u64,
        attempt: u32,
        elapsed: Duration,
    ) -> Verdict {
        let classifier = failure.classifier();
        let Some(rule) = self.rule_for(classifier) else {
            self.tally.record(Response::Stop);
            tracing::error!(cycle, attempt, classifier, error = %failure, "error with cycle; no rule matched, stopping");
            return Verdict::Stop {
                code: DEFAULT_FAILURE_CODE,
            };
        };

        for handler in &rule.handlers {
            match handler {
                Response::Count => self.tally.count(classifier),
                Response::Histogram => self.tally.observe(classifier, elapsed),
                Response::Warn => {
                    tracing::warn!(cycle, attempt, classifier, error = %failure, "error with cycle");
                }
                Response::Ignore | Response::Retry | Response::Stop => {}
            }
        }

        let resolved = if rule.retries() && attempt < self.max_tries {
            Response::Retry
        } else {
            let settled = rule.settled();
            if rule.retries() {
                tracing::debug!(cycle, attempt, classifier, escalated = %settled, "retries exhausted");
            }
            settled
        };
        self.tally.record(resolved);

        match resolved {
            Response::Retry => Verdict::Retry,
            Response::Stop => {
                tracing::error!(cycle, attempt, classifier, error = %failure, "error with cycle; stopping");
                Verdict::Stop { code: rule.code }
            }
            _ => Verdict::Continue { code: rule.code },
        }
    }

    /// Failure metrics gathered so far.
    pub fn tally(&self) -> &ErrorTally {
        &self.tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fail(classifier: &str) -> OperationFailure {
        OperationFailure::new(classifier, "test")
    }

    #[test]
    fn first_matching_rule_wins() {
        let policy = ErrorPolicy::parse("Time.*:warn;Timeout:ignore").unwrap();
        assert_eq!(policy.classify(&fail("Timeout")), Response::Warn);
    }

    #[test]
    fn matchers_are_anchored() {
        let policy = ErrorPolicy::parse("Time:ignore;warn").unwrap();
        assert_eq!(policy.classify(&fail("Timeout")), Response::Warn);
        assert_eq!(policy.classify(&fail("Time")), Response::Ignore);
    }

    #[test]
    fn unmatched_failure_stops() {
        let policy = ErrorPolicy::parse("Overloaded:retry").unwrap();
        let v = policy.handle(&fail("Disk"), 7, 1, Duration::ZERO);
        assert_eq!(v, Verdict::Stop { code: DEFAULT_FAILURE_CODE });
        assert_eq!(policy.tally().responses(Response::Stop), 1);
    }

    #[test]
    fn retry_is_bounded_then_falls_back() {
        let policy = ErrorPolicy::parse("Flaky:retry,warn,-3").unwrap().with_max_tries(3);
        let f = fail("Flaky");
        let mut attempts = 0;
        let verdict = loop {
            attempts += 1;
            match policy.handle(&f, 42, attempts, Duration::ZERO) {
                Verdict::Retry => continue,
                other => break other,
            }
        };
        assert_eq!(attempts, 3);
        assert_eq!(verdict, Verdict::Continue { code: -3 });
        assert_eq!(policy.tally().responses(Response::Retry), 2);
        assert_eq!(policy.tally().responses(Response::Warn), 1);
    }

    #[test]
    fn bare_retry_stops_once_exhausted() {
        let policy = ErrorPolicy::parse("retry").unwrap().with_max_tries(3);
        let f = fail("Anything");
        assert_eq!(policy.handle(&f, 1, 1, Duration::ZERO), Verdict::Retry);
        assert_eq!(policy.handle(&f, 1, 2, Duration::ZERO), Verdict::Retry);
        assert_eq!(
            policy.handle(&f, 1, 3, Duration::ZERO),
            Verdict::Stop { code: DEFAULT_FAILURE_CODE }
        );
    }

    #[test]
    fn count_and_histogram_feed_metrics() {
        let policy = ErrorPolicy::parse("A:count;B:histogram,5").unwrap();
        assert_eq!(
            policy.handle(&fail("A"), 1, 1, Duration::ZERO),
            Verdict::Continue { code: DEFAULT_FAILURE_CODE }
        );
        assert_eq!(
            policy.handle(&fail("B"), 2, 1, Duration::from_millis(1)),
            Verdict::Continue { code: 5 }
        );
        assert_eq!(policy.tally().count_for("A"), 1);
        assert_eq!(policy.tally().histogram_for("B").map(|h| h.count()), Some(1));
    }

    #[test]
    fn verification_and_timeout_have_classifiers() {
        let policy = ErrorPolicy::parse("VerificationFailure:count;Timeout:ignore").unwrap();
        assert_eq!(policy.classify(&OperationFailure::verification("x")), Response::Count);
        let timeout = OperationFailure::Timeout {
            timeout: Duration::from_millis(5),
        };
        assert_eq!(policy.classify(&timeout), Response::Ignore);
    }

    #[test]
    fn rejects_malformed_specs() {
        for spec in ["", " ; ", "X:explode", "X:retry,retry", "X:warn,1,2", "X:300", "X:warn,count,warn"] {
            assert!(ErrorPolicy::parse(spec).is_err(), "{spec:?} should be rejected");
        }
        let err = ErrorPolicy::parse("(unclosed:warn").unwrap_err();
        assert_eq!(err.as_label(), "config_invalid_pattern");
    }

    #[test]
    fn chained_handlers_all_take_effect() {
        let policy = ErrorPolicy::parse("Busy:warn,count,histogram,4").unwrap();
        let verdict = policy.handle(&fail("Busy"), 9, 1, Duration::from_millis(3));
        assert_eq!(verdict, Verdict::Continue { code: 4 });
        assert_eq!(policy.tally().count_for("Busy"), 1);
        assert_eq!(policy.tally().histogram_for("Busy").map(|h| h.count()), Some(1));
        assert_eq!(policy.tally().responses(Response::Warn), 1);
        assert_eq!(policy.tally().summary().total(), 1);
    }

    #[test]
    fn most_severe_handler_decides() {
        let policy = ErrorPolicy::parse("A:count,stop;B:ignore,warn").unwrap();
        assert_eq!(policy.classify(&fail("A")), Response::Stop);
        assert_eq!(
            policy.handle(&fail("A"), 1, 1, Duration::ZERO),
            Verdict::Stop { code: DEFAULT_FAILURE_CODE }
        );
        assert_eq!(policy.tally().count_for("A"), 1);
        assert_eq!(policy.classify(&fail("B")), Response::Warn);
    }

    #[test]
    fn chain_applies_on_every_retry() {
        let policy = ErrorPolicy::parse("Busy:retry,count,stop").unwrap().with_max_tries(2);
        let f = fail("Busy");
        assert_eq!(policy.handle(&f, 3, 1, Duration::ZERO), Verdict::Retry);
        assert_eq!(
            policy.handle(&f, 3, 2, Duration::ZERO),
            Verdict::Stop { code: DEFAULT_FAILURE_CODE }
        );
        assert_eq!(policy.tally().count_for("Busy"), 2);
        assert_eq!(policy.tally().responses(Response::Retry), 1);
        assert_eq!(policy.tally().responses(Response::Stop), 1);
    }

    #[test]
    fn empty_matcher_list_is_catch_all() {
        let policy = ErrorPolicy::parse(":ignore").unwrap();
        assert_eq!(policy.classify(&fail("Whatever")), Response::Ignore);
    }
}
