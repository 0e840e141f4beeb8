//! Result of a single command.

use std::time::Duration;

/// Output of one command sent with `send_command` or `send_command_timing`.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// The command as given by the caller.
    pub command: String,

    /// Cleaned output: linefeeds normalized, echo and trailing prompt removed
    /// as requested.
    pub result: String,

    /// Everything read for this command, untouched.
    pub raw_result: String,

    /// Last non-empty line of the raw output, normally the prompt.
    pub prompt: String,

    /// Time from write to completion.
    pub elapsed: Duration,

    /// Failure pattern of the dialect found in the output, if any.
    pub failure_message: Option<String>,
}

impl Response {
    /// Create a successful response.
    pub fn new(
        command: impl Into<String>,
        result: impl Into<String>,
        raw_result: impl Into<String>,
        prompt: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            result: result.into(),
            raw_result: raw_result.into(),
            prompt: prompt.into(),
            elapsed,
            failure_message: None,
        }
    }

    /// Mark the response failed with the first pattern found in `result`.
    pub fn with_failure_patterns<S: AsRef<str>>(mut self, patterns: &[S]) -> Self {
        self.failure_message = patterns
            .iter()
            .map(AsRef::as_ref)
            .find(|pattern| self.result.contains(pattern))
            .map(str::to_string);
        self
    }

    /// Whether no failure pattern matched.
    pub fn is_success(&self) -> bool {
        self.failure_message.is_none()
    }

    /// Lines of the cleaned output.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.result.lines()
    }

    /// Whether the cleaned output contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.result.contains(needle)
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_patterns() {
        let response = Response::new(
            "show bogus",
            "% Invalid input detected at '^' marker.",
            "",
            "router#",
            Duration::ZERO,
        )
        .with_failure_patterns(&["% Incomplete command", "% Invalid input"]);

        assert!(!response.is_success());
        assert_eq!(response.failure_message.as_deref(), Some("% Invalid input"));
    }

    #[test]
    fn test_clean_output_is_success() {
        let response = Response::new("show clock", "12:00:01 UTC", "", "router#", Duration::ZERO)
            .with_failure_patterns(&["% Invalid input"]);
        assert!(response.is_success());
        assert!(response.contains("UTC"));
        assert_eq!(response.to_string(), "12:00:01 UTC");
    }
}
