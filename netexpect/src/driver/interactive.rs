//! Multi-step dialogs: commands that ask questions before completing.
//!
//! `reload` asks "Proceed with reload? [confirm]", `copy` asks for a
//! destination file name, `delete` asks for confirmation. Each step sends
//! one line and waits for the pattern of the next question, or for the
//! prompt when the dialog is over.

use std::time::Duration;

use regex::bytes::Regex;

use crate::channel::compile;
use crate::error::Result;

/// One step of a dialog.
#[derive(Debug, Clone)]
pub struct InteractiveEvent {
    /// Line sent to the device; the line terminator is appended.
    pub input: String,

    /// Pattern ending the step. `None` waits for the session prompt.
    pub pattern: Option<Regex>,

    /// Keep the input out of logs and the transcript.
    pub hidden: bool,

    /// Per-step timeout; the connection's read timeout otherwise.
    pub timeout: Option<Duration>,
}

impl InteractiveEvent {
    /// Send `input`, then wait for `pattern`.
    ///
    /// ```
    /// use netexpect::driver::InteractiveEvent;
    ///
    /// let events = vec![
    ///     InteractiveEvent::new("reload", r"Proceed.*\[confirm\]")?,
    ///     InteractiveEvent::until_prompt("y"),
    /// ];
    /// # Ok::<(), netexpect::Error>(())
    /// ```
    pub fn new(input: impl Into<String>, pattern: &str) -> Result<Self> {
        Ok(Self {
            input: input.into(),
            pattern: Some(compile(pattern)?),
            hidden: false,
            timeout: None,
        })
    }

    /// Send a secret, then wait for `pattern`.
    pub fn hidden(input: impl Into<String>, pattern: &str) -> Result<Self> {
        Ok(Self {
            hidden: true,
            ..Self::new(input, pattern)?
        })
    }

    /// Send `input`, then wait for the session prompt.
    pub fn until_prompt(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            pattern: None,
            hidden: false,
            timeout: None,
        }
    }

    /// Override the timeout of this step.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Mark the input as secret.
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// The input as it may appear in logs.
    pub fn display_input(&self) -> &str {
        if self.hidden { "********" } else { &self.input }
    }
}

/// Outcome of a whole dialog.
#[derive(Debug, Clone)]
pub struct InteractiveResult {
    /// One entry per step, in order.
    pub steps: Vec<InteractiveStep>,

    /// Time for the whole dialog.
    pub elapsed: Duration,

    /// Whether any step hit a failure pattern.
    pub failed: bool,
}

impl InteractiveResult {
    /// Collect the steps of a finished dialog.
    pub fn new(steps: Vec<InteractiveStep>, elapsed: Duration) -> Self {
        let failed = steps.iter().any(|s| s.failure_message.is_some());
        Self { steps, elapsed, failed }
    }

    /// Output of the last step.
    pub fn final_output(&self) -> Option<&str> {
        self.steps.last().map(|s| s.output.as_str())
    }

    /// Outputs of all steps joined together.
    pub fn full_output(&self) -> String {
        self.steps.iter().map(|s| s.output.as_str()).collect()
    }
}

/// Outcome of one dialog step.
#[derive(Debug, Clone)]
pub struct InteractiveStep {
    /// Input sent, masked when hidden.
    pub input: String,

    /// Output with linefeeds normalized and the echo removed.
    pub output: String,

    /// Output as read.
    pub raw_output: String,

    /// Time for this step.
    pub elapsed: Duration,

    /// Failure pattern found in the output.
    pub failure_message: Option<String>,
}

/// Fluent construction of a dialog.
///
/// ```
/// use std::time::Duration;
/// use netexpect::driver::InteractiveBuilder;
///
/// let events = InteractiveBuilder::new()
///     .send("copy running-config startup-config")
///     .expect(r"Destination filename")
///     .send("")
///     .expect_prompt()
///     .with_timeout(Duration::from_secs(60))
///     .build()?;
/// assert_eq!(events.len(), 2);
/// # Ok::<(), netexpect::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct InteractiveBuilder {
    steps: Vec<PendingStep>,
    default_timeout: Option<Duration>,
}

#[derive(Debug)]
struct PendingStep {
    input: String,
    pattern: Option<String>,
    hidden: bool,
    timeout: Option<Duration>,
}

impl InteractiveBuilder {
    /// Start an empty dialog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line to send; follow with `expect` or `expect_prompt`.
    pub fn send(self, input: impl Into<String>) -> InteractiveBuilderWithInput {
        InteractiveBuilderWithInput {
            builder: self,
            input: input.into(),
            hidden: false,
            timeout: None,
        }
    }

    /// Add a secret line to send.
    pub fn send_hidden(self, input: impl Into<String>) -> InteractiveBuilderWithInput {
        InteractiveBuilderWithInput {
            hidden: true,
            ..self.send(input)
        }
    }

    /// Timeout for steps without their own.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Compile the dialog; fails on the first invalid pattern.
    pub fn build(self) -> Result<Vec<InteractiveEvent>> {
        let default_timeout = self.default_timeout;
        self.steps
            .into_iter()
            .map(|step| {
                let pattern = step.pattern.as_deref().map(compile).transpose()?;
                Ok(InteractiveEvent {
                    input: step.input,
                    pattern,
                    hidden: step.hidden,
                    timeout: step.timeout.or(default_timeout),
                })
            })
            .collect()
    }
}

/// Builder state after `send`.
#[derive(Debug)]
pub struct InteractiveBuilderWithInput {
    builder: InteractiveBuilder,
    input: String,
    hidden: bool,
    timeout: Option<Duration>,
}

impl InteractiveBuilderWithInput {
    /// Wait for `pattern` after sending.
    pub fn expect(self, pattern: impl Into<String>) -> InteractiveBuilder {
        self.push(Some(pattern.into()))
    }

    /// Wait for the session prompt after sending.
    pub fn expect_prompt(self) -> InteractiveBuilder {
        self.push(None)
    }

    /// Timeout for this step only.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn push(mut self, pattern: Option<String>) -> InteractiveBuilder {
        self.builder.steps.push(PendingStep {
            input: self.input,
            pattern,
            hidden: self.hidden,
            timeout: self.timeout,
        });
        self.builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_new() {
        let event = InteractiveEvent::new("reload", r"confirm").unwrap();
        assert_eq!(event.input, "reload");
        assert!(event.pattern.is_some());
        assert!(!event.hidden);
        assert!(event.timeout.is_none());
    }

    #[test]
    fn test_event_invalid_pattern() {
        assert!(InteractiveEvent::new("reload", r"confirm(").is_err());
    }

    #[test]
    fn test_hidden_event_is_masked() {
        let event = InteractiveEvent::hidden("secret123", r"#").unwrap();
        assert!(event.hidden);
        assert_eq!(event.display_input(), "********");
    }

    #[test]
    fn test_builder() {
        let events = InteractiveBuilder::new()
            .send("enable")
            .expect(r"[Pp]assword")
            .send_hidden("secret")
            .with_timeout(Duration::from_secs(3))
            .expect_prompt()
            .with_timeout(Duration::from_secs(30))
            .build()
            .unwrap();

        assert_eq!(events.len(), 2);
        assert!(!events[0].hidden);
        assert_eq!(events[0].timeout, Some(Duration::from_secs(30)));
        assert!(events[1].hidden);
        assert!(events[1].pattern.is_none());
        assert_eq!(events[1].timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_builder_reports_bad_pattern() {
        let result = InteractiveBuilder::new().send("reload").expect("[confirm").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_result() {
        let step = |output: &str, failure: Option<&str>| InteractiveStep {
            input: "x".to_string(),
            output: output.to_string(),
            raw_output: output.to_string(),
            elapsed: Duration::from_millis(100),
            failure_message: failure.map(str::to_string),
        };
        let result = InteractiveResult::new(
            vec![step("output1", None), step("output2", None)],
            Duration::from_millis(200),
        );
        assert!(!result.failed);
        assert_eq!(result.final_output(), Some("output2"));
        assert_eq!(result.full_output(), "output1output2");

        let failed = InteractiveResult::new(vec![step("% Invalid input", Some("% Invalid input"))], Duration::ZERO);
        assert!(failed.failed);
    }
}
