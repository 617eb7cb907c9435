//! Confirmation gate between stages
//!
//! The gate owns the fail-closed policy; where the answer comes from (a
//! terminal, a pipe, a test script) is behind [`OperatorPrompt`].

use std::io::{self, BufRead, Write};

/// Source of a single line of operator input
pub trait OperatorPrompt {
    /// Show `prompt` and block until one line of input arrives
    fn read_answer(&mut self, prompt: &str) -> io::Result<String>;
}

/// Prompt that reads one line from any buffered reader.
///
/// End of input yields an empty answer, which the gate treats as a decline.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> OperatorPrompt for LinePrompt<R, W> {
    fn read_answer(&mut self, prompt: &str) -> io::Result<String> {
        write!(self.output, "{prompt} [y/N] ")?;
        self.output.flush()?;

        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line)
    }
}

/// Prompt that must never be consulted (unattended runs)
pub struct NoPrompt;

impl OperatorPrompt for NoPrompt {
    fn read_answer(&mut self, prompt: &str) -> io::Result<String> {
        Err(io::Error::other(format!(
            "confirmation required but no operator input is available: {prompt}"
        )))
    }
}

/// Whether an answer is an explicit yes; everything else is a decline
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// A single pause between two stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationGate {
    pub prompt: String,
    pub resolved: bool,
    pub approved: bool,
}

impl ConfirmationGate {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            resolved: false,
            approved: false,
        }
    }

    /// Resolve the gate, blocking for input unless `auto_approve` is set.
    ///
    /// No retry and no timeout: one answer decides.
    pub fn resolve(
        &mut self,
        auto_approve: bool,
        prompt: &mut dyn OperatorPrompt,
    ) -> io::Result<bool> {
        self.approved = if auto_approve {
            log::debug!("auto-approved: {}", self.prompt);
            true
        } else {
            let answer = prompt.read_answer(&self.prompt)?;
            is_affirmative(&answer)
        };
        self.resolved = true;
        Ok(self.approved)
    }
}
