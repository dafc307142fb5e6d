//! Built-in prompt dialogs
//!
//! A prompt asks once, re-asks on unrecognized replies and fails with
//! `TooManyAttempts` when it runs out of tries.

use super::{Awaited, Dialog, DialogContext, DialogResult, Next};
use crate::error::DialogError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const DEFAULT_ATTEMPTS: u32 = 3;

/// Turns reply text into a typed answer
pub trait Recognizer: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Dialog kind of `Prompt<Self>`
    const KIND: &'static str;

    type Output: Serialize;

    fn recognize(&self, text: &str) -> Option<Self::Output>;

    /// Extra text appended to the prompt (e.g. the list of choices)
    fn hint(&self) -> Option<String> {
        None
    }
}

/// Prompt dialog parameterized by its recognizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt<R> {
    prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retry: Option<String>,
    attempts: u32,
    recognizer: R,
}

/// The only resume point of a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStep {
    Reply,
}

impl<R> Prompt<R> {
    fn with_recognizer(prompt: impl Into<String>, recognizer: R) -> Self {
        Self {
            prompt: prompt.into(),
            retry: None,
            attempts: DEFAULT_ATTEMPTS,
            recognizer,
        }
    }

    /// Message used when a reply is not recognized
    #[must_use]
    pub fn with_retry(mut self, retry: impl Into<String>) -> Self {
        self.retry = Some(retry.into());
        self
    }

    /// Total number of replies accepted before failing (at least one)
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn attempts_left(&self) -> u32 {
        self.attempts
    }
}

impl<R: Recognizer> Prompt<R> {
    fn render(&self, text: &str) -> String {
        match self.recognizer.hint() {
            Some(hint) => format!("{text} {hint}"),
            None => text.to_string(),
        }
    }
}

impl<R: Recognizer> Dialog for Prompt<R> {
    const KIND: &'static str = R::KIND;
    type Resume = PromptStep;

    fn start(&mut self, cx: &mut DialogContext) -> DialogResult<PromptStep> {
        cx.post(self.render(&self.prompt));
        Next::wait(PromptStep::Reply)
    }

    fn resume(
        &mut self,
        cx: &mut DialogContext,
        at: PromptStep,
        input: Awaited,
    ) -> DialogResult<PromptStep> {
        let PromptStep::Reply = at;
        let item = input.item()?;
        if let Some(answer) = self.recognizer.recognize(item.trimmed()) {
            return Next::done(&answer);
        }

        self.attempts = self.attempts.saturating_sub(1);
        if self.attempts == 0 {
            tracing::debug!(kind = R::KIND, "Prompt out of attempts");
            return Err(DialogError::too_many_attempts(format!(
                "no valid answer to '{}'",
                self.prompt
            )));
        }

        let retry = self
            .retry
            .clone()
            .unwrap_or_else(|| format!("Sorry, I didn't get that. {}", self.prompt));
        cx.post(self.render(&retry));
        Next::wait(PromptStep::Reply)
    }
}

// ============================================================================
// Recognizers
// ============================================================================

/// Any non-empty text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Text;

impl Recognizer for Text {
    const KIND: &'static str = "prompt.text";
    type Output = String;

    fn recognize(&self, text: &str) -> Option<String> {
        (!text.is_empty()).then(|| text.to_string())
    }
}

impl Prompt<Text> {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self::with_recognizer(prompt, Text)
    }
}

/// An integer, optionally bounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Number {
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
}

impl Recognizer for Number {
    const KIND: &'static str = "prompt.number";
    type Output = i64;

    fn recognize(&self, text: &str) -> Option<i64> {
        let n: i64 = text.parse().ok()?;
        let in_range = self.min.map_or(true, |min| n >= min) && self.max.map_or(true, |max| n <= max);
        in_range.then_some(n)
    }
}

impl Prompt<Number> {
    pub fn number(prompt: impl Into<String>) -> Self {
        Self::with_recognizer(prompt, Number::default())
    }

    #[must_use]
    pub fn between(mut self, min: i64, max: i64) -> Self {
        self.recognizer = Number {
            min: Some(min),
            max: Some(max),
        };
        self
    }
}

/// Yes / no
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Confirm;

const YES: &[&str] = &["yes", "y", "yeah", "yep", "sure", "ok", "okay", "true"];
const NO: &[&str] = &["no", "n", "nope", "nah", "false"];

impl Recognizer for Confirm {
    const KIND: &'static str = "prompt.confirm";
    type Output = bool;

    fn recognize(&self, text: &str) -> Option<bool> {
        let text = text.to_lowercase();
        if YES.contains(&text.as_str()) {
            Some(true)
        } else if NO.contains(&text.as_str()) {
            Some(false)
        } else {
            None
        }
    }

    fn hint(&self) -> Option<String> {
        Some("(yes/no)".to_string())
    }
}

impl Prompt<Confirm> {
    pub fn confirm(prompt: impl Into<String>) -> Self {
        Self::with_recognizer(prompt, Confirm)
    }
}

/// One of a fixed list, by name or 1-based position
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Choice {
    pub options: Vec<String>,
}

impl Recognizer for Choice {
    const KIND: &'static str = "prompt.choice";
    type Output = String;

    fn recognize(&self, text: &str) -> Option<String> {
        if let Ok(position) = text.parse::<usize>() {
            return position
                .checked_sub(1)
                .and_then(|index| self.options.get(index))
                .cloned();
        }
        let text = text.to_lowercase();
        self.options
            .iter()
            .find(|option| option.to_lowercase() == text)
            .cloned()
    }

    fn hint(&self) -> Option<String> {
        let listed: Vec<String> = self
            .options
            .iter()
            .enumerate()
            .map(|(i, option)| format!("{}. {option}", i + 1))
            .collect();
        Some(format!("({})", listed.join(", ")))
    }
}

impl Prompt<Choice> {
    pub fn choice<I, S>(prompt: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.into_iter().map(Into::into).collect();
        Self::with_recognizer(prompt, Choice { options })
    }
}
