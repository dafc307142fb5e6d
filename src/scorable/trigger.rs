//! Per-dialog interrupt triggers

use super::ScoreTraits;
use crate::activity::Activity;
use crate::dialog::{BoxedDialog, Dialog};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// How a trigger recognizes an item
pub enum Matcher {
    /// Case-insensitive match of the whole trimmed text; scores `maximum`
    Literal(String),
    /// Scores the matched share of the text, scaled into the bounds
    Regex(Regex),
    /// Arbitrary test with a declared score
    Predicate {
        test: fn(&Activity) -> bool,
        score: f64,
    },
}

impl Matcher {
    pub fn literal(text: impl Into<String>) -> Self {
        Matcher::Literal(text.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Matcher::Regex(Regex::new(pattern)?))
    }

    pub fn predicate(test: fn(&Activity) -> bool, score: f64) -> Self {
        Matcher::Predicate { test, score }
    }

    /// Score for `item`, or `None` when the matcher does not apply.
    /// Bounds are checked by the dispatcher, not here.
    pub fn score(&self, item: &Activity, traits: &ScoreTraits) -> Option<f64> {
        let text = item.trimmed();
        match self {
            Matcher::Literal(literal) => {
                (text.to_lowercase() == literal.to_lowercase()).then_some(traits.maximum)
            }
            Matcher::Regex(regex) => {
                let found = regex.find(text)?;
                Some(traits.scale(found.as_str().chars().count(), text.chars().count()))
            }
            Matcher::Predicate { test, score } => test(item).then_some(*score),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Literal(text) => write!(f, "literal({text:?})"),
            Matcher::Regex(regex) => write!(f, "regex({:?})", regex.as_str()),
            Matcher::Predicate { score, .. } => write!(f, "predicate({score})"),
        }
    }
}

/// What happens when a trigger wins
#[derive(Debug)]
pub enum TriggerAction<R> {
    /// Unwind to the owning frame and resume it here with the item
    Resume(R),
    /// Run a dialog above the current top; the interrupted frame keeps waiting
    Interrupt(BoxedDialog),
}

/// A handler a dialog offers while it is on the stack
#[derive(Debug)]
pub struct Trigger<R> {
    name: String,
    matcher: Matcher,
    action: TriggerAction<R>,
}

impl<R> Trigger<R> {
    /// Resume the owning dialog at `at` when `matcher` fires
    pub fn resume(matcher: Matcher, at: R) -> Self {
        Self {
            name: format!("{matcher:?}"),
            matcher,
            action: TriggerAction::Resume(at),
        }
    }

    /// Push `dialog` as an interrupt when `matcher` fires
    pub fn interrupt<D: Dialog>(matcher: Matcher, dialog: D) -> Self {
        Self {
            name: format!("{matcher:?}"),
            matcher,
            action: TriggerAction::Interrupt(BoxedDialog::new(dialog)),
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn into_action(self) -> TriggerAction<R> {
        self.action
    }
}

impl<R: Serialize> Trigger<R> {
    /// Replace the typed resume point with its serialized form
    pub fn erase(self) -> Result<Trigger<Value>, serde_json::Error> {
        let action = match self.action {
            TriggerAction::Resume(at) => TriggerAction::Resume(serde_json::to_value(at)?),
            TriggerAction::Interrupt(dialog) => TriggerAction::Interrupt(dialog),
        };
        Ok(Trigger {
            name: self.name,
            matcher: self.matcher,
            action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traits() -> ScoreTraits {
        ScoreTraits::default()
    }

    #[test]
    fn test_literal_is_case_insensitive_and_exact() {
        let matcher = Matcher::literal("Cancel");
        let max = matcher.score(&Activity::message("  cancel "), &traits()).unwrap();
        assert!((max - 1.0).abs() < f64::EPSILON);
        assert!(matcher.score(&Activity::message("cancel it"), &traits()).is_none());
    }

    #[test]
    fn test_regex_scores_matched_share() {
        let matcher = Matcher::regex(r"(?i)help").unwrap();
        let full = matcher.score(&Activity::message("help"), &traits()).unwrap();
        let half = matcher.score(&Activity::message("help me!"), &traits()).unwrap();
        assert!((full - 1.0).abs() < f64::EPSILON);
        assert!((half - 0.5).abs() < f64::EPSILON);
        assert!(matcher.score(&Activity::message("nothing"), &traits()).is_none());
    }

    #[test]
    fn test_predicate_uses_declared_score() {
        let matcher = Matcher::predicate(|item| item.value.is_some(), 0.25);
        let item = Activity::message("").with_value(serde_json::json!({ "action": "edit" }));
        let score = matcher.score(&item, &traits()).unwrap();
        assert!((score - 0.25).abs() < f64::EPSILON);
        assert!(matcher.score(&Activity::message("x"), &traits()).is_none());
    }

    #[test]
    fn test_erase_serializes_resume_point() {
        #[derive(Serialize)]
        enum Step {
            Edit { field: String },
        }
        let trigger = Trigger::resume(
            Matcher::literal("edit"),
            Step::Edit {
                field: "name".to_string(),
            },
        )
        .named("edit-name");
        let erased = trigger.erase().unwrap();
        assert_eq!(erased.name(), "edit-name");
        match erased.into_action() {
            TriggerAction::Resume(value) => {
                assert_eq!(value, serde_json::json!({ "Edit": { "field": "name" } }));
            }
            TriggerAction::Interrupt(_) => panic!("expected resume action"),
        }
    }
}
