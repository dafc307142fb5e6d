//! Ready-made global handlers

use super::{Intercept, Scorable, ScoreTraits};
use crate::activity::Activity;
use crate::dialog::DialogContext;
use crate::error::DialogError;
use regex::Regex;

/// Fixed command words, matched case-insensitively against the whole text.
/// A match always scores the dispatcher's `maximum`.
pub struct CommandScorable<F> {
    name: String,
    commands: Vec<String>,
    action: F,
}

impl<F> CommandScorable<F>
where
    F: Fn(&mut DialogContext, &Activity) -> Result<Intercept, DialogError> + Send + Sync + 'static,
{
    pub fn new<I, S>(name: impl Into<String>, commands: I, action: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            commands: commands
                .into_iter()
                .map(|command| command.into().to_lowercase())
                .collect(),
            action,
        }
    }
}

impl CommandScorable<()> {
    /// Answer with `text` and leave the stack untouched
    pub fn reply<I, S>(
        name: impl Into<String>,
        commands: I,
        text: impl Into<String>,
    ) -> CommandScorable<impl Fn(&mut DialogContext, &Activity) -> Result<Intercept, DialogError> + Send + Sync + 'static>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let text = text.into();
        CommandScorable::new(name, commands, move |cx: &mut DialogContext, _: &Activity| {
            cx.post(text.clone());
            Ok(Intercept::Handled)
        })
    }

    /// Answer with `text` and discard the conversation
    pub fn restart<I, S>(
        name: impl Into<String>,
        commands: I,
        text: impl Into<String>,
    ) -> CommandScorable<impl Fn(&mut DialogContext, &Activity) -> Result<Intercept, DialogError> + Send + Sync + 'static>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let text = text.into();
        CommandScorable::new(name, commands, move |cx: &mut DialogContext, _: &Activity| {
            cx.post(text.clone());
            Ok(Intercept::Restart)
        })
    }
}

impl<F> Scorable for CommandScorable<F>
where
    F: Fn(&mut DialogContext, &Activity) -> Result<Intercept, DialogError> + Send + Sync + 'static,
{
    type State = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&self, item: &Activity) -> Option<()> {
        let text = item.trimmed().to_lowercase();
        self.commands.contains(&text).then_some(())
    }

    fn score(&self, _: &(), traits: &ScoreTraits) -> f64 {
        traits.maximum
    }

    fn post(&self, cx: &mut DialogContext, item: &Activity, _: ()) -> Result<Intercept, DialogError> {
        (self.action)(cx, item)
    }
}

/// Capture groups of a `RegexScorable` match
#[derive(Debug, Clone, PartialEq)]
pub struct RegexMatch {
    /// Group 0 is the whole match
    pub groups: Vec<Option<String>>,
    /// Characters covered by group 0
    pub matched: usize,
    /// Characters in the trimmed text
    pub length: usize,
}

impl RegexMatch {
    pub fn group(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(Option::as_deref)
    }
}

/// Matches a pattern anywhere in the text; scores the matched share
pub struct RegexScorable<F> {
    name: String,
    regex: Regex,
    action: F,
}

impl<F> RegexScorable<F>
where
    F: Fn(&mut DialogContext, &RegexMatch) -> Result<Intercept, DialogError> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, pattern: &str, action: F) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            regex: Regex::new(pattern)?,
            action,
        })
    }
}

impl<F> Scorable for RegexScorable<F>
where
    F: Fn(&mut DialogContext, &RegexMatch) -> Result<Intercept, DialogError> + Send + Sync + 'static,
{
    type State = RegexMatch;

    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&self, item: &Activity) -> Option<RegexMatch> {
        let text = item.trimmed();
        let captures = self.regex.captures(text)?;
        let whole = captures.get(0)?;
        let groups = captures
            .iter()
            .map(|group| group.map(|m| m.as_str().to_string()))
            .collect();
        Some(RegexMatch {
            groups,
            matched: whole.as_str().chars().count(),
            length: text.chars().count(),
        })
    }

    fn score(&self, state: &RegexMatch, traits: &ScoreTraits) -> f64 {
        traits.scale(state.matched, state.length)
    }

    fn post(&self, cx: &mut DialogContext, _item: &Activity, state: RegexMatch) -> Result<Intercept, DialogError> {
        (self.action)(cx, &state)
    }
}
