//! Profile bot served by the binary
//!
//! Asks for a name and an age, then chats. "edit profile" unwinds to the
//! root from anywhere in the stack; "help", "cancel" and "who am i" are
//! global commands.

use crate::activity::Scope;
use crate::dialog::{
    Awaited, BoxedDialog, Dialog, DialogContext, DialogRegistry, DialogResult, Next, Prompt,
    RootFactory,
};
use crate::error::{DialogError, DialogErrorKind};
use crate::scorable::{
    CommandScorable, Dispatcher, Intercept, Matcher, RegexMatch, RegexScorable, ScoreTraits,
    Trigger,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const NAME: &str = "profile.name";
const AGE: &str = "profile.age";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileRoot {
    #[serde(default)]
    messages: u32,
}

/// Resume points of `ProfileRoot`
#[derive(Debug, Serialize, Deserialize)]
pub enum ProfileStep {
    /// First message of a conversation
    Greet,
    /// Name prompt finished; ask for the age afterwards unless editing
    GotName { then_age: bool },
    GotAge,
    EditChoice,
    Edit,
    Message,
}

impl ProfileRoot {
    fn ask_name(then_age: bool) -> DialogResult<ProfileStep> {
        Next::call(
            Prompt::text("What's your name?"),
            ProfileStep::GotName { then_age },
        )
    }

    fn ask_age() -> DialogResult<ProfileStep> {
        Next::call(
            Prompt::number("How old are you?")
                .between(0, 150)
                .with_retry("Please send your age as a number between 0 and 150."),
            ProfileStep::GotAge,
        )
    }

    fn summary(cx: &mut DialogContext) -> DialogResult<ProfileStep> {
        let name: Option<String> = cx.get(Scope::User, NAME)?;
        let age: Option<i64> = cx.get(Scope::User, AGE)?;
        let text = match (name, age) {
            (Some(name), Some(age)) => format!("Thanks {name}, you are {age}."),
            (Some(name), None) => format!("Thanks {name}."),
            _ => "Thanks.".to_string(),
        };
        cx.post(format!("{text} Say \"edit profile\" any time to change it."));
        Next::wait(ProfileStep::Message)
    }
}

impl Dialog for ProfileRoot {
    const KIND: &'static str = "demo.profile";
    type Resume = ProfileStep;

    fn start(&mut self, _cx: &mut DialogContext) -> DialogResult<ProfileStep> {
        Next::wait(ProfileStep::Greet)
    }

    fn resume(
        &mut self,
        cx: &mut DialogContext,
        at: ProfileStep,
        input: Awaited,
    ) -> DialogResult<ProfileStep> {
        match at {
            ProfileStep::Greet => {
                input.item()?;
                match cx.get::<String>(Scope::User, NAME)? {
                    Some(name) => {
                        cx.post(format!("Welcome back, {name}!"));
                        Next::wait(ProfileStep::Message)
                    }
                    None => {
                        cx.post("Hi! Let's set up your profile.");
                        Self::ask_name(true)
                    }
                }
            }
            ProfileStep::GotName { then_age } => {
                let name: String = input.value()?;
                cx.set(Scope::User, NAME, &name)?;
                if then_age {
                    Self::ask_age()
                } else {
                    Self::summary(cx)
                }
            }
            ProfileStep::GotAge => match input.value::<i64>() {
                Ok(age) => {
                    cx.set(Scope::User, AGE, &age)?;
                    Self::summary(cx)
                }
                Err(e) if e.kind == DialogErrorKind::TooManyAttempts => {
                    cx.remove(Scope::User, AGE);
                    cx.post("Let's skip the age for now.");
                    Self::summary(cx)
                }
                Err(e) => Err(e),
            },
            ProfileStep::Edit => {
                input.item()?;
                Next::call(
                    Prompt::choice("What would you like to change?", ["name", "age"]),
                    ProfileStep::EditChoice,
                )
            }
            ProfileStep::EditChoice => {
                let field: String = input.value()?;
                match field.as_str() {
                    "name" => Self::ask_name(false),
                    "age" => Self::ask_age(),
                    other => Err(DialogError::unexpected_input(format!("unknown field {other}"))),
                }
            }
            ProfileStep::Message => {
                let item = input.item()?;
                self.messages += 1;
                cx.post(format!("You said \"{}\" ({} messages so far).", item.trimmed(), self.messages));
                Next::wait(ProfileStep::Message)
            }
        }
    }

    fn triggers(&self) -> Vec<Trigger<ProfileStep>> {
        vec![Trigger::resume(Matcher::literal("edit profile"), ProfileStep::Edit).named("edit-profile")]
    }
}

pub fn registry() -> DialogRegistry {
    DialogRegistry::builder().register::<ProfileRoot>().build()
}

pub fn root() -> RootFactory {
    Arc::new(|| BoxedDialog::new(ProfileRoot::default()))
}

pub fn dispatcher(traits: ScoreTraits) -> Result<Dispatcher, regex::Error> {
    let whoami = RegexScorable::new(
        "whoami",
        r"(?i)^who\s*am\s*i\??$",
        |cx: &mut DialogContext, _: &RegexMatch| {
            let reply = match cx.get::<String>(Scope::User, NAME)? {
                Some(name) => format!("You are {name}."),
                None => "I don't know yet.".to_string(),
            };
            cx.post(reply);
            Ok(Intercept::Handled)
        },
    )?;

    Ok(Dispatcher::new(traits)
        .with_global(CommandScorable::restart(
            "cancel",
            ["cancel", "/cancel", "start over"],
            "Okay, starting over.",
        ))
        .with_global(CommandScorable::reply(
            "help",
            ["help", "/help"],
            "Answer the questions, or say \"edit profile\", \"who am i\" or \"cancel\".",
        ))
        .with_global(whoami))
}
