//! Shared test fixtures: a small dialog family and scripted handlers

use crate::activity::{Activity, ConversationKey, Scope};
use crate::dialog::{
    Awaited, BoxedDialog, Dialog, DialogContext, DialogRegistry, DialogResult, Next, RootFactory,
};
use crate::error::DialogError;
use crate::scorable::{Intercept, Matcher, Scorable, ScoreTraits, Trigger};
use crate::store::BotData;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Private-conversation key where `TestRoot` records its last child result
pub const ROOT_RECEIVED: &str = "root.received";
/// How many times `TestRoot` was resumed by a child
pub const ROOT_RESUMES: &str = "root.resumes";
/// Where `Relay` records what its child returned
pub const RELAY_RECEIVED: &str = "relay.received";

pub fn test_key() -> ConversationKey {
    ConversationKey::new("test", "conv-1", "user-1")
}

pub fn test_cx() -> DialogContext {
    DialogContext::new(test_key(), BotData::default())
}

pub fn test_registry() -> DialogRegistry {
    DialogRegistry::builder()
        .register::<TestRoot>()
        .register::<Acker>()
        .register::<Relay>()
        .register::<Answer>()
        .register::<Guardian>()
        .register::<Faulty>()
        .register::<Looper>()
        .build()
}

pub fn test_root() -> RootFactory {
    Arc::new(|| BoxedDialog::new(TestRoot::default()))
}

// ============================================================================
// Dialogs
// ============================================================================

/// Completes immediately with `value`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub value: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum AnswerStep {
    Unreachable,
}

impl Dialog for Answer {
    const KIND: &'static str = "test.answer";
    type Resume = AnswerStep;

    fn start(&mut self, _cx: &mut DialogContext) -> DialogResult<AnswerStep> {
        Next::done(&self.value)
    }

    fn resume(&mut self, _cx: &mut DialogContext, _at: AnswerStep, _input: Awaited) -> DialogResult<AnswerStep> {
        Err(DialogError::unexpected_input("answer never waits"))
    }
}

/// Calls `Answer { value: 42 }` and completes with "done"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relay {
    #[serde(default)]
    pub child_value: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum RelayStep {
    AfterAnswer,
}

impl Dialog for Relay {
    const KIND: &'static str = "test.relay";
    type Resume = RelayStep;

    fn start(&mut self, _cx: &mut DialogContext) -> DialogResult<RelayStep> {
        Next::call(Answer { value: 42 }, RelayStep::AfterAnswer)
    }

    fn resume(&mut self, cx: &mut DialogContext, at: RelayStep, input: Awaited) -> DialogResult<RelayStep> {
        let RelayStep::AfterAnswer = at;
        let value: i64 = input.value()?;
        self.child_value = Some(value);
        cx.set(Scope::PrivateConversation, RELAY_RECEIVED, &value)?;
        Next::done("done")
    }
}

/// Waits for one message and completes with "<text>-ack"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Acker {}

#[derive(Debug, Serialize, Deserialize)]
pub enum AckStep {
    Reply,
}

impl Dialog for Acker {
    const KIND: &'static str = "test.acker";
    type Resume = AckStep;

    fn start(&mut self, _cx: &mut DialogContext) -> DialogResult<AckStep> {
        Next::wait(AckStep::Reply)
    }

    fn resume(&mut self, _cx: &mut DialogContext, at: AckStep, input: Awaited) -> DialogResult<AckStep> {
        let AckStep::Reply = at;
        let item = input.item()?;
        Next::done(&format!("{}-ack", item.text))
    }

    fn triggers(&self) -> Vec<Trigger<AckStep>> {
        vec![Trigger::interrupt(Matcher::literal("aside"), Acker::default()).named("aside")]
    }
}

/// Calls `Faulty` and turns its failure into an apology
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Guardian {}

#[derive(Debug, Serialize, Deserialize)]
pub enum GuardStep {
    AfterFaulty,
}

impl Dialog for Guardian {
    const KIND: &'static str = "test.guardian";
    type Resume = GuardStep;

    fn start(&mut self, _cx: &mut DialogContext) -> DialogResult<GuardStep> {
        Next::call(Faulty, GuardStep::AfterFaulty)
    }

    fn resume(&mut self, cx: &mut DialogContext, at: GuardStep, input: Awaited) -> DialogResult<GuardStep> {
        let GuardStep::AfterFaulty = at;
        match input.value::<Value>() {
            Ok(value) => Next::done(&value),
            Err(e) => {
                cx.post(format!("Sorry, something went wrong ({e})"));
                Next::done("recovered")
            }
        }
    }
}

/// Fails as soon as it starts
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Faulty;

#[derive(Debug, Serialize, Deserialize)]
pub enum FaultyStep {
    Unreachable,
}

impl Dialog for Faulty {
    const KIND: &'static str = "test.faulty";
    type Resume = FaultyStep;

    fn start(&mut self, _cx: &mut DialogContext) -> DialogResult<FaultyStep> {
        Err(DialogError::failed("boom"))
    }

    fn resume(&mut self, _cx: &mut DialogContext, _at: FaultyStep, _input: Awaited) -> DialogResult<FaultyStep> {
        Err(DialogError::failed("boom"))
    }
}

/// Calls children forever without ever waiting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Looper {
    #[serde(default)]
    pub spins: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum LoopStep {
    Again,
}

impl Dialog for Looper {
    const KIND: &'static str = "test.looper";
    type Resume = LoopStep;

    fn start(&mut self, _cx: &mut DialogContext) -> DialogResult<LoopStep> {
        Next::call(Answer { value: 0 }, LoopStep::Again)
    }

    fn resume(&mut self, _cx: &mut DialogContext, _at: LoopStep, _input: Awaited) -> DialogResult<LoopStep> {
        self.spins += 1;
        Next::call(Answer { value: 0 }, LoopStep::Again)
    }
}

/// Root used by engine tests. Dispatches on the message text:
/// `relay`, `ack`, `guard`, `forward ...`, `quit`, anything else echoes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestRoot {
    #[serde(default)]
    pub turns: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum RootStep {
    Message,
    AfterChild,
    Status,
}

impl Dialog for TestRoot {
    const KIND: &'static str = "test.root";
    type Resume = RootStep;

    fn start(&mut self, _cx: &mut DialogContext) -> DialogResult<RootStep> {
        Next::wait(RootStep::Message)
    }

    fn resume(&mut self, cx: &mut DialogContext, at: RootStep, input: Awaited) -> DialogResult<RootStep> {
        match at {
            RootStep::Message => {
                let item = input.item()?;
                self.turns += 1;
                let text = item.trimmed().to_string();
                match text.as_str() {
                    "relay" => Next::call(Relay::default(), RootStep::AfterChild),
                    "ack" => Next::call(Acker::default(), RootStep::AfterChild),
                    "guard" => Next::call(Guardian::default(), RootStep::AfterChild),
                    "quit" => Next::done("bye"),
                    _ if text.starts_with("forward") => {
                        Next::forward(Acker::default(), item, RootStep::AfterChild)
                    }
                    _ => {
                        cx.post(format!("echo: {text}"));
                        Next::wait(RootStep::Message)
                    }
                }
            }
            RootStep::AfterChild => {
                let resumes = cx.get::<u32>(Scope::PrivateConversation, ROOT_RESUMES)?.unwrap_or(0);
                cx.set(Scope::PrivateConversation, ROOT_RESUMES, &(resumes + 1))?;
                let value: String = input.value()?;
                cx.set(Scope::PrivateConversation, ROOT_RECEIVED, &value)?;
                Next::wait(RootStep::Message)
            }
            RootStep::Status => {
                input.item()?;
                cx.post("status: ok");
                Next::wait(RootStep::Message)
            }
        }
    }

    fn triggers(&self) -> Vec<Trigger<RootStep>> {
        vec![Trigger::resume(Matcher::literal("status"), RootStep::Status).named("status")]
    }
}

// ============================================================================
// Scorables
// ============================================================================

/// Always applies with a fixed score; counts `prepare` calls
pub struct FixedScore {
    name: String,
    score: f64,
    pub prepared: Arc<AtomicUsize>,
}

impl FixedScore {
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score,
            prepared: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Scorable for FixedScore {
    type State = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&self, _item: &Activity) -> Option<()> {
        self.prepared.fetch_add(1, Ordering::SeqCst);
        Some(())
    }

    fn score(&self, _: &(), _: &ScoreTraits) -> f64 {
        self.score
    }

    fn post(&self, _cx: &mut DialogContext, _item: &Activity, _: ()) -> Result<Intercept, DialogError> {
        Ok(Intercept::Handled)
    }
}

/// Scores 0.5, counts posts and forwards the item to the stack
pub struct Counting {
    name: String,
    pub posted: Arc<AtomicUsize>,
}

impl Counting {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            posted: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Scorable for Counting {
    type State = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&self, _item: &Activity) -> Option<()> {
        Some(())
    }

    fn score(&self, _: &(), _: &ScoreTraits) -> f64 {
        0.5
    }

    fn post(&self, _cx: &mut DialogContext, _item: &Activity, _: ()) -> Result<Intercept, DialogError> {
        self.posted.fetch_add(1, Ordering::SeqCst);
        Ok(Intercept::Forward)
    }
}
