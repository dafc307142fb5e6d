//! Dialog model
//!
//! A dialog is plain serializable data plus an enum of resume points. Each
//! resume point variant carries the locals captured when the dialog
//! suspended, so a continuation is just `(dialog kind, state, resume point)`
//! and survives a process restart.

mod context;
mod prompts;
mod registry;

pub use context::DialogContext;
pub use prompts::{Choice, Confirm, Number, Prompt, PromptStep, Recognizer, Text};
pub use registry::{DialogRegistry, DialogRegistryBuilder, RootFactory};

use crate::activity::Activity;
use crate::error::DialogError;
use crate::fiber::Continuation;
use crate::scorable::Trigger;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Result of running one dialog method. `Err` is the same as `Next::Fail`.
pub type DialogResult<R> = Result<Next<R>, DialogError>;

/// A resumable conversational unit
pub trait Dialog: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable type key written into snapshots
    const KIND: &'static str;

    /// Resume points of this dialog
    type Resume: Serialize + DeserializeOwned;

    /// Entry point, run once when the dialog is called
    fn start(&mut self, cx: &mut DialogContext) -> DialogResult<Self::Resume>;

    /// Continue at `at` with the awaited input
    fn resume(
        &mut self,
        cx: &mut DialogContext,
        at: Self::Resume,
        input: Awaited,
    ) -> DialogResult<Self::Resume>;

    /// Interrupt triggers offered while this dialog is on the stack
    fn triggers(&self) -> Vec<Trigger<Self::Resume>> {
        Vec::new()
    }
}

/// What the stack should do after a dialog method returns
#[derive(Debug)]
pub enum Next<R> {
    /// Suspend until the next external item arrives
    Wait(R),
    /// Push `child`; resume at `resume` with its result
    Call { child: BoxedDialog, resume: R },
    /// Push `child` and hand it `item` once it suspends
    Forward {
        child: BoxedDialog,
        item: Activity,
        resume: R,
    },
    /// Pop this frame and resume the parent with a value
    Done(Value),
    /// Pop this frame and resume the parent with an error
    Fail(DialogError),
}

impl<R> Next<R> {
    pub fn wait(at: R) -> DialogResult<R> {
        Ok(Next::Wait(at))
    }

    pub fn call<D: Dialog>(child: D, resume: R) -> DialogResult<R> {
        Ok(Next::Call {
            child: BoxedDialog::new(child),
            resume,
        })
    }

    pub fn forward<D: Dialog>(child: D, item: Activity, resume: R) -> DialogResult<R> {
        Ok(Next::Forward {
            child: BoxedDialog::new(child),
            item,
            resume,
        })
    }

    pub fn done<T: Serialize + ?Sized>(value: &T) -> DialogResult<R> {
        serde_json::to_value(value)
            .map(Next::Done)
            .map_err(|e| DialogError::serialization(&e))
    }

    pub fn fail(error: DialogError) -> DialogResult<R> {
        Ok(Next::Fail(error))
    }
}

impl<R: Serialize> Next<R> {
    /// Replace the typed resume point with its serialized form
    fn erase(self) -> Result<Next<Value>, DialogError> {
        let encode = |at: R| serde_json::to_value(at).map_err(|e| DialogError::serialization(&e));
        Ok(match self {
            Next::Wait(at) => Next::Wait(encode(at)?),
            Next::Call { child, resume } => Next::Call {
                child,
                resume: encode(resume)?,
            },
            Next::Forward {
                child,
                item,
                resume,
            } => Next::Forward {
                child,
                item,
                resume: encode(resume)?,
            },
            Next::Done(value) => Next::Done(value),
            Next::Fail(error) => Next::Fail(error),
        })
    }
}

/// Input delivered to a resumed continuation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Awaited {
    /// Arms a dialog's entry point
    Start,
    /// An external item posted by the user
    Item { activity: Activity },
    /// A child dialog completed
    Value { value: Value },
    /// A child dialog failed
    Error { error: DialogError },
}

impl Awaited {
    pub fn item(self) -> Result<Activity, DialogError> {
        match self {
            Awaited::Item { activity } => Ok(activity),
            Awaited::Error { error } => Err(error),
            other => Err(DialogError::unexpected_input(format!(
                "expected an item, got {}",
                other.describe()
            ))),
        }
    }

    /// Typed child result; a child failure comes back as `Err`
    pub fn value<T: DeserializeOwned>(self) -> Result<T, DialogError> {
        match self {
            Awaited::Value { value } => serde_json::from_value(value)
                .map_err(|e| DialogError::type_mismatch(e.to_string())),
            Awaited::Error { error } => Err(error),
            other => Err(DialogError::unexpected_input(format!(
                "expected a value, got {}",
                other.describe()
            ))),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Awaited::Start => "start signal",
            Awaited::Item { .. } => "item",
            Awaited::Value { .. } => "value",
            Awaited::Error { .. } => "error",
        }
    }
}

impl From<Result<Value, DialogError>> for Awaited {
    fn from(outcome: Result<Value, DialogError>) -> Self {
        match outcome {
            Ok(value) => Awaited::Value { value },
            Err(error) => Awaited::Error { error },
        }
    }
}

// ============================================================================
// Type erasure
// ============================================================================

/// Object-safe view of a `Dialog`, used by stack frames
trait ErasedDialog: Send + Sync {
    fn kind(&self) -> &'static str;

    fn state(&self) -> Result<Value, serde_json::Error>;

    fn invoke(
        &mut self,
        cx: &mut DialogContext,
        continuation: &Continuation,
        input: Awaited,
    ) -> Next<Value>;

    fn erased_triggers(&self) -> Vec<Trigger<Value>>;
}

impl<D: Dialog> ErasedDialog for D {
    fn kind(&self) -> &'static str {
        D::KIND
    }

    fn state(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn invoke(
        &mut self,
        cx: &mut DialogContext,
        continuation: &Continuation,
        input: Awaited,
    ) -> Next<Value> {
        let result = match continuation {
            Continuation::Start => self.start(cx),
            Continuation::Resume { method } => {
                match serde_json::from_value::<D::Resume>(method.clone()) {
                    Ok(at) => self.resume(cx, at, input),
                    Err(e) => Err(DialogError::serialization(&e)),
                }
            }
        };
        result.and_then(Next::erase).unwrap_or_else(Next::Fail)
    }

    fn erased_triggers(&self) -> Vec<Trigger<Value>> {
        Dialog::triggers(self)
            .into_iter()
            .filter_map(|trigger| {
                let name = trigger.name().to_string();
                trigger
                    .erase()
                    .map_err(|e| {
                        tracing::warn!(kind = D::KIND, trigger = %name, error = %e, "Dropping trigger with unserializable resume point");
                    })
                    .ok()
            })
            .collect()
    }
}

/// An owned dialog of any registered kind
pub struct BoxedDialog(Box<dyn ErasedDialog>);

impl BoxedDialog {
    pub fn new<D: Dialog>(dialog: D) -> Self {
        Self(Box::new(dialog))
    }

    pub fn kind(&self) -> &'static str {
        self.0.kind()
    }

    pub(crate) fn state(&self) -> Result<Value, serde_json::Error> {
        self.0.state()
    }

    pub(crate) fn invoke(
        &mut self,
        cx: &mut DialogContext,
        continuation: &Continuation,
        input: Awaited,
    ) -> Next<Value> {
        self.0.invoke(cx, continuation, input)
    }

    pub(crate) fn triggers(&self) -> Vec<Trigger<Value>> {
        self.0.erased_triggers()
    }
}

impl fmt::Debug for BoxedDialog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoxedDialog").field(&self.kind()).finish()
    }
}
