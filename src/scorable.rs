//! Interrupt dispatch
//!
//! Every incoming item is scored against the triggers of the dialogs on the
//! stack (innermost first) and then the global handlers (registration
//! order). The single best candidate consumes the item; when nothing scores
//! above the floor the item goes to the top frame's pending wait.

mod commands;
mod dispatch;
mod trigger;

#[cfg(test)]
mod proptests;

pub use commands::{CommandScorable, RegexMatch, RegexScorable};
pub use dispatch::Dispatcher;
pub use trigger::{Matcher, Trigger, TriggerAction};

use crate::activity::Activity;
use crate::dialog::{BoxedDialog, Dialog, DialogContext};
use crate::error::{DialogError, ScoreError, TurnError};
use std::any::Any;
use std::cmp::Ordering;

/// A global handler that can claim an item ahead of the stack
pub trait Scorable: Send + Sync + 'static {
    /// Result of `prepare`, handed back to `score` and `post`
    type State: Send + 'static;

    fn name(&self) -> &str;

    /// Inspect the item; `None` means this handler does not apply
    fn prepare(&self, item: &Activity) -> Option<Self::State>;

    /// Must lie within `traits`, the dispatcher's declared range
    fn score(&self, state: &Self::State, traits: &ScoreTraits) -> f64;

    /// Consume the item after winning
    fn post(
        &self,
        cx: &mut DialogContext,
        item: &Activity,
        state: Self::State,
    ) -> Result<Intercept, DialogError>;
}

/// What the stack should do after a global handler ran
#[derive(Debug)]
pub enum Intercept {
    /// Deliver the item to the stack as if no handler had matched
    Forward,
    /// The handler consumed the item; the stack is left as it was
    Handled,
    /// Run a dialog above the current top
    Interrupt(BoxedDialog),
    /// Discard the stack and its stored snapshot
    Restart,
}

impl Intercept {
    pub fn interrupt<D: Dialog>(dialog: D) -> Self {
        Intercept::Interrupt(BoxedDialog::new(dialog))
    }
}

/// Declared score range and the order used to compare scores
#[derive(Debug, Clone, Copy)]
pub struct ScoreTraits {
    pub minimum: f64,
    pub maximum: f64,
    pub comparator: fn(&f64, &f64) -> Ordering,
}

impl Default for ScoreTraits {
    fn default() -> Self {
        Self {
            minimum: 0.0,
            maximum: 1.0,
            comparator: f64::total_cmp,
        }
    }
}

impl ScoreTraits {
    pub fn new(minimum: f64, maximum: f64) -> Self {
        Self {
            minimum,
            maximum,
            ..Self::default()
        }
    }

    /// Reject NaN and anything outside `[minimum, maximum]`
    pub fn check(&self, handler: &str, score: f64) -> Result<f64, ScoreError> {
        if score.is_nan() || score < self.minimum || score > self.maximum {
            return Err(ScoreError::OutOfBounds {
                handler: handler.to_string(),
                score,
                minimum: self.minimum,
                maximum: self.maximum,
            });
        }
        Ok(score)
    }

    /// `a` strictly outranks `b`
    pub fn beats(&self, a: f64, b: f64) -> bool {
        (self.comparator)(&a, &b) == Ordering::Greater
    }

    /// Nothing can outrank `score`
    pub fn is_maximum(&self, score: f64) -> bool {
        (self.comparator)(&score, &self.maximum) == Ordering::Equal
    }

    /// Map `part / whole` onto the declared range
    pub fn scale(&self, part: usize, whole: usize) -> f64 {
        if whole == 0 {
            return self.minimum;
        }
        let ratio = f64::from(saturate(part.min(whole))) / f64::from(saturate(whole));
        self.minimum + (self.maximum - self.minimum) * ratio
    }
}

fn saturate(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

// ============================================================================
// Type erasure
// ============================================================================

pub(crate) type Prepared = Box<dyn Any + Send>;

/// Object-safe view of a `Scorable`
pub(crate) trait ErasedScorable: Send + Sync {
    fn name(&self) -> &str;

    fn prepare(&self, item: &Activity) -> Option<Prepared>;

    fn score(&self, state: &Prepared, traits: &ScoreTraits) -> Result<f64, ScoreError>;

    fn post(
        &self,
        cx: &mut DialogContext,
        item: &Activity,
        state: Prepared,
    ) -> Result<Intercept, TurnError>;
}

impl<T: Scorable> ErasedScorable for T {
    fn name(&self) -> &str {
        Scorable::name(self)
    }

    fn prepare(&self, item: &Activity) -> Option<Prepared> {
        Scorable::prepare(self, item).map(|state| Box::new(state) as Prepared)
    }

    fn score(&self, state: &Prepared, traits: &ScoreTraits) -> Result<f64, ScoreError> {
        state
            .downcast_ref::<T::State>()
            .map(|state| Scorable::score(self, state, traits))
            .ok_or_else(|| ScoreError::StateMismatch {
                handler: Scorable::name(self).to_string(),
            })
    }

    fn post(
        &self,
        cx: &mut DialogContext,
        item: &Activity,
        state: Prepared,
    ) -> Result<Intercept, TurnError> {
        let handler = Scorable::name(self).to_string();
        let state = state
            .downcast::<T::State>()
            .map_err(|_| ScoreError::StateMismatch {
                handler: handler.clone(),
            })?;
        Scorable::post(self, cx, item, *state).map_err(|error| TurnError::Handler { handler, error })
    }
}
