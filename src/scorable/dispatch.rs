//! Candidate scan and routing

use super::{ErasedScorable, Intercept, Prepared, Scorable, ScoreTraits, Trigger, TriggerAction};
use crate::activity::Activity;
use crate::dialog::DialogContext;
use crate::error::{ScoreError, TurnError};
use crate::store::SnapshotStore;
use crate::task::{DialogTask, TurnStatus};
use serde_json::Value;

/// Global handlers plus the score range they are held to
pub struct Dispatcher {
    globals: Vec<Box<dyn ErasedScorable>>,
    traits: ScoreTraits,
}

/// The candidate that won the scan
pub(crate) enum Winner<'a> {
    Frame {
        index: usize,
        trigger: Trigger<Value>,
        score: f64,
    },
    Global {
        handler: &'a dyn ErasedScorable,
        state: Prepared,
        score: f64,
    },
}

impl Winner<'_> {
    pub(crate) fn name(&self) -> &str {
        match self {
            Winner::Frame { trigger, .. } => trigger.name(),
            Winner::Global { handler, .. } => handler.name(),
        }
    }

    pub(crate) fn score(&self) -> f64 {
        match self {
            Winner::Frame { score, .. } | Winner::Global { score, .. } => *score,
        }
    }
}

impl Dispatcher {
    pub fn new(traits: ScoreTraits) -> Self {
        Self {
            globals: Vec::new(),
            traits,
        }
    }

    /// Register a global handler; earlier registrations win ties
    #[must_use]
    pub fn with_global<T: Scorable>(mut self, handler: T) -> Self {
        self.globals.push(Box::new(handler));
        self
    }

    pub fn traits(&self) -> &ScoreTraits {
        &self.traits
    }

    pub fn global_names(&self) -> Vec<&str> {
        self.globals.iter().map(|handler| handler.name()).collect()
    }

    /// Scan frame triggers (already innermost first) and then the globals.
    /// Only a strictly better score replaces the current best, so ties keep
    /// the earlier candidate. A score equal to `maximum` ends the scan.
    pub(crate) fn select(
        &self,
        item: &Activity,
        triggers: Vec<(usize, Trigger<Value>)>,
    ) -> Result<Option<Winner<'_>>, ScoreError> {
        let mut best: Option<Winner<'_>> = None;

        for (index, trigger) in triggers {
            let Some(score) = trigger.matcher().score(item, &self.traits) else {
                continue;
            };
            let score = self.traits.check(trigger.name(), score)?;
            tracing::trace!(trigger = trigger.name(), frame = index, score, "Scored frame trigger");
            if self.improves(best.as_ref(), score) {
                let exact = self.traits.is_maximum(score);
                best = Some(Winner::Frame {
                    index,
                    trigger,
                    score,
                });
                if exact {
                    return Ok(best);
                }
            }
        }

        for handler in &self.globals {
            let Some(state) = handler.prepare(item) else {
                continue;
            };
            let score = self.traits.check(handler.name(), handler.score(&state, &self.traits)?)?;
            tracing::trace!(handler = handler.name(), score, "Scored global handler");
            if self.improves(best.as_ref(), score) {
                let exact = self.traits.is_maximum(score);
                best = Some(Winner::Global {
                    handler: handler.as_ref(),
                    state,
                    score,
                });
                if exact {
                    break;
                }
            }
        }

        Ok(best)
    }

    /// Above the floor and strictly better than the current best
    fn improves(&self, best: Option<&Winner<'_>>, score: f64) -> bool {
        self.traits.beats(score, self.traits.minimum)
            && best.map_or(true, |best| self.traits.beats(score, best.score()))
    }

    /// Route one item: to the winning handler, or to the stack's pending wait
    pub fn dispatch<S: SnapshotStore>(
        &self,
        task: &mut DialogTask<S>,
        cx: &mut DialogContext,
        item: Activity,
    ) -> Result<TurnStatus, TurnError> {
        let triggers = task.triggers(cx)?;
        let Some(winner) = self.select(&item, triggers)? else {
            return Ok(task.post(cx, item)?);
        };

        tracing::debug!(
            conversation = %task.key(),
            handler = winner.name(),
            score = winner.score(),
            "Item intercepted"
        );

        let status = match winner {
            Winner::Frame { index, trigger, .. } => match trigger.into_action() {
                TriggerAction::Resume(method) => task.resume_frame(cx, index, method, item)?,
                TriggerAction::Interrupt(dialog) => task.interrupt(cx, dialog)?,
            },
            Winner::Global { handler, state, .. } => match handler.post(cx, &item, state)? {
                Intercept::Forward => task.post(cx, item)?,
                Intercept::Handled => task.current_status(),
                Intercept::Interrupt(dialog) => task.interrupt(cx, dialog)?,
                Intercept::Restart => {
                    task.restart();
                    TurnStatus::Restarted
                }
            },
        };
        Ok(status)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(ScoreTraits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::Scope;
    use crate::scorable::{CommandScorable, Matcher};
    use crate::store::MemoryStore;
    use crate::testing::*;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn task() -> DialogTask<Arc<MemoryStore>> {
        DialogTask::new(
            test_key(),
            Arc::new(MemoryStore::new()),
            Arc::new(test_registry()),
            test_root(),
            64,
        )
    }

    /// Root -> acker -> acker -> acker: three live frames
    fn nested(task: &mut DialogTask<Arc<MemoryStore>>, cx: &mut DialogContext) {
        task.post(cx, Activity::message("ack")).unwrap();
        task.interrupt(cx, crate::dialog::BoxedDialog::new(Acker::default()))
            .unwrap();
        task.interrupt(cx, crate::dialog::BoxedDialog::new(Acker::default()))
            .unwrap();
        assert_eq!(task.fiber().unwrap().depth(), 4);
    }

    #[test]
    fn test_exact_global_short_circuits_deep_stack() {
        let later = FixedScore::new("after-cancel", 1.0);
        let calls = later.prepared.clone();
        let dispatcher = Dispatcher::default()
            .with_global(CommandScorable::restart("cancel", ["cancel"], "Cancelled."))
            .with_global(later);
        let mut task = task();
        let mut cx = test_cx();
        nested(&mut task, &mut cx);

        let status = dispatcher
            .dispatch(&mut task, &mut cx, Activity::message("cancel"))
            .unwrap();
        assert_eq!(status, TurnStatus::Restarted);
        assert_eq!(calls.load(Ordering::SeqCst), 0, "scan must stop at the exact match");
        assert_eq!(cx.replies().last().unwrap().text, "Cancelled.");
        assert!(task.fiber().is_none());
    }

    #[test]
    fn test_commands_score_dispatcher_maximum_under_custom_bounds() {
        let later = FixedScore::new("other", 50.0);
        let calls = later.prepared.clone();
        let dispatcher = Dispatcher::new(ScoreTraits::new(0.0, 100.0))
            .with_global(CommandScorable::restart("cancel", ["cancel"], "Cancelled."))
            .with_global(later);

        let winner = dispatcher
            .select(&Activity::message("cancel"), Vec::new())
            .unwrap()
            .unwrap();
        assert_eq!(winner.name(), "cancel");
        assert!((winner.score() - 100.0).abs() < f64::EPSILON);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_inner_frame_wins_tie_with_global() {
        let dispatcher = Dispatcher::default().with_global(FixedScore::new("global", 0.5));
        let triggers = vec![(
            1,
            Trigger::resume(Matcher::predicate(|_| true, 0.5), Value::Null).named("frame"),
        )];
        let winner = dispatcher
            .select(&Activity::message("x"), triggers)
            .unwrap()
            .unwrap();
        assert_eq!(winner.name(), "frame");
    }

    #[test]
    fn test_inner_frame_wins_tie_with_outer_frame() {
        let dispatcher = Dispatcher::default();
        let triggers = vec![
            (2, Trigger::resume(Matcher::predicate(|_| true, 0.5), Value::Null).named("inner")),
            (0, Trigger::resume(Matcher::predicate(|_| true, 0.5), Value::Null).named("outer")),
        ];
        let winner = dispatcher
            .select(&Activity::message("x"), triggers)
            .unwrap()
            .unwrap();
        assert_eq!(winner.name(), "inner");
    }

    #[test]
    fn test_higher_global_beats_frame() {
        let dispatcher = Dispatcher::default().with_global(FixedScore::new("global", 0.9));
        let triggers = vec![(
            0,
            Trigger::resume(Matcher::predicate(|_| true, 0.5), Value::Null).named("frame"),
        )];
        let winner = dispatcher
            .select(&Activity::message("x"), triggers)
            .unwrap()
            .unwrap();
        assert_eq!(winner.name(), "global");
    }

    #[test]
    fn test_out_of_bounds_score_aborts() {
        let dispatcher = Dispatcher::default().with_global(FixedScore::new("broken", 1.5));
        let mut task = task();
        let mut cx = test_cx();
        let err = dispatcher
            .dispatch(&mut task, &mut cx, Activity::message("x"))
            .unwrap_err();
        assert!(matches!(
            err,
            TurnError::Score(ScoreError::OutOfBounds { ref handler, .. }) if handler == "broken"
        ));
    }

    #[test]
    fn test_floor_score_falls_through_to_stack() {
        let dispatcher = Dispatcher::default().with_global(FixedScore::new("floor", 0.0));
        let mut task = task();
        let mut cx = test_cx();
        let status = dispatcher
            .dispatch(&mut task, &mut cx, Activity::message("hi"))
            .unwrap();
        assert_eq!(status, TurnStatus::Waiting { depth: 1 });
        assert_eq!(cx.replies().last().unwrap().text, "echo: hi");
    }

    #[test]
    fn test_frame_trigger_unwinds_to_owner() {
        let dispatcher = Dispatcher::default();
        let mut task = task();
        let mut cx = test_cx();
        nested(&mut task, &mut cx);

        // The root's "status" trigger resumes the root, discarding the ackers
        let status = dispatcher
            .dispatch(&mut task, &mut cx, Activity::message("status"))
            .unwrap();
        assert_eq!(status, TurnStatus::Waiting { depth: 1 });
        assert_eq!(cx.replies().last().unwrap().text, "status: ok");
    }

    #[test]
    fn test_frame_trigger_interrupt_keeps_wait() {
        let dispatcher = Dispatcher::default();
        let mut task = task();
        let mut cx = test_cx();
        task.post(&mut cx, Activity::message("ack")).unwrap();

        // The acker offers "aside", which interrupts with another acker
        let status = dispatcher
            .dispatch(&mut task, &mut cx, Activity::message("aside"))
            .unwrap();
        assert_eq!(status, TurnStatus::Waiting { depth: 3 });
        dispatcher
            .dispatch(&mut task, &mut cx, Activity::message("side note"))
            .unwrap();
        assert_eq!(task.fiber().unwrap().depth(), 2);

        dispatcher
            .dispatch(&mut task, &mut cx, Activity::message("real answer"))
            .unwrap();
        assert_eq!(
            cx.get::<String>(Scope::PrivateConversation, ROOT_RECEIVED).unwrap().as_deref(),
            Some("real answer-ack")
        );
    }

    #[test]
    fn test_handled_leaves_stack_alone() {
        let dispatcher =
            Dispatcher::default().with_global(CommandScorable::reply("help", ["help"], "Try 'ack'."));
        let mut task = task();
        let mut cx = test_cx();
        task.post(&mut cx, Activity::message("ack")).unwrap();

        let status = dispatcher
            .dispatch(&mut task, &mut cx, Activity::message("HELP"))
            .unwrap();
        assert_eq!(status, TurnStatus::Waiting { depth: 2 });
        assert_eq!(cx.replies().last().unwrap().text, "Try 'ack'.");
        assert!(task.fiber().unwrap().top().unwrap().wait().is_suspended());
    }

    #[test]
    fn test_forward_delivers_after_handler() {
        let counter = Counting::new("count");
        let seen = counter.posted.clone();
        let dispatcher = Dispatcher::default().with_global(counter);
        let mut task = task();
        let mut cx = test_cx();

        let status = dispatcher
            .dispatch(&mut task, &mut cx, Activity::message("hi"))
            .unwrap();
        assert_eq!(status, TurnStatus::Waiting { depth: 1 });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(cx.replies().last().unwrap().text, "echo: hi");
    }
}
