//! Property-based tests for the continuation stack
//!
//! A `Script` is a tree of nested calls. Each node calls its children in
//! order, optionally waits for one external item, then completes with its
//! own value plus everything its children returned.

use super::*;
use crate::activity::Scope;
use crate::dialog::{Dialog, DialogResult};
use crate::task::codec;
use crate::testing::test_cx;
use proptest::prelude::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Script {
    value: i64,
    waits: bool,
    children: Vec<Script>,
    #[serde(default)]
    acc: i64,
}

#[derive(Debug, Serialize, Deserialize)]
enum ScriptStep {
    Child { index: usize },
    Item,
}

impl Script {
    fn next_child(&mut self, index: usize) -> DialogResult<ScriptStep> {
        match self.children.get(index) {
            Some(child) => Next::call(child.clone(), ScriptStep::Child { index }),
            None if self.waits => Next::wait(ScriptStep::Item),
            None => Next::done(&(self.acc + self.value)),
        }
    }

    fn total(&self) -> i64 {
        self.value + self.children.iter().map(Script::total).sum::<i64>()
    }

    fn waiting_nodes(&self) -> usize {
        usize::from(self.waits) + self.children.iter().map(Script::waiting_nodes).sum::<usize>()
    }

    fn height(&self) -> usize {
        1 + self.children.iter().map(Script::height).max().unwrap_or(0)
    }
}

impl Dialog for Script {
    const KIND: &'static str = "test.script";
    type Resume = ScriptStep;

    fn start(&mut self, _cx: &mut DialogContext) -> DialogResult<ScriptStep> {
        self.next_child(0)
    }

    fn resume(
        &mut self,
        cx: &mut DialogContext,
        at: ScriptStep,
        input: Awaited,
    ) -> DialogResult<ScriptStep> {
        let resumes: u32 = cx.get(Scope::PrivateConversation, "resumes")?.unwrap_or(0);
        cx.set(Scope::PrivateConversation, "resumes", &(resumes + 1))?;
        cx.set(Scope::Conversation, "last", &(self.acc + self.value))?;
        match at {
            ScriptStep::Child { index } => {
                self.acc += input.value::<i64>()?;
                self.next_child(index + 1)
            }
            ScriptStep::Item => {
                input.item()?;
                Next::done(&(self.acc + self.value))
            }
        }
    }
}

fn arb_script() -> impl Strategy<Value = Script> {
    let leaf = (-100i64..100, any::<bool>()).prop_map(|(value, waits)| Script {
        value,
        waits,
        children: vec![],
        acc: 0,
    });
    leaf.prop_recursive(4, 24, 3, |inner| {
        (-100i64..100, any::<bool>(), proptest::collection::vec(inner, 0..3)).prop_map(
            |(value, waits, children)| Script {
                value,
                waits,
                children,
                acc: 0,
            },
        )
    })
}

fn registry() -> DialogRegistry {
    DialogRegistry::builder().register::<Script>().build()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Each call resolves to exactly one resume of its parent: the root sees
    // the sum of the whole tree after one post per waiting node
    #[test]
    fn prop_nested_calls_resolve_once(script in arb_script()) {
        let expected = script.total();
        let posts = script.waiting_nodes();
        let height = script.height();
        let mut cx = test_cx();
        let mut fiber = Fiber::with_root(BoxedDialog::new(script), DEFAULT_MAX_DRIVE_STEPS);

        let mut settled = fiber.drive(&mut cx).unwrap();
        let mut sent = 0;
        while settled == Settled::Waiting {
            prop_assert!(fiber.depth() <= height);
            prop_assert!(fiber.top().unwrap().wait().is_suspended());
            fiber.post(Activity::message("next")).unwrap();
            sent += 1;
            settled = fiber.drive(&mut cx).unwrap();
        }

        prop_assert_eq!(sent, posts);
        prop_assert_eq!(settled, Settled::Completed(Value::from(expected)));
        prop_assert!(fiber.is_empty());
    }

    // Encoding and restoring the stack between every turn gives the same
    // result and the same data bag as keeping the stack in memory
    #[test]
    fn prop_snapshot_between_turns_is_transparent(script in arb_script()) {
        let expected = script.total();
        let registry = registry();

        let mut live_cx = test_cx();
        let mut live = Fiber::with_root(BoxedDialog::new(script.clone()), DEFAULT_MAX_DRIVE_STEPS);
        let mut live_settled = live.drive(&mut live_cx).unwrap();

        let mut cx = test_cx();
        let mut fiber = Fiber::with_root(BoxedDialog::new(script), DEFAULT_MAX_DRIVE_STEPS);
        let mut settled = fiber.drive(&mut cx).unwrap();

        while settled == Settled::Waiting {
            let snapshot = fiber.snapshot().unwrap();
            let decoded = codec::decode(&codec::encode(&snapshot).unwrap()).unwrap();
            prop_assert_eq!(&decoded, &snapshot);

            fiber = Fiber::restore(decoded, &registry, DEFAULT_MAX_DRIVE_STEPS).unwrap();
            fiber.post(Activity::message("next")).unwrap();
            settled = fiber.drive(&mut cx).unwrap();

            prop_assert_eq!(&live_settled, &Settled::Waiting);
            live.post(Activity::message("next")).unwrap();
            live_settled = live.drive(&mut live_cx).unwrap();
            prop_assert_eq!(fiber.depth(), live.depth());
        }

        prop_assert_eq!(&live_settled, &settled);
        prop_assert_eq!(settled, Settled::Completed(Value::from(expected)));
        prop_assert_eq!(cx.data(), live_cx.data());
    }

    // Unwinding to any frame leaves exactly that many frames below the target
    #[test]
    fn prop_unwind_truncates_stack(script in arb_script(), pick in any::<prop::sample::Index>()) {
        let mut cx = test_cx();
        let mut fiber = Fiber::with_root(BoxedDialog::new(script), DEFAULT_MAX_DRIVE_STEPS);
        if fiber.drive(&mut cx).unwrap() != Settled::Waiting {
            return Ok(());
        }
        let depth = fiber.depth();
        let target = pick.index(depth);
        let method = serde_json::to_value(ScriptStep::Item).unwrap();
        fiber.unwind_to(target, method, Activity::message("jump")).unwrap();
        prop_assert_eq!(fiber.depth(), target + 1);
        prop_assert!(!fiber.top().unwrap().wait().is_suspended());
    }
}
