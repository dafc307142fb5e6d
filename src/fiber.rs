//! Continuation stack ("fiber")
//!
//! Frames are pushed by `call`, suspended by `wait`, resolved by `done` /
//! `fail`, and `drive` runs armed continuations until the top frame is
//! suspended or the root frame has been popped. Nothing here blocks: every
//! continuation runs to completion before the next one is considered.

mod wait;

#[cfg(test)]
mod proptests;

pub use wait::{Continuation, Wait};

use crate::activity::Activity;
use crate::dialog::{Awaited, BoxedDialog, DialogContext, DialogRegistry, Next};
use crate::error::{DialogError, FiberError, SnapshotError};
use crate::scorable::Trigger;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot schema version written by this build
pub const SNAPSHOT_VERSION: u32 = 1;

/// Default cap on drive steps per turn
pub const DEFAULT_MAX_DRIVE_STEPS: usize = 256;

/// One stack entry: the owning dialog and its suspension state
#[derive(Debug)]
pub struct Frame {
    target: BoxedDialog,
    wait: Wait,
    /// Pushed above a suspended frame by an interrupt handler
    interrupt: bool,
}

impl Frame {
    fn entry(target: BoxedDialog, interrupt: bool) -> Self {
        Self {
            target,
            wait: Wait::entry(),
            interrupt,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.target.kind()
    }

    pub fn wait(&self) -> &Wait {
        &self.wait
    }

    pub fn is_interrupt(&self) -> bool {
        self.interrupt
    }
}

/// How the stack came to rest after `drive`
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
    /// Top frame is suspended waiting for the next item
    Waiting,
    /// The root frame completed; the conversation is over
    Completed(Value),
    /// The root frame failed; the conversation is over
    Failed(DialogError),
}

/// Ordered frames, root at index 0
#[derive(Debug)]
pub struct Fiber {
    frames: Vec<Frame>,
    /// Item queued by `forward`, delivered to the next suspended top frame
    forwarded: Option<Activity>,
    max_steps: usize,
}

impl Fiber {
    pub fn new(max_steps: usize) -> Self {
        Self {
            frames: Vec::new(),
            forwarded: None,
            max_steps: max_steps.max(1),
        }
    }

    /// A fresh stack whose only frame is `root`, armed to start
    pub fn with_root(root: BoxedDialog, max_steps: usize) -> Self {
        let mut fiber = Self::new(max_steps);
        fiber.frames.push(Frame::entry(root, false));
        fiber
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    fn top_mut(&mut self) -> Result<&mut Frame, FiberError> {
        self.frames.last_mut().ok_or(FiberError::EmptyStack)
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.forwarded = None;
    }

    // ==================== Stack Operations ====================

    /// Park the current frame at `resume` and push `child` at its entry point
    pub fn call(&mut self, child: BoxedDialog, resume: Continuation) -> Result<(), FiberError> {
        let depth = self.frames.len() + 1;
        let top = self.top_mut()?;
        top.wait = Wait::suspended(resume);
        tracing::debug!(
            parent = top.target.kind(),
            child = child.kind(),
            depth,
            "Call"
        );
        self.frames.push(Frame::entry(child, false));
        Ok(())
    }

    /// `call`, then hand `item` to whichever frame is waiting once the child suspends
    pub fn forward(
        &mut self,
        child: BoxedDialog,
        item: Activity,
        resume: Continuation,
    ) -> Result<(), FiberError> {
        self.call(child, resume)?;
        if self.forwarded.replace(item).is_some() {
            tracing::warn!("Forwarded item replaced before delivery");
        }
        Ok(())
    }

    /// Suspend the current frame until the next external item
    pub fn wait(&mut self, resume: Continuation) -> Result<(), FiberError> {
        self.top_mut()?.wait = Wait::suspended(resume);
        Ok(())
    }

    /// Resolve the current frame with a value
    pub fn done(&mut self, value: Value) -> Result<(), FiberError> {
        self.top_mut()?.wait = Wait::Done { value };
        Ok(())
    }

    /// Resolve the current frame with an error
    pub fn fail(&mut self, error: DialogError) -> Result<(), FiberError> {
        let top = self.top_mut()?;
        tracing::debug!(kind = top.target.kind(), error = %error, "Frame failed");
        top.wait = Wait::Failed { error };
        Ok(())
    }

    /// Deliver an external item to the suspended top frame
    pub fn post(&mut self, item: Activity) -> Result<(), FiberError> {
        let top = self.frames.last_mut().ok_or(FiberError::UnhandledInput)?;
        if top.wait.arm(Awaited::Item { activity: item }) {
            Ok(())
        } else {
            Err(FiberError::UnhandledInput)
        }
    }

    /// Push `dialog` above the current top without touching the top's wait.
    /// When it completes its value is dropped and the interrupted frame stays
    /// suspended where it was.
    pub fn interrupt(&mut self, dialog: BoxedDialog) {
        let interrupt = !self.frames.is_empty();
        tracing::debug!(kind = dialog.kind(), depth = self.frames.len() + 1, "Interrupt");
        self.frames.push(Frame::entry(dialog, interrupt));
    }

    /// Discard every frame above `frame` and resume it at `method` with `item`
    pub fn unwind_to(&mut self, frame: usize, method: Value, item: Activity) -> Result<(), FiberError> {
        let depth = self.frames.len();
        if frame >= depth {
            return Err(FiberError::NoSuchFrame { frame, depth });
        }
        for discarded in self.frames.drain(frame + 1..) {
            tracing::debug!(kind = discarded.target.kind(), "Unwinding frame");
        }
        self.forwarded = None;
        self.frames[frame].wait = Wait::Resumable {
            continuation: Continuation::resume(method),
            ready: Some(Awaited::Item { activity: item }),
        };
        Ok(())
    }

    /// Apply the command returned by the top frame's continuation
    fn apply(&mut self, next: Next<Value>) -> Result<(), FiberError> {
        match next {
            Next::Wait(method) => self.wait(Continuation::resume(method)),
            Next::Call { child, resume } => self.call(child, Continuation::resume(resume)),
            Next::Forward {
                child,
                item,
                resume,
            } => self.forward(child, item, Continuation::resume(resume)),
            Next::Done(value) => self.done(value),
            Next::Fail(error) => self.fail(error),
        }
    }

    /// Pop a resolved top frame and feed its outcome to the parent
    fn complete_top(&mut self) -> Result<Option<Settled>, FiberError> {
        let frame = self.frames.pop().ok_or(FiberError::EmptyStack)?;
        let kind = frame.target.kind();
        let interrupt = frame.interrupt;
        let Some(outcome) = frame.wait.into_outcome() else {
            return Err(FiberError::NotSuspended {
                frame: self.frames.len(),
            });
        };

        let parent_index = self.frames.len().checked_sub(1);
        let Some(parent) = self.frames.last_mut() else {
            tracing::info!(kind, ok = outcome.is_ok(), "Root frame finished");
            return Ok(Some(match outcome {
                Ok(value) => Settled::Completed(value),
                Err(error) => Settled::Failed(error),
            }));
        };

        if interrupt && outcome.is_ok() {
            tracing::debug!(kind, "Interrupt finished, interrupted frame stays suspended");
            return Ok(None);
        }

        if parent.wait.arm(Awaited::from(outcome)) {
            Ok(None)
        } else {
            Err(FiberError::NotSuspended {
                frame: parent_index.unwrap_or_default(),
            })
        }
    }

    /// Run armed continuations and resolve finished frames until the stack
    /// rests. Fails with `DriveLimitExceeded` instead of spinning forever.
    pub fn drive(&mut self, cx: &mut DialogContext) -> Result<Settled, FiberError> {
        for step in 0..self.max_steps {
            let top = self.frames.last_mut().ok_or(FiberError::EmptyStack)?;

            if let Some((continuation, input)) = top.wait.take_input() {
                let next = top.target.invoke(cx, &continuation, input);
                self.apply(next)?;
                continue;
            }

            if top.wait.is_resolved() {
                if let Some(settled) = self.complete_top()? {
                    return Ok(settled);
                }
                continue;
            }

            // Suspended: hand over a forwarded item if one is pending
            if let Some(item) = self.forwarded.take() {
                top.wait.arm(Awaited::Item { activity: item });
                continue;
            }

            tracing::trace!(steps = step, depth = self.frames.len(), "Stack settled");
            return Ok(Settled::Waiting);
        }

        tracing::error!(limit = self.max_steps, depth = self.frames.len(), "Drive did not settle");
        Err(FiberError::DriveLimitExceeded {
            limit: self.max_steps,
        })
    }

    /// Triggers of every frame, innermost frame first
    pub fn triggers(&self) -> Vec<(usize, Trigger<Value>)> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .flat_map(|(index, frame)| {
                frame
                    .target
                    .triggers()
                    .into_iter()
                    .map(move |trigger| (index, trigger))
            })
            .collect()
    }

    // ==================== Snapshots ====================

    pub fn snapshot(&self) -> Result<FiberSnapshot, FiberError> {
        let frames = self
            .frames
            .iter()
            .map(|frame| {
                Ok(FrameSnapshot {
                    kind: frame.target.kind().to_string(),
                    state: frame.target.state()?,
                    wait: frame.wait.clone(),
                    interrupt: frame.interrupt,
                })
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;
        Ok(FiberSnapshot {
            version: SNAPSHOT_VERSION,
            frames,
        })
    }

    pub fn restore(
        snapshot: FiberSnapshot,
        registry: &DialogRegistry,
        max_steps: usize,
    ) -> Result<Self, SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        let mut fiber = Self::new(max_steps);
        for frame in snapshot.frames {
            fiber.frames.push(Frame {
                target: registry.rehydrate(&frame.kind, frame.state)?,
                wait: frame.wait,
                interrupt: frame.interrupt,
            });
        }
        Ok(fiber)
    }
}

/// Serializable form of a `Fiber`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiberSnapshot {
    pub version: u32,
    pub frames: Vec<FrameSnapshot>,
}

/// Serializable form of a `Frame`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub kind: String,
    pub state: Value,
    pub wait: Wait,
    #[serde(default)]
    pub interrupt: bool,
}
