//! Explicit dialog registration table
//!
//! Snapshots name dialogs by `Dialog::KIND`; this table maps each kind back
//! to a rehydration function. Built once at startup.

use super::prompts::{Choice, Confirm, Number, Prompt, Text};
use super::{BoxedDialog, Dialog};
use crate::error::SnapshotError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds the root dialog of a brand-new conversation
pub type RootFactory = Arc<dyn Fn() -> BoxedDialog + Send + Sync>;

type Rehydrate = fn(Value) -> Result<BoxedDialog, serde_json::Error>;

fn rehydrate<D: Dialog>(state: Value) -> Result<BoxedDialog, serde_json::Error> {
    serde_json::from_value::<D>(state).map(BoxedDialog::new)
}

/// Kind -> constructor table used when restoring snapshots
pub struct DialogRegistry {
    kinds: HashMap<&'static str, Rehydrate>,
}

impl DialogRegistry {
    /// Start a registry with the built-in prompts already registered
    pub fn builder() -> DialogRegistryBuilder {
        DialogRegistryBuilder {
            kinds: HashMap::new(),
        }
        .register::<Prompt<Text>>()
        .register::<Prompt<Number>>()
        .register::<Prompt<Confirm>>()
        .register::<Prompt<Choice>>()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.kinds.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Rebuild a dialog from its snapshot state
    pub fn rehydrate(&self, kind: &str, state: Value) -> Result<BoxedDialog, SnapshotError> {
        let build = self
            .kinds
            .get(kind)
            .ok_or_else(|| SnapshotError::UnknownDialog(kind.to_string()))?;
        Ok(build(state)?)
    }
}

/// Builder for `DialogRegistry`
pub struct DialogRegistryBuilder {
    kinds: HashMap<&'static str, Rehydrate>,
}

impl DialogRegistryBuilder {
    #[must_use]
    pub fn register<D: Dialog>(mut self) -> Self {
        if self.kinds.insert(D::KIND, rehydrate::<D>).is_some() {
            tracing::warn!(kind = D::KIND, "Dialog kind registered twice, keeping the last one");
        }
        self
    }

    pub fn build(self) -> DialogRegistry {
        tracing::debug!(kinds = self.kinds.len(), "Dialog registry built");
        DialogRegistry { kinds: self.kinds }
    }
}
