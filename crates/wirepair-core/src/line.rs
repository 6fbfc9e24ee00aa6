//! The shared-line contract
//!
//! A line is a contended boolean bus: any connected controller may drive it
//! high or release it, and anyone may sample its level. Implementations with
//! different fidelity live in `wirepair-line`; engine and monitor code
//! depends only on this trait.

use std::sync::Arc;

use crate::identity::{ControllerId, LineName};

/// One contended boolean signal line
///
/// Calls must be atomic: no `observe` may see a torn state across concurrent
/// `drive`/`release` calls. Repeated `drive` or `release` by the same actor
/// has no effect beyond the first.
pub trait SharedLine: Send + Sync {
    /// Name of this line
    fn name(&self) -> &LineName;

    /// Drive the line active on behalf of `actor`
    fn drive(&self, actor: ControllerId);

    /// Stop driving the line on behalf of `actor`
    fn release(&self, actor: ControllerId);

    /// Sample the line level
    fn observe(&self) -> bool;
}

/// The ordered set of lines visible to one controller
///
/// Cheap to clone; the engine and the monitor of one controller share it.
#[derive(Clone)]
pub struct LineSet {
    entries: Arc<Vec<Arc<dyn SharedLine>>>,
}

impl LineSet {
    pub fn new(lines: Vec<Arc<dyn SharedLine>>) -> Self {
        Self {
            entries: Arc::new(lines),
        }
    }

    /// Look up a line by name
    pub fn get(&self, name: &LineName) -> Option<&Arc<dyn SharedLine>> {
        self.entries.iter().find(|line| line.name() == name)
    }

    /// Iterate lines in configuration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SharedLine>> {
        self.entries.iter()
    }

    /// Line names in configuration order
    pub fn names(&self) -> Vec<LineName> {
        self.entries.iter().map(|line| line.name().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for LineSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
