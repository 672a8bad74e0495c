use std::cell::Cell;
use std::fmt;
use std::ops::Deref;
use std::path::Path;

use tracing::{debug, warn};

use crate::depth::depth;
use crate::{Error, Result};

/// Paths with this many segments or fewer are treated as dangerously shallow.
pub const DEFAULT_PROTECTED_DEPTH: usize = 2;

pub trait Confirm {
    fn confirm(&self, path: &Path, operation: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&Path, &str) -> bool,
{
    fn confirm(&self, path: &Path, operation: &str) -> bool {
        self(path, operation)
    }
}

pub struct GuardPolicy {
    enabled: Cell<bool>,
    protected_depth: usize,
    confirm: Box<dyn Confirm>,
}

impl GuardPolicy {
    pub fn new(protected_depth: usize, confirm: impl Confirm + 'static) -> Self {
        Self {
            enabled: Cell::new(true),
            protected_depth,
            confirm: Box::new(confirm),
        }
    }

    /// A policy that starts disabled and declines if it is ever re-enabled.
    pub fn unguarded() -> Self {
        let policy = Self::new(DEFAULT_PROTECTED_DEPTH, |_: &Path, _: &str| false);
        policy.set_enabled(false);
        policy
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    pub fn protected_depth(&self) -> usize {
        self.protected_depth
    }

    pub fn is_at_or_above_protected_depth(&self, path: &Path) -> bool {
        depth(path) <= self.protected_depth
    }

    /// Blocks on the confirmer when the guard is enabled and `path` is
    /// shallow. A declined prompt yields [`Error::Aborted`], which callers
    /// must treat as fatal.
    pub fn warn(&self, path: &Path, operation: &str) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        if !self.is_at_or_above_protected_depth(path) {
            debug!("Guard: {:?} is below protected depth {}", path, self.protected_depth);
            return Ok(());
        }

        warn!("Guard: '{}' on shallow path {:?} needs confirmation", operation, path);
        if self.confirm.confirm(path, operation) {
            Ok(())
        } else {
            Err(Error::Aborted {
                path: path.to_path_buf(),
                operation: operation.to_string(),
            })
        }
    }

    /// Disables the guard until the returned handle is dropped.
    pub fn suspend(&self) -> Suspended<'_> {
        let previous = self.enabled.replace(false);
        Suspended {
            policy: self,
            previous,
        }
    }
}

impl fmt::Debug for GuardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardPolicy")
            .field("enabled", &self.enabled.get())
            .field("protected_depth", &self.protected_depth)
            .finish_non_exhaustive()
    }
}

pub struct Suspended<'a> {
    policy: &'a GuardPolicy,
    previous: bool,
}

impl Deref for Suspended<'_> {
    type Target = GuardPolicy;

    fn deref(&self) -> &GuardPolicy {
        self.policy
    }
}

impl Drop for Suspended<'_> {
    fn drop(&mut self) {
        self.policy.enabled.set(self.previous);
    }
}
