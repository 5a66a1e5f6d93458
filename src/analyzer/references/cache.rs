//! Compute-once cells for the reference families.

use super::References;
use once_cell::sync::OnceCell;

/// A value built on first access, at most once even when several threads
/// race for it.
#[derive(Debug)]
pub struct Memo<T> {
    cell: OnceCell<T>,
}

impl<T> Memo<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Return the cached value, building it with `build` on first call.
    pub fn get_or_build(&self, build: impl FnOnce() -> T) -> &T {
        self.cell.get_or_init(build)
    }

    #[cfg(test)]
    pub fn is_built(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazily built reference graphs, one per family.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    pub pods: Memo<References>,
    pub rbac: Memo<References>,
}
