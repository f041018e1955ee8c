//! Handle identity and lifetime tracking.
//!
//! Every open engine resource is identified by an opaque integer [`Handle`]
//! tagged with a [`HandleKind`]. The [`HandleRegistry`] is the sole authority
//! on handle liveness: a handle is valid from `register` until exactly one
//! `release`, and every operation that is only meaningful for certain object
//! kinds asserts the recorded kind first. Nothing here is garbage-collected;
//! leak detection at test boundaries is the safety net for unmatched opens.

use std::collections::HashMap;
use std::fmt;

use tracing::warn;

use crate::error::{Result, StoreError};

/// Opaque identifier for one open engine resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Handle(pub(crate) u64);

impl Handle {
    /// Returns the raw integer value of this handle.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of object an open handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HandleKind {
    /// A file (root of a backing store).
    File,

    /// A group inside a file.
    Group,

    /// A dataset.
    DataSet,

    /// An attribute attached to a location, dataset, or named type.
    Attribute,

    /// A named (committed) type.
    NamedType,

    /// A space descriptor.
    Space,

    /// A property list.
    PropertyList,
}

/// One registry entry: the handle's kind plus an optional creation-site tag.
#[derive(Debug, Clone)]
struct HandleEntry {
    kind: HandleKind,
    tag: Option<&'static str>,
}

/// Tracks every live handle and enforces close-once semantics.
///
/// Wrapper objects hold at most one handle and release it exactly once; the
/// registry catches double-release and use-after-release bugs and lets tests
/// assert zero leaked handles after a unit of work.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    entries: HashMap<u64, HandleEntry>,
}

impl HandleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly created handle.
    ///
    /// # Arguments
    ///
    /// * `handle` - The handle to track.
    /// * `kind` - Object kind recorded for later assertions.
    /// * `tag` - Optional creation-site label, surfaced by [`Self::dump_open_handles`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateHandle`] if the handle is already tracked.
    pub fn register(
        &mut self,
        handle: Handle,
        kind: HandleKind,
        tag: Option<&'static str>,
    ) -> Result<()> {
        if self.entries.contains_key(&handle.0) {
            return Err(StoreError::DuplicateHandle(handle));
        }
        self.entries.insert(handle.0, HandleEntry { kind, tag });
        Ok(())
    }

    /// Removes tracking for a handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyClosed`] if the handle is not tracked,
    /// which guards double-dispose bugs.
    pub fn release(&mut self, handle: Handle) -> Result<()> {
        if self.entries.remove(&handle.0).is_none() {
            return Err(StoreError::AlreadyClosed(handle));
        }
        Ok(())
    }

    /// Returns the recorded kind of a live handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidHandle`] if the handle is not tracked.
    pub fn kind_of(&self, handle: Handle) -> Result<HandleKind> {
        self.entries
            .get(&handle.0)
            .map(|e| e.kind)
            .ok_or(StoreError::InvalidHandle(handle))
    }

    /// Asserts that a handle is live and of one of the allowed kinds.
    ///
    /// Called before every operation that is only valid for certain object
    /// kinds (e.g. attribute iteration is valid on File/Group/DataSet, not on
    /// a space descriptor).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidHandle`] for untracked handles and
    /// [`StoreError::WrongHandleKind`] when the recorded kind is not allowed.
    pub fn assert_kind(&self, handle: Handle, allowed: &[HandleKind]) -> Result<()> {
        let kind = self.kind_of(handle)?;
        if !allowed.contains(&kind) {
            return Err(StoreError::WrongHandleKind {
                found: kind,
                allowed: allowed.to_vec(),
            });
        }
        Ok(())
    }

    /// Returns the number of currently tracked handles.
    pub fn open_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns every tracked handle with its kind and creation-site tag.
    ///
    /// Diagnostic only; tests use this to name the leak when `open_count`
    /// is nonzero. Output is sorted by handle value for stable assertions.
    pub fn dump_open_handles(&self) -> Vec<(Handle, HandleKind, Option<&'static str>)> {
        let mut out: Vec<_> = self
            .entries
            .iter()
            .map(|(&id, e)| (Handle(id), e.kind, e.tag))
            .collect();
        out.sort_by_key(|(h, _, _)| h.0);
        out
    }

    /// Logs every still-open handle at `warn` level.
    ///
    /// Called when a [`crate::store::Store`] is dropped with live handles.
    pub fn warn_leaks(&self) {
        for (handle, kind, tag) in self.dump_open_handles() {
            warn!(%handle, ?kind, tag, "handle leaked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_release() {
        let mut reg = HandleRegistry::new();
        reg.register(Handle(1), HandleKind::File, Some("test")).unwrap();
        assert_eq!(reg.open_count(), 1);
        reg.release(Handle(1)).unwrap();
        assert_eq!(reg.open_count(), 0);
    }

    #[test]
    fn test_duplicate_register() {
        let mut reg = HandleRegistry::new();
        reg.register(Handle(7), HandleKind::Group, None).unwrap();
        let err = reg.register(Handle(7), HandleKind::Group, None).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateHandle(Handle(7))));
    }

    #[test]
    fn test_double_release() {
        let mut reg = HandleRegistry::new();
        reg.register(Handle(3), HandleKind::DataSet, None).unwrap();
        reg.release(Handle(3)).unwrap();
        let err = reg.release(Handle(3)).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyClosed(Handle(3))));
    }

    #[test]
    fn test_assert_kind() {
        let mut reg = HandleRegistry::new();
        reg.register(Handle(9), HandleKind::Space, None).unwrap();

        reg.assert_kind(Handle(9), &[HandleKind::Space]).unwrap();

        let err = reg
            .assert_kind(
                Handle(9),
                &[HandleKind::File, HandleKind::Group, HandleKind::DataSet],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::WrongHandleKind {
                found: HandleKind::Space,
                ..
            }
        ));
    }

    #[test]
    fn test_assert_kind_unknown_handle() {
        let reg = HandleRegistry::new();
        let err = reg.assert_kind(Handle(42), &[HandleKind::File]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidHandle(Handle(42))));
    }

    #[test]
    fn test_dump_is_sorted() {
        let mut reg = HandleRegistry::new();
        reg.register(Handle(5), HandleKind::File, Some("b")).unwrap();
        reg.register(Handle(2), HandleKind::Group, Some("a")).unwrap();
        let dump = reg.dump_open_handles();
        assert_eq!(dump.len(), 2);
        assert_eq!(dump[0].0, Handle(2));
        assert_eq!(dump[1].0, Handle(5));
    }
}
