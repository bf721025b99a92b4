//! Handle-indexed object storage.

use std::collections::HashMap;

use framebridge_types::Handle;

use crate::error::{EngineError, EngineResult};

/// Table of engine-resident objects keyed by [`Handle`].
///
/// Handles are allocated from a monotonically increasing counter starting at
/// 1 and are never reused, so a stale handle can only miss, never alias a
/// newer object.
#[derive(Debug)]
pub struct ObjectTable<T> {
    next: u64,
    objects: HashMap<Handle, T>,
}

impl<T> ObjectTable<T> {
    pub fn new() -> Self {
        Self {
            next: 1,
            objects: HashMap::new(),
        }
    }

    /// Store an object and return its freshly issued handle.
    pub fn insert(&mut self, object: T) -> Handle {
        let handle = Handle::from_raw(self.next);
        self.next += 1;
        self.objects.insert(handle, object);
        handle
    }

    pub fn get(&self, handle: Handle) -> EngineResult<&T> {
        self.objects
            .get(&handle)
            .ok_or(EngineError::UnknownHandle(handle))
    }

    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        self.objects.remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl<T> Default for ObjectTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_never_reused() {
        let mut table = ObjectTable::new();
        let a = table.insert("a");
        let b = table.insert("b");
        assert_ne!(a, b);
        assert_eq!(table.remove(a), Some("a"));
        let c = table.insert("c");
        assert_ne!(c, a);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_get_unknown_handle() {
        let mut table = ObjectTable::new();
        let h = table.insert(1u32);
        table.remove(h);
        assert!(matches!(table.get(h), Err(EngineError::UnknownHandle(x)) if x == h));
        assert!(table.is_empty());
    }
}
