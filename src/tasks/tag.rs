//! # Worker tags.
//!
//! A [`Tag`] is an opaque identity minted once per worker session and carried by
//! every task that worker enqueues. The queue removes pending tasks by tag when
//! the worker is disposed.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TAG: AtomicU64 = AtomicU64::new(1);

/// Opaque per-worker identity used for bulk removal of pending tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(u64);

impl Tag {
    /// Mints a new process-unique tag.
    pub(crate) fn next() -> Self {
        Tag(NEXT_TAG.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value (for logs and events).
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_unique() {
        let a = Tag::next();
        let b = Tag::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
        assert_eq!(a.to_string(), format!("tag#{}", a.as_u64()));
    }
}
