//! Unique identifier generation for targets and contexts.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic uid source owned by a session.
///
/// Uniqueness holds for the lifetime of the process, which is all the
/// attribute contract requires. Context uids persist beyond a single
/// resolution pass because they are written to the context element's marker
/// attribute and read back on rebuild.
#[derive(Debug, Default)]
pub struct UidGenerator {
    counter: AtomicU64,
}

impl UidGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next target uid, shaped `nf_<n>`.
    pub fn next_target(&self) -> String {
        format!("nf_{}", self.bump())
    }

    /// Next context uid, shaped `nf_context_<n>`.
    pub fn next_context(&self) -> String {
        format!("nf_context_{}", self.bump())
    }

    fn bump(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_and_prefixed() {
        let uids = UidGenerator::new();
        assert_eq!(uids.next_target(), "nf_1");
        assert_eq!(uids.next_context(), "nf_context_2");
        assert_eq!(uids.next_target(), "nf_3");
    }

    #[test]
    fn generators_do_not_share_state() {
        let a = UidGenerator::new();
        let b = UidGenerator::new();
        assert_eq!(a.next_target(), "nf_1");
        assert_eq!(b.next_target(), "nf_1");
    }
}
