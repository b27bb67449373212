//! Debug-build live handle registry
//!
//! Resource wrappers register their raw Vulkan handles on creation and
//! deregister on drop. A double destroy or a destroy of an unknown handle
//! trips a debug assertion immediately instead of corrupting the driver's
//! state at some later point. Release builds compile all of this away.

#[cfg(debug_assertions)]
use std::collections::HashSet;
#[cfg(debug_assertions)]
use std::sync::Mutex;

#[cfg(debug_assertions)]
static LIVE_HANDLES: Mutex<Option<HashSet<(&'static str, u64)>>> = Mutex::new(None);

/// Register a newly created handle under its kind label
#[cfg(debug_assertions)]
pub fn track(kind: &'static str, handle: u64) {
    if handle == 0 {
        return;
    }
    if let Ok(mut guard) = LIVE_HANDLES.lock() {
        let inserted = guard.get_or_insert_with(HashSet::new).insert((kind, handle));
        debug_assert!(inserted, "{kind} handle {handle:#x} tracked twice");
    }
}

#[cfg(not(debug_assertions))]
#[inline]
pub fn track(_kind: &'static str, _handle: u64) {}

/// Deregister a handle just before it is destroyed
#[cfg(debug_assertions)]
pub fn untrack(kind: &'static str, handle: u64) {
    if handle == 0 {
        return;
    }
    if let Ok(mut guard) = LIVE_HANDLES.lock() {
        let removed = guard
            .get_or_insert_with(HashSet::new)
            .remove(&(kind, handle));
        debug_assert!(removed, "{kind} handle {handle:#x} destroyed twice");
    }
}

#[cfg(not(debug_assertions))]
#[inline]
pub fn untrack(_kind: &'static str, _handle: u64) {}

/// Number of handles currently alive (debug builds only; always 0 otherwise)
pub fn live_count() -> usize {
    #[cfg(debug_assertions)]
    {
        LIVE_HANDLES
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|live| live.len()))
            .unwrap_or(0)
    }
    #[cfg(not(debug_assertions))]
    {
        0
    }
}

#[cfg(all(test, debug_assertions))]
mod tests {
    use super::*;

    // The registry is global, so tests that read live_count() must not
    // interleave with each other.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn track_untrack_balances_live_count() {
        let _guard = TEST_LOCK.lock().unwrap();
        let before = live_count();
        track("test_buffer", 0xdead_0001);
        track("test_buffer", 0xdead_0002);
        assert_eq!(live_count(), before + 2);
        untrack("test_buffer", 0xdead_0001);
        untrack("test_buffer", 0xdead_0002);
        assert_eq!(live_count(), before);
    }

    #[test]
    fn null_handles_are_ignored() {
        let _guard = TEST_LOCK.lock().unwrap();
        let before = live_count();
        track("test_image", 0);
        assert_eq!(live_count(), before);
        untrack("test_image", 0);
        assert_eq!(live_count(), before);
    }

    #[test]
    fn same_handle_different_kind_is_distinct() {
        let _guard = TEST_LOCK.lock().unwrap();
        let before = live_count();
        track("test_view", 0xbeef_0001);
        track("test_sampler", 0xbeef_0001);
        assert_eq!(live_count(), before + 2);
        untrack("test_view", 0xbeef_0001);
        untrack("test_sampler", 0xbeef_0001);
        assert_eq!(live_count(), before);
    }
}
