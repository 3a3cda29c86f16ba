//! TTL-governed cache slots for decoded batches.
//!
//! A slot is **fresh** while `now - last_fetch < ttl` and **stale-usable**
//! while `now - last_fetch < stale_ttl`. Only a successful fetch stores data
//! and stamps `last_fetch`/`last_success`; a failed attempt leaves the slot
//! untouched so stale data cannot be re-freshened by failures.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;

use crate::clock::Clock;

#[derive(Debug)]
struct SlotState<T> {
    data: Option<T>,
    item_count: usize,
    last_fetch: Option<u64>,
    last_success: Option<u64>,
}

/// One cache slot. `T` is the batch type, cheap to clone (an `Arc` in practice).
#[derive(Debug)]
pub struct CacheSlot<T> {
    ttl_millis: u64,
    stale_ttl_millis: u64,
    clock: Arc<dyn Clock>,
    state: Mutex<SlotState<T>>,
}

/// Consistent point-in-time view of a slot, for the introspection API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    pub has_data: bool,
    pub item_count: usize,
    /// Epoch milliseconds of the last successful fetch.
    pub last_fetch: Option<u64>,
    pub last_success: Option<u64>,
    /// Seconds since `last_fetch`.
    pub age_seconds: Option<u64>,
    pub is_fresh: bool,
    /// Has data that is past the TTL but still inside the stale window.
    pub is_stale: bool,
}

impl<T: Clone> CacheSlot<T> {
    pub fn new(ttl: Duration, stale_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl_millis: ttl.as_millis() as u64,
            stale_ttl_millis: stale_ttl.as_millis() as u64,
            clock,
            state: Mutex::new(SlotState {
                data: None,
                item_count: 0,
                last_fetch: None,
                last_success: None,
            }),
        }
    }

    /// The cached batch, only while fresh.
    pub fn fresh(&self) -> Option<T> {
        let state = self.lock();
        self.age(&state).filter(|age| *age < self.ttl_millis)?;
        state.data.clone()
    }

    /// The cached batch, while inside the stale window (fresh included).
    pub fn stale_usable(&self) -> Option<T> {
        let state = self.lock();
        self.age(&state).filter(|age| *age < self.stale_ttl_millis)?;
        state.data.clone()
    }

    /// The cached batch regardless of age.
    pub fn any(&self) -> Option<T> {
        self.lock().data.clone()
    }

    /// Store a successful fetch, stamping both timestamps with the current time.
    pub fn store(&self, data: T, item_count: usize) {
        let now = self.clock.now_millis();
        let mut state = self.lock();
        state.data = Some(data);
        state.item_count = item_count;
        state.last_fetch = Some(now);
        state.last_success = Some(now);
    }

    /// Drop the cached batch and its timestamps.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.data = None;
        state.item_count = 0;
        state.last_fetch = None;
        state.last_success = None;
    }

    /// Self-consistent snapshot for the introspection API.
    pub fn view(&self) -> SlotView {
        let state = self.lock();
        let age = self.age(&state);
        let has_data = state.data.is_some();
        let is_fresh = has_data && age.map(|a| a < self.ttl_millis).unwrap_or(false);
        let is_stale =
            has_data && !is_fresh && age.map(|a| a < self.stale_ttl_millis).unwrap_or(false);
        SlotView {
            has_data,
            item_count: state.item_count,
            last_fetch: state.last_fetch,
            last_success: state.last_success,
            age_seconds: age.map(|a| a / 1_000),
            is_fresh,
            is_stale,
        }
    }

    fn age(&self, state: &SlotState<T>) -> Option<u64> {
        state.last_fetch.map(|at| self.clock.now_millis().saturating_sub(at))
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
