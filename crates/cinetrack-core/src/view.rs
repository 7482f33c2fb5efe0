//! Per-session view context: page cursors, loading flags and the seen set.
//!
//! Shared as `Arc<ViewState>` between the sync engine, the swiper feed and
//! whatever renders the lists. Nothing here is persisted.

use cinetrack_models::ListKind;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::RwLock;

/// Things that can be loading at most once at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadSlot {
    Watchlist,
    Watched,
    Liked,
    Swiper,
}

impl LoadSlot {
    fn index(&self) -> usize {
        match self {
            LoadSlot::Watchlist => 0,
            LoadSlot::Watched => 1,
            LoadSlot::Liked => 2,
            LoadSlot::Swiper => 3,
        }
    }
}

impl From<ListKind> for LoadSlot {
    fn from(kind: ListKind) -> Self {
        match kind {
            ListKind::Watchlist => LoadSlot::Watchlist,
            ListKind::Watched => LoadSlot::Watched,
            ListKind::Liked => LoadSlot::Liked,
        }
    }
}

#[derive(Debug)]
pub struct ViewState {
    loading: [AtomicBool; 4],
    pages: [AtomicU32; 3],
    seen: RwLock<HashSet<u64>>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self {
            loading: Default::default(),
            pages: [AtomicU32::new(1), AtomicU32::new(1), AtomicU32::new(1)],
            seen: RwLock::new(HashSet::new()),
        }
    }

    /// Claim a loading slot. Returns `None` if a load is already in flight;
    /// the slot is released when the returned guard drops.
    pub fn try_begin_load(&self, slot: LoadSlot) -> Option<LoadGuard<'_>> {
        self.loading[slot.index()]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LoadGuard { state: self, slot })
    }

    pub fn is_loading(&self, slot: LoadSlot) -> bool {
        self.loading[slot.index()].load(Ordering::Acquire)
    }

    // Pagination

    pub fn page(&self, kind: ListKind) -> u32 {
        self.pages[page_index(kind)].load(Ordering::Acquire)
    }

    pub fn set_page(&self, kind: ListKind, page: u32) {
        self.pages[page_index(kind)].store(page.max(1), Ordering::Release);
    }

    /// Advance the cursor and return the new page number
    pub fn next_page(&self, kind: ListKind) -> u32 {
        self.pages[page_index(kind)].fetch_add(1, Ordering::AcqRel) + 1
    }

    // Seen set

    pub fn is_seen(&self, movie_id: u64) -> bool {
        self.seen.read().map(|seen| seen.contains(&movie_id)).unwrap_or(false)
    }

    pub fn mark_seen(&self, movie_id: u64) {
        if let Ok(mut seen) = self.seen.write() {
            seen.insert(movie_id);
        }
    }

    pub fn mark_all_seen(&self, ids: impl IntoIterator<Item = u64>) {
        if let Ok(mut seen) = self.seen.write() {
            seen.extend(ids);
        }
    }

    /// Replace the seen set wholesale
    pub fn rebuild_seen(&self, ids: impl IntoIterator<Item = u64>) {
        if let Ok(mut seen) = self.seen.write() {
            *seen = ids.into_iter().collect();
        }
    }

    pub fn seen_snapshot(&self) -> HashSet<u64> {
        self.seen.read().map(|seen| seen.clone()).unwrap_or_default()
    }

    pub fn seen_count(&self) -> usize {
        self.seen.read().map(|seen| seen.len()).unwrap_or(0)
    }

    pub fn clear_seen(&self) {
        if let Ok(mut seen) = self.seen.write() {
            seen.clear();
        }
    }
}

fn page_index(kind: ListKind) -> usize {
    match kind {
        ListKind::Watchlist => 0,
        ListKind::Watched => 1,
        ListKind::Liked => 2,
    }
}

/// Holds a loading slot; releases it on drop
#[derive(Debug)]
pub struct LoadGuard<'a> {
    state: &'a ViewState,
    slot: LoadSlot,
}

impl LoadGuard<'_> {
    pub fn slot(&self) -> LoadSlot {
        self.slot
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.state.loading[self.slot.index()].store(false, Ordering::Release);
    }
}
