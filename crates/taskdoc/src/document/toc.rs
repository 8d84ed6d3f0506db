//! Debounced background re-parse of invalidated documents.
//!
//! Mutations invalidate cache entries immediately; reads are authoritative
//! from the fresh parse. The warmer only re-populates entries (and their
//! rendered TOCs) after a quiet period so bursts of edits coalesce into one
//! parse. `destroy()` on the cache cancels pending work and joins the
//! thread.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::cache::CacheShared;

/// Minimum quiet period before a scheduled document is re-parsed.
pub const TOC_DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Default)]
struct WarmerState {
    pending: HashMap<String, Instant>,
    shutdown: bool,
}

struct WarmerShared {
    state: Mutex<WarmerState>,
    wakeup: Condvar,
}

pub(crate) struct TocWarmer {
    shared: Arc<WarmerShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TocWarmer {
    pub(crate) fn spawn(cache: Weak<CacheShared>) -> Self {
        let shared = Arc::new(WarmerShared {
            state: Mutex::new(WarmerState::default()),
            wakeup: Condvar::new(),
        });

        let thread_shared = shared.clone();
        let handle = std::thread::Builder::new()
            .name("taskdoc-toc-warmer".into())
            .spawn(move || run(thread_shared, cache))
            .ok();

        Self {
            shared,
            handle: Mutex::new(handle),
        }
    }

    /// Schedules `path` for re-parse after the debounce window. Re-scheduling
    /// an already-pending path restarts its window.
    pub(crate) fn schedule(&self, path: &str) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return;
        }
        state.pending.insert(path.to_string(), Instant::now());
        self.shared.wakeup.notify_one();
    }

    /// Cancels pending work and joins the worker thread.
    pub(crate) fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.pending.clear();
        }
        self.shared.wakeup.notify_one();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TocWarmer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(shared: Arc<WarmerShared>, cache: Weak<CacheShared>) {
    loop {
        let due: Vec<String> = {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                match next_deadline(&state) {
                    Some(deadline) => {
                        let now = Instant::now();
                        if deadline <= now {
                            break;
                        }
                        shared.wakeup.wait_until(&mut state, deadline);
                    }
                    None => {
                        shared.wakeup.wait(&mut state);
                    }
                }
            }

            let now = Instant::now();
            let due: Vec<String> = state
                .pending
                .iter()
                .filter(|(_, scheduled)| **scheduled + TOC_DEBOUNCE <= now)
                .map(|(path, _)| path.clone())
                .collect();
            for path in &due {
                state.pending.remove(path);
            }
            due
        };

        let Some(cache) = cache.upgrade() else {
            return;
        };
        for path in due {
            // Best effort: a failed warm leaves the entry to the next read.
            let _ = cache.refresh(&path);
        }
    }
}

fn next_deadline(state: &WarmerState) -> Option<Instant> {
    state
        .pending
        .values()
        .map(|scheduled| *scheduled + TOC_DEBOUNCE)
        .min()
}
