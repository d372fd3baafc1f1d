//! Allocator configuration
//!
//! With `memory_tracking` a counting allocator wraps the system allocator
//! (or mimalloc) so callers can watch the heap while streaming a large
//! document. Without it the counters always read 0.

#[cfg(feature = "memory_tracking")]
mod tracking {
    use std::alloc::{GlobalAlloc, Layout};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub static ALLOCATED: AtomicUsize = AtomicUsize::new(0);
    pub static PEAK_ALLOCATED: AtomicUsize = AtomicUsize::new(0);

    pub struct TrackingAllocator;

    #[cfg(feature = "mimalloc")]
    static UNDERLYING: mimalloc::MiMalloc = mimalloc::MiMalloc;

    #[cfg(not(feature = "mimalloc"))]
    static UNDERLYING: std::alloc::System = std::alloc::System;

    unsafe impl GlobalAlloc for TrackingAllocator {
        unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
            let ptr = UNDERLYING.alloc(layout);
            if !ptr.is_null() {
                let current = ALLOCATED.fetch_add(layout.size(), Ordering::Relaxed) + layout.size();
                PEAK_ALLOCATED.fetch_max(current, Ordering::Relaxed);
            }
            ptr
        }

        unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
            ALLOCATED.fetch_sub(layout.size(), Ordering::Relaxed);
            UNDERLYING.dealloc(ptr, layout)
        }
    }
}

#[cfg(feature = "memory_tracking")]
#[global_allocator]
static GLOBAL: tracking::TrackingAllocator = tracking::TrackingAllocator;

#[cfg(all(feature = "mimalloc", not(feature = "memory_tracking")))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Bytes currently allocated
#[cfg(feature = "memory_tracking")]
pub fn current_memory() -> usize {
    tracking::ALLOCATED.load(std::sync::atomic::Ordering::SeqCst)
}

/// Highest allocation level since start or the last reset
#[cfg(feature = "memory_tracking")]
pub fn peak_memory() -> usize {
    tracking::PEAK_ALLOCATED.load(std::sync::atomic::Ordering::SeqCst)
}

/// Reset the peak to the current level; returns `(current, previous peak)`.
#[cfg(feature = "memory_tracking")]
pub fn reset_memory_stats() -> (usize, usize) {
    use std::sync::atomic::Ordering;
    let current = tracking::ALLOCATED.load(Ordering::SeqCst);
    let peak = tracking::PEAK_ALLOCATED.swap(current, Ordering::SeqCst);
    (current, peak)
}

#[cfg(not(feature = "memory_tracking"))]
pub fn current_memory() -> usize {
    0
}

#[cfg(not(feature = "memory_tracking"))]
pub fn peak_memory() -> usize {
    0
}

#[cfg(not(feature = "memory_tracking"))]
pub fn reset_memory_stats() -> (usize, usize) {
    (0, 0)
}
