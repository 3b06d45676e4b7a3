//! Bump-allocator scratch arena for rebalance workspaces.
//!
//! Adapted from the teacher codebase's `Arena`: a region-based bump
//! allocator with a fallback to the general allocator for oversized
//! requests, and a single outstanding-allocation count used to know when
//! the bump pointer can be rewound. The teacher's `Arena` is safe for
//! concurrent use (atomics, CAS loops) because multiple graph-database
//! threads allocate from it; this crate's non-goal is concurrency (§6), so
//! the bump pointer and refcount here are plain `Cell<usize>` fields guarded
//! by the fact that a `Pma` and its `MemoryPool` are only ever touched from
//! one thread at a time.

use std::alloc::{alloc, dealloc, Layout};
use std::cell::Cell;

use crate::error::{PmaError, PmaResult};
use crate::logging::pma_warn;

/// A single scratch allocation handed out by [`MemoryPool::allocate`].
///
/// Dropping this guard returns the allocation to the pool (or frees it, if
/// it was an external fallback allocation), which is how the crate
/// satisfies the "released on all exit paths, including partial failure"
/// resource contract from §6: the guard's `Drop` runs even when the
/// enclosing rebalance returns early via `?`.
pub struct PoolBuffer<'a> {
    ptr: *mut u8,
    len: usize,
    align: usize,
    external: bool,
    outstanding: &'a Cell<usize>,
}

impl<'a> PoolBuffer<'a> {
    /// View the buffer as a mutable byte slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }

    /// View the buffer as a mutable slice of `T`. `T` must evenly divide
    /// the allocation and the allocation's alignment must satisfy `T`'s.
    ///
    /// # Safety
    /// Caller must ensure the buffer was allocated with `align_of::<T>()`
    /// and a length that is a multiple of `size_of::<T>()`.
    pub unsafe fn as_mut_slice_of<T>(&mut self, count: usize) -> &mut [T] {
        debug_assert!(count * std::mem::size_of::<T>() <= self.len);
        debug_assert_eq!(self.align % std::mem::align_of::<T>(), 0);
        std::slice::from_raw_parts_mut(self.ptr as *mut T, count)
    }
}

impl<'a> Drop for PoolBuffer<'a> {
    fn drop(&mut self) {
        if self.external {
            unsafe {
                let layout = Layout::from_size_align_unchecked(self.len, self.align);
                dealloc(self.ptr, layout);
            }
        }
        self.outstanding.set(self.outstanding.get() - 1);
    }
}

/// Fixed-capacity bump arena fronting the scratch allocations of
/// [`crate::weights::Weights`] and [`crate::spread::Spread`].
pub struct MemoryPool {
    region: Box<[u8]>,
    offset: Cell<usize>,
    outstanding: Cell<usize>,
}

impl MemoryPool {
    /// Create a pool backed by `capacity` bytes of region storage. Requests
    /// larger than `capacity` fall back to the general allocator.
    pub fn new(capacity: usize) -> Self {
        Self {
            region: vec![0u8; capacity].into_boxed_slice(),
            offset: Cell::new(0),
            outstanding: Cell::new(0),
        }
    }

    /// Number of bytes available in the bump region right now.
    pub fn region_capacity(&self) -> usize {
        self.region.len()
    }

    /// Allocate `len` bytes aligned to `align`. Falls back to the general
    /// allocator (and tags the result as external) when the region doesn't
    /// have room, or the request doesn't fit in the region at all.
    pub fn allocate(&self, len: usize, align: usize) -> PmaResult<PoolBuffer<'_>> {
        let base = self.region.as_ptr() as usize;
        let start = self.offset.get();
        let aligned_start = align_up(base + start, align) - base;
        let fits_region = aligned_start <= self.region.len()
            && len <= self.region.len() - aligned_start;

        if fits_region {
            self.offset.set(aligned_start + len);
            self.outstanding.set(self.outstanding.get() + 1);
            let ptr = unsafe { (self.region.as_ptr() as *mut u8).add(aligned_start) };
            return Ok(PoolBuffer {
                ptr,
                len,
                align,
                external: false,
                outstanding: &self.outstanding,
            });
        }

        if len == 0 {
            return Ok(PoolBuffer {
                ptr: std::ptr::NonNull::dangling().as_ptr(),
                len: 0,
                align,
                external: false,
                outstanding: &self.outstanding,
            });
        }

        pma_warn!(
            "MemoryPool region exhausted (requested {} bytes, {} available); falling back to heap",
            len,
            self.region.len().saturating_sub(start)
        );

        let layout = Layout::from_size_align(len, align)
            .map_err(|_| PmaError::RebalanceAllocation { requested: len })?;
        let ptr = unsafe { alloc(layout) };
        if ptr.is_null() {
            return Err(PmaError::RebalanceAllocation { requested: len });
        }
        self.outstanding.set(self.outstanding.get() + 1);
        Ok(PoolBuffer {
            ptr,
            len,
            align,
            external: true,
            outstanding: &self.outstanding,
        })
    }

    /// Reset the bump pointer. Only safe to call once every `PoolBuffer`
    /// handed out has been dropped; debug builds assert this.
    pub fn reset(&self) {
        debug_assert_eq!(
            self.outstanding.get(),
            0,
            "MemoryPool::reset called with outstanding allocations"
        );
        self.offset.set(0);
    }

    /// Number of allocations not yet dropped.
    pub fn outstanding(&self) -> usize {
        self.outstanding.get()
    }
}

fn align_up(addr: usize, align: usize) -> usize {
    (addr + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_within_region() {
        let pool = MemoryPool::new(1024);
        {
            let mut buf = pool.allocate(64, 8).unwrap();
            buf.as_mut_slice().fill(0xAB);
        }
        assert_eq!(pool.outstanding(), 0);
        pool.reset();
    }

    #[test]
    fn falls_back_to_heap_for_oversized_requests() {
        let pool = MemoryPool::new(16);
        let mut buf = pool.allocate(1024, 8).unwrap();
        buf.as_mut_slice()[0] = 1;
        drop(buf);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn reset_reclaims_region_after_drop() {
        let pool = MemoryPool::new(64);
        {
            let _buf = pool.allocate(32, 8).unwrap();
        }
        pool.reset();
        let buf = pool.allocate(64, 8).unwrap();
        assert_eq!(buf.len, 64);
    }

    #[test]
    fn early_return_via_question_mark_still_drops_buffer() {
        let pool = MemoryPool::new(64);
        fn do_work(pool: &MemoryPool) -> PmaResult<()> {
            let _buf = pool.allocate(32, 8)?;
            Err(PmaError::CorruptState("simulated failure".into()))
        }
        assert!(do_work(&pool).is_err());
        assert_eq!(pool.outstanding(), 0);
        pool.reset();
    }
}
