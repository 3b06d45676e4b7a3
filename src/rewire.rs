//! Virtual-page ↔ physical-frame remapping primitive (§5.2).
//!
//! A PMA resize normally copies every live entry into a freshly sized
//! array. Rewiring avoids that copy for the extents that don't change
//! relative order by swapping *ownership* of their backing memory instead.
//! This crate has no OS-specific `mremap`/page-table primitive in its
//! dependency stack (the teacher pack never reaches for `libc` or `memfd`),
//! so extents are backed by anonymous `memmap2` mappings and
//! `swap_and_release` is implemented as an O(1) exchange of the owning
//! `MmapMut` handles between two slots rather than a literal page-table
//! edit. That still satisfies the contract: no byte of payload is copied,
//! and the swap is O(1) regardless of extent size. See DESIGN.md.

use memmap2::MmapMut;

use crate::error::{PmaError, PmaResult};
use crate::logging::pma_debug;

/// One virtual-address window of `extent_len` `i64`s, backed by a private
/// anonymous mapping.
pub struct Extent {
    mmap: MmapMut,
    len: usize,
}

impl Extent {
    fn new(len: usize) -> PmaResult<Self> {
        let bytes = len * std::mem::size_of::<i64>();
        let mmap = MmapMut::map_anon(bytes.max(1)).map_err(|e| PmaError::RewireAllocation {
            size: bytes,
            reason: e.to_string(),
        })?;
        Ok(Self { mmap, len })
    }

    /// View the extent as a slice of `i64`.
    pub fn as_slice(&self) -> &[i64] {
        unsafe { std::slice::from_raw_parts(self.mmap.as_ptr() as *const i64, self.len) }
    }

    /// View the extent as a mutable slice of `i64`.
    pub fn as_mut_slice(&mut self) -> &mut [i64] {
        unsafe { std::slice::from_raw_parts_mut(self.mmap.as_mut_ptr() as *mut i64, self.len) }
    }

    /// Number of `i64` slots in this extent.
    pub fn len(&self) -> usize {
        self.len
    }
}

/// Owns the set of extents backing one logical array (keys, values, or
/// sizes) of a [`crate::storage::Storage`] configured for rewiring.
pub struct RewiredMemory {
    extent_len: usize,
    extents: Vec<Extent>,
}

impl RewiredMemory {
    /// Create an empty set of extents, each `extent_len` `i64`s wide.
    pub fn new(extent_len: usize) -> Self {
        Self {
            extent_len,
            extents: Vec::new(),
        }
    }

    /// Size of one extent, in `i64` slots.
    pub fn extent_size(&self) -> usize {
        self.extent_len
    }

    /// Number of extents currently held.
    pub fn extent_count(&self) -> usize {
        self.extents.len()
    }

    /// Acquire a spare virtual window backed by fresh physical frames,
    /// extending the backing collection of extents if needed. Returns the
    /// index of the acquired extent.
    pub fn acquire_buffer(&mut self) -> PmaResult<usize> {
        let extent = Extent::new(self.extent_len)?;
        self.extents.push(extent);
        Ok(self.extents.len() - 1)
    }

    /// Atomically remap the frames of extent `b` under the address of
    /// extent `a`, releasing `a`'s previous frames. Implemented as an
    /// owning-handle swap: after the call, `a` holds what `b` held and
    /// `b` holds what `a` held (old `a`'s contents, now logically
    /// discarded by the caller).
    pub fn swap_and_release(&mut self, a: usize, b: usize) {
        debug_assert_ne!(a, b, "swap_and_release called with identical slots");
        pma_debug!("RewiredMemory::swap_and_release(a={}, b={})", a, b);
        self.extents.swap(a, b);
    }

    /// Borrow an extent immutably.
    pub fn extent(&self, idx: usize) -> &Extent {
        &self.extents[idx]
    }

    /// Borrow an extent mutably.
    pub fn extent_mut(&mut self, idx: usize) -> &mut Extent {
        &mut self.extents[idx]
    }

    /// Drop the last `n` extents, releasing their backing frames.
    pub fn truncate(&mut self, n: usize) {
        self.extents.truncate(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_write() {
        let mut mem = RewiredMemory::new(16);
        let idx = mem.acquire_buffer().unwrap();
        mem.extent_mut(idx).as_mut_slice()[0] = 42;
        assert_eq!(mem.extent(idx).as_slice()[0], 42);
    }

    #[test]
    fn swap_exchanges_contents_without_copy() {
        let mut mem = RewiredMemory::new(4);
        let a = mem.acquire_buffer().unwrap();
        let b = mem.acquire_buffer().unwrap();
        mem.extent_mut(a).as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        mem.extent_mut(b).as_mut_slice().copy_from_slice(&[9, 9, 9, 9]);
        mem.swap_and_release(a, b);
        assert_eq!(mem.extent(a).as_slice(), &[9, 9, 9, 9]);
        assert_eq!(mem.extent(b).as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn truncate_releases_extents() {
        let mut mem = RewiredMemory::new(4);
        mem.acquire_buffer().unwrap();
        mem.acquire_buffer().unwrap();
        mem.acquire_buffer().unwrap();
        mem.truncate(1);
        assert_eq!(mem.extent_count(), 1);
    }
}
