use std::marker::PhantomData;
use std::ops::Range;

/// Shared handle that hands out mutable subslices of a single slice to several threads.
#[derive(Copy)]
pub struct ParallelSliceAccess<'a, T> {
    ptr: *mut T,
    len: usize,
    marker: PhantomData<&'a mut T>,
}

impl<'a, T> ParallelSliceAccess<'a, T> {
    /// Create parallel access to the given slice.
    ///
    /// The access holds the exclusive borrow of the slice for its lifetime, so no other
    /// (safe) access to the slice can exist while the access is alive.
    pub fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Construct a subslice for the given range.
    ///
    /// # Safety
    ///
    /// Multiple threads must not call this function with overlapping ranges without synchronization.
    /// A single thread must not hold two overlapping subslices at the same time.
    ///
    /// # Panics
    ///
    /// Panics if the range is not contained in the slice.
    pub unsafe fn subslice_mut(&self, range: Range<usize>) -> &'a mut [T] {
        let Range { start, end } = range;
        assert!(start <= end, "Range start must not exceed range end");
        assert!(end <= self.len, "Range must be contained in the slice");
        let ptr = self.ptr.add(start);
        std::slice::from_raw_parts_mut(ptr, end - start)
    }
}

impl<'a, T> Clone for ParallelSliceAccess<'a, T> {
    fn clone(&self) -> Self {
        Self {
            ptr: self.ptr,
            len: self.len,
            marker: PhantomData,
        }
    }
}

unsafe impl<'a, T: Send> Sync for ParallelSliceAccess<'a, T> {}
unsafe impl<'a, T: Send> Send for ParallelSliceAccess<'a, T> {}
