//! adr-paradis
//! ===========
//!
//! Parallel processing of disjoint, contiguous ranges of a slice.
//!
//! A typical use is a sparse matrix in CSR format where every work item owns a block of
//! consecutive rows: the values of those rows form a contiguous range of the value array,
//! and ranges belonging to different work items never overlap.
pub mod slice;

pub use slice::ParallelSliceAccess;

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::error::Error;
use std::fmt;
use std::ops::Range;

/// Error returned when offsets do not describe a sequence of disjoint ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRanges {
    position: usize,
}

impl InvalidRanges {
    /// Index of the first offset that is smaller than its predecessor.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for InvalidRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "offsets must be non-decreasing, but offset {} is smaller than its predecessor",
            self.position
        )
    }
}

impl Error for InvalidRanges {}

/// A sequence of pairwise disjoint contiguous ranges `offsets[i] .. offsets[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisjointRanges {
    offsets: Vec<usize>,
}

impl DisjointRanges {
    /// Construct ranges from a non-decreasing sequence of offsets.
    ///
    /// An empty offset sequence is interpreted as zero ranges.
    pub fn try_from_offsets(offsets: Vec<usize>) -> Result<Self, InvalidRanges> {
        if let Some(position) = offsets
            .windows(2)
            .position(|pair| pair[1] < pair[0])
        {
            return Err(InvalidRanges { position: position + 1 });
        }
        Ok(Self { offsets })
    }

    pub fn num_ranges(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn range(&self, index: usize) -> Range<usize> {
        self.offsets[index]..self.offsets[index + 1]
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// One past the largest index covered by any range.
    pub fn end(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Calls `f(i, &mut data[range(i)])` for every range `i`, in parallel.
    ///
    /// Returns only once every range has been processed.
    ///
    /// # Panics
    ///
    /// Panics if the ranges extend beyond the end of `data`.
    pub fn par_for_each_mut<T, F>(&self, data: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync + Send,
    {
        assert!(self.end() <= data.len(), "Ranges must be contained in the data slice");
        let access = ParallelSliceAccess::new(data);
        (0..self.num_ranges()).into_par_iter().for_each(|i| {
            // The offsets are non-decreasing, so distinct indices map to non-overlapping ranges
            let subslice = unsafe { access.subslice_mut(self.range(i)) };
            f(i, subslice);
        });
    }

    /// Sequential counterpart of [`par_for_each_mut`](Self::par_for_each_mut).
    pub fn for_each_mut<T, F>(&self, data: &mut [T], mut f: F)
    where
        F: FnMut(usize, &mut [T]),
    {
        assert!(self.end() <= data.len(), "Ranges must be contained in the data slice");
        for i in 0..self.num_ranges() {
            f(i, &mut data[self.range(i)]);
        }
    }
}
