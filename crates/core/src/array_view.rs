//! Owning-or-shared view over a contiguous buffer.
//!
//! An [`ArrayView`] either owns its backing storage outright or holds a
//! range into a reference-counted pool shared with other views. Either way
//! it dereferences to a slice, is move-only, and releases the backing
//! allocation exactly once when the last owner drops. Carving many views
//! out of one pool keeps per-item allocator traffic off hot paths; the
//! page-linked queues allocate their page slots through it.

use std::ops::{Deref, Range};
use std::sync::Arc;

enum Repr<T> {
    Owned(Box<[T]>),
    Shared { pool: Arc<[T]>, range: Range<usize> },
}

/// A move-only view over a contiguous run of `T`.
pub struct ArrayView<T> {
    repr: Repr<T>,
}

impl<T> ArrayView<T> {
    /// Allocate an owning view of `len` default-initialized elements.
    pub fn allocate(len: usize) -> Self
    where
        T: Default,
    {
        ArrayView {
            repr: Repr::Owned((0..len).map(|_| T::default()).collect()),
        }
    }

    /// Take ownership of an existing buffer.
    pub fn from_vec(vec: Vec<T>) -> Self {
        ArrayView {
            repr: Repr::Owned(vec.into_boxed_slice()),
        }
    }

    /// A view over the whole of a shared pool.
    pub fn from_shared(pool: Arc<[T]>) -> Self {
        let range = 0..pool.len();
        ArrayView {
            repr: Repr::Shared { pool, range },
        }
    }

    /// Convert an owning view into a shared one so it can be sliced.
    pub fn into_shared(self) -> Self {
        match self.repr {
            Repr::Owned(buffer) => Self::from_shared(Arc::from(buffer)),
            shared @ Repr::Shared { .. } => ArrayView { repr: shared },
        }
    }

    /// Carve a sub-view out of a shared view. `range` is relative to this
    /// view. Returns `None` for owned views (share first) or when the range
    /// is out of bounds.
    pub fn try_slice(&self, range: Range<usize>) -> Option<ArrayView<T>> {
        match &self.repr {
            Repr::Owned(_) => None,
            Repr::Shared { pool, range: own } => {
                let start = own.start.checked_add(range.start)?;
                let end = own.start.checked_add(range.end)?;
                if start > end || end > own.end {
                    return None;
                }
                Some(ArrayView {
                    repr: Repr::Shared {
                        pool: Arc::clone(pool),
                        range: start..end,
                    },
                })
            }
        }
    }

    /// Mutable access to the elements. Only owning views are mutable.
    pub fn as_mut_slice(&mut self) -> Option<&mut [T]> {
        match &mut self.repr {
            Repr::Owned(buffer) => Some(buffer),
            Repr::Shared { .. } => None,
        }
    }
}

impl<T> Deref for ArrayView<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        match &self.repr {
            Repr::Owned(buffer) => buffer,
            Repr::Shared { pool, range } => &pool[range.clone()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_allocate_and_mutate() {
        let mut view: ArrayView<u32> = ArrayView::allocate(4);
        assert_eq!(&*view, &[0, 0, 0, 0]);
        view.as_mut_slice().unwrap()[2] = 7;
        assert_eq!(view[2], 7);
        assert_eq!(view.len(), 4);
    }

    #[test]
    fn test_shared_pool_slicing() {
        let pool = ArrayView::from_vec(vec![10, 20, 30, 40, 50]).into_shared();
        let head = pool.try_slice(0..2).unwrap();
        let tail = pool.try_slice(2..5).unwrap();
        assert_eq!(&*head, &[10, 20]);
        assert_eq!(&*tail, &[30, 40, 50]);
        // Sub-views of sub-views stay relative.
        let middle = tail.try_slice(0..1).unwrap();
        assert_eq!(&*middle, &[30]);
    }

    #[test]
    fn test_slice_bounds_checked() {
        let pool = ArrayView::from_vec(vec![1, 2, 3]).into_shared();
        assert!(pool.try_slice(1..4).is_none());
        let owned = ArrayView::from_vec(vec![1]);
        assert!(owned.try_slice(0..1).is_none());
    }

    #[test]
    fn test_owned_views_are_not_sliceable_but_shared_survive_the_pool() {
        let pool = ArrayView::from_vec(vec![1, 2, 3, 4]).into_shared();
        let slice = pool.try_slice(1..3).unwrap();
        drop(pool);
        // Backing storage is still alive through the remaining view.
        assert_eq!(&*slice, &[2, 3]);
    }

    #[test]
    fn test_backing_released_exactly_once() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        #[derive(Default)]
        struct Counted;
        impl Drop for Counted {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let pool = ArrayView::<Counted>::allocate(3).into_shared();
        let a = pool.try_slice(0..1).unwrap();
        let b = pool.try_slice(1..3).unwrap();
        drop(pool);
        drop(a);
        assert_eq!(DROPS.load(Ordering::SeqCst), 0);
        drop(b);
        assert_eq!(DROPS.load(Ordering::SeqCst), 3);
    }
}
