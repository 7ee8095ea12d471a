//! Binary min-heap over a pluggable weight function
//!
//! Array-backed complete binary tree. The invariant: for every non-root slot
//! `n`, `weight(heap[n]) >= weight(heap[parent(n)])`. The weight function is
//! an explicit construction argument; there is no process-wide default. For
//! element types that are themselves ordered, `BinaryHeap::default()` uses
//! identity weight.

use std::fmt;

/// Min-heap priority queue.
///
/// `T` is the element type, `K` the orderable weight produced by the weight
/// function. Mutation goes through `push`/`pop`/`remove`/`remove_all` only.
///
/// Equal-weight elements are not popped in any guaranteed order; the only
/// guarantee is that weights come out non-decreasing.
pub struct BinaryHeap<T, K = u64> {
    heap: Vec<T>,
    weight: Box<dyn Fn(&T) -> K + Send + Sync>,
}

impl<T, K: Ord> BinaryHeap<T, K> {
    /// Create an empty heap with the given weight function.
    pub fn new(weight: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        BinaryHeap {
            heap: Vec::new(),
            weight: Box::new(weight),
        }
    }

    /// Number of elements currently held.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True when the heap holds nothing.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The minimum-weight element, without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.heap.first()
    }

    /// Insert an element. O(log n).
    pub fn push(&mut self, item: T) {
        self.heap.push(item);
        self.bubble_up(self.heap.len() - 1);
    }

    /// Remove and return the minimum-weight element. O(log n).
    pub fn pop(&mut self) -> Option<T> {
        let last = self.heap.pop()?;
        if self.heap.is_empty() {
            return Some(last);
        }
        let front = std::mem::replace(&mut self.heap[0], last);
        self.bubble_down(0);
        Some(front)
    }

    /// Remove the first element equal to `item`. O(n) scan + O(log n) repair.
    ///
    /// The vacated slot is refilled with the last element, whose correct
    /// position is not known a priori, so the invariant is restored in both
    /// directions from that slot.
    pub fn remove(&mut self, item: &T) -> Option<T>
    where
        T: PartialEq,
    {
        let index = self.heap.iter().position(|x| x == item)?;
        let last_index = self.heap.len() - 1;
        if index == last_index {
            return self.heap.pop();
        }
        let last = self.heap.pop()?;
        let removed = std::mem::replace(&mut self.heap[index], last);
        self.bubble_up(index);
        self.bubble_down(index);
        Some(removed)
    }

    /// Drop every element. O(1).
    pub fn remove_all(&mut self) {
        self.heap.clear();
    }

    /// Iterate the elements in internal (heap) order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.heap.iter()
    }

    fn bubble_up(&mut self, mut n: usize) {
        while n > 0 {
            let parent = (n - 1) / 2;
            if (self.weight)(&self.heap[n]) < (self.weight)(&self.heap[parent]) {
                self.heap.swap(n, parent);
                n = parent;
            } else {
                break;
            }
        }
    }

    fn bubble_down(&mut self, mut n: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * n + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            // Equal-weight children resolve to the right child.
            let child = if right < len
                && (self.weight)(&self.heap[right]) <= (self.weight)(&self.heap[left])
            {
                right
            } else {
                left
            };
            if (self.weight)(&self.heap[child]) < (self.weight)(&self.heap[n]) {
                self.heap.swap(n, child);
                n = child;
            } else {
                break;
            }
        }
    }
}

impl<T: Ord + Clone> Default for BinaryHeap<T, T> {
    /// Identity weight: elements order themselves.
    fn default() -> Self {
        BinaryHeap::new(|x: &T| x.clone())
    }
}

impl<T: fmt::Debug, K> fmt::Debug for BinaryHeap<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryHeap")
            .field("len", &self.heap.len())
            .field("heap", &self.heap)
            .finish()
    }
}
