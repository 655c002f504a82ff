//! FIFO ready queue

use super::ReadyQueue;
use uthread_core::id::GreenId;
use uthread_core::queue::IdQueue;

#[derive(Debug, Default)]
pub struct FifoQueue {
    queue: IdQueue,
}

impl FifoQueue {
    pub fn new() -> Self {
        Self {
            queue: IdQueue::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: IdQueue::with_capacity(capacity),
        }
    }
}

impl ReadyQueue for FifoQueue {
    #[inline]
    fn push(&mut self, id: GreenId) {
        self.queue.push(id);
    }

    #[inline]
    fn pop(&mut self) -> Option<GreenId> {
        self.queue.pop()
    }

    #[inline]
    fn peek(&self) -> Option<GreenId> {
        self.queue.peek()
    }

    #[inline]
    fn len(&self) -> usize {
        self.queue.len()
    }

    fn reserve(&mut self, total: usize) {
        self.queue.reserve_total(total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_order() {
        let mut q = FifoQueue::with_capacity(4);
        for n in 1..=3 {
            q.push(GreenId::new(n));
        }
        // Running thread 0 yields: goes to the tail, head runs next
        q.push(GreenId::new(0));
        let order: Vec<u32> = std::iter::from_fn(|| q.pop()).map(GreenId::as_u32).collect();
        assert_eq!(order, vec![1, 2, 3, 0]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_reserve_through_trait() {
        let mut q: Box<dyn ReadyQueue> = Box::new(FifoQueue::new());
        q.reserve(1000);
        q.push(GreenId::new(5));
        assert_eq!(q.peek(), Some(GreenId::new(5)));
        assert_eq!(q.len(), 1);
    }
}
