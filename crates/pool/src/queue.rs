//! Bounded FIFO queue with backpressure.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};

/// A multi-producer multi-consumer FIFO queue with explicit backpressure.
///
/// - [`enqueue`](Self::enqueue) waits while the queue is full
/// - [`dequeue`](Self::dequeue) waits while the queue is empty
///
/// Waiters park on one-shot gates and re-check the queue under its lock after
/// every wake, so a waiter dropped mid-wait (for example by losing a
/// `select!`) never takes an item or a capacity slot with it.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    capacity: usize,
    state: Arc<Mutex<QueueState<T>>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            capacity: self.capacity,
            state: Arc::clone(&self.state),
        }
    }
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    waiting_consumers: Vec<oneshot::Sender<()>>,
    waiting_producers: Vec<oneshot::Sender<()>>,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Arc::new(Mutex::new(QueueState {
                items: VecDeque::new(),
                waiting_consumers: Vec::new(),
                waiting_producers: Vec::new(),
            })),
        }
    }

    /// The configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of queued items.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.items.len()
    }

    /// True when no items are queued.
    pub async fn is_empty(&self) -> bool {
        let state = self.state.lock().await;
        state.items.is_empty()
    }

    /// Push an item, waiting for capacity while the queue is full.
    pub async fn enqueue(&self, item: T) {
        loop {
            let gate = {
                let mut state = self.state.lock().await;
                if state.items.len() < self.capacity {
                    state.items.push_back(item);
                    wake_all(&mut state.waiting_consumers);
                    return;
                }

                let (gate_tx, gate_rx) = oneshot::channel();
                state.waiting_producers.push(gate_tx);
                gate_rx
            };

            let _ = gate.await;
        }
    }

    /// Pop the oldest item, waiting while the queue is empty.
    pub async fn dequeue(&self) -> T {
        loop {
            let gate = {
                let mut state = self.state.lock().await;
                if let Some(item) = state.items.pop_front() {
                    wake_all(&mut state.waiting_producers);
                    return item;
                }

                let (gate_tx, gate_rx) = oneshot::channel();
                state.waiting_consumers.push(gate_tx);
                gate_rx
            };

            let _ = gate.await;
        }
    }
}

/// Wake every parked waiter; each re-checks the queue and re-parks if it
/// loses the race. Sends to waiters that gave up are ignored.
fn wake_all(waiters: &mut Vec<oneshot::Sender<()>>) {
    for gate in waiters.drain(..) {
        let _ = gate.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn preserves_fifo_order() {
        let queue = BoundedQueue::new(4);

        queue.enqueue(1u32).await;
        queue.enqueue(2u32).await;
        queue.enqueue(3u32).await;

        assert_eq!(queue.len().await, 3);
        assert_eq!(queue.dequeue().await, 1);
        assert_eq!(queue.dequeue().await, 2);
        assert_eq!(queue.dequeue().await, 3);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn enqueue_applies_backpressure() {
        let queue = BoundedQueue::new(1);

        queue.enqueue(1u32).await;

        let full = queue.clone();
        let mut blocked = tokio::spawn(async move { full.enqueue(2u32).await });

        // The second enqueue should block while the queue is full.
        let timed = tokio::time::timeout(Duration::from_millis(50), &mut blocked).await;
        assert!(timed.is_err(), "enqueue should be backpressured");

        assert_eq!(queue.dequeue().await, 1);

        // Now that capacity is available, the blocked enqueue should complete.
        blocked.await.expect("join failed");

        assert_eq!(queue.dequeue().await, 2);
    }

    #[tokio::test]
    async fn dequeue_waits_for_an_item() {
        let queue = BoundedQueue::new(1);

        let empty = queue.clone();
        let consumer = tokio::spawn(async move { empty.dequeue().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.enqueue(7u32).await;

        assert_eq!(consumer.await.expect("join failed"), 7);
    }
}
