//! Bounded FIFO and take-and-clear notification shared between tasks and interrupt handlers

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel, signal::Signal};
use embassy_time::{with_timeout, Duration};

use crate::error::QueueError;

/// Fixed-capacity FIFO. Backed by a critical-section channel so interrupt handlers may
/// push with [`BoundedQueue::try_push`] while tasks block with a timeout.
pub struct BoundedQueue<T, const N: usize> {
    channel: Channel<CriticalSectionRawMutex, T, N>,
}

impl<T, const N: usize> BoundedQueue<T, N> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Waits up to `timeout` for free space
    pub async fn push(&self, item: T, timeout: Duration) -> Result<(), QueueError> {
        with_timeout(timeout, self.channel.send(item))
            .await
            .map_err(|_| QueueError::Full)
    }

    /// Non-blocking push, safe from interrupt context. The item is dropped when full.
    pub fn try_push(&self, item: T) -> Result<(), QueueError> {
        self.channel.try_send(item).map_err(|_| QueueError::Full)
    }

    /// Waits up to `timeout` for an item
    pub async fn pop(&self, timeout: Duration) -> Result<T, QueueError> {
        with_timeout(timeout, self.channel.receive())
            .await
            .map_err(|_| QueueError::Empty)
    }

    pub fn try_pop(&self) -> Result<T, QueueError> {
        self.channel.try_receive().map_err(|_| QueueError::Empty)
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.channel.is_full()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn clear(&self) {
        self.channel.clear();
    }
}

impl<T, const N: usize> Default for BoundedQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Pending flag raised by a producer and consumed by exactly one waiter.
/// Repeated notifications before a wait collapse into one.
pub struct Notifier {
    signal: Signal<CriticalSectionRawMutex, ()>,
}

impl Notifier {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    pub fn notify(&self) {
        self.signal.signal(());
    }

    /// Takes the pending flag without waiting
    pub fn take(&self) -> bool {
        self.signal.try_take().is_some()
    }

    /// Returns `true` if a notification arrived before `timeout`
    pub async fn wait(&self, timeout: Duration) -> bool {
        with_timeout(timeout, self.signal.wait()).await.is_ok()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embassy_time::Instant;

    use super::*;

    const SHORT: Duration = Duration::from_millis(20);

    #[test]
    fn test_fifo_order() {
        let queue: BoundedQueue<u8, 4> = BoundedQueue::new();
        block_on(async {
            for i in [1, 2, 3] {
                queue.push(i, SHORT).await.unwrap();
            }
            assert_eq!(queue.len(), 3);
            assert_eq!(queue.pop(SHORT).await, Ok(1));
            assert_eq!(queue.pop(SHORT).await, Ok(2));
            assert_eq!(queue.pop(SHORT).await, Ok(3));
        });
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_full_times_out() {
        let queue: BoundedQueue<u8, 2> = BoundedQueue::new();
        queue.try_push(1).unwrap();
        queue.try_push(2).unwrap();

        let start = Instant::now();
        let res = block_on(queue.push(3, SHORT));
        assert_eq!(res, Err(QueueError::Full));
        assert!(start.elapsed() >= SHORT);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_try_push_full_leaves_contents() {
        let queue: BoundedQueue<u8, 2> = BoundedQueue::new();
        queue.try_push(1).unwrap();
        queue.try_push(2).unwrap();
        assert_eq!(queue.try_push(3), Err(QueueError::Full));
        assert!(queue.is_full());
        assert_eq!(queue.try_pop(), Ok(1));
        assert_eq!(queue.try_pop(), Ok(2));
        assert_eq!(queue.try_pop(), Err(QueueError::Empty));
    }

    #[test]
    fn test_pop_empty_times_out() {
        let queue: BoundedQueue<u8, 2> = BoundedQueue::new();
        assert_eq!(block_on(queue.pop(SHORT)), Err(QueueError::Empty));
        assert_eq!(queue.capacity(), 2);
    }

    #[test]
    fn test_notifier_take_and_clear() {
        let notifier = Notifier::new();
        assert!(!notifier.take());
        notifier.notify();
        notifier.notify();
        assert!(notifier.take());
        assert!(!notifier.take());

        notifier.notify();
        assert!(block_on(notifier.wait(SHORT)));
        assert!(!block_on(notifier.wait(SHORT)));
    }
}
