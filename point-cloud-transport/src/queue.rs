//! Drop-oldest queue sitting between the zenoh callback and a subscriber's
//! dispatcher thread. Its capacity is the subscriber's `queue_size`.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

#[derive(Debug)]
pub struct BoundedQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// `usize::MAX` makes the queue effectively unbounded.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            }),
            not_empty: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Push an item, dropping the oldest one when full.
    ///
    /// Returns `true` if an item was dropped. Pushing to a closed queue is a no-op.
    pub fn push(&self, item: T) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        let dropped = if state.items.len() >= self.capacity {
            state.items.pop_front();
            true
        } else {
            false
        };
        state.items.push_back(item);
        self.not_empty.notify_one();
        dropped
    }

    /// Block until an item is available. `None` once the queue is closed and drained.
    pub fn recv(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        let mut state = self.state.lock();
        if state.items.is_empty() && !state.closed {
            self.not_empty.wait_for(&mut state, timeout);
        }
        state.items.pop_front()
    }

    pub fn try_recv(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /// Wake every waiter; pending items are still handed out.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn drops_oldest_on_overflow() {
        let q = BoundedQueue::new(2);
        assert!(!q.push(1));
        assert!(!q.push(2));
        assert!(q.push(3));
        assert_eq!(q.try_recv(), Some(2));
        assert_eq!(q.try_recv(), Some(3));
        assert_eq!(q.try_recv(), None);
    }

    #[test]
    fn zero_capacity_keeps_latest() {
        let q = BoundedQueue::new(0);
        q.push("a");
        q.push("b");
        assert_eq!(q.len(), 1);
        assert_eq!(q.try_recv(), Some("b"));
    }

    #[test]
    fn recv_timeout_expires() {
        let q: BoundedQueue<u8> = BoundedQueue::new(4);
        let start = std::time::Instant::now();
        assert!(q.recv_timeout(Duration::from_millis(30)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn close_drains_then_stops() {
        let q = Arc::new(BoundedQueue::new(4));
        q.push(1);
        q.close();
        assert!(!q.push(2));
        assert_eq!(q.recv(), Some(1));
        assert_eq!(q.recv(), None);
    }

    #[test]
    fn close_wakes_blocked_receiver() {
        let q: Arc<BoundedQueue<u8>> = Arc::new(BoundedQueue::new(4));
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.recv());
        thread::sleep(Duration::from_millis(20));
        q.close();
        assert_eq!(handle.join().unwrap(), None);
    }
}
