use anyhow::{bail, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

struct Inner<T> {
    queue: VecDeque<T>,
    closed: bool,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    capacity: usize,
    notify: Notify,
    sent: AtomicU64,
    evicted: AtomicU64,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Create a fixed-capacity drop-oldest channel.
///
/// `send` never blocks: at capacity the oldest unread value is evicted to make
/// room. `close` stops further sends while keeping buffered values readable.
pub fn bounded<T>(capacity: usize) -> Result<(Sender<T>, Receiver<T>)> {
    if capacity == 0 {
        bail!("Channel capacity must be >= 1");
    }

    let shared = Arc::new(Shared {
        inner: Mutex::new(Inner {
            queue: VecDeque::with_capacity(capacity),
            closed: false,
        }),
        capacity,
        notify: Notify::new(),
        sent: AtomicU64::new(0),
        evicted: AtomicU64::new(0),
    });

    Ok((
        Sender {
            shared: shared.clone(),
        },
        Receiver { shared },
    ))
}

/// Producer half. Cloning shares the same channel; the pipeline keeps a
/// single sending task per channel.
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Sender<T> {
    /// Append a value, evicting the oldest one when full. No-op once closed.
    pub fn send(&self, value: T) {
        {
            let mut inner = self.shared.lock();
            if inner.closed {
                return;
            }
            if inner.queue.len() == self.shared.capacity {
                inner.queue.pop_front();
                self.shared.evicted.fetch_add(1, Ordering::Relaxed);
            }
            inner.queue.push_back(value);
        }
        self.shared.sent.fetch_add(1, Ordering::Relaxed);
        self.shared.notify.notify_one();
    }

    pub fn close(&self) {
        close(&self.shared);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn stats(&self) -> ChannelStats {
        stats(&self.shared)
    }
}

/// Consumer half
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Receiver<T> {
    /// Take every buffered value in FIFO order as one batch. Never blocks.
    pub fn try_receive_all(&self) -> Vec<T> {
        let mut inner = self.shared.lock();
        inner.queue.drain(..).collect()
    }

    /// Wait for the next value. Returns `None` once the channel is closed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            {
                let mut inner = self.shared.lock();
                if let Some(value) = inner.queue.pop_front() {
                    return Some(value);
                }
                if inner.closed {
                    return None;
                }
            }
            // notify_one stores a permit when nobody waits, so a send between
            // the unlock above and this await is not lost.
            self.shared.notify.notified().await;
        }
    }

    pub fn close(&self) {
        close(&self.shared);
    }

    pub fn len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn stats(&self) -> ChannelStats {
        stats(&self.shared)
    }
}

/// Cumulative channel counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelStats {
    /// Values accepted by `send` (sends after close are not counted)
    pub sent: u64,
    /// Values discarded by the drop-oldest policy
    pub evicted: u64,
}

impl ChannelStats {
    /// Fraction of accepted values evicted before being read
    pub fn loss_ratio(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        self.evicted as f64 / self.sent as f64
    }
}

fn close<T>(shared: &Shared<T>) {
    let mut inner = shared.lock();
    if inner.closed {
        return;
    }
    inner.closed = true;
    drop(inner);
    shared.notify.notify_one();
}

fn stats<T>(shared: &Shared<T>) -> ChannelStats {
    ChannelStats {
        sent: shared.sent.load(Ordering::Relaxed),
        evicted: shared.evicted.load(Ordering::Relaxed),
    }
}
