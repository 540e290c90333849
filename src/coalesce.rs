use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use log::debug;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

type Sink<K, V> = Arc<dyn Fn(K, V) -> BoxFuture<'static, ()> + Send + Sync>;

struct Pending<V> {
    value: V,
    generation: u64,
    timer: JoinHandle<()>,
}

struct Slots<K, V> {
    pending: HashMap<K, Pending<V>>,
    next_generation: u64,
    /// Sink calls started by a timer or `write_now` that have not returned yet.
    in_flight: usize,
}

/// Counts one running sink call; decrements on drop, even if the task is aborted.
struct InFlight<K, V> {
    slots: Arc<Mutex<Slots<K, V>>>,
    idle: Arc<Notify>,
}

impl<K, V> Drop for InFlight<K, V> {
    fn drop(&mut self) {
        let mut slots = self.slots.lock();
        slots.in_flight -= 1;
        if slots.in_flight == 0 {
            self.idle.notify_waiters();
        }
    }
}

/// Buffers the latest value per key and hands it to the sink once the key has
/// been quiet for `quiet`. A newer write for the same key cancels the pending one.
pub struct CoalescingWriter<K, V> {
    quiet: Duration,
    sink: Sink<K, V>,
    slots: Arc<Mutex<Slots<K, V>>>,
    idle: Arc<Notify>,
}

impl<K, V> CoalescingWriter<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    pub fn new<F, Fut>(quiet: Duration, sink: F) -> Self
    where
        F: Fn(K, V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let sink: Sink<K, V> = Arc::new(move |key, value| Box::pin(sink(key, value)));
        Self {
            quiet,
            sink,
            slots: Arc::new(Mutex::new(Slots {
                pending: HashMap::new(),
                next_generation: 0,
                in_flight: 0,
            })),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn write(&self, key: K, value: V) {
        let mut slots = self.slots.lock();
        slots.next_generation += 1;
        let generation = slots.next_generation;

        let timer = tokio::spawn({
            let slots = Arc::clone(&self.slots);
            let sink = Arc::clone(&self.sink);
            let idle = Arc::clone(&self.idle);
            let key = key.clone();
            let quiet = self.quiet;
            async move {
                tokio::time::sleep(quiet).await;
                let value = {
                    let mut guarded = slots.lock();
                    match guarded.pending.get(&key) {
                        Some(pending) if pending.generation == generation => {
                            guarded.in_flight += 1;
                            guarded.pending.remove(&key).map(|p| p.value)
                        }
                        _ => None,
                    }
                };
                if let Some(value) = value {
                    let _in_flight = InFlight { slots, idle };
                    sink(key, value).await;
                }
            }
        });

        if let Some(superseded) = slots.pending.insert(
            key,
            Pending {
                value,
                generation,
                timer,
            },
        ) {
            superseded.timer.abort();
        }
    }

    /// Sends `value` right away on a detached task, replacing anything pending
    /// for `key`. `flush` still waits for it.
    pub fn write_now(&self, key: K, value: V) {
        let in_flight = {
            let mut slots = self.slots.lock();
            if let Some(superseded) = slots.pending.remove(&key) {
                superseded.timer.abort();
            }
            slots.in_flight += 1;
            InFlight {
                slots: Arc::clone(&self.slots),
                idle: Arc::clone(&self.idle),
            }
        };

        let call = (self.sink)(key, value);
        tokio::spawn(async move {
            let _in_flight = in_flight;
            call.await;
        });
    }

    /// Sends every pending value now, then waits until no sink call is running,
    /// including ones whose timer fired before the flush.
    pub async fn flush(&self) {
        let drained: Vec<(K, V)> = {
            let mut slots = self.slots.lock();
            slots
                .pending
                .drain()
                .map(|(key, pending)| {
                    pending.timer.abort();
                    (key, pending.value)
                })
                .collect()
        };

        if !drained.is_empty() {
            debug!("Flushing {} pending write(s)", drained.len());
            join_all(drained.into_iter().map(|(key, value)| (self.sink)(key, value))).await;
        }

        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.slots.lock().in_flight == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Drops every pending value without sending it.
    pub fn cancel_all(&self) {
        let mut slots = self.slots.lock();
        for (_, pending) in slots.pending.drain() {
            pending.timer.abort();
        }
    }

    pub fn pending(&self) -> usize {
        self.slots.lock().pending.len()
    }
}

impl<K, V> Drop for CoalescingWriter<K, V> {
    fn drop(&mut self) {
        for (_, pending) in self.slots.lock().pending.drain() {
            pending.timer.abort();
        }
    }
}
