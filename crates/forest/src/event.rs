//! Synchronous observer registry fired on tracker mutations.

use std::{collections::BTreeMap, fmt};

use tracing::warn;

/// Callback invoked with every occurrence of an event.
pub type Observer<T> = Box<dyn FnMut(&T) -> eyre::Result<()> + Send>;

type OnceObserver<T> = Box<dyn FnOnce(&T) -> eyre::Result<()> + Send>;

/// Handle returned by [`Event::watch`], used to unsubscribe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchId(u64);

/// Named event with an ordered list of observers.
///
/// Observers run in subscription order on the mutating thread, followed by the one-shot
/// observers registered with [`Event::watch_once`]. A failing observer is logged
/// and does not stop delivery to the others, nor does it fail the mutation that fired it.
pub struct Event<T> {
    name: &'static str,
    observers: BTreeMap<WatchId, Observer<T>>,
    once: Vec<OnceObserver<T>>,
    next_id: u64,
    times: u64,
}

impl<T> Event<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            observers: BTreeMap::new(),
            once: Vec::new(),
            next_id: 0,
            times: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Subscribes `observer` to every future occurrence.
    pub fn watch<F>(&mut self, observer: F) -> WatchId
    where
        F: FnMut(&T) -> eyre::Result<()> + Send + 'static,
    {
        let id = WatchId(self.next_id);
        self.next_id += 1;
        self.observers.insert(id, Box::new(observer));
        id
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub fn unwatch(&mut self, id: WatchId) -> bool {
        self.observers.remove(&id).is_some()
    }

    /// Subscribes `observer` to the next occurrence only.
    ///
    /// One-shot observers run after every regular observer, whenever they were registered.
    pub fn watch_once<F>(&mut self, observer: F)
    where
        F: FnOnce(&T) -> eyre::Result<()> + Send + 'static,
    {
        self.once.push(Box::new(observer));
    }

    /// Delivers `value` to all observers.
    pub fn happened(&mut self, value: &T) {
        self.times += 1;

        for (id, observer) in self.observers.iter_mut() {
            if let Err(err) = observer(value) {
                warn!(event = self.name, watch_id = id.0, %err, "observer failed");
            }
        }

        for observer in std::mem::take(&mut self.once) {
            if let Err(err) = observer(value) {
                warn!(event = self.name, %err, "one-shot observer failed");
            }
        }
    }

    /// Number of times this event has fired.
    pub fn times(&self) -> u64 {
        self.times
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len() + self.once.len()
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("observers", &self.observers.len())
            .field("once", &self.once.len())
            .field("times", &self.times)
            .finish()
    }
}
