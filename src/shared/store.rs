//! Observable value containers: single writer, many subscribed readers.
//!
//! A [`Store`] holds the current value and pushes every new value to each live
//! subscriber. Subscribers receive an unbounded `futures` channel receiver, which
//! is a `Stream`; dropped receivers are pruned on the next notification.

use futures::channel::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};

/// A list of stream subscribers for values of type `T`.
pub struct Listeners<T> {
    senders: Arc<Mutex<Vec<mpsc::UnboundedSender<T>>>>,
}

impl<T: Clone> Listeners<T> {
    pub fn new() -> Self {
        Self {
            senders: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded();
        lock(&self.senders).push(tx);
        rx
    }

    /// Deliver `value` to every live subscriber.
    pub fn emit(&self, value: &T) {
        lock(&self.senders).retain(|tx| tx.unbounded_send(value.clone()).is_ok());
    }

    /// Number of live subscribers (as of the last emit).
    pub fn len(&self) -> usize {
        lock(&self.senders).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Listeners<T> {
    fn clone(&self) -> Self {
        Self {
            senders: self.senders.clone(),
        }
    }
}

/// An observable value. Cloning a `Store` yields another handle to the same value.
pub struct Store<T> {
    value: Arc<Mutex<T>>,
    listeners: Listeners<T>,
}

impl<T: Clone> Store<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: Arc::new(Mutex::new(initial)),
            listeners: Listeners::new(),
        }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        lock(&self.value).clone()
    }

    /// Replace the value and notify subscribers.
    ///
    /// The value is swapped as a whole; a subscriber never observes a
    /// partially-updated state.
    pub fn set(&self, value: T) {
        {
            let mut guard = lock(&self.value);
            *guard = value.clone();
        }
        self.listeners.emit(&value);
    }

    /// Update the value in place and notify subscribers with the result.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let next = {
            let mut guard = lock(&self.value);
            f(&mut *guard);
            guard.clone()
        };
        self.listeners.emit(&next);
    }

    /// Subscribe to subsequent values. The current value is not replayed.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        self.listeners.subscribe()
    }
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            listeners: self.listeners.clone(),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_subscribers_receive_each_set() {
        let store = Store::new(0u32);
        let mut rx = store.subscribe();
        store.set(1);
        store.set(2);
        assert_eq!(rx.next().await, Some(1));
        assert_eq!(rx.next().await, Some(2));
        assert_eq!(store.get(), 2);
    }

    #[tokio::test]
    async fn test_update_notifies_with_new_value() {
        let store = Store::new(vec![1u8]);
        let mut rx = store.subscribe();
        store.update(|v| v.push(2));
        assert_eq!(rx.next().await, Some(vec![1, 2]));
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let store = Store::new(0u8);
        let rx = store.subscribe();
        assert_eq!(store.listeners.len(), 1);
        drop(rx);
        store.set(1);
        assert!(store.listeners.is_empty());
    }

    #[test]
    fn test_clone_shares_value() {
        let a = Store::new("x".to_string());
        let b = a.clone();
        b.set("y".to_string());
        assert_eq!(a.get(), "y");
    }
}
