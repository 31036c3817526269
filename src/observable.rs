//! Observable values
//!
//! A value plus a list of change callbacks. Callbacks only run when the new
//! value differs from the old one.

use std::fmt;

/// Handle returned by [`Observable::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Numeric form, for handing across the JS boundary
    pub fn as_raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

type Callback<T> = Box<dyn FnMut(&T)>;

pub struct Observable<T> {
    value: T,
    subscribers: Vec<(SubscriptionId, Callback<T>)>,
    next_id: u64,
}

impl<T: PartialEq> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Replace the value, notifying subscribers in subscription order
    ///
    /// Returns `true` if the value changed.
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        for (_, callback) in &mut self.subscribers {
            callback(&self.value);
        }
        true
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&T) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns `false` if the subscription was already gone
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &self.value)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_notifies_on_change_only() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut obs = Observable::new(1);
        let sink = Rc::clone(&seen);
        obs.subscribe(move |v| sink.borrow_mut().push(*v));

        assert!(obs.set(2));
        assert!(!obs.set(2));
        assert!(obs.set(3));

        assert_eq!(*seen.borrow(), vec![2, 3]);
        assert_eq!(*obs.get(), 3);
    }

    #[test]
    fn test_unsubscribe() {
        let count = Rc::new(RefCell::new(0));
        let mut obs = Observable::new(String::from("a"));
        let sink = Rc::clone(&count);
        let id = obs.subscribe(move |_| *sink.borrow_mut() += 1);

        obs.set("b".to_string());
        assert!(obs.unsubscribe(id));
        assert!(!obs.unsubscribe(id));
        obs.set("c".to_string());

        assert_eq!(*count.borrow(), 1);
        assert_eq!(obs.subscriber_count(), 0);
        assert!(!obs.unsubscribe(SubscriptionId::from_raw(id.as_raw())));
    }

    #[test]
    fn test_ids_are_distinct() {
        let mut obs = Observable::new(false);
        let a = obs.subscribe(|_| {});
        let b = obs.subscribe(|_| {});

        assert_ne!(a.as_raw(), b.as_raw());
        assert!(obs.unsubscribe(SubscriptionId::from_raw(b.as_raw())));
        assert_eq!(obs.subscriber_count(), 1);
    }
}
