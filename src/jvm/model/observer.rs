use std::fmt;

/// Something which wants to hear about changes to a builder
///
/// Observers are only notified when the builder's `update` method is called explicitly. Any
/// closure taking the builder by reference is an observer.
pub trait Observer<T> {
    fn notify(&mut self, subject: &T);
}

impl<T, F: FnMut(&T)> Observer<T> for F {
    fn notify(&mut self, subject: &T) {
        self(subject)
    }
}

/// Key for removing an observer that was previously added
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(usize);

/// Set of observers attached to one builder
pub struct Observers<T> {
    next_id: usize,
    observers: Vec<(ObserverId, Box<dyn Observer<T>>)>,
}

impl<T> Observers<T> {
    pub fn add(&mut self, observer: impl Observer<T> + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer, returning whether it was there to remove
    pub fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    /// Notify every observer, in the order they were added
    pub fn notify_all(&mut self, subject: &T) {
        for (_, observer) in &mut self.observers {
            observer.notify(subject);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Observers {
            next_id: 0,
            observers: vec![],
        }
    }
}

impl<T> fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn notify_in_order_and_remove() {
        let log = Rc::new(RefCell::new(vec![]));
        let mut observers: Observers<u32> = Observers::default();

        let first_log = log.clone();
        let first = observers.add(move |value: &u32| first_log.borrow_mut().push(("first", *value)));
        let second_log = log.clone();
        observers.add(move |value: &u32| second_log.borrow_mut().push(("second", *value)));

        observers.notify_all(&1);
        assert!(observers.remove(first));
        assert!(!observers.remove(first));
        observers.notify_all(&2);

        assert_eq!(
            *log.borrow(),
            vec![("first", 1), ("second", 1), ("second", 2)]
        );
        assert_eq!(observers.len(), 1);
    }
}
