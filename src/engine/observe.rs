//! Change notification for views that mirror engine state.

use std::fmt;
use std::path::PathBuf;

use crate::engine::allocation::PassSummary;
use crate::error::{AllocationError, EngineError};

pub const MAX_OBSERVERS: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    CatalogRebuilt { buffs: usize, failures: usize },
    Recalculated { summary: PassSummary },
    AllocationFailed { error: AllocationError },
    Saved { path: PathBuf, records: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(usize);

type Callback = Box<dyn FnMut(&EngineEvent)>;

#[derive(Default)]
pub struct Observers {
    next_id: usize,
    callbacks: Vec<(SubscriptionId, Callback)>,
}

impl Observers {
    pub fn subscribe<F>(&mut self, callback: F) -> Result<SubscriptionId, EngineError>
    where
        F: FnMut(&EngineEvent) + 'static,
    {
        if self.callbacks.len() >= MAX_OBSERVERS {
            return Err(EngineError::ObserverLimit(MAX_OBSERVERS));
        }
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        Ok(id)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(existing, _)| *existing != id);
        self.callbacks.len() != before
    }

    /// Observers are called in subscription order.
    pub fn notify(&mut self, event: &EngineEvent) {
        for (_, callback) in &mut self.callbacks {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("subscribed", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn limit_and_unsubscribe() {
        let mut observers = Observers::default();
        let mut ids = Vec::new();
        for _ in 0..MAX_OBSERVERS {
            ids.push(observers.subscribe(|_| {}).unwrap());
        }
        assert!(matches!(
            observers.subscribe(|_| {}),
            Err(EngineError::ObserverLimit(16))
        ));
        assert!(observers.unsubscribe(ids[3]));
        assert!(!observers.unsubscribe(ids[3]));
        assert!(observers.subscribe(|_| {}).is_ok());
    }

    #[test]
    fn events_reach_subscribers() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut observers = Observers::default();
        observers
            .subscribe(move |event| sink.borrow_mut().push(event.clone()))
            .unwrap();
        observers.notify(&EngineEvent::CatalogRebuilt {
            buffs: 2,
            failures: 0,
        });
        assert_eq!(seen.borrow().len(), 1);
    }
}
