//! Enter/exit notifications as queued commands
//!
//! A sensor never calls into scripts while it walks its own entity sets.
//! It records [`SensorCallback`] commands instead, and the owner drains them
//! at a safe point:
//! - immediate commands right after the sensor's update
//! - deferred commands at the start of the next tick

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::foundation::collections::{EntityHandle, SensorHandle};
use crate::foundation::logging::warn;

/// Which notification a command carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    /// Entity became sensed
    Enter,
    /// Entity stopped being sensed
    Exit,
}

/// Script function names attached to a sensor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackNames {
    /// Called when an entity enters
    pub enter: Option<String>,
    /// Called when an entity exits
    pub exit: Option<String>,
    /// Decides whether a candidate may be sensed
    pub filter: Option<String>,
}

impl CallbackNames {
    /// Name for a notification kind
    pub fn for_kind(&self, kind: CallbackKind) -> Option<&str> {
        match kind {
            CallbackKind::Enter => self.enter.as_deref(),
            CallbackKind::Exit => self.exit.as_deref(),
        }
    }
}

/// One pending notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorCallback {
    /// Sensor that produced it
    pub sensor: SensorHandle,
    /// Entity that entered or exited
    pub entity: EntityHandle,
    /// Enter or exit
    pub kind: CallbackKind,
    /// Script function to run; `None` when the sensor has no callback for
    /// this kind (the notification is still delivered so hosts can observe it)
    pub name: Option<String>,
}

/// Executes named script callbacks on behalf of sensors
pub trait ScriptDispatcher {
    /// Deliver an enter/exit notification. The result is never inspected.
    fn call(&mut self, callback: &SensorCallback);

    /// Run the named filter for a candidate; `true` lets it be sensed
    fn filter(&mut self, name: &str, sensor: SensorHandle, entity: EntityHandle) -> bool;
}

/// Dispatcher for hosts without scripting: drops notifications and accepts
/// every candidate
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDispatcher;

impl ScriptDispatcher for NullDispatcher {
    fn call(&mut self, _callback: &SensorCallback) {}

    fn filter(&mut self, name: &str, sensor: SensorHandle, entity: EntityHandle) -> bool {
        warn!("No script dispatcher for filter '{name}' on {sensor:?}; accepting {entity:?}");
        true
    }
}

/// Immediate and deferred notification queues
#[derive(Debug, Default)]
pub struct CallbackQueue {
    immediate: Vec<SensorCallback>,
    deferred: VecDeque<SensorCallback>,
}

impl CallbackQueue {
    /// Create empty queues
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue for delivery right after the current sensor update
    pub fn send(&mut self, callback: SensorCallback) {
        self.immediate.push(callback);
    }

    /// Queue for delivery at the start of the next tick
    pub fn post(&mut self, callback: SensorCallback) {
        self.deferred.push_back(callback);
    }

    /// Deliver every immediate command in issue order
    pub fn dispatch_immediate(&mut self, scripts: &mut dyn ScriptDispatcher) -> usize {
        let immediate = std::mem::take(&mut self.immediate);
        for callback in &immediate {
            scripts.call(callback);
        }
        immediate.len()
    }

    /// Remove up to `limit` deferred commands (all when `limit` is 0)
    pub fn take_deferred(&mut self, limit: usize) -> Vec<SensorCallback> {
        let count = if limit == 0 {
            self.deferred.len()
        } else {
            limit.min(self.deferred.len())
        };
        self.deferred.drain(..count).collect()
    }

    /// Move every command of `other` to the back of these queues
    pub fn append(&mut self, other: &mut Self) {
        self.immediate.append(&mut other.immediate);
        self.deferred.append(&mut other.deferred);
    }

    /// Commands waiting for immediate delivery
    pub fn immediate(&self) -> &[SensorCallback] {
        &self.immediate
    }

    /// Number of deferred commands
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Total queued commands
    pub fn len(&self) -> usize {
        self.immediate.len() + self.deferred.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.immediate.is_empty() && self.deferred.is_empty()
    }

    /// Drop everything (level reset)
    pub fn clear(&mut self) {
        self.immediate.clear();
        self.deferred.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(EntityHandle, CallbackKind)>,
    }

    impl ScriptDispatcher for Recorder {
        fn call(&mut self, callback: &SensorCallback) {
            self.calls.push((callback.entity, callback.kind));
        }

        fn filter(&mut self, _name: &str, _sensor: SensorHandle, _entity: EntityHandle) -> bool {
            true
        }
    }

    fn command(entity: EntityHandle, kind: CallbackKind) -> SensorCallback {
        SensorCallback {
            sensor: SensorHandle::default(),
            entity,
            kind,
            name: None,
        }
    }

    #[test]
    fn test_immediate_dispatch_keeps_order() {
        let mut entities: SlotMap<EntityHandle, ()> = SlotMap::with_key();
        let (a, b) = (entities.insert(()), entities.insert(()));

        let mut queue = CallbackQueue::new();
        queue.send(command(a, CallbackKind::Enter));
        queue.send(command(b, CallbackKind::Exit));
        queue.post(command(a, CallbackKind::Exit));

        let mut recorder = Recorder::default();
        assert_eq!(queue.dispatch_immediate(&mut recorder), 2);
        assert_eq!(recorder.calls, vec![(a, CallbackKind::Enter), (b, CallbackKind::Exit)]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.deferred_len(), 1);
    }

    #[test]
    fn test_take_deferred_respects_limit() {
        let mut entities: SlotMap<EntityHandle, ()> = SlotMap::with_key();
        let mut queue = CallbackQueue::new();
        for _ in 0..5 {
            queue.post(command(entities.insert(()), CallbackKind::Exit));
        }
        assert_eq!(queue.take_deferred(2).len(), 2);
        assert_eq!(queue.take_deferred(0).len(), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_callback_names_by_kind() {
        let names = CallbackNames {
            enter: Some("on_enter".into()),
            exit: None,
            filter: None,
        };
        assert_eq!(names.for_kind(CallbackKind::Enter), Some("on_enter"));
        assert_eq!(names.for_kind(CallbackKind::Exit), None);
    }
}
