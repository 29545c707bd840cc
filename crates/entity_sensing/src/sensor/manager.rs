//! Sensor registry and per-tick driver
//!
//! Sensors live behind `Arc<RwLock<_>>` in a slot map guarded by a mutex.
//! The mutex covers handle resolution only: callers get an `Arc` back and
//! lock the sensor themselves, so a reader on another thread (debug drawing,
//! snapshotting) never holds up the registry while the simulation thread
//! updates a different sensor.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{ConfigError, SensingConfig};
use crate::error::{SensorError, SensorResult};
use crate::foundation::collections::{EntityHandle, SensorHandle, SlotMap};
use crate::foundation::logging::{debug, warn};
use crate::world::SensingContext;

use super::{CallbackQueue, CreationParams, ScriptDispatcher, Sensor, TickContext};

/// Shared, individually locked sensor
pub type SharedSensor = Arc<RwLock<Sensor>>;

/// Outcome of one [`SensorManager::update_all`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Sensors that ran their pipeline
    pub updated: usize,
    /// Disabled or suspended sensors
    pub skipped: usize,
    /// Sensors whose update failed (missing source)
    pub failed: usize,
    /// Notifications delivered, deferred ones included
    pub callbacks: usize,
}

fn read_sensor(sensor: &SharedSensor) -> RwLockReadGuard<'_, Sensor> {
    sensor.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_sensor(sensor: &SharedSensor) -> RwLockWriteGuard<'_, Sensor> {
    sensor.write().unwrap_or_else(PoisonError::into_inner)
}

/// Owns every sensor and drives them once per simulation tick
#[derive(Debug)]
pub struct SensorManager {
    config: SensingConfig,
    sensors: Mutex<SlotMap<SensorHandle, SharedSensor>>,
    pending: Mutex<CallbackQueue>,
}

impl Default for SensorManager {
    fn default() -> Self {
        Self {
            config: SensingConfig::default(),
            sensors: Mutex::new(SlotMap::with_key()),
            pending: Mutex::new(CallbackQueue::new()),
        }
    }
}

impl SensorManager {
    /// Create a manager whose new sensors take their defaults from `config`
    pub fn new(config: SensingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Active configuration
    pub fn config(&self) -> &SensingConfig {
        &self.config
    }

    fn slots(&self) -> MutexGuard<'_, SlotMap<SensorHandle, SharedSensor>> {
        self.sensors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, CallbackQueue> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, mut sensor: Sensor) -> SensorHandle {
        self.slots().insert_with_key(|handle| {
            sensor.set_handle(handle);
            Arc::new(RwLock::new(sensor))
        })
    }

    /// Validate and register a new sensor
    ///
    /// Nothing is registered when validation fails.
    pub fn create(&self, params: CreationParams) -> SensorResult<SensorHandle> {
        let sensor = Sensor::with_config(params, SensorHandle::default(), &self.config)?;
        let kind = sensor.kind();
        let handle = self.register(sensor);
        debug!("Created {kind:?} sensor {handle:?}");
        Ok(handle)
    }

    /// Register a sensor decoded from its creation and state records
    pub fn restore(&self, creation: &[u8], state: &[u8]) -> SensorResult<SensorHandle> {
        let sensor = Sensor::decode(SensorHandle::default(), creation, state)?;
        let handle = self.register(sensor);
        debug!("Restored sensor {handle:?}");
        Ok(handle)
    }

    /// Encode a sensor's creation and state records
    pub fn snapshot(&self, handle: SensorHandle) -> SensorResult<(Vec<u8>, Vec<u8>)> {
        let shared = self.resolve(handle).ok_or(SensorError::MissingSensor(handle))?;
        let sensor = read_sensor(&shared);
        Ok((sensor.encode_creation()?, sensor.encode_state()?))
    }

    /// Unregister a sensor
    ///
    /// With `handle_on_exit_callbacks` every sensed entity gets an exit
    /// notification, delivered at the start of the next update.
    pub fn destroy(&self, handle: SensorHandle, handle_on_exit_callbacks: bool) -> SensorResult<()> {
        let shared = self.slots().remove(handle).ok_or(SensorError::MissingSensor(handle))?;
        let mut exits = CallbackQueue::new();
        write_sensor(&shared).remove_all_sensed_entities(handle_on_exit_callbacks, true, &mut exits);
        self.pending().append(&mut exits);
        debug!("Destroyed sensor {handle:?}");
        Ok(())
    }

    /// Destroy every sensor (level reset)
    pub fn clear(&self, handle_on_exit_callbacks: bool) {
        let drained: Vec<SharedSensor> = self.slots().drain().map(|(_, sensor)| sensor).collect();
        let mut exits = CallbackQueue::new();
        for shared in &drained {
            write_sensor(shared).remove_all_sensed_entities(handle_on_exit_callbacks, true, &mut exits);
        }
        self.pending().append(&mut exits);
    }

    /// Look up a sensor; the returned handle stays valid after the sensor is
    /// destroyed but no longer receives updates
    pub fn resolve(&self, handle: SensorHandle) -> Option<SharedSensor> {
        self.slots().get(handle).cloned()
    }

    /// Run `f` on a sensor under its write lock
    pub fn with_sensor_mut<R>(&self, handle: SensorHandle, f: impl FnOnce(&mut Sensor) -> R) -> SensorResult<R> {
        let shared = self.resolve(handle).ok_or(SensorError::MissingSensor(handle))?;
        let mut sensor = write_sensor(&shared);
        Ok(f(&mut sensor))
    }

    /// Entities a sensor currently senses
    pub fn sensed_entities(&self, handle: SensorHandle) -> Option<Vec<EntityHandle>> {
        self.resolve(handle)
            .map(|shared| read_sensor(&shared).sensed_entities().to_vec())
    }

    /// Whether a sensor currently senses `entity`
    pub fn is_sensing(&self, handle: SensorHandle, entity: EntityHandle) -> bool {
        self.resolve(handle)
            .is_some_and(|shared| read_sensor(&shared).is_sensing(entity))
    }

    /// Number of registered sensors
    pub fn sensor_count(&self) -> usize {
        self.slots().len()
    }

    /// Handles of every registered sensor
    pub fn handles(&self) -> Vec<SensorHandle> {
        self.slots().keys().collect()
    }

    /// Deliver deferred notifications, at most
    /// `max_callbacks_per_drain` of them when that is non-zero
    pub fn dispatch_deferred(&self, scripts: &mut dyn ScriptDispatcher) -> usize {
        let batch = self.pending().take_deferred(self.config.max_callbacks_per_drain);
        for callback in &batch {
            scripts.call(callback);
        }
        batch.len()
    }

    /// Number of notifications waiting for the next update
    pub fn pending_callbacks(&self) -> usize {
        self.pending().len()
    }

    /// Run one tick for every sensor
    ///
    /// Deferred notifications from earlier ticks are delivered first. Each
    /// sensor then runs to completion and its notifications are delivered
    /// before the next sensor starts. A failing sensor is logged and skipped;
    /// the others still run.
    pub fn update_all(
        &self,
        world: SensingContext<'_>,
        tick: TickContext,
        scripts: &mut dyn ScriptDispatcher,
    ) -> UpdateStats {
        let mut stats = UpdateStats {
            callbacks: self.dispatch_deferred(scripts),
            ..UpdateStats::default()
        };

        let sensors: Vec<(SensorHandle, SharedSensor)> = self
            .slots()
            .iter()
            .map(|(handle, sensor)| (handle, Arc::clone(sensor)))
            .collect();

        let mut queue = CallbackQueue::new();
        for (handle, shared) in sensors {
            let result = write_sensor(&shared).update(world, tick, scripts, &mut queue);
            match result {
                Ok(true) => stats.updated += 1,
                Ok(false) => stats.skipped += 1,
                Err(error) => {
                    warn!("Sensor {handle:?} update failed: {error}");
                    stats.failed += 1;
                }
            }
            stats.callbacks += queue.dispatch_immediate(scripts);
            if queue.deferred_len() > 0 {
                self.pending().append(&mut queue);
            }
        }
        stats
    }
}
