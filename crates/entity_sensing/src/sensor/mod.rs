//! Sensors: a shape attached to a source entity that reports which entities
//! enter and leave it over time
//!
//! Each tick a sensor:
//! 1. places its shape from the source transform ([`SensorPlacement`])
//! 2. gathers candidates (broad phase)
//! 3. tests range, collision state, visibility and the script filter
//!    (narrow phase)
//! 4. holds new candidates back until the detection delay has elapsed
//! 5. diffs the result against the previously sensed set and queues enter
//!    and exit notifications
//!
//! A candidate is in at most one of the sensed, delayed and rejected-filter
//! sets at the end of a tick.

pub mod cache;
pub mod callbacks;
pub mod codec;
pub mod manager;
pub mod pipeline;

pub use cache::{DelayTracker, FilterCache, FilterEntry};
pub use callbacks::{
    CallbackKind, CallbackNames, CallbackQueue, NullDispatcher, ScriptDispatcher, SensorCallback,
};
pub use manager::{SensorManager, UpdateStats};
pub use pipeline::TickContext;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::config::SensingConfig;
use crate::error::{SensorError, SensorResult};
use crate::foundation::collections::{EntityHandle, Key, SensorHandle};
use crate::foundation::math::Vec2;
use crate::shapes::{RangePolicy, Shape};
use crate::world::{Entity, TileStopMask};

/// What a sensor detects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SensorKind {
    /// Anything inside the shape
    Touch = 0,
    /// Anything inside the shape with a clear line from the sensor
    Sight = 1,
}

bitflags! {
    /// Sensor behaviour switches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct SensorFlags: u8 {
        /// Sensor runs on update
        const ENABLED = 1 << 0;
        /// Temporarily paused (kept separate from `ENABLED` so game logic
        /// can pause without losing the designer's setting)
        const SUSPENDED = 1 << 1;
        /// Never sense the source entity
        const IGNORE_OWN_COLLISION = 1 << 2;
        /// Sense entities whose collision is switched off
        const IGNORE_ACTIVE_COLLISION = 1 << 3;
        /// Sight keeps working while the level is dark
        const ENABLED_IN_DARKNESS = 1 << 4;
        /// Order sensed entities (and callbacks) by distance
        const DISTANCE_SORT = 1 << 5;
    }
}

impl Default for SensorFlags {
    fn default() -> Self {
        Self::ENABLED | Self::IGNORE_OWN_COLLISION
    }
}

/// Where the shape is anchored
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SensorPlacement {
    /// Offset from the source, rotated with it; shape angles are relative to
    /// the source rotation
    Local(Vec2),
    /// Fixed world position; shape angles are absolute
    World(Vec2),
}

impl Default for SensorPlacement {
    fn default() -> Self {
        Self::Local(Vec2::zeros())
    }
}

/// Everything needed to construct a sensor
#[derive(Debug, Clone)]
pub struct CreationParams {
    /// Touch or sight
    pub kind: SensorKind,
    /// Entity the sensor is attached to
    pub source: EntityHandle,
    /// Detection region
    pub shape: Option<Shape>,
    /// When set, only this entity is ever sensed
    pub target: Option<EntityHandle>,
}

impl CreationParams {
    /// Parameters for a sensor without a specific target
    pub fn new(kind: SensorKind, source: EntityHandle, shape: impl Into<Shape>) -> Self {
        Self {
            kind,
            source,
            shape: Some(shape.into()),
            target: None,
        }
    }

    /// Restrict the sensor to one entity
    pub fn with_target(mut self, target: EntityHandle) -> Self {
        self.target = Some(target);
        self
    }
}

/// Reject parameter combinations that cannot describe a working sensor
pub fn validate(params: &CreationParams) -> SensorResult<()> {
    let Some(shape) = &params.shape else {
        return Err(SensorError::InvalidCreation(format!("{:?} sensor has no shape", params.kind)));
    };
    if params.source.is_null() {
        return Err(SensorError::InvalidCreation("source handle is null".to_string()));
    }
    shape.validate().map_err(SensorError::InvalidCreation)?;
    if let Some(target) = params.target {
        if target.is_null() {
            return Err(SensorError::InvalidCreation("target handle is null".to_string()));
        }
        if target == params.source {
            return Err(SensorError::InvalidCreation("sensor cannot target its own source".to_string()));
        }
    }
    Ok(())
}

/// Buffers reused every tick to avoid allocation
#[derive(Debug, Clone, Default)]
struct Scratch {
    candidates: Vec<EntityHandle>,
    resolved: Vec<(EntityHandle, Entity)>,
    passing: Vec<(EntityHandle, Entity)>,
    confirmed: Vec<EntityHandle>,
}

/// Region attached to an entity that tracks which entities are inside it
#[derive(Debug, Clone)]
pub struct Sensor {
    handle: SensorHandle,
    kind: SensorKind,
    source: EntityHandle,
    target: Option<EntityHandle>,
    placement: SensorPlacement,
    shape: Shape,
    range_policy: RangePolicy,
    flags: SensorFlags,
    delay_seconds: f64,
    stop_mask: TileStopMask,
    callbacks: CallbackNames,
    sensed: Vec<EntityHandle>,
    filters: FilterCache,
    delayed: DelayTracker,
    scratch: Scratch,
    dirty: bool,
    temp_copy: Option<Vec<u8>>,
}

impl Sensor {
    /// Validate `params` and build a sensor with default settings
    pub fn new(params: CreationParams, handle: SensorHandle) -> SensorResult<Self> {
        Self::with_config(params, handle, &SensingConfig::default())
    }

    /// Validate `params` and build a sensor using `config` for its defaults
    pub fn with_config(params: CreationParams, handle: SensorHandle, config: &SensingConfig) -> SensorResult<Self> {
        validate(&params)?;
        let CreationParams { kind, source, shape, target } = params;
        let shape = shape.ok_or_else(|| SensorError::InvalidCreation("sensor has no shape".to_string()))?;

        let mut flags = SensorFlags::default();
        flags.set(SensorFlags::DISTANCE_SORT, config.distance_sort_by_default);
        let stop_mask = match kind {
            SensorKind::Sight => config.default_sight_stop_mask,
            SensorKind::Touch => TileStopMask::default(),
        };

        Ok(Self {
            handle,
            kind,
            source,
            target,
            placement: SensorPlacement::default(),
            shape,
            range_policy: RangePolicy::default(),
            flags,
            delay_seconds: config.default_delay_seconds,
            stop_mask,
            callbacks: CallbackNames::default(),
            sensed: Vec::new(),
            filters: FilterCache::new(),
            delayed: DelayTracker::new(),
            scratch: Scratch::default(),
            dirty: false,
            temp_copy: None,
        })
    }

    /// Stable handle other systems use to reach this sensor
    pub fn handle(&self) -> SensorHandle {
        self.handle
    }

    pub(crate) fn set_handle(&mut self, handle: SensorHandle) {
        self.handle = handle;
    }

    /// Touch or sight
    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Entity the sensor is attached to
    pub fn source(&self) -> EntityHandle {
        self.source
    }

    /// Specific entity this sensor watches, if any
    pub fn target(&self) -> Option<EntityHandle> {
        self.target
    }

    /// Shape anchoring
    pub fn placement(&self) -> SensorPlacement {
        self.placement
    }

    /// Detection region (placed by the last update)
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Candidate-gathering policy
    pub fn range_policy(&self) -> RangePolicy {
        self.range_policy
    }

    /// Behaviour switches
    pub fn flags(&self) -> SensorFlags {
        self.flags
    }

    /// Whether the sensor runs on update
    pub fn is_enabled(&self) -> bool {
        self.flags.contains(SensorFlags::ENABLED)
    }

    /// Whether the sensor is paused
    pub fn is_suspended(&self) -> bool {
        self.flags.contains(SensorFlags::SUSPENDED)
    }

    /// Whether the sensor will run on the next update
    pub fn is_active(&self) -> bool {
        self.is_enabled() && !self.is_suspended()
    }

    /// Minimum continuous detection time before an entity is reported (seconds)
    pub fn delay_seconds(&self) -> f64 {
        self.delay_seconds
    }

    /// Tile kinds that block sight and ray walks
    pub fn stop_mask(&self) -> TileStopMask {
        self.stop_mask
    }

    /// Script callback names
    pub fn callbacks(&self) -> &CallbackNames {
        &self.callbacks
    }

    /// Entities currently sensed, in notification order
    pub fn sensed_entities(&self) -> &[EntityHandle] {
        &self.sensed
    }

    /// Whether `entity` is currently sensed
    pub fn is_sensing(&self, entity: EntityHandle) -> bool {
        self.sensed.contains(&entity)
    }

    /// Cached script filter verdicts
    pub fn filter_cache(&self) -> &FilterCache {
        &self.filters
    }

    /// Candidates still accruing detection delay
    pub fn delayed_entities(&self) -> &DelayTracker {
        &self.delayed
    }

    /// Whether cached filter verdicts will be discarded on the next update
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
        self.temp_copy = None;
    }

    /// Replace the shape. Sensed entities are re-evaluated on the next update.
    pub fn set_shape(&mut self, shape: impl Into<Shape>) -> SensorResult<()> {
        let shape = shape.into();
        shape.validate().map_err(SensorError::InvalidCreation)?;
        self.shape = shape;
        self.mark_dirty();
        Ok(())
    }

    /// Watch one specific entity, or any entity with `None`
    pub fn set_target(&mut self, target: Option<EntityHandle>) -> SensorResult<()> {
        if target == Some(self.source) {
            return Err(SensorError::InvalidCreation("sensor cannot target its own source".to_string()));
        }
        self.target = target;
        self.mark_dirty();
        Ok(())
    }

    /// Anchor the shape at a fixed world position
    pub fn set_world_position(&mut self, position: Vec2) {
        self.placement = SensorPlacement::World(position);
        self.mark_dirty();
    }

    /// Anchor the shape relative to the source
    pub fn set_offset(&mut self, offset: Vec2) {
        self.placement = SensorPlacement::Local(offset);
        self.mark_dirty();
    }

    /// Change the candidate-gathering policy
    pub fn set_range_policy(&mut self, policy: RangePolicy) {
        self.range_policy = policy;
        self.mark_dirty();
    }

    fn set_flag(&mut self, flag: SensorFlags, value: bool) {
        if self.flags.contains(flag) != value {
            self.flags.set(flag, value);
            self.mark_dirty();
        }
    }

    /// Enable or disable. A disabled sensor is skipped without side effects.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.set_flag(SensorFlags::ENABLED, enabled);
    }

    /// Pause or resume
    pub fn set_suspended(&mut self, suspended: bool) {
        self.set_flag(SensorFlags::SUSPENDED, suspended);
    }

    /// Never sense the source entity
    pub fn set_ignore_own_collision(&mut self, ignore: bool) {
        self.set_flag(SensorFlags::IGNORE_OWN_COLLISION, ignore);
    }

    /// Sense entities even when their collision is inactive
    pub fn set_ignore_active_collision(&mut self, ignore: bool) {
        self.set_flag(SensorFlags::IGNORE_ACTIVE_COLLISION, ignore);
    }

    /// Keep sight working in darkness
    pub fn set_enabled_in_darkness(&mut self, enabled: bool) {
        self.set_flag(SensorFlags::ENABLED_IN_DARKNESS, enabled);
    }

    /// Order sensed entities by distance from the sensor
    pub fn set_distance_sort(&mut self, sort: bool) {
        self.set_flag(SensorFlags::DISTANCE_SORT, sort);
    }

    /// Set the detection delay (negative values are treated as zero)
    pub fn set_delay_seconds(&mut self, delay: f64) {
        self.delay_seconds = delay.max(0.0);
        self.temp_copy = None;
    }

    /// Tile kinds that block sight and ray walks
    pub fn set_stop_mask(&mut self, mask: TileStopMask) {
        self.stop_mask = mask;
        self.mark_dirty();
    }

    /// Script function for enter notifications
    pub fn set_enter_callback(&mut self, name: Option<String>) {
        self.callbacks.enter = name;
        self.temp_copy = None;
    }

    /// Script function for exit notifications
    pub fn set_exit_callback(&mut self, name: Option<String>) {
        self.callbacks.exit = name;
        self.temp_copy = None;
    }

    /// Script function deciding whether a candidate may be sensed
    pub fn set_filter_callback(&mut self, name: Option<String>) {
        self.callbacks.filter = name;
        self.mark_dirty();
    }

    pub(crate) fn notification(&self, entity: EntityHandle, kind: CallbackKind) -> SensorCallback {
        SensorCallback {
            sensor: self.handle,
            entity,
            kind,
            name: self.callbacks.for_kind(kind).map(str::to_string),
        }
    }

    /// Forget every sensed, delayed and filtered entity
    ///
    /// With `handle_on_exit_callbacks` each sensed entity gets an exit
    /// notification, queued as deferred when `queue_callbacks` is set.
    /// Calling it again does nothing.
    pub fn remove_all_sensed_entities(
        &mut self,
        handle_on_exit_callbacks: bool,
        queue_callbacks: bool,
        callbacks: &mut CallbackQueue,
    ) {
        let sensed = std::mem::take(&mut self.sensed);
        if handle_on_exit_callbacks {
            for entity in sensed {
                let callback = self.notification(entity, CallbackKind::Exit);
                if queue_callbacks {
                    callbacks.post(callback);
                } else {
                    callbacks.send(callback);
                }
            }
        }
        self.delayed.clear();
        self.filters.clear();
        self.temp_copy = None;
    }
}
