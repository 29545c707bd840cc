//! Sensor persistence
//!
//! A sensor is written as two `bincode` records:
//! - the creation record (kind, source, shape parameters, target), written
//!   once
//! - the state record (placement, flags, delay, callbacks and the sensed,
//!   filtered and delayed sets), prefixed with [`STATE_VERSION`]
//!
//! Cached geometry (squared radii, derived angles, bounding rectangles,
//! ray end points) is never written; the next update recomputes it.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{SensorError, SensorResult};
use crate::foundation::collections::{EntityHandle, SensorHandle};
use crate::foundation::logging::warn;
use crate::foundation::math::Vec2;
use crate::shapes::{BoxShape, CircleShape, ConeShape, RangePolicy, RayShape, Shape};
use crate::world::TileStopMask;

use super::{CallbackNames, CreationParams, FilterEntry, Sensor, SensorFlags, SensorKind, SensorPlacement};

/// Format version of the state record
pub const STATE_VERSION: u16 = 1;

/// Shape parameters only; the variant is the shape discriminant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum ShapeRecord {
    Circle {
        min_radius: f32,
        max_radius: f32,
    },
    Box {
        width: f32,
        height: f32,
        use_intersects: bool,
    },
    Cone {
        min_radius: f32,
        max_radius: f32,
        angle: f32,
        spread: f32,
    },
    Ray {
        offset_end: Vec2,
        target: Option<EntityHandle>,
    },
}

impl From<&Shape> for ShapeRecord {
    fn from(shape: &Shape) -> Self {
        match shape {
            Shape::Circle(circle) => Self::Circle {
                min_radius: circle.min_radius(),
                max_radius: circle.max_radius(),
            },
            Shape::Box(bx) => Self::Box {
                width: bx.width(),
                height: bx.height(),
                use_intersects: bx.use_intersects(),
            },
            Shape::Cone(cone) => Self::Cone {
                min_radius: cone.circle().min_radius(),
                max_radius: cone.circle().max_radius(),
                angle: cone.angle(),
                spread: cone.spread(),
            },
            Shape::Ray(ray) => Self::Ray {
                offset_end: ray.offset_end(),
                target: ray.target(),
            },
        }
    }
}

impl From<ShapeRecord> for Shape {
    fn from(record: ShapeRecord) -> Self {
        match record {
            ShapeRecord::Circle { min_radius, max_radius } => CircleShape::new(min_radius, max_radius).into(),
            ShapeRecord::Box {
                width,
                height,
                use_intersects,
            } => BoxShape::new(width, height, use_intersects).into(),
            ShapeRecord::Cone {
                min_radius,
                max_radius,
                angle,
                spread,
            } => ConeShape::new(min_radius, max_radius, angle, spread).into(),
            ShapeRecord::Ray { offset_end, target } => {
                let mut ray = RayShape::new(offset_end);
                ray.set_target(target);
                ray.into()
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CreationRecord {
    kind: SensorKind,
    source: EntityHandle,
    shape: ShapeRecord,
    target: Option<EntityHandle>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateRecord {
    placement: SensorPlacement,
    flags: SensorFlags,
    delay_seconds: f64,
    range_policy: RangePolicy,
    stop_mask: TileStopMask,
    callbacks: CallbackNames,
    sensed: Vec<EntityHandle>,
    filters: Vec<(EntityHandle, FilterEntry)>,
    delayed: Vec<(EntityHandle, f64)>,
}

fn encode<T: Serialize>(value: &T) -> SensorResult<Vec<u8>> {
    Ok(bincode::serde::encode_to_vec(value, bincode::config::standard())?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> SensorResult<(T, usize)> {
    Ok(bincode::serde::decode_from_slice::<T, _>(bytes, bincode::config::standard())?)
}

impl Sensor {
    /// Encode kind, source, shape parameters and target
    pub fn encode_creation(&self) -> SensorResult<Vec<u8>> {
        encode(&CreationRecord {
            kind: self.kind,
            source: self.source,
            shape: ShapeRecord::from(&self.shape),
            target: self.target,
        })
    }

    /// Encode the mutable state, prefixed with [`STATE_VERSION`]
    pub fn encode_state(&self) -> SensorResult<Vec<u8>> {
        let record = StateRecord {
            placement: self.placement,
            flags: self.flags,
            delay_seconds: self.delay_seconds,
            range_policy: self.range_policy,
            stop_mask: self.stop_mask,
            callbacks: self.callbacks.clone(),
            sensed: self.sensed.clone(),
            filters: self.filters.iter().collect(),
            delayed: self.delayed.iter().collect(),
        };
        let mut bytes = encode(&STATE_VERSION)?;
        bytes.extend(encode(&record)?);
        Ok(bytes)
    }

    /// Rebuild a sensor from its two records
    ///
    /// The creation record goes through the same validation as a new sensor.
    pub fn decode(handle: SensorHandle, creation: &[u8], state: &[u8]) -> SensorResult<Self> {
        let (record, _) = decode::<CreationRecord>(creation)?;
        let params = CreationParams {
            kind: record.kind,
            source: record.source,
            shape: Some(record.shape.into()),
            target: record.target,
        };
        let mut sensor = Self::new(params, handle)?;
        sensor.apply_state(state)?;
        Ok(sensor)
    }

    /// Replace the mutable state with a decoded state record
    ///
    /// Entities found in more than one of the sensed, delayed and
    /// rejected-filter sets are repaired (sensed wins, then delayed) and
    /// reported with a warning.
    pub fn apply_state(&mut self, state: &[u8]) -> SensorResult<()> {
        let (version, read) = decode::<u16>(state)?;
        if version != STATE_VERSION {
            return Err(SensorError::UnsupportedVersion {
                found: version,
                expected: STATE_VERSION,
            });
        }
        let (record, _) = decode::<StateRecord>(&state[read..])?;

        self.placement = record.placement;
        self.flags = record.flags;
        self.delay_seconds = record.delay_seconds.max(0.0);
        self.range_policy = record.range_policy;
        self.stop_mask = record.stop_mask;
        self.callbacks = record.callbacks;
        self.sensed = record.sensed;

        self.filters.clear();
        for &(entity, entry) in &record.filters {
            self.filters.insert_entry(entity, entry);
        }
        self.delayed.clear();
        for &(entity, started) in &record.delayed {
            self.delayed.insert(entity, started);
        }
        if self.filters.len() != record.filters.len() || self.delayed.len() != record.delayed.len() {
            warn!(
                "Sensor {:?}: cache entry count mismatch on load ({} filters, {} delayed entries read)",
                self.handle,
                record.filters.len(),
                record.delayed.len()
            );
        }

        self.repair_sets();
        self.scratch = Default::default();
        self.dirty = false;
        self.temp_copy = None;
        Ok(())
    }

    fn repair_sets(&mut self) {
        let mut repairs = 0;

        let mut seen = HashSet::new();
        let before = self.sensed.len();
        self.sensed.retain(|&entity| seen.insert(entity));
        repairs += before - self.sensed.len();

        let sensed = &self.sensed;
        let before = self.delayed.len();
        self.delayed.retain(|entity| !sensed.contains(&entity));
        repairs += before - self.delayed.len();

        let conflicting: Vec<EntityHandle> = self
            .filters
            .rejected()
            .filter(|&entity| self.sensed.contains(&entity) || self.delayed.contains(entity))
            .collect();
        repairs += conflicting.len();
        for entity in conflicting {
            self.filters.remove(entity);
        }

        if repairs > 0 {
            warn!("Sensor {:?}: repaired {repairs} inconsistent cache entries on load", self.handle);
        }
    }

    /// Encoded state for snapshot and undo readers, cached until the sensor
    /// changes
    pub fn temp_copy(&mut self) -> SensorResult<&[u8]> {
        let bytes = match self.temp_copy.take() {
            Some(bytes) => bytes,
            None => self.encode_state()?,
        };
        Ok(self.temp_copy.insert(bytes).as_slice())
    }

    /// Whether a cached temp copy exists
    pub fn has_temp_copy(&self) -> bool {
        self.temp_copy.is_some()
    }

    /// Drop the cached temp copy
    pub fn invalidate_temp_copy(&mut self) {
        self.temp_copy = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::utils::deg_to_rad;
    use crate::sensor::{CallbackQueue, NullDispatcher, TickContext};
    use crate::world::{Entity, SensingWorld};

    fn sensing_scene() -> (SensingWorld, Sensor, [EntityHandle; 3]) {
        let mut world = SensingWorld::new(1.0);
        let source = world.spawn(Entity::at(Vec2::zeros()));
        let near = world.spawn(Entity::at(Vec2::new(1.0, 0.5)));
        let far = world.spawn(Entity::at(Vec2::new(40.0, 0.0)));
        let cone = ConeShape::new(0.5, 4.0, deg_to_rad(10.0), deg_to_rad(60.0));
        let params = CreationParams::new(SensorKind::Sight, source, cone);
        let sensor = Sensor::new(params, SensorHandle::default()).unwrap();
        (world, sensor, [source, near, far])
    }

    #[test]
    fn test_round_trip_preserves_state() {
        let (world, mut sensor, [_, near, far]) = sensing_scene();
        sensor.set_offset(Vec2::new(0.25, 0.0));
        sensor.set_enter_callback(Some("on_seen".to_string()));
        sensor.set_exit_callback(Some("on_lost".to_string()));
        sensor.set_distance_sort(true);
        sensor.set_range_policy(RangePolicy::WorldRect);
        sensor.update(world.context(), TickContext::at(1.0), &mut NullDispatcher, &mut CallbackQueue::new())
            .unwrap();
        assert!(sensor.is_sensing(near));
        sensor.delayed.insert(far, 0.75);

        let creation = sensor.encode_creation().unwrap();
        let state = sensor.encode_state().unwrap();
        let restored = Sensor::decode(sensor.handle(), &creation, &state).unwrap();

        assert_eq!(restored.sensed_entities(), sensor.sensed_entities());
        assert_eq!(restored.flags(), sensor.flags());
        assert_eq!(restored.placement(), sensor.placement());
        assert_eq!(restored.callbacks(), sensor.callbacks());
        assert_eq!(restored.range_policy(), sensor.range_policy());
        assert_eq!(restored.stop_mask(), sensor.stop_mask());
        assert_eq!(restored.delayed_entities(), sensor.delayed_entities());
        assert_eq!(restored.filter_cache(), sensor.filter_cache());
        match restored.shape() {
            Shape::Cone(cone) => {
                assert_eq!(cone.angle(), deg_to_rad(10.0));
                assert_eq!(cone.spread(), deg_to_rad(60.0));
                assert_eq!(cone.circle().min_radius(), 0.5);
            }
            other => panic!("expected a cone, got {other:?}"),
        }
        assert_eq!(restored.encode_creation().unwrap(), creation);
        assert_eq!(restored.encode_state().unwrap(), state);
    }

    #[test]
    fn test_ray_target_survives_round_trip() {
        let (_, sensor, [source, near, _]) = sensing_scene();
        let params = CreationParams::new(SensorKind::Touch, source, RayShape::following(near, Vec2::new(5.0, 0.0)));
        let ray_sensor = Sensor::new(params, sensor.handle()).unwrap();
        let restored = Sensor::decode(
            ray_sensor.handle(),
            &ray_sensor.encode_creation().unwrap(),
            &ray_sensor.encode_state().unwrap(),
        )
        .unwrap();
        assert_eq!(restored.shape().ray_target(), Some(near));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let (_, sensor, _) = sensing_scene();
        let mut state = sensor.encode_state().unwrap();
        state[0] = 9;
        let creation = sensor.encode_creation().unwrap();
        let result = Sensor::decode(sensor.handle(), &creation, &state);
        assert!(matches!(
            result,
            Err(SensorError::UnsupportedVersion { found: 9, expected: STATE_VERSION })
        ));
    }

    #[test]
    fn test_truncated_record_is_a_decode_error() {
        let (_, sensor, _) = sensing_scene();
        let creation = sensor.encode_creation().unwrap();
        let result = Sensor::decode(sensor.handle(), &creation[..creation.len() / 2], &[]);
        assert!(matches!(result, Err(SensorError::Decode(_))));
    }

    #[test]
    fn test_overlapping_sets_are_repaired_on_load() {
        let (_, mut sensor, [_, near, far]) = sensing_scene();
        let record = StateRecord {
            placement: SensorPlacement::default(),
            flags: SensorFlags::default(),
            delay_seconds: 0.5,
            range_policy: RangePolicy::Center,
            stop_mask: TileStopMask::SOLID,
            callbacks: CallbackNames::default(),
            sensed: vec![near, near],
            filters: vec![
                (near, FilterEntry { accepted: false, used: true }),
                (far, FilterEntry { accepted: false, used: true }),
            ],
            delayed: vec![(near, 0.0), (far, 0.25)],
        };
        let mut state = encode(&STATE_VERSION).unwrap();
        state.extend(encode(&record).unwrap());

        sensor.apply_state(&state).unwrap();
        assert_eq!(sensor.sensed_entities(), &[near]);
        assert!(!sensor.delayed_entities().contains(near));
        assert!(sensor.delayed_entities().contains(far));
        assert!(sensor.filter_cache().is_empty());
    }

    #[test]
    fn test_temp_copy_is_cached_until_mutation() {
        let (_, mut sensor, _) = sensing_scene();
        assert!(!sensor.has_temp_copy());
        let copy = sensor.temp_copy().unwrap().to_vec();
        assert_eq!(copy, sensor.encode_state().unwrap());
        assert!(sensor.has_temp_copy());

        sensor.set_delay_seconds(2.0);
        assert!(!sensor.has_temp_copy());
        assert_ne!(sensor.temp_copy().unwrap(), copy.as_slice());

        sensor.invalidate_temp_copy();
        assert!(!sensor.has_temp_copy());
    }
}
