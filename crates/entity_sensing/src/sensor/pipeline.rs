//! Per-tick detection pipeline
//!
//! Broad phase gathers candidates from the shape (or the single target),
//! narrow phase applies, in order and short-circuiting:
//! 1. precise range test against the shape
//! 2. collision state (`IGNORE_OWN_COLLISION`, `IGNORE_ACTIVE_COLLISION`)
//! 3. line of sight, for sight sensors
//! 4. the script filter, cached per entity
//!
//! Survivors pass through the delay state machine, are optionally sorted by
//! distance, and are diffed against the previous sensed set. All enter
//! notifications of a tick are queued before any exit notification.

use crate::error::{SensorError, SensorResult};
use crate::foundation::collections::EntityHandle;
use crate::foundation::logging::{debug, trace, warn};
use crate::shapes::{Shape, ShapeFrame, ShapeQuery};
use crate::world::{Entity, SensingContext};

use super::{CallbackKind, CallbackQueue, ScriptDispatcher, Sensor, SensorFlags, SensorKind, SensorPlacement};

/// Per-tick inputs shared by every sensor
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickContext {
    /// Game time of this tick (seconds)
    pub game_time: f64,
    /// Whether the level is dark
    pub darkness: bool,
}

impl TickContext {
    /// Lit tick at `game_time`
    pub fn at(game_time: f64) -> Self {
        Self {
            game_time,
            darkness: false,
        }
    }

    /// Set darkness (builder pattern)
    pub fn with_darkness(mut self, darkness: bool) -> Self {
        self.darkness = darkness;
        self
    }
}

impl Sensor {
    /// Run one tick of detection
    ///
    /// Returns `Ok(false)` when the sensor is disabled or suspended, in which
    /// case nothing changes. A missing source detects nothing: every sensed
    /// entity exits, pending delays are dropped and the tick reports
    /// [`SensorError::MissingSource`]. Notifications are queued as immediate
    /// commands on `callbacks`.
    pub fn update(
        &mut self,
        world: SensingContext<'_>,
        tick: TickContext,
        scripts: &mut dyn ScriptDispatcher,
        callbacks: &mut CallbackQueue,
    ) -> SensorResult<bool> {
        if !self.is_active() {
            return Ok(false);
        }
        let Some(source) = world.entities.get(self.source) else {
            warn!("Sensor {:?} skipped: source {:?} is not alive", self.handle, self.source);
            self.delayed.clear();
            self.diff_and_notify(&[], callbacks);
            self.temp_copy = None;
            return Err(SensorError::MissingSource(self.source));
        };

        if self.dirty {
            self.filters.clear();
            self.dirty = false;
        }

        let frame = self.frame(&source, world);
        self.shape.update_transform(&frame);

        let mut scratch = std::mem::take(&mut self.scratch);
        self.broad_phase(world, tick, &mut scratch.candidates);
        scratch.resolved.clear();
        world.entities.resolve_many(&scratch.candidates, &mut scratch.resolved);

        self.filters.begin_frame();
        self.narrow_phase(world, scripts, &scratch.resolved, &mut scratch.passing);
        self.filters.sweep();

        self.apply_delay(tick.game_time, &scratch.passing, &mut scratch.confirmed);
        if self.flags.contains(SensorFlags::DISTANCE_SORT) {
            self.sort_by_distance(&scratch.passing, &mut scratch.confirmed);
        }
        self.diff_and_notify(&scratch.confirmed, callbacks);

        scratch.candidates.clear();
        scratch.resolved.clear();
        scratch.passing.clear();
        self.scratch = scratch;
        self.temp_copy = None;
        Ok(true)
    }

    fn frame(&self, source: &Entity, world: SensingContext<'_>) -> ShapeFrame {
        let (anchor, facing) = match self.placement {
            SensorPlacement::Local(offset) => (source.transform.transform_point(offset), source.transform.rotation),
            SensorPlacement::World(position) => (position, 0.0),
        };
        let target_position = self
            .shape
            .ray_target()
            .and_then(|target| world.entities.get(target))
            .map(|entity| entity.position());
        ShapeFrame {
            anchor,
            facing,
            target_position,
        }
    }

    fn is_blind(&self, tick: TickContext) -> bool {
        self.kind == SensorKind::Sight && tick.darkness && !self.flags.contains(SensorFlags::ENABLED_IN_DARKNESS)
    }

    fn broad_phase(&mut self, world: SensingContext<'_>, tick: TickContext, out: &mut Vec<EntityHandle>) {
        out.clear();
        if self.is_blind(tick) {
            return;
        }
        match self.target {
            Some(target) if !matches!(self.shape, Shape::Ray(_)) => {
                if world.entities.contains(target) {
                    out.push(target);
                }
            }
            target => {
                let query = ShapeQuery {
                    context: world,
                    stop_mask: self.stop_mask,
                    exclude: self
                        .flags
                        .contains(SensorFlags::IGNORE_OWN_COLLISION)
                        .then_some(self.source),
                };
                self.shape.entities_in_range(self.range_policy, &query, out);
                if let Some(target) = target {
                    out.retain(|&handle| handle == target);
                }
            }
        }
    }

    fn narrow_phase(
        &mut self,
        world: SensingContext<'_>,
        scripts: &mut dyn ScriptDispatcher,
        resolved: &[(EntityHandle, Entity)],
        passing: &mut Vec<(EntityHandle, Entity)>,
    ) {
        passing.clear();
        for &(handle, entity) in resolved {
            if !self.is_target_in_range(&entity)
                || !self.is_candidate_active(handle, &entity)
                || (self.kind == SensorKind::Sight && !self.is_target_visible(world, &entity))
                || !self.passes_filter(handle, scripts)
            {
                continue;
            }
            passing.push((handle, entity));
        }
    }

    fn is_target_in_range(&self, entity: &Entity) -> bool {
        match &self.shape {
            // The walk itself is the range test
            Shape::Ray(_) => true,
            shape => shape.is_entity_in_range(entity, self.range_policy),
        }
    }

    fn is_candidate_active(&self, handle: EntityHandle, entity: &Entity) -> bool {
        if handle == self.source && self.flags.contains(SensorFlags::IGNORE_OWN_COLLISION) {
            return false;
        }
        entity.collision_active || self.flags.contains(SensorFlags::IGNORE_ACTIVE_COLLISION)
    }

    fn is_target_visible(&self, world: SensingContext<'_>, entity: &Entity) -> bool {
        let sight = world.tracer.trace(self.shape.position(), entity.position(), self.stop_mask);
        if let Some(tile) = sight.tile.filter(|_| sight.hit) {
            trace!("Sensor {:?}: line of sight blocked at {:?}", self.handle, tile);
        }
        !sight.hit
    }

    fn passes_filter(&mut self, handle: EntityHandle, scripts: &mut dyn ScriptDispatcher) -> bool {
        let Some(name) = self.callbacks.filter.as_deref() else {
            return true;
        };
        if let Some(accepted) = self.filters.lookup(handle) {
            return accepted;
        }
        let accepted = scripts.filter(name, self.handle, handle);
        self.filters.store(handle, accepted);
        accepted
    }

    fn apply_delay(&mut self, now: f64, passing: &[(EntityHandle, Entity)], confirmed: &mut Vec<EntityHandle>) {
        confirmed.clear();
        let delay = self.delay_seconds;
        if delay <= 0.0 {
            self.delayed.clear();
            confirmed.extend(passing.iter().map(|&(handle, _)| handle));
            return;
        }

        for &(handle, _) in passing {
            if self.sensed.contains(&handle) {
                confirmed.push(handle);
                continue;
            }
            let started = self.delayed.start_or_insert(handle, now);
            if now - started >= delay {
                self.delayed.remove(handle);
                confirmed.push(handle);
            }
        }
        self.delayed
            .retain(|handle| passing.iter().any(|&(candidate, _)| candidate == handle));
    }

    /// Ascending distance from the shape anchor; equal distances fall back to
    /// handle order
    fn sort_by_distance(&self, passing: &[(EntityHandle, Entity)], confirmed: &mut Vec<EntityHandle>) {
        let origin = self.shape.position();
        let mut keyed: Vec<(f32, EntityHandle)> = passing
            .iter()
            .filter(|(handle, _)| confirmed.contains(handle))
            .map(|(handle, entity)| ((entity.position() - origin).magnitude_squared(), *handle))
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        confirmed.clear();
        confirmed.extend(keyed.into_iter().map(|(_, handle)| handle));
    }

    fn diff_and_notify(&mut self, confirmed: &[EntityHandle], callbacks: &mut CallbackQueue) {
        for &entity in confirmed.iter().filter(|entity| !self.sensed.contains(entity)) {
            debug!("Sensor {:?}: {:?} entered", self.handle, entity);
            callbacks.send(self.notification(entity, CallbackKind::Enter));
        }
        for &entity in self.sensed.iter().filter(|entity| !confirmed.contains(entity)) {
            debug!("Sensor {:?}: {:?} exited", self.handle, entity);
            callbacks.send(self.notification(entity, CallbackKind::Exit));
        }

        self.sensed.clear();
        self.sensed.extend_from_slice(confirmed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::SensorHandle;
    use crate::foundation::math::{constants, Vec2};
    use crate::shapes::{CircleShape, RangePolicy, RayShape};
    use crate::sensor::{CreationParams, SensorCallback};
    use crate::world::{SensingWorld, TileKind, TilePos};
    use approx::assert_relative_eq;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(EntityHandle, CallbackKind)>,
        filter_calls: usize,
        reject: Vec<EntityHandle>,
    }

    impl ScriptDispatcher for Recorder {
        fn call(&mut self, callback: &SensorCallback) {
            self.calls.push((callback.entity, callback.kind));
        }

        fn filter(&mut self, _name: &str, _sensor: SensorHandle, entity: EntityHandle) -> bool {
            self.filter_calls += 1;
            !self.reject.contains(&entity)
        }
    }

    struct Fixture {
        world: SensingWorld,
        queue: CallbackQueue,
        scripts: Recorder,
        source: EntityHandle,
    }

    impl Fixture {
        fn new() -> Self {
            crate::foundation::logging::init_for_tests();
            let mut world = SensingWorld::new(1.0);
            let source = world.spawn(Entity::at(Vec2::zeros()));
            Self {
                world,
                queue: CallbackQueue::new(),
                scripts: Recorder::default(),
                source,
            }
        }

        fn sensor(&self, kind: SensorKind, shape: impl Into<Shape>) -> Sensor {
            Sensor::new(CreationParams::new(kind, self.source, shape), SensorHandle::default()).unwrap()
        }

        fn tick_with(&mut self, sensor: &mut Sensor, tick: TickContext) -> SensorResult<bool> {
            let result = sensor.update(self.world.context(), tick, &mut self.scripts, &mut self.queue);
            self.queue.dispatch_immediate(&mut self.scripts);
            result
        }

        fn tick(&mut self, sensor: &mut Sensor, time: f64) -> SensorResult<bool> {
            self.tick_with(sensor, TickContext::at(time))
        }

        fn take_calls(&mut self) -> Vec<(EntityHandle, CallbackKind)> {
            std::mem::take(&mut self.scripts.calls)
        }
    }

    #[test]
    fn test_delay_holds_back_enter() {
        let mut fx = Fixture::new();
        let entity = fx.world.spawn(Entity::at(Vec2::new(1.0, 0.0)));
        let mut sensor = fx.sensor(SensorKind::Touch, CircleShape::disc(3.0));
        sensor.set_delay_seconds(0.5);

        fx.tick(&mut sensor, 0.0).unwrap();
        assert!(fx.take_calls().is_empty());
        assert!(sensor.delayed_entities().contains(entity));

        fx.tick(&mut sensor, 0.4).unwrap();
        assert!(fx.take_calls().is_empty());
        assert!(!sensor.is_sensing(entity));

        fx.tick(&mut sensor, 0.5).unwrap();
        assert_eq!(fx.take_calls(), vec![(entity, CallbackKind::Enter)]);
        assert!(sensor.is_sensing(entity));
        assert!(sensor.delayed_entities().is_empty());

        fx.tick(&mut sensor, 0.6).unwrap();
        assert!(fx.take_calls().is_empty());
    }

    #[test]
    fn test_leaving_before_delay_never_enters() {
        let mut fx = Fixture::new();
        let entity = fx.world.spawn(Entity::at(Vec2::new(1.0, 0.0)));
        let mut sensor = fx.sensor(SensorKind::Touch, CircleShape::disc(3.0));
        sensor.set_delay_seconds(0.5);

        fx.tick(&mut sensor, 0.0).unwrap();
        fx.world.move_to(entity, Vec2::new(8.0, 0.0));
        fx.tick(&mut sensor, 0.3).unwrap();
        fx.world.move_to(entity, Vec2::new(1.0, 0.0));
        fx.tick(&mut sensor, 0.6).unwrap();

        assert!(fx.take_calls().is_empty());
        assert!(sensor.delayed_entities().contains(entity));

        fx.tick(&mut sensor, 1.1).unwrap();
        assert_eq!(fx.take_calls(), vec![(entity, CallbackKind::Enter)]);
    }

    #[test]
    fn test_every_enter_is_paired_with_one_exit() {
        let mut fx = Fixture::new();
        let entity = fx.world.spawn(Entity::at(Vec2::new(1.0, 0.0)));
        let mut sensor = fx.sensor(SensorKind::Touch, CircleShape::disc(3.0));

        for step in 0..3 {
            fx.tick(&mut sensor, f64::from(step)).unwrap();
        }
        fx.world.move_to(entity, Vec2::new(9.0, 0.0));
        for step in 3..6 {
            fx.tick(&mut sensor, f64::from(step)).unwrap();
        }
        assert_eq!(
            fx.take_calls(),
            vec![(entity, CallbackKind::Enter), (entity, CallbackKind::Exit)]
        );
    }

    #[test]
    fn test_enters_come_before_exits() {
        let mut fx = Fixture::new();
        let leaving = fx.world.spawn(Entity::at(Vec2::new(1.0, 0.0)));
        let arriving = fx.world.spawn(Entity::at(Vec2::new(9.0, 0.0)));
        let mut sensor = fx.sensor(SensorKind::Touch, CircleShape::disc(3.0));

        fx.tick(&mut sensor, 0.0).unwrap();
        fx.take_calls();

        fx.world.move_to(leaving, Vec2::new(9.0, 5.0));
        fx.world.move_to(arriving, Vec2::new(-1.0, 0.0));
        fx.tick(&mut sensor, 0.1).unwrap();
        assert_eq!(
            fx.take_calls(),
            vec![(arriving, CallbackKind::Enter), (leaving, CallbackKind::Exit)]
        );
    }

    #[test]
    fn test_distance_sort_orders_callbacks_with_handle_tie_break() {
        let mut fx = Fixture::new();
        let far = fx.world.spawn(Entity::at(Vec2::new(2.0, 0.0)));
        let tie_a = fx.world.spawn(Entity::at(Vec2::new(1.5, 0.0)));
        let tie_b = fx.world.spawn(Entity::at(Vec2::new(0.0, -1.5)));
        let near = fx.world.spawn(Entity::at(Vec2::new(1.0, 0.0)));
        let mut sensor = fx.sensor(SensorKind::Touch, CircleShape::disc(3.0));
        sensor.set_distance_sort(true);

        fx.tick(&mut sensor, 0.0).unwrap();
        let order: Vec<EntityHandle> = fx.take_calls().into_iter().map(|(entity, _)| entity).collect();
        assert!(tie_a < tie_b);
        assert_eq!(order, vec![near, tie_a, tie_b, far]);
        assert_eq!(sensor.sensed_entities(), &[near, tie_a, tie_b, far]);
    }

    #[test]
    fn test_filter_verdicts_are_cached_and_reaped() {
        let mut fx = Fixture::new();
        let friend = fx.world.spawn(Entity::at(Vec2::new(1.0, 0.0)));
        let foe = fx.world.spawn(Entity::at(Vec2::new(-1.0, 0.0)));
        fx.scripts.reject.push(foe);
        let mut sensor = fx.sensor(SensorKind::Touch, CircleShape::disc(3.0));
        sensor.set_filter_callback(Some("friends_only".to_string()));

        fx.tick(&mut sensor, 0.0).unwrap();
        assert_eq!(fx.take_calls(), vec![(friend, CallbackKind::Enter)]);
        assert_eq!(fx.scripts.filter_calls, 2);
        assert!(sensor.filter_cache().is_rejected(foe));

        fx.tick(&mut sensor, 0.1).unwrap();
        assert_eq!(fx.scripts.filter_calls, 2);

        fx.world.move_to(foe, Vec2::new(-9.0, 0.0));
        fx.tick(&mut sensor, 0.2).unwrap();
        assert_eq!(sensor.filter_cache().len(), 1);

        fx.world.move_to(foe, Vec2::new(-1.0, 0.0));
        fx.tick(&mut sensor, 0.3).unwrap();
        assert_eq!(fx.scripts.filter_calls, 3);
        assert!(!sensor.is_sensing(foe));
        assert!(!sensor.delayed_entities().contains(foe));
    }

    #[test]
    fn test_dirty_sensor_reruns_filters() {
        let mut fx = Fixture::new();
        fx.world.spawn(Entity::at(Vec2::new(1.0, 0.0)));
        let mut sensor = fx.sensor(SensorKind::Touch, CircleShape::disc(3.0));
        sensor.set_filter_callback(Some("any".to_string()));

        fx.tick(&mut sensor, 0.0).unwrap();
        fx.tick(&mut sensor, 0.1).unwrap();
        assert_eq!(fx.scripts.filter_calls, 1);

        sensor.set_offset(Vec2::new(0.5, 0.0));
        assert!(sensor.is_dirty());
        fx.tick(&mut sensor, 0.2).unwrap();
        assert!(!sensor.is_dirty());
        assert_eq!(fx.scripts.filter_calls, 2);
    }

    #[test]
    fn test_target_sensor_only_senses_target() {
        let mut fx = Fixture::new();
        let bystander = fx.world.spawn(Entity::at(Vec2::new(1.0, 0.0)));
        let target = fx.world.spawn(Entity::at(Vec2::new(-1.0, 0.0)));
        let params = CreationParams::new(SensorKind::Touch, fx.source, CircleShape::disc(3.0)).with_target(target);
        let mut sensor = Sensor::new(params, SensorHandle::default()).unwrap();

        fx.tick(&mut sensor, 0.0).unwrap();
        assert_eq!(fx.take_calls(), vec![(target, CallbackKind::Enter)]);
        assert!(!sensor.is_sensing(bystander));

        fx.world.despawn(target);
        fx.tick(&mut sensor, 0.1).unwrap();
        assert_eq!(fx.take_calls(), vec![(target, CallbackKind::Exit)]);
    }

    #[test]
    fn test_missing_source_exits_sensed_entities() {
        let mut fx = Fixture::new();
        let entity = fx.world.spawn(Entity::at(Vec2::new(1.0, 0.0)));
        let mut sensor = fx.sensor(SensorKind::Touch, CircleShape::disc(3.0));
        fx.tick(&mut sensor, 0.0).unwrap();
        fx.take_calls();

        let source = fx.source;
        fx.world.despawn(source);
        let result = fx.tick(&mut sensor, 0.1);
        assert!(matches!(result, Err(SensorError::MissingSource(handle)) if handle == source));
        assert_eq!(fx.take_calls(), vec![(entity, CallbackKind::Exit)]);
        assert!(sensor.sensed_entities().is_empty());

        for step in 2..10 {
            assert!(fx.tick(&mut sensor, f64::from(step) * 0.1).is_err());
        }
        assert!(fx.take_calls().is_empty());
    }

    #[test]
    fn test_missing_source_drops_pending_delays() {
        let mut fx = Fixture::new();
        let entity = fx.world.spawn(Entity::at(Vec2::new(1.0, 0.0)));
        let mut sensor = fx.sensor(SensorKind::Touch, CircleShape::disc(3.0));
        sensor.set_delay_seconds(0.5);
        fx.tick(&mut sensor, 0.0).unwrap();
        assert!(sensor.delayed_entities().contains(entity));

        let source = fx.source;
        fx.world.despawn(source);
        assert!(fx.tick(&mut sensor, 1.0).is_err());
        assert!(sensor.delayed_entities().is_empty());
        assert!(fx.take_calls().is_empty());
    }

    #[test]
    fn test_fractional_delay_confirms_on_exact_tick() {
        let mut fx = Fixture::new();
        let entity = fx.world.spawn(Entity::at(Vec2::new(1.0, 0.0)));
        let mut sensor = fx.sensor(SensorKind::Touch, CircleShape::disc(3.0));
        sensor.set_delay_seconds(0.1);

        fx.tick(&mut sensor, 0.0).unwrap();
        fx.tick(&mut sensor, 0.05).unwrap();
        assert!(fx.take_calls().is_empty());

        fx.tick(&mut sensor, 0.1).unwrap();
        assert_eq!(fx.take_calls(), vec![(entity, CallbackKind::Enter)]);
    }

    #[test]
    fn test_shrinking_shape_exits_on_next_update() {
        let mut fx = Fixture::new();
        let entity = fx.world.spawn(Entity::at(Vec2::new(2.0, 0.0)));
        let mut sensor = fx.sensor(SensorKind::Touch, CircleShape::disc(3.0));
        fx.tick(&mut sensor, 0.0).unwrap();
        fx.take_calls();

        sensor.set_shape(CircleShape::disc(1.0)).unwrap();
        assert_eq!(sensor.sensed_entities(), &[entity]);
        assert!(fx.take_calls().is_empty());

        fx.tick(&mut sensor, 0.1).unwrap();
        assert_eq!(fx.take_calls(), vec![(entity, CallbackKind::Exit)]);
        fx.tick(&mut sensor, 0.2).unwrap();
        assert!(fx.take_calls().is_empty());
    }

    #[test]
    fn test_retargeting_swaps_sensed_entity_on_next_update() {
        let mut fx = Fixture::new();
        let first = fx.world.spawn(Entity::at(Vec2::new(2.0, 0.0)));
        let second = fx.world.spawn(Entity::at(Vec2::new(-1.0, 0.0)));
        let params = CreationParams::new(SensorKind::Touch, fx.source, CircleShape::disc(3.0)).with_target(first);
        let mut sensor = Sensor::new(params, SensorHandle::default()).unwrap();
        fx.tick(&mut sensor, 0.0).unwrap();
        fx.take_calls();

        sensor.set_target(Some(second)).unwrap();
        assert_eq!(sensor.sensed_entities(), &[first]);

        fx.tick(&mut sensor, 0.1).unwrap();
        assert_eq!(
            fx.take_calls(),
            vec![(second, CallbackKind::Enter), (first, CallbackKind::Exit)]
        );
    }

    #[test]
    fn test_disabled_sensor_is_skipped_without_side_effects() {
        let mut fx = Fixture::new();
        let entity = fx.world.spawn(Entity::at(Vec2::new(1.0, 0.0)));
        let mut sensor = fx.sensor(SensorKind::Touch, CircleShape::disc(3.0));
        fx.tick(&mut sensor, 0.0).unwrap();
        fx.take_calls();

        sensor.set_enabled(false);
        fx.world.move_to(entity, Vec2::new(9.0, 0.0));
        assert!(!fx.tick(&mut sensor, 0.1).unwrap());
        assert!(fx.take_calls().is_empty());
        assert!(sensor.is_sensing(entity));

        sensor.set_suspended(true);
        sensor.set_enabled(true);
        assert!(!fx.tick(&mut sensor, 0.2).unwrap());

        sensor.set_suspended(false);
        assert!(fx.tick(&mut sensor, 0.3).unwrap());
        assert_eq!(fx.take_calls(), vec![(entity, CallbackKind::Exit)]);
    }

    #[test]
    fn test_sight_is_blocked_by_walls_and_darkness() {
        let mut fx = Fixture::new();
        let source = fx.source;
        fx.world.move_to(source, Vec2::new(0.5, 0.5));
        fx.world.tiles.set(TilePos::new(2, 0), TileKind::Solid);
        let hidden = fx.world.spawn(Entity::at(Vec2::new(4.5, 0.5)));
        let visible = fx.world.spawn(Entity::at(Vec2::new(0.5, 3.5)));
        let mut sensor = fx.sensor(SensorKind::Sight, CircleShape::disc(5.0));

        fx.tick(&mut sensor, 0.0).unwrap();
        assert_eq!(fx.take_calls(), vec![(visible, CallbackKind::Enter)]);
        assert!(!sensor.is_sensing(hidden));

        fx.tick_with(&mut sensor, TickContext::at(0.1).with_darkness(true)).unwrap();
        assert_eq!(fx.take_calls(), vec![(visible, CallbackKind::Exit)]);

        sensor.set_enabled_in_darkness(true);
        fx.tick_with(&mut sensor, TickContext::at(0.2).with_darkness(true)).unwrap();
        assert_eq!(fx.take_calls(), vec![(visible, CallbackKind::Enter)]);
    }

    #[test]
    fn test_collision_flags() {
        let mut fx = Fixture::new();
        let ghost = fx.world.spawn(Entity::at(Vec2::new(1.0, 0.0)).with_collision_active(false));
        let mut sensor = fx.sensor(SensorKind::Touch, CircleShape::disc(3.0));

        fx.tick(&mut sensor, 0.0).unwrap();
        assert!(sensor.sensed_entities().is_empty());

        sensor.set_ignore_active_collision(true);
        fx.tick(&mut sensor, 0.1).unwrap();
        assert!(sensor.is_sensing(ghost));

        sensor.set_ignore_own_collision(false);
        fx.tick(&mut sensor, 0.2).unwrap();
        assert!(sensor.is_sensing(fx.source));
    }

    #[test]
    fn test_local_offset_rotates_with_source() {
        let mut fx = Fixture::new();
        let source = fx.source;
        fx.world.rotate_to(source, constants::PI * 0.5);
        let above = fx.world.spawn(Entity::at(Vec2::new(0.0, 3.0)));
        let right = fx.world.spawn(Entity::at(Vec2::new(3.0, 0.0)));
        let mut sensor = fx.sensor(SensorKind::Touch, CircleShape::disc(1.0));
        sensor.set_offset(Vec2::new(3.0, 0.0));

        fx.tick(&mut sensor, 0.0).unwrap();
        assert_eq!(sensor.sensed_entities(), &[above]);
        assert!(!sensor.is_sensing(right));

        sensor.set_world_position(Vec2::new(3.0, 0.0));
        fx.tick(&mut sensor, 0.1).unwrap();
        assert_eq!(sensor.sensed_entities(), &[right]);
    }

    #[test]
    fn test_world_rect_policy_senses_overlapping_bodies() {
        let mut fx = Fixture::new();
        let body = fx
            .world
            .spawn(Entity::at(Vec2::new(3.5, 0.0)).with_half_extents(Vec2::new(1.0, 1.0)));
        let mut sensor = fx.sensor(SensorKind::Touch, CircleShape::disc(3.0));

        fx.tick(&mut sensor, 0.0).unwrap();
        assert!(!sensor.is_sensing(body));

        sensor.set_range_policy(RangePolicy::WorldRect);
        fx.tick(&mut sensor, 0.1).unwrap();
        assert!(sensor.is_sensing(body));
    }

    #[test]
    fn test_ray_sensor_stops_at_wall() {
        let mut fx = Fixture::new();
        fx.world.tiles.set(TilePos::new(5, 0), TileKind::Solid);
        fx.world
            .spawn(Entity::at(Vec2::new(7.5, 0.0)).with_half_extents(Vec2::new(0.4, 0.4)));
        let mut sensor = fx.sensor(SensorKind::Touch, RayShape::new(Vec2::new(10.0, 0.0)));

        fx.tick(&mut sensor, 0.0).unwrap();
        assert!(sensor.sensed_entities().is_empty());
        assert_eq!(sensor.shape().hit_position(), Some(Vec2::new(5.0, 0.0)));

        let near = fx
            .world
            .spawn(Entity::at(Vec2::new(3.0, 0.0)).with_half_extents(Vec2::new(0.4, 0.4)));
        fx.tick(&mut sensor, 0.1).unwrap();
        assert_eq!(sensor.sensed_entities(), &[near]);
        let hit = sensor.shape().hit_position().unwrap();
        assert_relative_eq!(hit.x, 2.6, epsilon = 1e-5);
    }

    #[test]
    fn test_remove_all_is_idempotent() {
        let mut fx = Fixture::new();
        let entity = fx.world.spawn(Entity::at(Vec2::new(1.0, 0.0)));
        let mut sensor = fx.sensor(SensorKind::Touch, CircleShape::disc(3.0));
        fx.tick(&mut sensor, 0.0).unwrap();
        fx.take_calls();

        let mut queue = CallbackQueue::new();
        sensor.remove_all_sensed_entities(true, false, &mut queue);
        assert_eq!(queue.immediate().len(), 1);
        assert_eq!(queue.immediate()[0].entity, entity);
        sensor.remove_all_sensed_entities(true, false, &mut queue);
        assert_eq!(queue.len(), 1);
        assert!(sensor.sensed_entities().is_empty());

        fx.tick(&mut sensor, 0.1).unwrap();
        let mut deferred = CallbackQueue::new();
        sensor.remove_all_sensed_entities(true, true, &mut deferred);
        assert_eq!(deferred.deferred_len(), 1);
        assert!(deferred.immediate().is_empty());
    }
}
