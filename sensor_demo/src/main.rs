//! Sensor demo
//!
//! Drives a small scripted scene through a few seconds of simulation and
//! logs every enter/exit notification:
//! - a guard with a sight cone watching a corridor behind a crystal wall
//! - a pressure plate (box touch sensor with a detection delay)
//! - a turret ray locked onto the intruder
//!
//! Usage: `sensor_demo [config.toml|config.ron]`

use entity_sensing::prelude::*;
use entity_sensing::foundation::math::utils::deg_to_rad;

/// Demo errors
#[derive(thiserror::Error, Debug)]
enum DemoError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),
}

const TICK_SECONDS: f64 = 1.0 / 30.0;
const TICKS: u32 = 150;

/// Logs notifications and lets the "ignore_allies" filter reject allies
struct LoggingScripts {
    allies: Vec<EntityHandle>,
    enters: usize,
    exits: usize,
}

impl ScriptDispatcher for LoggingScripts {
    fn call(&mut self, callback: &SensorCallback) {
        match callback.kind {
            CallbackKind::Enter => self.enters += 1,
            CallbackKind::Exit => self.exits += 1,
        }
        log::info!(
            "{:?} {:?} -> {:?} (script: {})",
            callback.kind,
            callback.entity,
            callback.sensor,
            callback.name.as_deref().unwrap_or("<none>")
        );
    }

    fn filter(&mut self, name: &str, sensor: SensorHandle, entity: EntityHandle) -> bool {
        let accepted = !self.allies.contains(&entity);
        log::debug!("Filter '{name}' on {sensor:?}: {entity:?} accepted={accepted}");
        accepted
    }
}

fn load_config() -> Result<SensingConfig, DemoError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading config from {path}");
            let config = SensingConfig::load_from_file(&path)?;
            config.validate()?;
            Ok(config)
        }
        None => Ok(SensingConfig::default()),
    }
}

fn run() -> Result<(), DemoError> {
    let config = load_config()?;
    let mut world = SensingWorld::new(config.tile_size);
    let sensors = SensorManager::new(config)?;

    // Crystal wall with a gap at y = 4
    for y in -2..4 {
        world.tiles.set(TilePos::new(6, y), TileKind::Crystal);
    }

    let guard = world.spawn(Entity::at(Vec2::new(0.5, 0.5)).with_half_extents(Vec2::new(0.4, 0.4)));
    let ally = world.spawn(Entity::at(Vec2::new(2.5, 1.5)).with_half_extents(Vec2::new(0.4, 0.4)));
    let intruder = world.spawn(Entity::at(Vec2::new(10.5, 4.5)).with_half_extents(Vec2::new(0.4, 0.4)));
    let plate = world.spawn(Entity::at(Vec2::new(3.5, 4.5)).with_collision_active(false));

    let sight = sensors.create(CreationParams::new(
        SensorKind::Sight,
        guard,
        ConeShape::new(0.0, 12.0, 0.0, deg_to_rad(50.0)),
    ))?;
    sensors.with_sensor_mut(sight, |sensor| {
        sensor.set_enter_callback(Some("guard_spotted".to_string()));
        sensor.set_exit_callback(Some("guard_lost".to_string()));
        sensor.set_filter_callback(Some("ignore_allies".to_string()));
        sensor.set_distance_sort(true);
    })?;

    let trigger = sensors.create(CreationParams::new(SensorKind::Touch, plate, BoxShape::new(2.0, 2.0, true)))?;
    sensors.with_sensor_mut(trigger, |sensor| {
        sensor.set_delay_seconds(0.5);
        sensor.set_range_policy(RangePolicy::WorldRect);
        sensor.set_enter_callback(Some("plate_pressed".to_string()));
        sensor.set_exit_callback(Some("plate_released".to_string()));
    })?;

    let turret = sensors.create(CreationParams::new(
        SensorKind::Touch,
        guard,
        RayShape::following(intruder, Vec2::new(8.0, 0.0)),
    ))?;
    sensors.with_sensor_mut(turret, |sensor| sensor.set_enter_callback(Some("turret_lock".to_string())))?;

    let mut scripts = LoggingScripts {
        allies: vec![ally],
        enters: 0,
        exits: 0,
    };

    for step in 0..TICKS {
        let time = f64::from(step) * TICK_SECONDS;
        // Intruder walks left along the corridor, then back out
        let x = if time < 2.5 { 10.5 - time * 3.0 } else { 3.0 + (time - 2.5) * 6.0 };
        #[allow(clippy::cast_possible_truncation)]
        world.move_to(intruder, Vec2::new(x as f32, 4.5));

        let darkness = (3.5..4.0).contains(&time);
        let stats = sensors.update_all(world.context(), TickContext::at(time).with_darkness(darkness), &mut scripts);
        if stats.failed > 0 {
            log::warn!("Tick {step}: {} sensor(s) failed", stats.failed);
        }
    }

    let (creation, state) = sensors.snapshot(sight)?;
    log::info!(
        "Guard sensor snapshot: {} + {} bytes, currently sensing {:?}",
        creation.len(),
        state.len(),
        sensors.sensed_entities(sight).unwrap_or_default()
    );

    sensors.clear(true);
    sensors.dispatch_deferred(&mut scripts);
    log::info!("Done: {} enters, {} exits", scripts.enters, scripts.exits);
    Ok(())
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting sensor demo");
    if let Err(error) = run() {
        log::error!("Sensor demo failed: {error}");
        std::process::exit(1);
    }
}
