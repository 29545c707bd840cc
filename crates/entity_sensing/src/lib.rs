//! # Entity Sensing
//!
//! Spatial queries for tile-based games: "which entities are inside this
//! region, and can they be seen or touched?", answered once per simulation
//! tick with enter/exit notifications.
//!
//! ## Features
//!
//! - **Shapes**: circle (ring), axis-aligned box, cone and ray, with a
//!   symmetric pairwise intersection test
//! - **Sensors**: broad phase over tile registration, narrow phase with
//!   range, collision state, line of sight and a scriptable filter
//! - **Temporal smoothing**: detection delay that survives save/load
//! - **Persistence**: compact `bincode` records with a versioned state format
//! - **Thread-friendly registry**: handle resolution under a mutex, sensors
//!   individually locked
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use entity_sensing::prelude::*;
//!
//! let mut world = SensingWorld::new(1.0);
//! let guard = world.spawn(Entity::at(Vec2::new(0.0, 0.0)));
//! let intruder = world.spawn(Entity::at(Vec2::new(1.5, 0.0)));
//!
//! let sensors = SensorManager::default();
//! let sensor = sensors
//!     .create(CreationParams::new(SensorKind::Sight, guard, CircleShape::disc(4.0)))
//!     .unwrap();
//!
//! let stats = sensors.update_all(world.context(), TickContext::at(0.0), &mut NullDispatcher);
//! assert_eq!(stats.updated, 1);
//! assert!(sensors.is_sensing(sensor, intruder));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::must_use_candidate,
    clippy::missing_errors_doc
)]

pub mod config;
pub mod error;
pub mod foundation;
pub mod sensor;
pub mod shapes;
pub mod world;

pub use error::{SensorError, SensorResult};

/// Common imports for users of the crate
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, SensingConfig},
        error::{SensorError, SensorResult},
        foundation::{
            collections::{EntityHandle, SensorHandle},
            math::{Transform2, Vec2},
        },
        sensor::{
            CallbackKind, CallbackQueue, CreationParams, NullDispatcher, ScriptDispatcher, Sensor,
            SensorCallback, SensorFlags, SensorKind, SensorManager, SensorPlacement, TickContext,
        },
        shapes::{BoxShape, CircleShape, ConeShape, RangePolicy, RayShape, Shape, ShapeKind},
        world::{Entity, EntityRegistry, SensingContext, SensingWorld, TileKind, TilePos, TileStopMask},
    };
}
