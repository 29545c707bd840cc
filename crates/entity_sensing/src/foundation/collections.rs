//! Handle types for stable cross-system references
//!
//! Entities and sensors are referenced through slot-map keys: an index plus a
//! generation counter. A handle whose slot has been reused no longer resolves.

pub use slotmap::{Key, SlotMap};

slotmap::new_key_type! {
    /// Generation-checked reference to an entity in an [`EntityRegistry`](crate::world::EntityRegistry)
    pub struct EntityHandle;

    /// Generation-checked reference to a sensor in a [`SensorManager`](crate::sensor::SensorManager)
    pub struct SensorHandle;
}
