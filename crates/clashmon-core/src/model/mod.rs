// ── Domain model ──

pub mod device;
pub mod entity;
pub mod presentation;

pub use device::DeviceIdentity;
pub use entity::{
    ActionMethod, EntityAction, EntityDescriptor, EntityState, EntityType, slugify, unique_id,
};
pub use presentation::{DeviceClass, Platform, Presentation, StateClass};
