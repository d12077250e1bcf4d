//! Kernel value objects, aggregates and domain events shared by every
//! service. Pure domain logic lives here: no sqlx, no Rocket, no I/O.

pub mod booking;
pub mod events;
pub mod ids;
pub mod inventory;
pub mod money;
pub mod value_objects;
