//! Change events and their scoped delivery bus.

pub mod bus;
pub mod types;

pub use bus::{ChangeEventBus, Scope};
pub use types::{Cause, ChangeEvent, ChangeKind, EventType, UnknownEventType};
