//! Domain model: ids, lists, items, and link relation sets.

pub mod id;
pub mod item;
pub mod list;

pub use id::{InvalidId, ItemId, ListId, UserId};
pub use item::{Item, LinkedItemRow, LinkedItems};
pub use list::{List, ListType, ParseEnumError};
