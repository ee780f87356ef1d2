//! The `message` module defines the unit of relay: the emergency `Message`,
//! its closed set of kinds, the ordered `Priority`, and the `NewMessage`
//! fields used to originate one locally.

pub mod model;

pub use model::{Flags, Location, Message, MessageKind, NewMessage, Priority, Source};
