pub mod id;
pub mod snowflake;
pub mod wire;

pub use snowflake::SnowflakeGenerator;
pub use wire::{EventKind, EventPayload, Frame};
