pub mod buffer;
pub mod connection;
pub mod events;
pub mod fanout;
pub mod poll;
pub mod presence;
pub mod registry;
pub mod server;
pub mod tasks;
