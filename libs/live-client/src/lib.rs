//! Client side of live delivery.
//!
//! The state machines ([`Reconciler`] and its parts) are IO-free and driven by
//! an explicit clock. [`LiveClient`] runs them on tokio against a live API
//! server.

pub mod achievements;
pub mod activity;
pub mod api;
pub mod config;
pub mod dedup;
pub mod error;
pub mod reconciler;
pub mod runner;
pub mod transport;
pub mod typing;
pub mod ui;

pub use config::ClientConfig;
pub use error::ClientError;
pub use reconciler::{Applied, Effect, Reconciler};
pub use runner::{ClientSnapshot, LiveClient, LiveHandle};
pub use transport::TransportMode;
pub use ui::{UiBus, UiEvent, UnreadState};
