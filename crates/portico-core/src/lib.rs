//! # Portico Core
//! Error taxonomy, typed event primitive, and configuration shared by every
//! Portico crate.

pub mod config;
pub mod error;
pub mod event;

pub use config::PorticoConfig;
pub use error::{PorticoError, Result};
pub use event::{Event, ListenerHandle};
