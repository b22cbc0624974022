//! DREAM Shared Protocol Library (dreamproto)
//!
//! This library contains definitions shared between the controlling side of the
//! software (dreamlib, dreamcsc) and the DREAM server side (dreamsim).

pub mod types;
pub mod commands;
pub mod ack;
pub mod telemetry;
pub mod weather;
pub mod protocol;
pub mod config;
pub mod error;

pub use types::*;
pub use commands::*;
pub use ack::*;
pub use telemetry::*;
pub use weather::*;
pub use protocol::*;
pub use config::*;
pub use error::*;
