//! DREAM Gateway Library (dreamlib)
//!
//! This library keeps the CSC's connections to the DREAM camera-controller
//! servers. It correlates acknowledgements with the commands that caused them,
//! enforces the acknowledgement deadline, reconnects after connection loss and
//! surfaces telemetry as events.

pub mod backoff;
pub mod client;
pub mod connection;
pub mod events;
pub mod gateway;
pub mod pending;

pub use backoff::*;
pub use client::*;
pub use connection::*;
pub use events::*;
pub use gateway::*;
pub use pending::*;
pub use dreamproto::*;
