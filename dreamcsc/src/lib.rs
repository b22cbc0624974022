//! DREAM CSC - Controller for the DREAM camera controllers
//!
//! The CSC connects to every DREAM server, relays operational commands and
//! weather, archives announced data products and watches status telemetry.

pub mod config;
pub mod controller;
pub mod products;
pub mod simulation;
pub mod weather;

pub use config::*;
pub use controller::*;
pub use products::*;
pub use simulation::*;
pub use weather::*;
