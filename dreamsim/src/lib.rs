//! DREAM Server Simulator (dreamsim)
//!
//! Mock DREAM camera-controller servers for exercising the CSC without the
//! instrument.

pub mod mock;

pub use mock::*;
