//! Worker pool for simulated vehicles.
//!
//! ## Structure
//!
//! - [`worker`] - the paced build, send and record loop run by each vehicle.
//! - [`manager`] - spawns the workers, owns the shutdown token and collects
//!   their reports.

pub mod manager;
pub mod worker;
