#![doc = include_str!("../README.md")]

pub mod client;
pub mod config;
pub mod pacer;
pub mod pool;

pub use client::{CommandClient, Delivery};
pub use config::{CliArgs, LoadgenConfig};
pub use pacer::{Pacer, period_for_rate};
pub use pool::manager::{PoolReport, WorkerPool};
pub use pool::worker::{WorkerExit, WorkerReport, worker_loop};
