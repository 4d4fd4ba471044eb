#![doc = include_str!("../README.md")]

pub mod config;
pub mod service;

pub use service::handler::{CommandRoute, Rejection, ResponderOptions, handle, router};
pub use service::serve;
