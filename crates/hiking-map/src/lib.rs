//! Hiking Map - Application Library
//!
//! Host side of the track viewer: filesystem-backed collection and settings storage, a
//! headless map surface, and the command line front end driving the core
//! [`hiking_map_lib::SyncController`].

mod app;

pub use app::{AppError, Settings, run};
