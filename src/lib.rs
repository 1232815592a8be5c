#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod activity_summary;
pub mod api;
pub mod distance;
pub mod error;
pub mod export_data;
pub mod gps_processor;
mod logs;
pub mod main_db;
pub mod route_recorder;
pub mod route_store;
pub mod session_timer;
pub mod storage;
pub mod utils;
