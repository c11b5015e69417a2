//! DeployLog Library
//!
//! Core modules for the DeployLog CI/CD dashboard.

pub mod analysis;
pub mod app;
pub mod diagnostic;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod sync;
pub mod utils;
pub mod workers;
