//! Request and response models of the DeployLog HTTP API.

pub mod models;
