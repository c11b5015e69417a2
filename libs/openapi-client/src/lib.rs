//! Wire models for the upstream services DeployLog talks to.

pub mod models;
