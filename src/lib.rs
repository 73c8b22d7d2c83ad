//! sifthub-deploy library: builds, pushes and deploys the sifthub reporting image

pub mod aws;
pub mod commands;
pub mod config;
pub mod dockerfile;
pub mod k8s;
pub mod manifests;
pub mod pipeline;
pub mod utils;

pub use utils::errors::DeployError;
