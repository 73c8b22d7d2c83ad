//! Configuration: deployment environment, image names and the settings file

pub mod env;
pub mod image;
pub mod settings;

pub use env::{DeployEnv, EnvVar};
pub use image::{ImageRef, Registry};
pub use settings::Settings;
