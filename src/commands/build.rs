//! Build and push the container image

use anyhow::Result;

use super::{Session, run_stages};
use crate::pipeline::StageSelection;

/// Build the image and tag it for the registry
pub fn build(session: &Session, no_tag: bool) -> Result<()> {
    run_stages(session, &StageSelection::build(no_tag), "Build")
}

/// Build, tag, log in to ECR and push
pub fn push(session: &Session, skip_build: bool) -> Result<()> {
    if skip_build {
        crate::log_info!("Skipping image build (--skip-build flag provided)");
    }
    run_stages(session, &StageSelection::push(skip_build), "Push")
}
