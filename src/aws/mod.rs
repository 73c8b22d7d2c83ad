//! AWS CLI and eksctl commands: registry login and cluster access

pub mod ecr;
pub mod eks;
