//! Prerequisite and environment checks

use anyhow::{Result, anyhow};
use colored::Colorize;

use super::Session;
use crate::pipeline::StageSelection;
use crate::utils::CommonPrereqs;
use crate::utils::prereqs::Prerequisite;

/// Tools a selection needs, in first-use order
pub fn tools_for(session: &Session, selection: &StageSelection) -> Result<Vec<String>> {
    let runtime = session.runtime()?;
    let mut tools: Vec<String> = Vec::new();
    for stage in selection.stages() {
        for tool in stage.tools(runtime) {
            if !tools.iter().any(|t| t == tool) {
                tools.push(tool.to_string());
            }
        }
    }
    Ok(tools)
}

/// Report missing tools and variables for `selection`
pub fn check(session: &Session, selection: &StageSelection) -> Result<()> {
    crate::log_info!("Checking prerequisites...");

    let tools = tools_for(session, selection)?;
    let prereqs: Vec<_> = tools.iter().map(|t| CommonPrereqs::for_tool(t)).collect();
    let refs: Vec<&dyn Prerequisite> = prereqs.iter().map(|p| p as &dyn Prerequisite).collect();
    let (found, missing) = CommonPrereqs::check_all(&refs);

    for name in &found {
        println!("  {} {}", "✓".green(), name);
    }
    for (name, hint) in &missing {
        println!("  {} {}  {}", "✗".red(), name, hint.dimmed());
    }

    let env_result = session
        .env
        .require(&selection.required_vars())
        .and_then(|_| session.env.validate());
    if let Err(e) = &env_result {
        println!("  {} {}", "✗".red(), e);
    }

    if missing.is_empty() && env_result.is_ok() {
        crate::log_info!("✓ All prerequisites satisfied!");
        return Ok(());
    }

    if !missing.is_empty() {
        return Err(anyhow!(
            "{} required tool(s) missing",
            missing.len()
        ));
    }
    env_result.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeployEnv, Settings};
    use crate::utils::ContainerRuntime;

    #[test]
    fn test_tools_for_release() {
        let mut session = Session::new(DeployEnv::default(), Settings::default());
        session.runtime = Some(ContainerRuntime::Podman);

        let selection = StageSelection::release(Default::default());
        assert_eq!(
            tools_for(&session, &selection).unwrap(),
            vec!["podman", "aws", "eksctl", "kubectl"]
        );
    }

    #[test]
    fn test_tools_for_build() {
        let mut session = Session::new(DeployEnv::default(), Settings::default());
        session.runtime = Some(ContainerRuntime::Docker);

        assert_eq!(
            tools_for(&session, &StageSelection::build(false)).unwrap(),
            vec!["docker"]
        );
    }
}
