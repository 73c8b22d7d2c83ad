//! Preview manifests the way `deploy` will apply them

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use super::Session;
use crate::config::EnvVar;
use crate::manifests::ManifestSet;

/// Print the rendered manifests, or write them to `out`
pub fn render(session: &Session, out: Option<&Path>) -> Result<()> {
    let dir = session
        .root
        .join(session.settings.manifests_dir_for(session.env.get(EnvVar::Env)));
    let set = ManifestSet::discover(&dir)?;

    if set.is_empty() {
        crate::log_warn!("No manifests found in {}", dir.display());
        return Ok(());
    }

    let vars = session.manifest_variables();
    let substitute = session.settings.deploy.substitute_variables;
    let mut documents = Vec::with_capacity(set.manifests.len());

    for manifest in &set.manifests {
        let rendered = manifest.prepare(&vars, substitute);
        for name in &rendered.unresolved {
            crate::log_warn!("{}: ${} has no value", manifest.file_name(), name);
        }
        let text = rendered.text;

        // Fails on broken YAML, as deploy does
        let resources = manifest.resources(&text)?;
        crate::log_debug!(
            "{}: {} resource(s)",
            manifest.file_name(),
            resources.len()
        );

        documents.push((manifest.file_name(), text));
    }

    match out {
        Some(out_dir) => write_all(out_dir, &documents),
        None => {
            for (name, text) in &documents {
                println!("---");
                println!("# Source: {}", name);
                print!("{}", text);
                if !text.ends_with('\n') {
                    println!();
                }
            }
            Ok(())
        }
    }
}

fn write_all(out_dir: &Path, documents: &[(String, String)]) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    for (name, text) in documents {
        let target = out_dir.join(name);

        // Same directory as the target so the rename is atomic
        let mut temp = tempfile::NamedTempFile::new_in(out_dir)
            .with_context(|| format!("Failed to create a file in {}", out_dir.display()))?;
        temp.write_all(text.as_bytes())
            .with_context(|| format!("Failed to write {}", target.display()))?;
        temp.persist(&target)
            .with_context(|| format!("Failed to write {}", target.display()))?;

        crate::log_info!("Wrote {}", target.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeployEnv, Settings};

    #[test]
    fn test_render_writes_substituted_files() {
        let project = tempfile::tempdir().unwrap();
        let manifests = project.path().join("deployment");
        std::fs::create_dir(&manifests).unwrap();
        std::fs::write(
            manifests.join("service.yaml"),
            "kind: Service\nmetadata:\n  name: reporting-$ENV\n",
        )
        .unwrap();

        let mut session = Session::new(
            DeployEnv {
                env: Some("staging".to_string()),
                ..DeployEnv::default()
            },
            Settings::default(),
        );
        session.root = project.path().to_path_buf();

        let out = project.path().join("rendered");
        render(&session, Some(&out)).unwrap();

        let written = std::fs::read_to_string(out.join("service.yaml")).unwrap();
        assert_eq!(written, "kind: Service\nmetadata:\n  name: reporting-staging\n");
        assert!(!out.join("deployment.yaml").exists());
    }

    #[test]
    fn test_render_rejects_broken_yaml() {
        let project = tempfile::tempdir().unwrap();
        let manifests = project.path().join("deployment");
        std::fs::create_dir(&manifests).unwrap();
        std::fs::write(manifests.join("role.yaml"), "kind: [").unwrap();

        let mut session = Session::new(DeployEnv::default(), Settings::default());
        session.root = project.path().to_path_buf();

        assert!(render(&session, None).is_err());
    }
}
