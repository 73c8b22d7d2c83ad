//! `config init` and `config show`

use anyhow::{Context, Result, anyhow};
use std::path::Path;

use super::Session;
use crate::config::EnvVar;
use crate::config::settings::Settings;

/// Write an example settings file
pub fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        ));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    Settings::example().save(path)?;

    crate::log_info!("Wrote {}", path.display());
    Ok(())
}

/// Print the effective settings and deployment values
pub fn show(session: &Session) -> Result<()> {
    let env = session.env.get(EnvVar::Env);

    println!("# Effective settings");
    println!(
        "{}",
        toml::to_string_pretty(&session.settings).context("Failed to serialize settings")?
    );

    println!("# Deployment values");
    for var in EnvVar::ALL {
        println!(
            "# {:<22} {}",
            var.name(),
            session.env.get(var).unwrap_or("(unset)")
        );
    }
    println!("# {:<22} {}", "namespace", session.settings.namespace_for(env));
    println!(
        "# {:<22} {}",
        "manifests_dir",
        session.settings.manifests_dir_for(env)
    );
    println!(
        "# {:<22} {}",
        "production",
        session.settings.is_production(env)
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        init(&path, false).unwrap();
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.defaults.namespace, "default");
        assert_eq!(settings.namespace_for(Some("prod")), "reporting");
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            Settings::example_config()
        );
    }

    #[test]
    fn test_init_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "# mine\n").unwrap();

        assert!(init(&path, false).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine\n");

        init(&path, true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("[defaults]"));
    }
}
