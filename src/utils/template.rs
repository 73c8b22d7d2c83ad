//! `$NAME` / `${NAME}` placeholder substitution for manifests

use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("placeholder pattern is valid")
    })
}

/// Result of rendering a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Placeholders with no value, left in the text as written
    pub unresolved: BTreeSet<String>,
}

/// Replace known placeholders; unknown ones stay untouched
pub fn substitute(text: &str, vars: &BTreeMap<String, String>) -> Rendered {
    let mut unresolved = BTreeSet::new();

    let rendered = placeholder().replace_all(text, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();

        match vars.get(name) {
            Some(value) => value.clone(),
            None => {
                unresolved.insert(name.to_string());
                caps[0].to_string()
            }
        }
    });

    Rendered {
        text: rendered.into_owned(),
        unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("IMAGE".to_string(), "1234.dkr.ecr/r:1".to_string()),
            ("ENV".to_string(), "dev".to_string()),
        ])
    }

    #[test]
    fn test_braced_and_bare_forms() {
        let out = substitute("image: ${IMAGE}\nenv: $ENV-x", &vars());
        assert_eq!(out.text, "image: 1234.dkr.ecr/r:1\nenv: dev-x");
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn test_unknown_placeholders_are_kept() {
        let out = substitute("a: ${MISSING} b: $ALSO_MISSING c: $ENV", &vars());
        assert_eq!(out.text, "a: ${MISSING} b: $ALSO_MISSING c: dev");
        assert_eq!(
            out.unresolved.into_iter().collect::<Vec<_>>(),
            vec!["ALSO_MISSING", "MISSING"]
        );
    }

    #[test]
    fn test_longest_name_wins() {
        // $ENVIRONMENT must not be read as $ENV followed by "IRONMENT"
        let out = substitute("$ENVIRONMENT", &vars());
        assert_eq!(out.text, "$ENVIRONMENT");
    }

    #[test]
    fn test_text_without_placeholders() {
        let out = substitute("kind: Service\nport: 80 # costs $5", &vars());
        assert_eq!(out.text, "kind: Service\nport: 80 # costs $5");
    }
}
