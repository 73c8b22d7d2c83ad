//! Reading the container image definition before a build
//!
//! Only what the deploy pipeline needs is understood: stage boundaries, the base
//! image of the final stage and its declared entry point. Everything else is kept
//! as raw instruction text.

use crate::utils::errors::DeployError;
use std::fs;
use std::path::{Path, PathBuf};

/// One logical instruction, continuation lines joined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub keyword: String,
    pub args: String,
    /// 1-based line the instruction starts on
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct Dockerfile {
    pub path: PathBuf,
    pub instructions: Vec<Instruction>,
}

impl Dockerfile {
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        let text = fs::read_to_string(path).map_err(|e| DeployError::Dockerfile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self::parse(path, &text))
    }

    pub fn parse(path: &Path, text: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            instructions: parse_instructions(text),
        }
    }

    /// Instructions from the last FROM onwards
    fn final_stage(&self) -> &[Instruction] {
        let start = self
            .instructions
            .iter()
            .rposition(|i| i.keyword == "FROM")
            .unwrap_or(0);
        &self.instructions[start..]
    }

    /// Base image of the final stage
    pub fn base_image(&self) -> Option<String> {
        self.final_stage()
            .iter()
            .find(|i| i.keyword == "FROM")
            .and_then(|i| parse_from_ref(&i.args))
    }

    /// Handler the image starts, from the last ENTRYPOINT or CMD of the final stage
    pub fn entrypoint(&self) -> Option<String> {
        let stage = self.final_stage();
        let entry = stage.iter().rev().find(|i| i.keyword == "ENTRYPOINT");
        let cmd = stage.iter().rev().find(|i| i.keyword == "CMD");

        let words: Vec<String> = [entry, cmd]
            .into_iter()
            .flatten()
            .flat_map(|i| command_words(&i.args))
            .collect();

        if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        }
    }

    /// Fail early on a file `docker build` would reject
    pub fn validate(&self) -> Result<(), DeployError> {
        let Some(first) = self.instructions.first() else {
            return Err(self.invalid("no instructions found"));
        };

        if first.keyword != "FROM" && first.keyword != "ARG" {
            return Err(self.invalid(format!(
                "line {}: expected FROM before {}",
                first.line, first.keyword
            )));
        }

        for instruction in self.instructions.iter().filter(|i| i.keyword == "FROM") {
            if parse_from_ref(&instruction.args).is_none() {
                return Err(self.invalid(format!(
                    "line {}: FROM without an image",
                    instruction.line
                )));
            }
        }

        if self.base_image().is_none() {
            return Err(self.invalid("no FROM instruction"));
        }

        Ok(())
    }

    fn invalid(&self, reason: impl Into<String>) -> DeployError {
        DeployError::Dockerfile {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

fn parse_instructions(text: &str) -> Vec<Instruction> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut start_line = 0usize;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if buf.is_empty() {
            start_line = line_no;
        } else {
            buf.push(' ');
        }
        if let Some(prefix) = trimmed.strip_suffix('\\') {
            buf.push_str(prefix.trim_end());
            continue;
        }
        buf.push_str(trimmed);
        flush(&mut buf, start_line, &mut out);
    }

    // Trailing continuation at end of file
    flush(&mut buf, start_line, &mut out);
    out
}

fn flush(buf: &mut String, line: usize, out: &mut Vec<Instruction>) {
    if buf.is_empty() {
        return;
    }
    let mut parts = buf.splitn(2, char::is_whitespace);
    let keyword = parts.next().unwrap_or("").to_ascii_uppercase();
    let args = parts.next().unwrap_or("").trim().to_string();
    if !keyword.is_empty() {
        out.push(Instruction {
            keyword,
            args,
            line,
        });
    }
    buf.clear();
}

fn parse_from_ref(args: &str) -> Option<String> {
    args.split_whitespace()
        .find(|token| !token.starts_with("--"))
        .map(str::to_string)
}

/// Words of an exec-form (`["a", "b"]`) or shell-form instruction
fn command_words(args: &str) -> Vec<String> {
    let trimmed = args.trim();
    if trimmed.starts_with('[') {
        if let Ok(values) = serde_json::from_str::<Vec<String>>(trimmed) {
            return values;
        }
    }
    if trimmed.is_empty() {
        Vec::new()
    } else {
        vec![trimmed.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAMBDA_IMAGE: &str = r#"
# Reporting worker image
FROM public.ecr.aws/lambda/python:3.11

COPY requirements.txt ${LAMBDA_TASK_ROOT}
RUN pip install -r requirements.txt \
    --no-cache-dir

COPY sifthub ${LAMBDA_TASK_ROOT}/sifthub
CMD [ "sifthub.reporting.sqs_consumer.handler" ]
"#;

    fn parse(text: &str) -> Dockerfile {
        Dockerfile::parse(Path::new("Dockerfile"), text)
    }

    #[test]
    fn test_parse_joins_continuations() {
        let df = parse(LAMBDA_IMAGE);
        let keywords: Vec<&str> = df.instructions.iter().map(|i| i.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["FROM", "COPY", "RUN", "COPY", "CMD"]);

        let run = &df.instructions[2];
        assert_eq!(run.line, 6);
        assert_eq!(run.args, "pip install -r requirements.txt --no-cache-dir");
    }

    #[test]
    fn test_base_image_and_entrypoint() {
        let df = parse(LAMBDA_IMAGE);
        assert_eq!(
            df.base_image().as_deref(),
            Some("public.ecr.aws/lambda/python:3.11")
        );
        assert_eq!(
            df.entrypoint().as_deref(),
            Some("sifthub.reporting.sqs_consumer.handler")
        );
        assert!(df.validate().is_ok());
    }

    #[test]
    fn test_final_stage_of_multistage_build() {
        let df = parse(
            "FROM --platform=linux/amd64 python:3.11 AS builder\n\
             CMD [\"ignored\"]\n\
             FROM --platform=$TARGETPLATFORM python:3.11-slim\n\
             ENTRYPOINT [\"python\", \"-m\"]\n\
             CMD [\"reporting\"]\n",
        );
        assert_eq!(df.base_image().as_deref(), Some("python:3.11-slim"));
        assert_eq!(df.entrypoint().as_deref(), Some("python -m reporting"));
    }

    #[test]
    fn test_shell_form_cmd() {
        let df = parse("FROM alpine\nCMD python -m reporting\n");
        assert_eq!(df.entrypoint().as_deref(), Some("python -m reporting"));
    }

    #[test]
    fn test_validate_rejects_missing_from() {
        let err = parse("RUN echo hi\n").validate().unwrap_err();
        assert!(err.to_string().contains("expected FROM"));

        let err = parse("# only comments\n").validate().unwrap_err();
        assert!(err.to_string().contains("no instructions"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Dockerfile::load(Path::new("/nonexistent/Dockerfile")).unwrap_err();
        assert!(matches!(err, DeployError::Dockerfile { .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dockerfile");
        std::fs::write(&path, LAMBDA_IMAGE).unwrap();

        let df = Dockerfile::load(&path).unwrap();
        assert_eq!(df.instructions.len(), 5);
    }
}
