// src/exec/command.rs

//! Argument-vector description of an external command.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// An external command: program, arguments, optional working directory and
/// environment overrides.
///
/// Commands are never passed through a shell by this type; the argument
/// vector is handed to the OS as-is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Build from a full argument vector (`argv[0]` is the program).
    ///
    /// Returns `None` for an empty vector.
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let (program, rest) = argv.split_first()?;
        Some(Self::new(program.as_ref()).args(rest.iter().map(|a| a.as_ref())))
    }

    /// Build from an argument-vector template, replacing `{key}` placeholders
    /// in every element with the matching value from `vars`.
    pub fn from_template<S: AsRef<str>>(template: &[S], vars: &[(&str, &str)]) -> Option<Self> {
        let argv: Vec<String> = template
            .iter()
            .map(|part| expand_placeholders(part.as_ref(), vars))
            .collect();
        Self::from_argv(&argv)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Build a `std::process::Command` with stdin closed. Output wiring is
    /// left to the caller.
    pub(crate) fn to_std(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(&self.env).stdin(Stdio::null());
        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    pub(crate) fn to_tokio(&self) -> tokio::process::Command {
        tokio::process::Command::from(self.to_std())
    }
}

/// Renders the literal command line, quoting arguments that contain
/// whitespace. Used for the `[CMD]` marker and logs.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote_if_needed(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote_if_needed(arg))?;
        }
        Ok(())
    }
}

fn quote_if_needed(s: &str) -> String {
    if s.is_empty() || s.chars().any(char::is_whitespace) {
        format!("\"{}\"", s.replace('"', "\\\""))
    } else {
        s.to_string()
    }
}

/// Replace every `{key}` in `input` with its value from `vars`. Unknown
/// placeholders are left untouched.
pub fn expand_placeholders(input: &str, vars: &[(&str, &str)]) -> String {
    let mut out = input.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}
