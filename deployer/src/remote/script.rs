//! Templated remote shell scripts.
//!
//! Every path or name substituted into a script goes through [`shell_quote`].
//! Rendered scripts always start with `set -eu` so the remote shell stops at
//! the first failing command or unset variable.

use std::fmt;

/// Quote a value for a POSIX shell using single quotes
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// A remote script built line by line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteScript {
    lines: Vec<String>,
}

impl RemoteScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a program with quoted arguments
    pub fn cmd(mut self, program: &str, args: &[&str]) -> Self {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(&shell_quote(arg));
        }
        self.lines.push(line);
        self
    }

    /// Change directory
    pub fn cd(self, dir: &str) -> Self {
        self.cmd("cd", &[dir])
    }

    /// Fail with `exit_code` when `path` exists but is not a symbolic link
    pub fn require_symlink_or_absent(mut self, path: &str, exit_code: i32) -> Self {
        let quoted = shell_quote(path);
        self.lines.push(format!(
            "if [ -e {q} ] && [ ! -L {q} ]; then echo {msg} >&2; exit {code}; fi",
            q = quoted,
            msg = shell_quote(&format!("{} exists and is not a symbolic link", path)),
            code = exit_code,
        ));
        self
    }

    /// Append a line verbatim. Only for operator-supplied shell commands.
    pub fn raw(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// Full script text, including the fail-fast prologue
    pub fn render(&self) -> String {
        let mut text = String::from("set -eu\n");
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for RemoteScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
