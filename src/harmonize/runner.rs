// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! External command execution.

use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use tracing::debug;

/// Runs a program to completion
pub trait CommandRunner {
    fn run(&mut self, program: &str, args: &[String]) -> Result<()>;
}

/// Spawns real processes and blocks until they exit
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&mut self, program: &str, args: &[String]) -> Result<()> {
        debug!(program, ?args, "spawn");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to start {}", program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} {} failed ({}): {}", program, args.join(" "), output.status, stderr.trim());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_an_error() {
        let err = ProcessRunner
            .run("emotransform-no-such-program", &["--version".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("Failed to start"));
    }
}
