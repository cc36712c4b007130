//! Subprocess helpers shared by the CLI-backed adapters

use std::process::{Command, Output};

use crate::domain::ports::ClusterError;

/// Printable form of a command line
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program.to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run to completion and capture output
pub fn run(program: &str, args: &[String]) -> Result<Output, ClusterError> {
    tracing::trace!(command = %command_line(program, args), "running");
    Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ClusterError::Spawn {
            program: program.to_string(),
            source,
        })
}

/// Run and fail unless the command exits successfully; returns stdout
pub fn run_checked(pod: &str, program: &str, args: &[String]) -> Result<String, ClusterError> {
    let output = run(program, args)?;
    if !output.status.success() {
        return Err(ClusterError::CommandFailed {
            pod: pod.to_string(),
            command: command_line(program, args),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
