use anyhow::{Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use stepkit::CommandOutput;

/// Run a command and capture output, whether or not it succeeded
pub fn output(cmd: &str, args: &[&str]) -> Result<CommandOutput> {
    log::debug!("Running {} {}", cmd, args.join(" "));
    let output = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;
    Ok(output.into())
}

/// Run a command and capture stdout, failing on a non-zero exit
pub fn run_capture(cmd: &str, args: &[&str]) -> Result<String> {
    let output = output(cmd, args)?;

    if output.success {
        Ok(output.stdout_str().trim().to_string())
    } else {
        anyhow::bail!("Command failed: {}", output.stderr_str().trim())
    }
}

/// Run a command with `input` written to its stdin
///
/// Used for anything sensitive: the input never appears in the process
/// argument list and is never logged.
pub fn run_with_input(cmd: &str, args: &[&str], input: &str) -> Result<CommandOutput> {
    log::debug!("Running {} {} (with stdin)", cmd, args.join(" "));
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .with_context(|| format!("Failed to write stdin of {cmd}"))?;
    }

    let output = child
        .wait_with_output()
        .with_context(|| format!("Failed to wait for {cmd}"))?;
    Ok(output.into())
}
