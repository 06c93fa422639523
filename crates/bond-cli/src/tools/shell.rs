use anyhow::{anyhow, bail, Context, Result};
use bond::normalize::ToolOutput;
use serde_json::Value;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;

use super::{optional_integer_arg, optional_string_arg, string_arg};

const SHORT_TIMEOUT: Duration = Duration::from_secs(5);
const FILE_TIMEOUT: Duration = Duration::from_secs(10);
const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
const BASH_TIMEOUT: Duration = Duration::from_secs(60);

/// What a finished command printed, stdout followed by stderr
#[derive(Debug)]
pub struct CommandOutput {
    pub program: String,
    pub status: ExitStatus,
    pub text: String,
}

impl CommandOutput {
    /// The output text, or an error carrying it when the command failed
    pub fn into_result(self) -> Result<String> {
        if self.status.success() {
            return Ok(self.text);
        }
        let status = match self.status.code() {
            Some(code) => format!("exit status {}", code),
            None => "a signal".to_string(),
        };
        let detail = self.text.trim();
        if detail.is_empty() {
            bail!("{} failed with {}", self.program, status)
        }
        bail!("{} failed with {}: {}", self.program, status, detail)
    }
}

/// Run a program to completion, killing it once `timeout` has passed
pub async fn run_command(program: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    tracing::debug!(program, ?args, "running command");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to run {}", program))?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| anyhow!("{} timed out after {:?}", program, timeout))?
        .with_context(|| format!("failed to read output of {}", program))?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(CommandOutput {
        program: program.to_string(),
        status: output.status,
        text,
    })
}

async fn run(program: &str, args: &[&str], timeout: Duration) -> Result<ToolOutput> {
    let text = run_command(program, args, timeout).await?.into_result()?;
    Ok(text.into())
}

pub async fn ls(arguments: Value) -> Result<ToolOutput> {
    let path = optional_string_arg(&arguments, "path").unwrap_or(".");
    run("ls", &["-lah", path], FILE_TIMEOUT).await
}

pub async fn pwd(_arguments: Value) -> Result<ToolOutput> {
    let dir = std::env::current_dir().context("failed to read the working directory")?;
    Ok(dir.display().to_string().into())
}

pub async fn cat(arguments: Value) -> Result<ToolOutput> {
    let filepath = string_arg(&arguments, "filepath")?;
    run("cat", &[filepath], FILE_TIMEOUT).await
}

/// `-nN` for head and tail. A negative count means "all but the last N" to GNU head,
/// so counts below one are raised to one.
fn line_count_flag(arguments: &Value) -> String {
    let lines = optional_integer_arg(arguments, "lines").unwrap_or(10).max(1);
    format!("-n{}", lines)
}

pub async fn head(arguments: Value) -> Result<ToolOutput> {
    let filepath = string_arg(&arguments, "filepath")?;
    let lines = line_count_flag(&arguments);
    run("head", &[lines.as_str(), filepath], FILE_TIMEOUT).await
}

pub async fn tail(arguments: Value) -> Result<ToolOutput> {
    let filepath = string_arg(&arguments, "filepath")?;
    let lines = line_count_flag(&arguments);
    run("tail", &[lines.as_str(), filepath], FILE_TIMEOUT).await
}

pub async fn wc(arguments: Value) -> Result<ToolOutput> {
    let filepath = string_arg(&arguments, "filepath")?;
    run("wc", &[filepath], FILE_TIMEOUT).await
}

pub async fn grep(arguments: Value) -> Result<ToolOutput> {
    let pattern = string_arg(&arguments, "pattern")?;
    let filepath = string_arg(&arguments, "filepath")?;
    let output = run_command("grep", &["-n", pattern, filepath], FILE_TIMEOUT).await?;

    // grep exits with 1 when nothing matched, which is not a failure here
    if output.status.code() == Some(1) && output.text.trim().is_empty() {
        return Ok("No matches found".into());
    }
    Ok(output.into_result()?.into())
}

pub async fn find(arguments: Value) -> Result<ToolOutput> {
    let path = string_arg(&arguments, "path")?;
    let name_pattern = optional_string_arg(&arguments, "name_pattern").unwrap_or("*");
    run("find", &[path, "-name", name_pattern], SEARCH_TIMEOUT).await
}

pub async fn whoami(_arguments: Value) -> Result<ToolOutput> {
    let text = run_command("whoami", &[], SHORT_TIMEOUT).await?.into_result()?;
    Ok(text.trim().into())
}

pub async fn uname(_arguments: Value) -> Result<ToolOutput> {
    let text = run_command("uname", &["-a"], SHORT_TIMEOUT).await?.into_result()?;
    Ok(text.trim().into())
}

pub async fn df(_arguments: Value) -> Result<ToolOutput> {
    run("df", &["-h"], FILE_TIMEOUT).await
}

pub async fn ps(_arguments: Value) -> Result<ToolOutput> {
    run("ps", &["aux"], FILE_TIMEOUT).await
}

pub async fn env(_arguments: Value) -> Result<ToolOutput> {
    run("env", &[], SHORT_TIMEOUT).await
}

pub async fn which(arguments: Value) -> Result<ToolOutput> {
    let command = string_arg(&arguments, "command")?;
    let output = run_command("which", &[command], SHORT_TIMEOUT).await?;

    if output.text.trim().is_empty() {
        return Ok(format!("command not found: {}", command).into());
    }
    Ok(output.into_result()?.trim().into())
}

pub async fn curl(arguments: Value) -> Result<ToolOutput> {
    let url = string_arg(&arguments, "url")?;
    let mut args = vec!["-sS"];
    args.extend(optional_string_arg(&arguments, "options").unwrap_or_default().split_whitespace());
    args.push(url);
    run("curl", &args, SEARCH_TIMEOUT).await
}

pub async fn gh(arguments: Value) -> Result<ToolOutput> {
    let command = string_arg(&arguments, "command")?;
    let args: Vec<&str> = command.split_whitespace().collect();
    run("gh", &args, BASH_TIMEOUT).await
}

pub async fn tree(arguments: Value) -> Result<ToolOutput> {
    let path = optional_string_arg(&arguments, "path").unwrap_or(".");
    let level = optional_integer_arg(&arguments, "level").map(|level| level.max(1).to_string());

    let mut args = Vec::new();
    if let Some(level) = level.as_deref() {
        args.extend(["-L", level]);
    }
    args.extend(optional_string_arg(&arguments, "options").unwrap_or_default().split_whitespace());
    args.push(path);
    run("tree", &args, SEARCH_TIMEOUT).await
}

pub async fn bash(arguments: Value) -> Result<ToolOutput> {
    let command = string_arg(&arguments, "command")?;
    run("bash", &["-c", command], BASH_TIMEOUT).await
}
