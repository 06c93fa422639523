use anyhow::{anyhow, bail, Result};
use bond::normalize::ToolOutput;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::shell::run_command;
use super::{number_arg, string_arg};

const PING_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn ping(arguments: Value) -> Result<ToolOutput> {
    let host = string_arg(&arguments, "host")?;
    let output = run_command("ping", &["-c", "5", host], PING_TIMEOUT).await?;
    Ok(output.into_result()?.into())
}

pub async fn echo(arguments: Value) -> Result<ToolOutput> {
    let message = string_arg(&arguments, "message")?;
    Ok(format!("Echo: {}", message).into())
}

pub async fn calculate(arguments: Value) -> Result<ToolOutput> {
    let operation = string_arg(&arguments, "operation")?;
    let a = number_arg(&arguments, "a")?;
    let b = number_arg(&arguments, "b")?;

    // Whole number operands stay exact unless the operation is a division
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        let exact = match operation {
            "add" => Some(x.checked_add(y)),
            "subtract" => Some(x.checked_sub(y)),
            "multiply" => Some(x.checked_mul(y)),
            _ => None,
        };
        if let Some(result) = exact {
            return result
                .map(ToolOutput::from)
                .ok_or_else(|| anyhow!("integer overflow in {} of {} and {}", operation, x, y));
        }
    }

    let (x, y) = (
        a.as_f64().unwrap_or_default(),
        b.as_f64().unwrap_or_default(),
    );
    let result = match operation {
        "add" => x + y,
        "subtract" => x - y,
        "multiply" => x * y,
        "divide" if y == 0.0 => f64::INFINITY,
        "divide" => x / y,
        other => bail!("Unsupported operation: {}", other),
    };
    Ok(result.into())
}

#[derive(Debug, Serialize)]
struct SystemInfo {
    os: &'static str,
    family: &'static str,
    architecture: &'static str,
    cpus: usize,
    agent_version: &'static str,
}

pub async fn get_system_info(_arguments: Value) -> Result<ToolOutput> {
    let info = SystemInfo {
        os: std::env::consts::OS,
        family: std::env::consts::FAMILY,
        architecture: std::env::consts::ARCH,
        cpus: std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        agent_version: env!("CARGO_PKG_VERSION"),
    };
    Ok(ToolOutput::json(&info)?)
}
