//! The tools Bond offers the model out of the box.
//!
//! `basic` holds self contained tools, `shell` wraps common Unix commands and `web` talks
//! to a search API. Every handler
//! receives arguments that already passed schema validation, the helpers below only turn
//! them into Rust types.
use anyhow::{anyhow, Result};
use bond::errors::RegistryError;
use bond::models::tool::Tool;
use bond::registry::ToolRegistry;
use serde_json::{json, Value};

pub mod basic;
pub mod shell;
pub mod web;

/// Build the registry with every built in tool, in a fixed order
pub fn builtin_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();

    registry.register(
        Tool::new(
            "ping",
            "Ping a host on the internet to check whether it is reachable",
            object_schema(json!({"host": string_prop("Hostname or IP address to ping")}), &["host"]),
        ),
        basic::ping,
    )?;
    registry.register(
        Tool::new(
            "echo",
            "Echo back a message",
            object_schema(json!({"message": string_prop("The message to echo")}), &["message"]),
        ),
        basic::echo,
    )?;
    registry.register(
        Tool::new(
            "calculate",
            "Perform a basic calculation on two numbers",
            object_schema(
                json!({
                    "operation": {
                        "type": "string",
                        "enum": ["add", "subtract", "multiply", "divide"],
                        "description": "Operation to perform"
                    },
                    "a": {"type": "number", "description": "First number"},
                    "b": {"type": "number", "description": "Second number"}
                }),
                &["operation", "a", "b"],
            ),
        ),
        basic::calculate,
    )?;
    registry.register(
        Tool::new(
            "get_system_info",
            "Get basic information about the machine Bond runs on",
            object_schema(json!({}), &[]),
        ),
        basic::get_system_info,
    )?;
    registry.register(
        Tool::new(
            "ls",
            "List directory contents",
            object_schema(
                json!({"path": string_prop("Directory to list, defaults to the current directory")}),
                &[],
            ),
        ),
        shell::ls,
    )?;
    registry.register(
        Tool::new("pwd", "Print the working directory", object_schema(json!({}), &[])),
        shell::pwd,
    )?;
    registry.register(
        Tool::new(
            "cat",
            "Display the contents of a file",
            object_schema(json!({"filepath": string_prop("Path to the file")}), &["filepath"]),
        ),
        shell::cat,
    )?;
    registry.register(
        Tool::new(
            "head",
            "Display the first lines of a file",
            object_schema(
                json!({
                    "filepath": string_prop("Path to the file"),
                    "lines": {"type": "integer", "minimum": 1, "description": "Number of lines, defaults to 10"}
                }),
                &["filepath"],
            ),
        ),
        shell::head,
    )?;
    registry.register(
        Tool::new(
            "tail",
            "Display the last lines of a file",
            object_schema(
                json!({
                    "filepath": string_prop("Path to the file"),
                    "lines": {"type": "integer", "minimum": 1, "description": "Number of lines, defaults to 10"}
                }),
                &["filepath"],
            ),
        ),
        shell::tail,
    )?;
    registry.register(
        Tool::new(
            "wc",
            "Count lines, words and characters in a file",
            object_schema(json!({"filepath": string_prop("Path to the file")}), &["filepath"]),
        ),
        shell::wc,
    )?;
    registry.register(
        Tool::new(
            "grep",
            "Search a file for lines matching a pattern",
            object_schema(
                json!({
                    "pattern": string_prop("Pattern to search for"),
                    "filepath": string_prop("File to search in")
                }),
                &["pattern", "filepath"],
            ),
        ),
        shell::grep,
    )?;
    registry.register(
        Tool::new(
            "find",
            "Find files under a directory whose name matches a pattern",
            object_schema(
                json!({
                    "path": string_prop("Directory to search in"),
                    "name_pattern": string_prop("File name pattern, defaults to *")
                }),
                &["path"],
            ),
        ),
        shell::find,
    )?;
    registry.register(
        Tool::new("whoami", "Display the current user", object_schema(json!({}), &[])),
        shell::whoami,
    )?;
    registry.register(
        Tool::new(
            "uname",
            "Display kernel and system information",
            object_schema(json!({}), &[]),
        ),
        shell::uname,
    )?;
    registry.register(
        Tool::new(
            "df",
            "Display disk space usage for all filesystems",
            object_schema(json!({}), &[]),
        ),
        shell::df,
    )?;
    registry.register(
        Tool::new("ps", "Display currently running processes", object_schema(json!({}), &[])),
        shell::ps,
    )?;
    registry.register(
        Tool::new("env", "Display environment variables", object_schema(json!({}), &[])),
        shell::env,
    )?;
    registry.register(
        Tool::new(
            "which",
            "Locate a command in the system PATH",
            object_schema(json!({"command": string_prop("Command name to locate")}), &["command"]),
        ),
        shell::which,
    )?;
    registry.register(
        Tool::new(
            "curl",
            "Fetch content from a URL",
            object_schema(
                json!({
                    "url": string_prop("URL to fetch"),
                    "options": string_prop("Additional curl options (e.g., '-I' for headers)")
                }),
                &["url"],
            ),
        ),
        shell::curl,
    )?;
    registry.register(
        Tool::new(
            "gh",
            "Execute GitHub CLI commands to interact with repositories, issues, PRs, releases, etc. \
             Common commands: 'repo view', 'issue list', 'pr list', 'pr status', 'release list', 'status'",
            object_schema(
                json!({"command": string_prop(
                    "GitHub CLI command without the 'gh' prefix, e.g. 'repo view', 'issue list', 'pr status'"
                )}),
                &["command"],
            ),
        ),
        shell::gh,
    )?;
    registry.register(
        Tool::new(
            "web_search",
            "Search the web with Google. Useful for finding commands, frameworks and solutions.",
            object_schema(
                json!({
                    "query": string_prop("Search query to find solutions, commands, or documentation"),
                    "num_results": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Number of top results to return (default: 3)"
                    }
                }),
                &["query"],
            ),
        ),
        web::web_search,
    )?;
    registry.register(
        Tool::new(
            "tree",
            "Display directory tree structure. Useful for visualizing project layout.",
            object_schema(
                json!({
                    "path": string_prop("Directory path to display (default: current directory)"),
                    "level": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Maximum depth to descend (e.g., 2 for 2 levels)"
                    },
                    "options": string_prop(
                        "Additional options: -a (all files), -d (dirs only), --gitignore, -I 'pattern'"
                    )
                }),
                &[],
            ),
        ),
        shell::tree,
    )?;
    registry.register(
        Tool::new(
            "bash",
            "Execute a bash command and return its output. Use with care.",
            object_schema(json!({"command": string_prop("The command to run")}), &["command"]),
        ),
        shell::bash,
    )?;

    Ok(registry)
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn string_prop(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

pub(crate) fn string_arg<'a>(arguments: &'a Value, name: &str) -> Result<&'a str> {
    optional_string_arg(arguments, name).ok_or_else(|| anyhow!("missing argument '{}'", name))
}

pub(crate) fn optional_string_arg<'a>(arguments: &'a Value, name: &str) -> Option<&'a str> {
    arguments.get(name).and_then(Value::as_str)
}

/// Integer arguments may arrive as whole floats such as `5.0`
pub(crate) fn optional_integer_arg(arguments: &Value, name: &str) -> Option<i64> {
    let value = arguments.get(name)?;
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
            .map(|f| f as i64)
    })
}

pub(crate) fn number_arg<'a>(arguments: &'a Value, name: &str) -> Result<&'a serde_json::Number> {
    match arguments.get(name) {
        Some(Value::Number(n)) => Ok(n),
        _ => Err(anyhow!("argument '{}' must be a number", name)),
    }
}
