use std::io::{self, Write};

use anyhow::Result;
use bat::WrappingMode;
use cliclack::spinner;
use console::style;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;

use super::{parse_input, Input, InputType, Prompt, HELP};
use bond::models::message::Message;
use bond::models::role::Role;
use bond::models::tool::ToolCall;

const PROMPT: &str = "\x1b[1m\x1b[38;5;30mbond> \x1b[0m";
const MAX_STRING_LENGTH: usize = 40;
const MAX_RESULT_LINES: usize = 20;
const INDENT: &str = "    ";

pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    fn bat_theme(&self) -> &'static str {
        match self {
            Theme::Light => "GitHub",
            Theme::Dark => "zenburn",
        }
    }
}

pub struct RustylinePrompt {
    editor: DefaultEditor,
    spinner: Option<cliclack::ProgressBar>,
    theme: Theme,
}

impl RustylinePrompt {
    pub fn new() -> Result<Self> {
        Ok(RustylinePrompt {
            editor: DefaultEditor::new()?,
            spinner: None,
            theme: Theme::Dark,
        })
    }
}

fn print_markdown(content: &str, theme: &str) {
    let printed = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(theme)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print();
    if printed.is_err() {
        println!("{}", content);
    }
}

fn print_tool_call(call: &ToolCall) {
    println!();
    println!(
        "─── {} | {} ──────────────────────────",
        style(&call.name),
        style(&call.id).magenta().dim(),
    );

    match (call.name.as_str(), call.arguments.get("command")) {
        ("bash", Some(Value::String(command))) => {
            println!("{}: {}", style("command").dim(), style(command).green());
        }
        _ => print_params(&call.arguments, 0),
    }
}

fn print_tool_result(content: &str) {
    if let Some(error) = content.strip_prefix("error: ") {
        println!("{} {}", style("error:").red().bold(), style(error).red());
        return;
    }

    let lines: Vec<&str> = content.lines().collect();
    for line in lines.iter().take(MAX_RESULT_LINES) {
        println!("{}", style(line).dim());
    }
    if lines.len() > MAX_RESULT_LINES {
        println!(
            "{}",
            style(format!("... {} more lines", lines.len() - MAX_RESULT_LINES)).dim()
        );
    }
}

/// Format and print parameters recursively with proper indentation and colors
fn print_params(value: &Value, depth: usize) {
    let indent = INDENT.repeat(depth);

    match value {
        Value::Object(map) => {
            for (key, val) in map {
                match val {
                    Value::Object(_) => {
                        println!("{}{}:", indent, style(key).dim());
                        print_params(val, depth + 1);
                    }
                    Value::Array(arr) => {
                        println!("{}{}:", indent, style(key).dim());
                        for item in arr.iter() {
                            println!("{}{}- ", indent, INDENT);
                            print_params(item, depth + 2);
                        }
                    }
                    Value::String(s) if s.len() > MAX_STRING_LENGTH => {
                        println!("{}{}: {}", indent, style(key).dim(), style("...").dim());
                    }
                    Value::String(s) => {
                        println!("{}{}: {}", indent, style(key).dim(), style(s).green());
                    }
                    Value::Number(n) => {
                        println!("{}{}: {}", indent, style(key).dim(), style(n).blue());
                    }
                    Value::Bool(b) => {
                        println!("{}{}: {}", indent, style(key).dim(), style(b).blue());
                    }
                    Value::Null => {
                        println!("{}{}: {}", indent, style(key).dim(), style("null").dim());
                    }
                }
            }
        }
        Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                println!("{}{}.", indent, i + 1);
                print_params(item, depth + 1);
            }
        }
        Value::String(s) if s.len() > MAX_STRING_LENGTH => {
            println!(
                "{}{}",
                indent,
                style(format!("[REDACTED: {} chars]", s.len())).yellow()
            );
        }
        Value::String(s) => println!("{}{}", indent, style(s).green()),
        Value::Number(n) => println!("{}{}", indent, style(n).yellow()),
        Value::Bool(b) => println!("{}{}", indent, style(b).yellow()),
        Value::Null => println!("{}{}", indent, style("null").dim()),
    }
}

impl Prompt for RustylinePrompt {
    fn render(&mut self, message: &Message) {
        match message.role {
            // the user already sees what they typed
            Role::User => return,
            Role::Assistant if message.has_tool_calls() => {
                for call in &message.tool_calls {
                    print_tool_call(call);
                }
            }
            Role::Assistant => {
                println!();
                print_markdown(message.text().unwrap_or_default(), self.theme.bat_theme());
            }
            Role::Tool => print_tool_result(message.text().unwrap_or_default()),
        }

        println!();
        let _ = io::stdout().flush();
    }

    fn render_notice(&mut self, text: &str) {
        println!("{}", style(text).dim());
    }

    fn render_error(&mut self, text: &str) {
        eprintln!("{} {}", style("Error:").red().bold(), text);
    }

    fn show_busy(&mut self) {
        let busy = spinner();
        busy.start("thinking...");
        self.spinner = Some(busy);
    }

    fn hide_busy(&mut self) {
        if let Some(busy) = self.spinner.take() {
            busy.stop("");
        }
    }

    fn get_input(&mut self) -> Result<Input> {
        let line = match self.editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                return Ok(Input {
                    input_type: InputType::Exit,
                    content: None,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let input = parse_input(&line);
        match input.input_type {
            InputType::Message => {
                let _ = self.editor.add_history_entry(line.trim());
                Ok(input)
            }
            InputType::Help => {
                println!("{}", HELP);
                Ok(Input {
                    input_type: InputType::AskAgain,
                    content: None,
                })
            }
            InputType::ToggleTheme => {
                self.theme = match self.theme {
                    Theme::Light => {
                        println!("Switching to Dark theme");
                        Theme::Dark
                    }
                    Theme::Dark => {
                        println!("Switching to Light theme");
                        Theme::Light
                    }
                };
                Ok(Input {
                    input_type: InputType::AskAgain,
                    content: None,
                })
            }
            _ => Ok(input),
        }
    }

    fn close(&self) {
        println!("Goodbye!");
    }
}
