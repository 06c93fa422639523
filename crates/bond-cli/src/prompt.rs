use anyhow::Result;
use bond::models::message::Message;
use bond::models::role::Role;
use bond::models::tool::Tool;

pub mod rustyline;

pub trait Prompt {
    fn render(&mut self, message: &Message);
    fn render_notice(&mut self, text: &str);
    fn render_error(&mut self, text: &str);
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    fn close(&self);
    fn ready(&self) {
        println!();
        println!("Bond is ready. Ask for something, type /help for commands or /exit to quit.");
        println!();
    }
}

#[derive(Debug, PartialEq)]
pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Only set for messages
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    AskAgain, // Nothing to do, ask the user for input again
    Message,  // User sent a message
    Exit,     // User wants to exit the session
    Help,
    Reset,
    Context,
    Tools,
    ToggleTheme,
}

impl Input {
    fn command(input_type: InputType) -> Self {
        Input {
            input_type,
            content: None,
        }
    }
}

/// Classify one line typed at the prompt
pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::command(InputType::AskAgain);
    }

    match line.to_ascii_lowercase().as_str() {
        "/exit" | "/quit" => Input::command(InputType::Exit),
        "/help" | "/?" => Input::command(InputType::Help),
        "/reset" => Input::command(InputType::Reset),
        "/context" => Input::command(InputType::Context),
        "/tools" => Input::command(InputType::Tools),
        "/t" => Input::command(InputType::ToggleTheme),
        _ => Input {
            input_type: InputType::Message,
            content: Some(line.to_string()),
        },
    }
}

pub const HELP: &str = "\
Commands:
  /help      - Show this help message
  /exit      - Exit the session (also /quit)
  /reset     - Clear the conversation context
  /context   - Show the conversation history
  /tools     - List the tools Bond can use
  /t         - Toggle Light/Dark theme
  Ctrl+C     - Interrupt Bond, the conversation goes back to before the last message";

/// Numbered listing of a conversation, one line per message
pub fn format_context(messages: &[Message]) -> String {
    if messages.is_empty() {
        return "(the conversation is empty)".to_string();
    }

    messages
        .iter()
        .enumerate()
        .map(|(i, message)| {
            let body = match message.role {
                Role::Assistant if message.has_tool_calls() => message
                    .tool_calls
                    .iter()
                    .map(|call| format!("{}({})", call.name, call.arguments))
                    .collect::<Vec<_>>()
                    .join(", "),
                Role::Tool => format!(
                    "({}) {}",
                    message.tool_call_id.as_deref().unwrap_or("?"),
                    message.text().unwrap_or_default()
                ),
                _ => message.text().unwrap_or_default().to_string(),
            };
            format!("{}. [{}] {}", i + 1, message.role, body)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_tools(tools: &[Tool]) -> String {
    let width = tools.iter().map(|tool| tool.name.len()).max().unwrap_or(0);
    tools
        .iter()
        .map(|tool| format!("  {:width$}  {}", tool.name, tool.description, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}
