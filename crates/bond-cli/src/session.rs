use anyhow::Result;
use std::path::PathBuf;

use crate::prompt::{format_context, format_tools, InputType, Prompt};
use bond::agent::Agent;
use bond::errors::{AgentError, AgentResult};
use bond::store::MessageStore;

pub mod session_file;

use session_file::{persist_messages, read_messages};

pub struct Session<'a> {
    agent: Agent,
    store: MessageStore,
    prompt: Box<dyn Prompt + 'a>,
    session_file: PathBuf,
}

impl<'a> Session<'a> {
    pub fn new(agent: Agent, prompt: Box<impl Prompt + 'a>, session_file: PathBuf) -> Self {
        Session {
            agent,
            store: MessageStore::new(),
            prompt,
            session_file,
        }
    }

    /// Continue a conversation recorded in an earlier session file
    pub fn resume(agent: Agent, prompt: Box<impl Prompt + 'a>, session_file: PathBuf) -> Result<Self> {
        let history = read_messages(&session_file)?;
        tracing::info!(messages = history.len(), "resuming session");
        Ok(Session {
            agent,
            store: MessageStore::from(history),
            prompt,
            session_file,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        self.setup_session();

        loop {
            let input = self.prompt.get_input()?;
            match input.input_type {
                InputType::Message => {
                    if let Some(content) = input.content {
                        self.process_turn(&content).await;
                    }
                }
                InputType::Reset => {
                    self.store.reset();
                    self.persist();
                    self.prompt.render_notice("Conversation cleared.");
                }
                InputType::Context => {
                    let context = format_context(&self.store.snapshot());
                    self.prompt.render_notice(&context);
                }
                InputType::Tools => {
                    let tools = format_tools(&self.agent.registry().export_schemas());
                    self.prompt.render_notice(&tools);
                }
                InputType::Exit => break,
                // handled by the prompt itself
                InputType::AskAgain | InputType::Help | InputType::ToggleTheme => continue,
            }
        }

        self.close_session();
        Ok(())
    }

    /// Run a single turn without user interaction and return the answer
    pub async fn headless_start(&mut self, text: &str) -> Result<String> {
        tracing::info!(session_file = %self.session_file.display(), "starting headless turn");

        let result = self.agent.process(&mut self.store, text).await;
        self.persist();
        Ok(result?)
    }

    async fn process_turn(&mut self, text: &str) {
        let before = self.store.len();

        self.prompt.show_busy();
        let outcome: Option<AgentResult<String>> = tokio::select! {
            result = self.agent.process(&mut self.store, text) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };
        self.prompt.hide_busy();

        // the user message is already on screen
        for message in self.store.messages().iter().skip(before + 1) {
            self.prompt.render(message);
        }

        match outcome {
            Some(Ok(_)) => self.persist(),
            Some(Err(e @ AgentError::LoopLimitExceeded { .. })) => {
                self.persist();
                self.prompt.render_error(&e.to_string());
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "turn failed");
                self.prompt.render_error(&e.to_string());
            }
            None => {
                self.prompt.render_notice(
                    "Interrupt: the conversation is back to before the last sent message.",
                );
            }
        }
    }

    fn persist(&mut self) {
        if let Err(e) = persist_messages(&self.session_file, self.store.messages()) {
            self.prompt
                .render_error(&format!("Failed to persist messages: {}", e));
        }
    }

    fn setup_session(&mut self) {
        self.prompt.render_notice(&format!(
            "Starting session. Recording to {}",
            self.session_file.display()
        ));
        self.prompt.render_notice(&format!(
            "{} tools available, /tools lists them.",
            self.agent.registry().len()
        ));
        self.prompt.ready();
    }

    fn close_session(&mut self) {
        self.prompt.render_notice(&format!(
            "Closing session. Recorded to {}",
            self.session_file.display()
        ));
        self.prompt.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{parse_input, Input};
    use bond::agent::AgentConfig;
    use bond::dispatcher::ToolDispatcher;
    use bond::models::message::Message;
    use bond::models::role::Role;
    use bond::models::tool::{Tool, ToolCall};
    use bond::normalize::ToolOutput;
    use bond::providers::base::ModelResponse;
    use bond::providers::mock::MockProvider;
    use bond::registry::ToolRegistry;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Feeds canned lines to the session and records everything it shows
    struct ScriptedPrompt {
        lines: VecDeque<String>,
        shown: Rc<RefCell<Vec<String>>>,
    }

    impl ScriptedPrompt {
        fn new(lines: &[&str], shown: Rc<RefCell<Vec<String>>>) -> Self {
            Self {
                lines: lines.iter().map(|l| l.to_string()).collect(),
                shown,
            }
        }
    }

    impl Prompt for ScriptedPrompt {
        fn render(&mut self, message: &Message) {
            let text = match message.role {
                Role::Assistant if message.has_tool_calls() => format!(
                    "call {}",
                    message.tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(",")
                ),
                _ => message.text().unwrap_or_default().to_string(),
            };
            self.shown.borrow_mut().push(format!("{}: {}", message.role, text));
        }

        fn render_notice(&mut self, text: &str) {
            self.shown.borrow_mut().push(format!("notice: {}", text));
        }

        fn render_error(&mut self, text: &str) {
            self.shown.borrow_mut().push(format!("error: {}", text));
        }

        fn get_input(&mut self) -> Result<Input> {
            Ok(match self.lines.pop_front() {
                Some(line) => parse_input(&line),
                None => parse_input("/exit"),
            })
        }

        fn show_busy(&mut self) {}
        fn hide_busy(&mut self) {}
        fn close(&self) {}
        fn ready(&self) {}
    }

    async fn echo(arguments: Value) -> Result<ToolOutput> {
        Ok(format!("Echo: {}", arguments["message"].as_str().unwrap_or_default()).into())
    }

    fn agent(provider: MockProvider, max_tool_iterations: usize) -> Result<Agent> {
        let mut registry = ToolRegistry::new();
        registry.register(
            Tool::new(
                "echo",
                "Echo back a message",
                json!({
                    "type": "object",
                    "properties": {"message": {"type": "string"}},
                    "required": ["message"]
                }),
            ),
            echo,
        )?;
        Ok(Agent::new(
            Box::new(provider),
            ToolDispatcher::new(Arc::new(registry)),
            AgentConfig {
                max_tool_iterations,
                ..AgentConfig::default()
            },
        ))
    }

    fn echo_call(id: &str) -> ModelResponse {
        ModelResponse::tool_calls(vec![ToolCall::new(id, "echo", json!({"message": "hi"}))])
    }

    #[tokio::test]
    async fn test_session_renders_and_persists_turn() -> Result<()> {
        let dir = TempDir::new()?;
        let file = dir.path().join("session.jsonl");
        let shown = Rc::new(RefCell::new(Vec::new()));
        let prompt = ScriptedPrompt::new(&["say hi", "/exit"], shown.clone());
        let provider = MockProvider::new(vec![echo_call("call_1"), ModelResponse::text("done")]);
        let agent = agent(provider, 20)?;

        let mut session = Session::new(agent, Box::new(prompt), file.clone());
        session.start().await?;

        let shown = shown.borrow();
        assert!(shown.contains(&"assistant: call echo".to_string()));
        assert!(shown.contains(&"tool: Echo: hi".to_string()));
        assert!(shown.contains(&"assistant: done".to_string()));

        let saved = read_messages(&file)?;
        assert_eq!(saved.len(), 4);
        assert_eq!(saved, session.store.snapshot());
        Ok(())
    }

    #[tokio::test]
    async fn test_session_reset_and_context() -> Result<()> {
        let dir = TempDir::new()?;
        let file = dir.path().join("session.jsonl");
        let shown = Rc::new(RefCell::new(Vec::new()));
        let prompt = ScriptedPrompt::new(&["hello", "/reset", "/context"], shown.clone());
        let provider = MockProvider::new(vec![ModelResponse::text("hi there")]);
        let agent = agent(provider, 20)?;

        let mut session = Session::new(agent, Box::new(prompt), file.clone());
        session.start().await?;

        assert!(session.store.is_empty());
        assert!(read_messages(&file)?.is_empty());
        assert!(shown
            .borrow()
            .contains(&"notice: (the conversation is empty)".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_session_reports_provider_error() -> Result<()> {
        let dir = TempDir::new()?;
        let file = dir.path().join("session.jsonl");
        let shown = Rc::new(RefCell::new(Vec::new()));
        let prompt = ScriptedPrompt::new(&["hello"], shown.clone());
        let agent = agent(MockProvider::new(vec![]).then_fail("model unavailable"), 20)?;

        let mut session = Session::new(agent, Box::new(prompt), file.clone());
        session.start().await?;

        assert!(session.store.is_empty());
        assert!(shown.borrow().contains(&"error: model unavailable".to_string()));
        // nothing was committed, so nothing was written
        assert!(!file.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_session_keeps_transcript_at_loop_limit() -> Result<()> {
        let dir = TempDir::new()?;
        let file = dir.path().join("session.jsonl");
        let shown = Rc::new(RefCell::new(Vec::new()));
        let prompt = ScriptedPrompt::new(&["loop"], shown.clone());
        let provider = MockProvider::new(vec![echo_call("call_1"), echo_call("call_2")]);
        let agent = agent(provider, 1)?;

        let mut session = Session::new(agent, Box::new(prompt), file.clone());
        session.start().await?;

        // user, one tool round, nothing for the refused second round
        assert_eq!(session.store.len(), 3);
        assert_eq!(read_messages(&file)?.len(), 3);
        assert!(shown
            .borrow()
            .iter()
            .any(|line| line.starts_with("error: model kept requesting tools")));
        Ok(())
    }

    #[tokio::test]
    async fn test_session_lists_tools() -> Result<()> {
        let dir = TempDir::new()?;
        let shown = Rc::new(RefCell::new(Vec::new()));
        let prompt = ScriptedPrompt::new(&["/tools"], shown.clone());

        let agent = agent(MockProvider::new(vec![]), 20)?;

        let mut session = Session::new(agent, Box::new(prompt), dir.path().join("s.jsonl"));
        session.start().await?;

        assert!(shown
            .borrow()
            .contains(&"notice:   echo  Echo back a message".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_resume_continues_recorded_conversation() -> Result<()> {
        let dir = TempDir::new()?;
        let file = dir.path().join("session.jsonl");
        session_file::persist_messages(
            &file,
            &[
                Message::user().with_text("my name is Ada"),
                Message::assistant().with_text("Hello Ada"),
            ],
        )?;
        let prompt = ScriptedPrompt::new(&[], Rc::new(RefCell::new(Vec::new())));
        let provider = MockProvider::new(vec![ModelResponse::text("You are Ada")]);
        let agent = agent(provider, 20)?;

        let mut session = Session::resume(agent, Box::new(prompt), file.clone())?;
        assert_eq!(session.store.len(), 2);

        session.headless_start("who am I?").await?;
        let saved = read_messages(&file)?;
        assert_eq!(saved.len(), 4);
        assert_eq!(saved[3].text(), Some("You are Ada"));
        Ok(())
    }

    #[tokio::test]
    async fn test_headless_start() -> Result<()> {
        let dir = TempDir::new()?;
        let file = dir.path().join("session.jsonl");
        let prompt = ScriptedPrompt::new(&[], Rc::new(RefCell::new(Vec::new())));
        let provider =
            MockProvider::new(vec![echo_call("call_1"), ModelResponse::text("It said hi")]);
        let agent = agent(provider, 20)?;

        let mut session = Session::new(agent, Box::new(prompt), file.clone());
        let answer = session.headless_start("echo hi").await?;

        assert_eq!(answer, "It said hi");
        assert_eq!(read_messages(&file)?.len(), 4);
        Ok(())
    }
}
