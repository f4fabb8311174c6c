use std::io::{self, Write};

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;

use super::Session;
use crate::chat::{MessageId, MessageUpdate, RenderSink, SettingsProvider, TurnOutcome};
use crate::openai::{Role, model_supports_temperature};

const HELP: &str = "Commands:
  /key <api key>        set the API key for this session
  /model <model>        switch model
  /temperature <value>  set the sampling temperature
  /system [prompt]      set the system prompt, empty to clear
  /history              print the transcript
  /quit                 exit
Ctrl-C while a reply is streaming stops it.";

/// Prints assistant replies to a terminal as they stream in.
///
/// Content updates carry the whole text so far. Only the part that
/// hasn't been printed yet is written; if the text no longer extends
/// what's on screen (an error replaced it) it's printed again on a new
/// line.
pub struct TerminalSink<W: Write> {
    out: W,
    current: Option<MessageId>,
    printed: String,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            current: None,
            printed: String::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_content(&mut self, content: &str) -> io::Result<()> {
        if let Some(rest) = content.strip_prefix(self.printed.as_str()) {
            self.out.write_all(rest.as_bytes())?;
        } else {
            writeln!(self.out)?;
            self.out.write_all(content.as_bytes())?;
        }
        self.printed = content.to_string();
        self.out.flush()
    }

    fn finish_message(&mut self, status: Option<&str>) -> io::Result<()> {
        match status {
            Some(status) if !status.is_empty() => writeln!(self.out, " [{}]", status)?,
            _ => writeln!(self.out)?,
        }
        self.current = None;
        self.printed.clear();
        self.out.flush()
    }

    fn apply(&mut self, update: MessageUpdate) -> io::Result<()> {
        if let Some(content) = &update.content {
            self.write_content(content)?;
        }
        if update.is_loading == Some(false) {
            self.finish_message(update.status.as_deref())?;
        }
        Ok(())
    }
}

impl<W: Write> RenderSink for TerminalSink<W> {
    fn create(&mut self, id: &MessageId, role: Role, update: MessageUpdate) {
        // The user's own message is already on screen
        if role != Role::Assistant {
            return;
        }
        self.current = Some(id.clone());
        self.printed.clear();
        if let Err(e) = self.apply(update) {
            tracing::error!("Failed to write to terminal: {}", e);
        }
    }

    fn update(&mut self, id: &MessageId, update: MessageUpdate) {
        if self.current.as_ref() != Some(id) {
            return;
        }
        if let Err(e) = self.apply(update) {
            tracing::error!("Failed to write to terminal: {}", e);
        }
    }
}

#[derive(Debug, PartialEq)]
enum ReplCommand<'a> {
    Key(&'a str),
    Model(&'a str),
    Temperature(&'a str),
    System(&'a str),
    History,
    Help,
    Quit,
    Unknown(&'a str),
    Message(&'a str),
}

fn parse_command(line: &str) -> ReplCommand<'_> {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return ReplCommand::Message(line);
    };
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map(|(name, arg)| (name, arg.trim()))
        .unwrap_or((command, ""));

    match name {
        "key" => ReplCommand::Key(arg),
        "model" => ReplCommand::Model(arg),
        "temperature" | "temp" => ReplCommand::Temperature(arg),
        "system" => ReplCommand::System(arg),
        "history" => ReplCommand::History,
        "help" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        _ => ReplCommand::Unknown(name),
    }
}

/// Sends one message, letting Ctrl-C cancel it while it streams.
async fn send_interruptible(session: &Session, line: &str) -> TurnOutcome {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let mut sink = TerminalSink::new(io::stdout());
    let outcome = session.send_with_cancel(line, &mut sink, &cancel).await;
    watcher.abort();
    outcome
}

pub async fn run(session: &Session) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    let config = session.settings().snapshot();
    println!("Chatting with {}. Type /help for commands.", config.model);
    if config.credential().is_none() {
        println!("No API key configured. Set OPENAI_API_KEY or use /key.");
    }

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }
                match parse_command(&line) {
                    ReplCommand::Key(key) => {
                        session.settings().set_api_key(key);
                        println!("API key updated for this session.");
                    }
                    ReplCommand::Model(model) if model.is_empty() => {
                        println!("Current model: {}", session.settings().snapshot().model);
                    }
                    ReplCommand::Model(model) => {
                        session.settings().set_model(model);
                        if !model_supports_temperature(model) {
                            println!("{} ignores temperature.", model);
                        }
                    }
                    ReplCommand::Temperature(input) => {
                        let value = session.settings().set_temperature(input);
                        println!("Temperature set to {}", value);
                        let model = session.settings().snapshot().model;
                        if !model_supports_temperature(&model) {
                            println!("Note: {} ignores temperature.", model);
                        }
                    }
                    ReplCommand::System(prompt) => {
                        session.settings().set_system_prompt(prompt).await?;
                        if prompt.is_empty() {
                            println!("System prompt cleared.");
                        } else {
                            println!("System prompt applied.");
                        }
                    }
                    ReplCommand::History => {
                        for msg in session.history().messages() {
                            let role = match msg.role {
                                Role::User => "You",
                                Role::Assistant => "Assistant",
                                Role::System => "System",
                            };
                            println!("{}: {}\n", role, msg.content);
                        }
                    }
                    ReplCommand::Help => println!("{}", HELP),
                    ReplCommand::Quit => break,
                    ReplCommand::Unknown(name) => {
                        println!("Unknown command /{}. Type /help for commands.", name)
                    }
                    ReplCommand::Message(text) => {
                        let outcome = send_interruptible(session, text).await;
                        tracing::debug!("Turn finished: {:?}", outcome);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
