//! Interactive conversation loop.
//!
//! One session holds the rolling message history, the exported tool
//! definitions and a dispatcher over the built catalog. A turn is: user
//! question in, chat completion, tool calls dispatched in the order the
//! model emitted them, one follow-up completion folding the results back.

use std::io::Write as _;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};

use futbot_mcp::{
    CallRecorder, Dispatcher, ToolCatalog, EVENT_CHAT_ERROR, EVENT_SESSION_END,
    EVENT_USER_QUESTION,
};

use crate::openai::{tool_definition, ChatClient, ChatMessage};

const SYSTEM_PROMPT: &str = "Eres un asistente especializado en información de fútbol. \
Tienes acceso a herramientas que te permiten consultar competiciones, equipos, partidos, \
goleadores y jugadores, además de herramientas auxiliares de ficheros y de git. \
Ejemplos de IDs de competiciones comunes: 'PL' (Premier League), 'CL' (Champions League), \
'SA' (Serie A), 'PD' (La Liga). \
Siempre usa las herramientas disponibles para obtener información real antes de responder.";

/// One line of user input, classified.
#[derive(Debug, PartialEq, Eq)]
pub enum UserInput {
    Quit,
    Empty,
    Prompt(String),
}

impl UserInput {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return UserInput::Empty;
        }
        let lowered = trimmed.to_lowercase();
        if matches!(lowered.as_str(), "salir" | "exit" | "quit") {
            return UserInput::Quit;
        }
        UserInput::Prompt(trimmed.to_string())
    }
}

pub struct ChatSession<'a> {
    client: &'a ChatClient,
    dispatcher: Dispatcher<'a>,
    recorder: &'a CallRecorder,
    tools: Vec<Value>,
    messages: Vec<ChatMessage>,
}

impl<'a> ChatSession<'a> {
    pub fn new(client: &'a ChatClient, catalog: &'a ToolCatalog, recorder: &'a CallRecorder) -> Self {
        let tools = catalog.descriptors().iter().map(tool_definition).collect();
        Self {
            client,
            dispatcher: Dispatcher::new(catalog, recorder),
            recorder,
            tools,
            messages: vec![ChatMessage::system(SYSTEM_PROMPT)],
        }
    }

    /// Run the loop until the user quits, stdin closes, or Ctrl-C arrives.
    pub async fn run(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("\nTú: ");
            std::io::stdout().flush().ok();

            let line = tokio::select! {
                line = lines.next_line() => line.context("failed to read input")?,
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    self.end_session("interrupt");
                    return Ok(());
                }
            };

            let Some(line) = line else {
                // stdin closed
                self.end_session("eof");
                return Ok(());
            };

            match UserInput::parse(&line) {
                UserInput::Empty => continue,
                UserInput::Quit => {
                    println!("¡Hasta pronto!");
                    self.end_session("quit");
                    return Ok(());
                }
                UserInput::Prompt(question) => {
                    if let Err(e) = self.turn(&question).await {
                        eprintln!("Error: {e:#}");
                        self.recorder.record_event(
                            EVENT_CHAT_ERROR,
                            serde_json::json!({"user_input": question}),
                            serde_json::json!({"error": format!("{e:#}")}),
                        );
                    }
                }
            }
        }
    }

    async fn turn(&mut self, question: &str) -> Result<()> {
        self.recorder.record_event(
            EVENT_USER_QUESTION,
            serde_json::json!({"question": question}),
            serde_json::json!({"status": "received"}),
        );
        self.messages.push(ChatMessage::user(question));

        let assistant = self
            .client
            .complete(&self.messages, Some(&self.tools))
            .await?;

        let Some(calls) = assistant.tool_calls.clone().filter(|c| !c.is_empty()) else {
            if let Some(content) = &assistant.content {
                println!("\n⚽ Asistente: {content}");
            }
            self.messages.push(assistant);
            return Ok(());
        };

        self.messages.push(assistant);
        for call in &calls {
            println!("→ Ejecutando herramienta: {}", call.function.name);

            let arguments = match serde_json::from_str::<Value>(&call.function.arguments) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(
                        tool = %call.function.name,
                        "unparseable tool arguments, passing empty object: {}",
                        e
                    );
                    serde_json::json!({})
                }
            };

            let result = self.dispatcher.dispatch(&call.function.name, arguments).await;
            let content = serde_json::to_string(&result.content)?;
            self.messages.push(ChatMessage::tool(
                call.id.clone(),
                call.function.name.clone(),
                content,
            ));
        }

        // Second pass without tools, so the model answers from the results.
        let reply = self.client.complete(&self.messages, None).await?;
        if let Some(content) = &reply.content {
            println!("\n⚽ Asistente: {content}");
        }
        self.messages.push(reply);
        Ok(())
    }

    fn end_session(&self, action: &str) {
        self.recorder.record_event(
            EVENT_SESSION_END,
            serde_json::json!({"user_action": action}),
            serde_json::json!({"message": "sesión terminada"}),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_words_are_case_insensitive() {
        assert_eq!(UserInput::parse("salir"), UserInput::Quit);
        assert_eq!(UserInput::parse("SALIR"), UserInput::Quit);
        assert_eq!(UserInput::parse("  Exit  "), UserInput::Quit);
        assert_eq!(UserInput::parse("quit"), UserInput::Quit);
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(UserInput::parse(""), UserInput::Empty);
        assert_eq!(UserInput::parse("   "), UserInput::Empty);
        assert_eq!(UserInput::parse("\t"), UserInput::Empty);
    }

    #[test]
    fn anything_else_is_a_prompt() {
        assert_eq!(
            UserInput::parse("¿Qué competiciones hay?"),
            UserInput::Prompt("¿Qué competiciones hay?".to_string())
        );
        // quit words inside a sentence do not quit
        assert_eq!(
            UserInput::parse("quiero salir de dudas"),
            UserInput::Prompt("quiero salir de dudas".to_string())
        );
    }
}
