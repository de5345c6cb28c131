//! The user interface port.
//!
//! The orchestrator talks to the user only through [`UiPort`]. A question
//! suspends the caller until the user answers; notifications are
//! fire-and-forget.

use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// A button offered with a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Value returned in [`UserInput::button`].
    pub id: String,
    /// Text shown to the user.
    pub label: String,
}

/// A question for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub buttons: Vec<Button>,
    /// Button chosen when the user just confirms.
    pub default: Option<String>,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
            default: None,
        }
    }

    pub fn with_button(mut self, id: impl Into<String>, label: impl Into<String>) -> Self {
        self.buttons.push(Button {
            id: id.into(),
            label: label.into(),
        });
        self
    }

    pub fn with_default(mut self, id: impl Into<String>) -> Self {
        self.default = Some(id.into());
        self
    }

    /// Find the button matching a typed answer by id or label.
    pub fn match_button(&self, answer: &str) -> Option<&Button> {
        let answer = answer.trim();
        self.buttons.iter().find(|b| {
            b.id.eq_ignore_ascii_case(answer) || b.label.eq_ignore_ascii_case(answer)
        })
    }
}

/// The user's answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInput {
    /// Id of the chosen button, if any.
    pub button: Option<String>,
    /// Free text typed instead of choosing a button.
    pub text: Option<String>,
    /// The user dismissed the question.
    pub cancelled: bool,
}

impl UserInput {
    pub fn button(id: impl Into<String>) -> Self {
        Self {
            button: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Default::default()
        }
    }

    /// Whether the user chose the given button (and did not cancel).
    pub fn is_button(&self, id: &str) -> bool {
        !self.cancelled && self.button.as_deref() == Some(id)
    }
}

/// How prominent a notification is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// Interaction with the user.
#[async_trait]
pub trait UiPort: Send + Sync {
    /// Ask a question and wait for the answer.
    async fn ask_question(&self, question: &Question) -> CoreResult<UserInput>;

    /// Show a message without waiting for a reaction.
    async fn notify(&self, message: &str, severity: Severity);
}

/// A shared UI for dynamic dispatch.
pub type BoxedUi = Arc<dyn UiPort>;

type Input = Box<dyn AsyncBufRead + Send + Unpin>;
type Output = Box<dyn AsyncWrite + Send + Unpin>;

/// Plain text UI over a pair of streams (stdin/stdout by default).
pub struct ConsoleUi {
    input: Mutex<Input>,
    output: Mutex<Output>,
}

impl ConsoleUi {
    /// A console UI on the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }

    pub fn new(
        input: impl AsyncBufRead + Send + Unpin + 'static,
        output: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            input: Mutex::new(Box::new(input)),
            output: Mutex::new(Box::new(output)),
        }
    }

    async fn write(&self, text: &str) -> std::io::Result<()> {
        let mut output = self.output.lock().await;
        output.write_all(text.as_bytes()).await?;
        output.flush().await
    }
}

fn render(question: &Question) -> String {
    let mut text = format!("{}\n", question.text);
    for button in &question.buttons {
        let marker = if question.default.as_deref() == Some(button.id.as_str()) {
            " (default)"
        } else {
            ""
        };
        text.push_str(&format!("  [{}] {}{}\n", button.id, button.label, marker));
    }
    text.push_str("> ");
    text
}

#[async_trait]
impl UiPort for ConsoleUi {
    async fn ask_question(&self, question: &Question) -> CoreResult<UserInput> {
        self.write(&render(question))
            .await
            .map_err(|e| CoreError::ui(format!("failed to show question: {e}")))?;

        let mut line = String::new();
        let read = self
            .input
            .lock()
            .await
            .read_line(&mut line)
            .await
            .map_err(|e| CoreError::ui(format!("failed to read answer: {e}")))?;

        // End of input: nobody is there to answer.
        if read == 0 {
            return Ok(UserInput::cancelled());
        }

        let answer = line.trim();
        if answer.is_empty() {
            return Ok(match &question.default {
                Some(default) => UserInput::button(default.clone()),
                None => UserInput::text(""),
            });
        }

        Ok(match question.match_button(answer) {
            Some(button) => UserInput::button(button.id.clone()),
            None => UserInput::text(answer),
        })
    }

    async fn notify(&self, message: &str, severity: Severity) {
        let line = match severity {
            Severity::Info => format!("{message}\n"),
            _ => format!("[{severity}] {message}\n"),
        };
        if let Err(e) = self.write(&line).await {
            warn!(error = %e, "Failed to write notification");
        }
    }
}

/// Headless UI that answers every question the same way.
///
/// Without a fixed answer it picks the question's default, and cancels
/// questions that have none.
#[derive(Debug, Clone, Default)]
pub struct AutoUi {
    answer: Option<String>,
}

impl AutoUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always choose this button.
    pub fn answering(button: impl Into<String>) -> Self {
        Self {
            answer: Some(button.into()),
        }
    }
}

#[async_trait]
impl UiPort for AutoUi {
    async fn ask_question(&self, question: &Question) -> CoreResult<UserInput> {
        let input = match self.answer.as_ref().or(question.default.as_ref()) {
            Some(button) => UserInput::button(button.clone()),
            None => UserInput::cancelled(),
        };
        info!(question = %question.text, answer = ?input.button, "Answered question automatically");
        Ok(input)
    }

    async fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => info!(message = %message, "Notification"),
            Severity::Warning => warn!(message = %message, "Notification"),
            Severity::Error => error!(message = %message, "Notification"),
        }
    }
}
