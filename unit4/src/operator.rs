//! The human at the keyboard.
//!
//! Login, manual intervention and confirmations all block on an [`Operator`].
//! The driver never cancels on its own; an operator that answers "no" or
//! closes stdin is the only way a run stops early.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::Mutex;
use tracing::{debug, warn};

#[async_trait::async_trait]
pub trait Operator: Send + Sync {
    /// Show `message` and wait until the operator acknowledges it.
    async fn pause(&self, message: &str);

    /// Yes/no question; anything other than an explicit yes is no.
    async fn confirm(&self, question: &str) -> bool;

    /// Free-form answer; `None` when input is closed.
    async fn ask(&self, question: &str) -> Option<String>;
}

/// Reads answers from stdin on a blocking thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOperator;

impl ConsoleOperator {
    async fn read_line(prompt: String) -> Option<String> {
        let result = tokio::task::spawn_blocking(move || {
            print!("{prompt}");
            let _ = io::stdout().flush();
            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) => None,
                Ok(_) => Some(line.trim().to_string()),
                Err(e) => {
                    warn!("Failed to read from stdin: {}", e);
                    None
                }
            }
        })
        .await;
        result.unwrap_or_else(|e| {
            warn!("stdin reader task failed: {}", e);
            None
        })
    }
}

#[async_trait::async_trait]
impl Operator for ConsoleOperator {
    async fn pause(&self, message: &str) {
        println!();
        println!("{message}");
        if Self::read_line("Press Enter to continue... ".to_string())
            .await
            .is_none()
        {
            debug!("stdin closed; continuing without acknowledgement");
        }
    }

    async fn confirm(&self, question: &str) -> bool {
        let answer = Self::read_line(format!("{question} [y/N]: ")).await;
        matches!(
            answer.as_deref().map(str::to_lowercase).as_deref(),
            Some("y" | "yes" | "j" | "ja")
        )
    }

    async fn ask(&self, question: &str) -> Option<String> {
        Self::read_line(format!("{question}: ")).await
    }
}

/// Answers from a prepared script; for unattended runs and tests.
///
/// Pauses are recorded and return immediately. Once the scripted answers
/// run out, `ask` returns `None` and `confirm` falls back to the default.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: Mutex<VecDeque<String>>,
    confirm_default: bool,
    pauses: Mutex<Vec<String>>,
    questions: Mutex<Vec<String>>,
}

impl ScriptedOperator {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            confirm_default: true,
            ..Default::default()
        }
    }

    pub fn confirm_default(mut self, value: bool) -> Self {
        self.confirm_default = value;
        self
    }

    pub fn pauses(&self) -> Vec<String> {
        self.pauses.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().map(|q| q.clone()).unwrap_or_default()
    }

    fn next_answer(&self, question: &str) -> Option<String> {
        if let Ok(mut q) = self.questions.lock() {
            q.push(question.to_string());
        }
        self.answers.lock().ok().and_then(|mut a| a.pop_front())
    }
}

#[async_trait::async_trait]
impl Operator for ScriptedOperator {
    async fn pause(&self, message: &str) {
        debug!(message, "scripted pause");
        if let Ok(mut p) = self.pauses.lock() {
            p.push(message.to_string());
        }
    }

    async fn confirm(&self, question: &str) -> bool {
        match self.next_answer(question) {
            Some(answer) => matches!(answer.to_lowercase().as_str(), "y" | "yes" | "j" | "ja"),
            None => self.confirm_default,
        }
    }

    async fn ask(&self, question: &str) -> Option<String> {
        self.next_answer(question)
    }
}
