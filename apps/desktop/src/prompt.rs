//! Terminal rendition of alerts, confirmations and notices.

use std::{
    io::{self, Write},
    sync::Arc,
};

use async_trait::async_trait;
use client_core::{Notice, UserPrompt};
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::Mutex,
};
use tracing::warn;

/// Stdin lines, shared by the command loop and the prompt.
pub type SharedInput = Arc<Mutex<Lines<BufReader<Stdin>>>>;

pub fn stdin_lines() -> SharedInput {
    Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()))
}

/// Reads the next line; `None` at end of input.
pub async fn read_line(input: &SharedInput) -> io::Result<Option<String>> {
    input.lock().await.next_line().await
}

pub fn print_flush(text: &str) {
    print!("{text}");
    let _ = io::stdout().flush();
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub struct TerminalPrompt {
    input: SharedInput,
}

impl TerminalPrompt {
    pub fn new(input: SharedInput) -> Self {
        Self { input }
    }
}

#[async_trait]
impl UserPrompt for TerminalPrompt {
    async fn alert(&self, message: &str) {
        println!();
        println!("!! {message}");
        print_flush("   (press Enter) ");
        if let Err(err) = read_line(&self.input).await {
            warn!(error = %err, "failed to read alert acknowledgement");
        }
    }

    async fn confirm(&self, question: &str) -> bool {
        print_flush(&format!("{question} [y/N] "));
        match read_line(&self.input).await {
            Ok(Some(answer)) => is_yes(&answer),
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "failed to read confirmation");
                false
            }
        }
    }

    fn notify(&self, notice: Notice) {
        eprintln!("[{} failed] {}", notice.context.label(), notice.message);
    }
}
