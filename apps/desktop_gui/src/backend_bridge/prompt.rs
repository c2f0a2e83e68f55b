//! Alerts and confirmations as a round-trip to the UI thread.

use async_trait::async_trait;
use client_core::{Notice, UserPrompt};
use crossbeam_channel::Sender;
use tokio::sync::oneshot;
use tracing::warn;

use crate::controller::events::{UiError, UiEvent};

/// Forwards prompts to the UI and waits on a oneshot for the user's answer.
pub struct GuiPrompt {
    ui_tx: Sender<UiEvent>,
}

impl GuiPrompt {
    pub fn new(ui_tx: Sender<UiEvent>) -> Self {
        Self { ui_tx }
    }

    fn emit(&self, event: UiEvent) -> bool {
        match self.ui_tx.try_send(event) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "failed to deliver prompt to ui");
                false
            }
        }
    }
}

#[async_trait]
impl UserPrompt for GuiPrompt {
    async fn alert(&self, message: &str) {
        let (ack, acked) = oneshot::channel();
        if self.emit(UiEvent::Alert {
            message: message.to_string(),
            ack,
        }) {
            // Err means the window closed with the alert open.
            let _ = acked.await;
        }
    }

    async fn confirm(&self, question: &str) -> bool {
        let (reply, answer) = oneshot::channel();
        if !self.emit(UiEvent::ConfirmRequested {
            question: question.to_string(),
            reply,
        }) {
            return false;
        }
        answer.await.unwrap_or(false)
    }

    fn notify(&self, notice: Notice) {
        self.emit(UiEvent::Error(UiError::from_notice(&notice)));
    }
}
