//! Worker thread owning the controller; bridges the UI command queue and the
//! session notifications into UI events.

use std::{sync::Arc, thread};

use client_core::{
    open_backends, ActionOutcome, ControllerError, CrmController, LaunchOptions,
};
use crossbeam_channel::Sender;
use shared::domain::Identity;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info, warn};

use crate::backend_bridge::{commands::BackendCommand, prompt::GuiPrompt};
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

enum Step {
    Command(Option<BackendCommand>),
    Session(Option<Option<Identity>>),
}

pub fn launch(
    options: LaunchOptions,
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let _ = ui_tx.try_send(UiEvent::Info("Backend worker starting...".to_string()));
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(run_worker(options, cmd_rx, ui_tx));
    })
}

/// Runs until the UI drops its command sender.
pub async fn run_worker(
    options: LaunchOptions,
    mut cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) {
    let backends = match open_backends(&options).await {
        Ok(backends) => backends,
        Err(err) => {
            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                UiErrorContext::BackendStartup,
                format!("backend worker startup failure: {err:#}"),
            )));
            error!(error = %format!("{err:#}"), "failed to open backends");
            return;
        }
    };

    let prompt = Arc::new(GuiPrompt::new(ui_tx.clone()));
    let mut controller = CrmController::new(backends.auth, backends.records, prompt);
    controller.start();
    info!(backend = %options.backend, "backend worker ready");
    let _ = ui_tx.try_send(UiEvent::Ready);
    publish_state(&ui_tx, &controller, false);

    loop {
        let step = tokio::select! {
            command = cmd_rx.recv() => Step::Command(command),
            change = controller.next_session_change() => Step::Session(change),
        };

        match step {
            Step::Command(Some(command)) => {
                let name = command.name();
                match run_command(&mut controller, command).await {
                    Ok(outcome) => debug!(command = name, ?outcome, "command finished"),
                    // Already surfaced to the user through the prompt.
                    Err(err) => debug!(command = name, error = %err, "command failed"),
                }
                publish_state(&ui_tx, &controller, true);
            }
            Step::Command(None) => break,
            Step::Session(Some(identity)) => {
                if let Err(err) = controller.apply_session_change(identity).await {
                    debug!(error = %err, "refresh after session change failed");
                }
                publish_state(&ui_tx, &controller, false);
            }
            Step::Session(None) => {
                warn!("session provider closed");
                break;
            }
        }
    }

    controller.shutdown();
    info!("backend worker stopped");
}

pub async fn run_command(
    controller: &mut CrmController,
    command: BackendCommand,
) -> Result<ActionOutcome, ControllerError> {
    match command {
        BackendCommand::SignUp { email, password } => {
            controller.set_email(email);
            controller.set_password(password);
            controller.sign_up().await
        }
        BackendCommand::SignIn { email, password } => {
            controller.set_email(email);
            controller.set_password(password);
            controller.sign_in().await
        }
        BackendCommand::SignOut => controller.sign_out().await,
        BackendCommand::AddCustomer { name } => {
            controller.set_customer_name(name);
            controller.add_customer().await
        }
        BackendCommand::DeleteCustomer { id } => controller.delete_customer(&id).await,
        BackendCommand::Refresh => controller
            .refresh()
            .await
            .map(|()| ActionOutcome::Completed),
    }
}

fn publish_state(ui_tx: &Sender<UiEvent>, controller: &CrmController, after_command: bool) {
    let event = UiEvent::StateChanged {
        snapshot: controller.snapshot(),
        after_command,
    };
    if let Err(err) = ui_tx.try_send(event) {
        warn!(error = %err, "failed to publish controller state");
    }
}
