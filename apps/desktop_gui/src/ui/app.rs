use std::collections::VecDeque;

use client_core::ControllerSnapshot;
use crossbeam_channel::Receiver;
use eframe::egui;
use shared::domain::CustomerId;
use tokio::sync::{mpsc::Sender, oneshot};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::{
    events::{err_label, UiError, UiErrorContext, UiEvent},
    orchestration::dispatch_backend_command,
};

/// Error shown above the current screen until dismissed.
#[derive(Debug, Clone)]
struct StatusBanner {
    message: String,
}

impl From<&UiError> for StatusBanner {
    fn from(err: &UiError) -> Self {
        Self {
            message: format!("{} error: {}", err_label(err.category()), err.message()),
        }
    }
}

/// A modal question from the worker. The sender is taken when answered.
enum Dialog {
    Alert {
        message: String,
        ack: Option<oneshot::Sender<()>>,
    },
    Confirm {
        question: String,
        reply: Option<oneshot::Sender<bool>>,
    },
}

impl Dialog {
    fn resolve(mut self, accepted: bool) {
        match &mut self {
            Self::Alert { ack, .. } => {
                if let Some(ack) = ack.take() {
                    let _ = ack.send(());
                }
            }
            Self::Confirm { reply, .. } => {
                if let Some(reply) = reply.take() {
                    let _ = reply.send(accepted);
                }
            }
        }
    }
}

pub struct CrmApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    snapshot: ControllerSnapshot,
    email: String,
    password: String,
    customer_name: String,
    status: String,
    status_banner: Option<StatusBanner>,
    dialogs: VecDeque<Dialog>,
    busy: bool,
    backend_ready: bool,
}

impl CrmApp {
    pub fn new(cmd_tx: Sender<BackendCommand>, ui_rx: Receiver<UiEvent>) -> Self {
        Self {
            cmd_tx,
            ui_rx,
            snapshot: ControllerSnapshot::default(),
            email: String::new(),
            password: String::new(),
            customer_name: String::new(),
            status: "Starting backend...".to_string(),
            status_banner: None,
            dialogs: VecDeque::new(),
            busy: false,
            backend_ready: false,
        }
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Ready => {
                    self.backend_ready = true;
                    self.status = "Ready".to_string();
                }
                UiEvent::Info(message) => {
                    self.status = message;
                }
                UiEvent::StateChanged {
                    snapshot,
                    after_command,
                } => {
                    if after_command {
                        self.email = snapshot.email.clone();
                        self.password = snapshot.password.clone();
                        self.customer_name = snapshot.customer_name.clone();
                        self.busy = false;
                    }
                    match (&self.snapshot.identity, &snapshot.identity) {
                        (None, Some(identity)) => {
                            self.status = format!("Signed in as {}", identity.email);
                            self.status_banner = None;
                        }
                        (Some(_), None) => self.status = "Signed out".to_string(),
                        _ => {}
                    }
                    self.snapshot = snapshot;
                }
                UiEvent::Alert { message, ack } => {
                    self.dialogs.push_back(Dialog::Alert {
                        message,
                        ack: Some(ack),
                    });
                }
                UiEvent::ConfirmRequested { question, reply } => {
                    self.dialogs.push_back(Dialog::Confirm {
                        question,
                        reply: Some(reply),
                    });
                }
                UiEvent::Error(err) => {
                    if err.context() == UiErrorContext::BackendStartup {
                        self.backend_ready = false;
                        self.busy = false;
                    }
                    tracing::warn!(
                        category = err_label(err.category()),
                        context = ?err.context(),
                        "{}",
                        err.message()
                    );
                    self.status = err.message().to_string();
                    self.status_banner = Some(StatusBanner::from(&err));
                }
            }
        }
    }

    fn can_dispatch(&self) -> bool {
        self.backend_ready && !self.busy && self.dialogs.is_empty()
    }

    fn dispatch(&mut self, cmd: BackendCommand) {
        if !self.can_dispatch() {
            return;
        }
        if dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status) {
            self.busy = true;
        } else {
            let err = UiError::from_message(UiErrorContext::General, self.status.clone());
            self.status_banner = Some(StatusBanner::from(&err));
        }
    }

    fn resolve_dialog(&mut self, accepted: bool) {
        if let Some(dialog) = self.dialogs.pop_front() {
            dialog.resolve(accepted);
        }
    }

    fn sign_up(&mut self) {
        self.dispatch(BackendCommand::SignUp {
            email: self.email.clone(),
            password: self.password.clone(),
        });
    }

    fn sign_in(&mut self) {
        self.dispatch(BackendCommand::SignIn {
            email: self.email.clone(),
            password: self.password.clone(),
        });
    }

    fn add_customer(&mut self) {
        self.dispatch(BackendCommand::AddCustomer {
            name: self.customer_name.clone(),
        });
    }

    fn show_status_banner(&mut self, ui: &mut egui::Ui) {
        if let Some(banner) = self.status_banner.clone() {
            egui::Frame::NONE
                .fill(egui::Color32::from_rgb(111, 53, 53))
                .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(175, 96, 96)))
                .corner_radius(8.0)
                .inner_margin(egui::Margin::symmetric(10, 8))
                .show(ui, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        ui.label(egui::RichText::new(&banner.message).color(egui::Color32::WHITE));
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.button("Dismiss").clicked() {
                                self.status_banner = None;
                            }
                        });
                    });
                });
        }
    }

    fn text_field(
        ui: &mut egui::Ui,
        id: &'static str,
        label: &str,
        hint: &str,
        value: &mut String,
        password: bool,
    ) -> egui::Response {
        ui.label(egui::RichText::new(label).strong());
        let edit = egui::TextEdit::singleline(value)
            .id_salt(id)
            .password(password)
            .hint_text(
                egui::RichText::new(hint)
                    .color(ui.visuals().weak_text_color().gamma_multiply(0.85)),
            )
            .desired_width(f32::INFINITY);
        ui.add_sized([ui.available_width(), 34.0], edit)
    }

    fn show_login_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let avail = ui.available_size();
            let card_width = avail.x.clamp(380.0, 480.0);
            ui.add_space((avail.y * 0.12).clamp(18.0, 90.0));

            ui.vertical_centered(|ui| {
                ui.set_width(card_width);

                egui::Frame::NONE
                    .fill(ui.visuals().faint_bg_color)
                    .corner_radius(14.0)
                    .stroke(egui::Stroke::new(
                        1.0,
                        ui.visuals().widgets.noninteractive.bg_stroke.color,
                    ))
                    .inner_margin(egui::Margin::symmetric(20, 18))
                    .show(ui, |ui| {
                        ui.style_mut().spacing.item_spacing = egui::vec2(10.0, 10.0);
                        ui.heading("Simple CRM");
                        ui.weak("Sign in or create an account.");
                        ui.add_space(8.0);
                        self.show_status_banner(ui);

                        let email_resp = Self::text_field(
                            ui,
                            "login_email",
                            "Email",
                            "you@example.com",
                            &mut self.email,
                            false,
                        );
                        let password_resp = Self::text_field(
                            ui,
                            "login_password",
                            "Password",
                            "at least 6 characters",
                            &mut self.password,
                            true,
                        );

                        let enter_pressed = ctx.input(|i| i.key_pressed(egui::Key::Enter));
                        if enter_pressed && (email_resp.lost_focus() || password_resp.lost_focus())
                        {
                            self.sign_in();
                        }

                        ui.add_space(6.0);
                        let enabled = self.can_dispatch();
                        ui.columns(2, |columns| {
                            let sign_up = egui::Button::new(egui::RichText::new("Sign up").strong())
                                .min_size(egui::vec2(columns[0].available_width(), 36.0));
                            if columns[0].add_enabled(enabled, sign_up).clicked() {
                                self.sign_up();
                            }
                            let log_in = egui::Button::new(egui::RichText::new("Log in").strong())
                                .min_size(egui::vec2(columns[1].available_width(), 36.0));
                            if columns[1].add_enabled(enabled, log_in).clicked() {
                                self.sign_in();
                            }
                        });

                        if self.snapshot.cache_is_stale {
                            ui.small(
                                egui::RichText::new(format!(
                                    "{} customers from the ended session are still cached.",
                                    self.snapshot.customers.len()
                                ))
                                .weak(),
                            );
                        }

                        ui.separator();
                        self.show_status_line(ui);
                    });
            });
        });
    }

    fn show_customers_screen(&mut self, ctx: &egui::Context) {
        let email = self
            .snapshot
            .identity
            .as_ref()
            .map(|identity| identity.email.clone())
            .unwrap_or_default();
        let enabled = self.can_dispatch();

        egui::TopBottomPanel::top("customers_top_bar").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.heading("Customers");
                ui.weak(&email);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.add_enabled(enabled, egui::Button::new("Log out")).clicked() {
                        self.dispatch(BackendCommand::SignOut);
                    }
                    if ui.add_enabled(enabled, egui::Button::new("Refresh")).clicked() {
                        self.dispatch(BackendCommand::Refresh);
                    }
                });
            });
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("customers_status").show(ctx, |ui| {
            self.show_status_line(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_status_banner(ui);

            ui.horizontal(|ui| {
                let edit = egui::TextEdit::singleline(&mut self.customer_name)
                    .id_salt("customer_name")
                    .hint_text("Customer name")
                    .desired_width((ui.available_width() - 80.0).max(120.0));
                let response = ui.add(edit);
                let submitted =
                    response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                if ui.add_enabled(enabled, egui::Button::new("Add")).clicked() || submitted {
                    self.add_customer();
                }
            });
            ui.separator();

            if self.snapshot.customers.is_empty() {
                ui.weak("No customers yet.");
                return;
            }

            let mut delete_target: Option<CustomerId> = None;
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    for customer in &self.snapshot.customers {
                        ui.horizontal(|ui| {
                            ui.label(&customer.name);
                            ui.with_layout(
                                egui::Layout::right_to_left(egui::Align::Center),
                                |ui| {
                                    if ui.add_enabled(enabled, egui::Button::new("Delete")).clicked()
                                    {
                                        delete_target = Some(customer.id.clone());
                                    }
                                },
                            );
                        });
                    }
                });
            if let Some(id) = delete_target {
                self.dispatch(BackendCommand::DeleteCustomer { id });
            }
        });
    }

    fn show_status_line(&self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            if self.busy {
                ui.spinner();
            }
            ui.small("Status:");
            ui.small(egui::RichText::new(&self.status).weak());
        });
    }

    fn show_dialog(&mut self, ctx: &egui::Context) {
        let Some(dialog) = self.dialogs.front() else {
            return;
        };
        let (title, text, confirm) = match dialog {
            Dialog::Alert { message, .. } => ("Notice", message.clone(), false),
            Dialog::Confirm { question, .. } => ("Confirm", question.clone(), true),
        };

        let mut answer = None;
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(text);
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("OK").clicked() {
                        answer = Some(true);
                    }
                    if confirm && ui.button("Cancel").clicked() {
                        answer = Some(false);
                    }
                });
            });
        if let Some(accepted) = answer {
            self.resolve_dialog(accepted);
        }
    }
}

impl eframe::App for CrmApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        if self.snapshot.identity.is_some() {
            self.show_customers_screen(ctx);
        } else {
            self.show_login_screen(ctx);
        }
        self.show_dialog(ctx);

        ctx.request_repaint_after(std::time::Duration::from_millis(100));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, Sender as UiSender};
    use shared::domain::{Customer, Identity, UserId};
    use tokio::sync::mpsc;

    fn app() -> (CrmApp, mpsc::Receiver<BackendCommand>, UiSender<UiEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (ui_tx, ui_rx) = bounded(16);
        (CrmApp::new(cmd_tx, ui_rx), cmd_rx, ui_tx)
    }

    fn ready_app() -> (CrmApp, mpsc::Receiver<BackendCommand>, UiSender<UiEvent>) {
        let (mut app, cmd_rx, ui_tx) = app();
        ui_tx.send(UiEvent::Ready).expect("send");
        app.process_ui_events();
        (app, cmd_rx, ui_tx)
    }

    fn signed_in(customers: &[&str]) -> ControllerSnapshot {
        ControllerSnapshot {
            identity: Some(Identity {
                uid: UserId::from("u1"),
                email: "alice@example.com".to_string(),
            }),
            customers: customers
                .iter()
                .enumerate()
                .map(|(index, name)| Customer {
                    id: CustomerId(format!("c{index}")),
                    name: name.to_string(),
                })
                .collect(),
            ..ControllerSnapshot::default()
        }
    }

    #[test]
    fn commands_wait_for_backend_ready() {
        let (mut app, mut cmd_rx, _ui_tx) = app();
        app.sign_in();
        assert!(cmd_rx.try_recv().is_err());
        assert!(!app.busy);
    }

    #[test]
    fn sign_in_sends_typed_credentials_and_blocks_further_commands() {
        let (mut app, mut cmd_rx, _ui_tx) = ready_app();
        app.email = "alice@example.com".to_string();
        app.password = "secret123".to_string();

        app.sign_in();
        app.sign_up();

        assert_eq!(
            cmd_rx.try_recv().expect("queued"),
            BackendCommand::SignIn {
                email: "alice@example.com".to_string(),
                password: "secret123".to_string(),
            }
        );
        assert!(cmd_rx.try_recv().is_err());
        assert!(app.busy);
    }

    #[test]
    fn only_finished_commands_overwrite_form_buffers() {
        let (mut app, _cmd_rx, ui_tx) = ready_app();
        app.customer_name = "Dav".to_string();

        ui_tx
            .send(UiEvent::StateChanged {
                snapshot: signed_in(&["Alice"]),
                after_command: false,
            })
            .expect("send");
        app.process_ui_events();
        assert_eq!(app.customer_name, "Dav");
        assert_eq!(app.status, "Signed in as alice@example.com");

        app.busy = true;
        ui_tx
            .send(UiEvent::StateChanged {
                snapshot: signed_in(&["Alice", "Dave"]),
                after_command: true,
            })
            .expect("send");
        app.process_ui_events();
        assert_eq!(app.customer_name, "");
        assert!(!app.busy);
        assert_eq!(app.snapshot.customers.len(), 2);
    }

    #[test]
    fn confirm_dialog_answers_worker_and_gates_commands() {
        let (mut app, mut cmd_rx, ui_tx) = ready_app();
        let (reply, mut answer) = oneshot::channel();
        ui_tx
            .send(UiEvent::ConfirmRequested {
                question: "Delete Alice?".to_string(),
                reply,
            })
            .expect("send");
        app.process_ui_events();
        assert!(!app.can_dispatch());
        app.dispatch(BackendCommand::Refresh);
        assert!(cmd_rx.try_recv().is_err());

        app.resolve_dialog(false);
        assert_eq!(answer.try_recv(), Ok(false));
        assert!(app.can_dispatch());
    }

    #[test]
    fn alerts_queue_in_order() {
        let (mut app, _cmd_rx, ui_tx) = ready_app();
        let (first_ack, mut first) = oneshot::channel();
        let (second_ack, mut second) = oneshot::channel();
        for (message, ack) in [("first", first_ack), ("second", second_ack)] {
            ui_tx
                .send(UiEvent::Alert {
                    message: message.to_string(),
                    ack,
                })
                .expect("send");
        }
        app.process_ui_events();
        assert_eq!(app.dialogs.len(), 2);

        app.resolve_dialog(true);
        assert!(first.try_recv().is_ok());
        assert!(second.try_recv().is_err());
        assert!(matches!(
            app.dialogs.front(),
            Some(Dialog::Alert { message, .. }) if message == "second"
        ));
    }

    #[test]
    fn errors_show_labeled_banner() {
        let (mut app, _cmd_rx, ui_tx) = ready_app();
        ui_tx
            .send(UiEvent::Error(UiError::from_message(
                UiErrorContext::Refresh,
                "refresh failed: record store unreachable: connection refused",
            )))
            .expect("send");
        app.process_ui_events();

        let banner = app.status_banner.expect("banner");
        assert_eq!(
            banner.message,
            "Connection error: refresh failed: record store unreachable: connection refused"
        );
        assert!(app.backend_ready);
    }

    #[test]
    fn startup_failure_disables_commands() {
        let (mut app, _cmd_rx, ui_tx) = app();
        ui_tx
            .send(UiEvent::Error(UiError::from_message(
                UiErrorContext::BackendStartup,
                "backend worker startup failure: missing required setting `api_key`",
            )))
            .expect("send");
        app.process_ui_events();
        assert!(!app.can_dispatch());
        assert!(app.status.contains("api_key"));
    }

    #[test]
    fn stopped_worker_surfaces_banner() {
        let (mut app, cmd_rx, _ui_tx) = ready_app();
        drop(cmd_rx);
        app.dispatch(BackendCommand::Refresh);
        assert!(!app.busy);
        let banner = app.status_banner.expect("banner");
        assert!(banner.message.starts_with("Connection error:"));
    }
}
