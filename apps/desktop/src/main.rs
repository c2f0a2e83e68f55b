mod commands;
mod prompt;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    open_backends, ActionOutcome, BackendKind, CrmController, LaunchOptions, SessionView,
};
use shared::domain::Identity;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    commands::{execute, parse_command, Command, Execution},
    prompt::{print_flush, read_line, stdin_lines, TerminalPrompt},
};

#[derive(Parser, Debug)]
#[command(name = "crm", about = "Sign in and manage a shared customer list from the terminal")]
struct Args {
    /// `memory` keeps accounts and customers in this process; `firebase` uses
    /// the hosted project from the settings.
    #[arg(long, default_value = "memory")]
    backend: BackendKind,
    /// Settings file (defaults to ./crm.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Session database URL or path, overriding the settings.
    #[arg(long)]
    session_db: Option<String>,
}

impl Args {
    fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            backend: self.backend,
            config_path: self.config.clone(),
            session_db: self.session_db.clone(),
        }
    }
}

enum Input {
    Session(Option<Option<Identity>>),
    Line(Option<String>),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let backends = open_backends(&args.launch_options())
        .await
        .with_context(|| format!("failed to open {} backends", args.backend))?;
    let input = stdin_lines();
    let prompt = Arc::new(TerminalPrompt::new(input.clone()));
    let mut controller = CrmController::new(backends.auth, backends.records, prompt);
    controller.start();
    info!(backend = %args.backend, "crm ready");

    loop {
        let next = tokio::select! {
            change = controller.next_session_change() => Input::Session(change),
            line = read_line(&input) => Input::Line(line.context("failed to read stdin")?),
        };

        match next {
            Input::Session(Some(identity)) => {
                if let Err(err) = controller.apply_session_change(identity).await {
                    debug!(error = %err, "refresh after session change failed");
                }
                render(&controller);
            }
            Input::Session(None) => {
                warn!("session provider closed");
                break;
            }
            Input::Line(None) => break,
            Input::Line(Some(line)) => match parse_command(&line) {
                Ok(None) => {}
                Ok(Some(command)) => {
                    let show_help = command == Command::Help;
                    match execute(&mut controller, command).await {
                        Execution::Quit => break,
                        Execution::Show if show_help => print_help(&controller),
                        Execution::Show => render(&controller),
                        Execution::Unavailable => {
                            println!("not available on this screen (try 'help')");
                        }
                        Execution::NoSuchPosition(position) => {
                            println!("no customer at position {position}");
                        }
                        Execution::Ran(Ok(ActionOutcome::Completed)) => render(&controller),
                        Execution::Ran(Ok(ActionOutcome::Skipped)) => {
                            debug!("command declined")
                        }
                        // Already surfaced through the prompt.
                        Execution::Ran(Err(err)) => debug!(error = %err, "command failed"),
                    }
                }
                Err(err) => println!("{err}"),
            },
        }
        print_flush("> ");
    }

    controller.shutdown();
    Ok(())
}

fn render(controller: &CrmController) {
    println!();
    match controller.view() {
        SessionView::SignedOut => {
            println!("Signed out.");
            if controller.cache_is_stale() {
                println!(
                    "  ({} customers from the ended session are still cached)",
                    controller.customers().len()
                );
            }
            println!("  signup <email> <password> | login <email> <password> | quit");
        }
        SessionView::SignedIn(identity) => {
            println!("Signed in as {}", identity.email);
            if controller.customers().is_empty() {
                println!("  (no customers)");
            }
            for (index, customer) in controller.customers().iter().enumerate() {
                println!("  {:>3}. {}", index + 1, customer.name);
            }
            println!("  add <name> | delete <number> | refresh | logout | quit");
        }
    }
}

fn print_help(controller: &CrmController) {
    println!();
    if controller.identity().is_some() {
        println!("add <name>        add a customer (the name is kept as typed)");
        println!("delete <number>   delete the customer at that list position");
        println!("list              show the customer list");
        println!("refresh           fetch the list again");
        println!("logout            sign out");
    } else {
        println!("signup <email> <password>   create an account and sign in");
        println!("login <email> <password>    sign in");
    }
    println!("quit              exit");
}
