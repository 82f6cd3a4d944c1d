mod appeal;
mod cli;
mod config;
mod error;
mod handler;
mod notify;

use anyhow::{Context, Result};
use clap::Parser;
use console::Style;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use appeal::{Appeal, AppealKind, AppealStore, AppealWorkflow, FileStore, MemoryStore, SubmissionPolicy};
use cli::{Cli, Command};
use config::AppConfig;
use error::AppealError;
use handler::{AppealHandler, Caller, HandlerError};
use notify::{Notifier, TerminalNotifier};

const DEMO_ADMIN: i64 = 1000;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::Demo = cli.command {
        return run_demo().await;
    }

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }

    let store = FileStore::open(&config.database_path, config.submission_policy())
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    info!(db = %store.path().display(), admin_configured = config.admin_id.is_some(), "appeal database ready");

    let handler = AppealHandler::new(
        AppealWorkflow::new(store),
        TerminalNotifier::default(),
        config.admin_id,
        config.page_size,
    );
    let caller = Caller {
        id: cli.sender,
        username: cli.username,
    };
    run(&handler, &caller, &cli.command).await;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// Handle one inbound action and print the reply the sender would see.
async fn run<S: AppealStore, N: Notifier>(handler: &AppealHandler<S, N>, caller: &Caller, command: &Command) {
    let reply = match command {
        Command::Start => Ok(Some(handler.start())),
        Command::Appeal { kind: None } => Ok(Some(handler.appeal_menu())),
        Command::Appeal { kind: Some(kind) } => {
            submission_reply(handler.submit(caller, AppealKind::from(*kind)).await)
        }
        Command::Pending { page } => handler.pending(caller, *page).map(Some),
        Command::Approve { .. } | Command::Reject { .. } => match command.decision() {
            Some((id, word)) => match handler.resolve(caller, id, word).await {
                Ok(_) | Err(HandlerError::Appeal(_)) => Ok(None),
                Err(err) => Err(err),
            },
            None => Ok(None),
        },
        Command::Show { id } => handler.show(caller, *id).map(Some),
        Command::Demo => Ok(None),
    };

    match reply {
        Ok(Some(text)) => println!("{text}"),
        Ok(None) => {}
        Err(err) => eprintln!("{}", Style::new().red().bold().apply_to(err)),
    }
}

/// Refusals already reached the user as a notification; only storage
/// failures are reported on the command line as well.
fn submission_reply(result: Result<Appeal, AppealError>) -> Result<Option<String>, HandlerError> {
    match result {
        Err(err @ AppealError::Storage(_)) => Err(err.into()),
        Ok(_) | Err(_) => Ok(None),
    }
}

/// Walk one appeal through its lifecycle against an in-memory store.
async fn run_demo() -> Result<()> {
    let heading = Style::new().yellow().bold();
    let handler = AppealHandler::new(
        AppealWorkflow::new(MemoryStore::new(SubmissionPolicy::default())),
        TerminalNotifier::default(),
        Some(DEMO_ADMIN),
        5,
    );
    let user = Caller {
        id: 42,
        username: Some("banned_user".to_string()),
    };
    let admin = Caller {
        id: DEMO_ADMIN,
        username: None,
    };

    let steps: [(&str, &Caller, Command); 6] = [
        ("user 42 files an unban appeal", &user, Command::Appeal { kind: Some(cli::KindArg::Unban) }),
        ("user 42 files the same appeal again", &user, Command::Appeal { kind: Some(cli::KindArg::Unban) }),
        ("administrator opens the queue", &admin, Command::Pending { page: 0 }),
        ("administrator approves #1", &admin, Command::Approve { id: 1 }),
        ("administrator tries to reject #1", &admin, Command::Reject { id: 1 }),
        ("administrator approves #999", &admin, Command::Approve { id: 999 }),
    ];
    for (title, caller, command) in &steps {
        println!("\n{}", heading.apply_to(format!("── {title} ──")));
        run(&handler, caller, command).await;
    }

    println!("\n{}", heading.apply_to("── final record ──"));
    run(&handler, &admin, &Command::Show { id: 1 }).await;
    Ok(())
}
