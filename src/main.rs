use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use creditlog::{
    account::AccountOps,
    admin::{AdminOps, Principal},
    core::history::{HistoryQuery, Order},
    persist::{OpSink, sqlite::SqliteJournal},
    pipeline::{Pipeline, TranslationRequest},
    provider::GlossaryProvider,
    runtime::handle::{LedgerHandle, spawn_ledger},
    settings::Settings,
    types::{Credits, LedgerKind},
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Parser)]
#[command(name = "creditlog", about = "Metered translation credits ledger")]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long, env = "CREDITLOG_CONFIG")]
    config: Option<PathBuf>,
    /// Override the SQLite journal path.
    #[arg(long)]
    db: Option<PathBuf>,
    /// Identity running the command; admin commands require --admin.
    #[arg(long, default_value = "cli")]
    actor: String,
    /// Assert the administrator claim for the actor.
    #[arg(long)]
    admin: bool,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Run the two-user smoke scenario against a fresh ledger.
    Demo,
    /// Record the signup grant for a new user.
    Open { user: String },
    /// Show a user's balance.
    Balance { user: String },
    /// Add purchased credits to a user's balance.
    TopUp { user: String, amount: Credits },
    /// Grant bonus credits (admin).
    Grant { user: String, amount: Credits },
    /// Translate text, charging the user.
    Translate {
        user: String,
        text: String,
        #[arg(long, default_value = "en")]
        from: String,
        #[arg(long, default_value = "fr")]
        to: String,
        #[arg(long)]
        cost: Option<Credits>,
    },
    /// List a user's own ledger entries, newest first.
    History {
        user: String,
        #[arg(long)]
        kind: Option<LedgerKind>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        oldest_first: bool,
    },
    /// Dump transactions and translations (admin).
    Audit {
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(db) = args.db.clone() {
        settings.journal.path = Some(db);
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("creditlog={}", settings.app.log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ledger = open_ledger(&settings, matches!(args.command, Cmd::Demo))?;
    let result = run(&args, &settings, &ledger).await;
    ledger.shutdown().await?;
    result
}

fn open_ledger(settings: &Settings, fresh: bool) -> Result<LedgerHandle, BoxError> {
    let path = settings.journal.path.as_ref().filter(|_| !fresh);
    let Some(path) = path else {
        tracing::info!("running without a journal");
        return Ok(spawn_ledger(Vec::new(), None, settings.runtime.clone())?);
    };

    let journal = SqliteJournal::open(path)?;
    let replay = journal.load_events_after(0)?;
    tracing::info!(path = %path.display(), events = replay.len(), "journal opened");
    let sink: Box<dyn OpSink> = Box::new(journal);
    Ok(spawn_ledger(replay, Some(sink), settings.runtime.clone())?)
}

async fn run(args: &Args, settings: &Settings, ledger: &LedgerHandle) -> Result<(), BoxError> {
    let principal = Principal {
        user_id: args.actor.clone(),
        is_admin: args.admin,
    };
    let accounts = AccountOps::new(ledger.clone()).with_signup_grant(settings.pricing.signup_grant);
    let provider = GlossaryProvider::from_config(&settings.provider);

    match &args.command {
        Cmd::Demo => demo(ledger, provider).await,
        Cmd::Open { user } => print(&accounts.open_account(user).await?),
        Cmd::Balance { user } => print(&serde_json::json!({
            "user_id": user,
            "balance": accounts.balance(user).await?,
        })),
        Cmd::TopUp { user, amount } => print(&accounts.top_up(user, *amount).await?),
        Cmd::Grant { user, amount } => {
            let admin = AdminOps::authorize(ledger.clone(), &principal)?;
            print(&admin.approve_bonus(user, *amount).await?)
        }
        Cmd::Translate {
            user,
            text,
            from,
            to,
            cost,
        } => {
            let pipeline = Pipeline::new(ledger.clone(), Arc::new(provider))
                .with_default_cost(settings.pricing.translation_cost);
            let mut request = TranslationRequest::new(user.as_str(), text.as_str(), from.as_str(), to.as_str());
            request.cost = *cost;
            print(&pipeline.process(request).await?)
        }
        Cmd::History {
            user,
            kind,
            limit,
            offset,
            oldest_first,
        } => {
            let query = HistoryQuery {
                kind: *kind,
                order: if *oldest_first {
                    Order::OldestFirst
                } else {
                    Order::NewestFirst
                },
                limit: *limit,
                offset: *offset,
            };
            print(&accounts.transactions(user, &query).await?)
        }
        Cmd::Audit { user } => {
            let admin = AdminOps::authorize(ledger.clone(), &principal)?;
            print(&serde_json::json!({
                "transactions": admin.view_transactions(user.as_deref()).await?,
                "translations": admin.view_translations(user.as_deref()).await?,
            }))
        }
    }
}

async fn demo(ledger: &LedgerHandle, provider: GlossaryProvider) -> Result<(), BoxError> {
    let pipeline = Pipeline::new(ledger.clone(), Arc::new(provider));
    let admin = AdminOps::authorize(ledger.clone(), &Principal::admin("admin@example.com"))?;

    admin.approve_bonus("user1", 10).await?;
    admin.approve_bonus("user2", 5).await?;

    let first = pipeline
        .process(TranslationRequest::new("user1", "Hello", "en", "fr"))
        .await?;
    let second = pipeline
        .process(TranslationRequest::new("user2", "Bonjour", "fr", "en"))
        .await?;

    print(&serde_json::json!({
        "result1": first.output_text,
        "result2": second.output_text,
        "balance_user1": ledger.balance("user1").await?,
        "balance_user2": ledger.balance("user2").await?,
    }))
}

fn print<T: Serialize>(value: &T) -> Result<(), BoxError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
