use std::{error::Error, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::{
    BatchRetry, Engine, Month, Transaction, TransactionKind, User,
    store::{DocumentStore, MemoryStore, SqliteStore},
};
use migration::{Migrator, MigratorTrait};
use serde::Serialize;

mod settings;

type AppResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(about = "Record, query and summarize personal transactions and budgets")]
struct Cli {
    /// Settings file, without the `.toml` extension.
    #[arg(long, env = "TALLY_SETTINGS", default_value = "settings")]
    settings: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(subcommand)]
    User(UserCommand),
    #[command(subcommand)]
    Tx(TxCommand),
    #[command(subcommand)]
    Budget(BudgetCommand),
    /// All-history totals and category breakdown.
    Summary(UserArg),
    /// One month's totals joined with its budgets.
    Report(UserMonth),
    Analytics(UserMonth),
    Insights(UserMonth),
    Breakdown(UserMonth),
    Categories(UserArg),
    Months(UserArg),
}

#[derive(Args, Debug)]
struct UserArg {
    #[arg(long)]
    user: String,
}

#[derive(Args, Debug)]
struct UserMonth {
    #[arg(long)]
    user: String,
    #[arg(long)]
    month: Month,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
    },
    Show {
        id: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    Income,
    Expense,
}

impl From<Kind> for TransactionKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Income => TransactionKind::Income,
            Kind::Expense => TransactionKind::Expense,
        }
    }
}

#[derive(Subcommand, Debug)]
enum TxCommand {
    Add {
        #[arg(long)]
        user: String,
        #[arg(long, value_enum)]
        kind: Kind,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        category: String,
        #[arg(long)]
        description: String,
        /// RFC 3339 timestamp or `YYYY-MM-DD`; defaults to now.
        #[arg(long, value_parser = parse_date)]
        date: Option<DateTime<Utc>>,
    },
    Get {
        #[arg(long)]
        user: String,
        id: String,
    },
    /// Newest first; filter by month or category.
    List {
        #[arg(long)]
        user: String,
        #[arg(long, conflicts_with = "category")]
        month: Option<Month>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value_t = 0)]
        limit: usize,
        #[arg(long)]
        cursor: Option<String>,
    },
    Update {
        #[arg(long)]
        user: String,
        id: String,
        /// Version the edit is based on; defaults to the stored one.
        #[arg(long)]
        version: Option<u64>,
        #[arg(long, value_enum)]
        kind: Option<Kind>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_date)]
        date: Option<DateTime<Utc>>,
    },
    Delete {
        #[arg(long)]
        user: String,
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum BudgetCommand {
    Set {
        #[arg(long)]
        user: String,
        #[arg(long)]
        month: Month,
        #[arg(long)]
        category: String,
        #[arg(long)]
        amount: f64,
    },
    Get {
        #[arg(long)]
        user: String,
        #[arg(long)]
        month: Month,
        #[arg(long)]
        category: String,
    },
    List(UserMonth),
    Delete {
        #[arg(long)]
        user: String,
        #[arg(long)]
        month: Month,
        #[arg(long)]
        category: String,
    },
    Utilization(UserMonth),
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    engine::parse_timestamp(raw).ok_or_else(|| format!("\"{raw}\" is not a date"))
}

fn print(value: &impl Serialize) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(&cli.settings)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "tally={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let store = open_store(&settings.store).await?;
    let engine = Engine::builder()
        .store(store)
        .list_limit(settings.engine.list_limit)
        .default_page_size(settings.engine.default_page_size)
        .batch_retry(BatchRetry {
            max_retries: settings.engine.batch_max_retries,
            backoff: Duration::from_millis(settings.engine.batch_backoff_ms),
        })
        .build()?;

    run(&engine, cli.command).await
}

async fn open_store(config: &settings::Store) -> AppResult<Arc<dyn DocumentStore>> {
    match config {
        settings::Store::Memory => {
            tracing::warn!("using the in-memory store, nothing will be persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
        settings::Store::Sqlite { path } => {
            let store = SqliteStore::connect(&format!("sqlite:{path}?mode=rwc")).await?;
            Migrator::up(store.connection(), None).await?;
            tracing::debug!(path, "sqlite store ready");
            Ok(Arc::new(store))
        }
    }
}

async fn run(engine: &Engine, command: Command) -> AppResult<()> {
    match command {
        Command::User(UserCommand::Create { id, email, name }) => {
            let user = match id {
                Some(id) => User::with_id(id, email, name)?,
                None => User::new(email, name)?,
            };
            print(&engine.create_user(user).await?)
        }
        Command::User(UserCommand::Show { id }) => print(&engine.user(&id).await?),
        Command::Tx(command) => run_tx(engine, command).await,
        Command::Budget(command) => run_budget(engine, command).await,
        Command::Summary(UserArg { user }) => print(&engine.financial_summary(&user).await?),
        Command::Report(UserMonth { user, month }) => {
            print(&engine.monthly_budget_report(&user, month).await?)
        }
        Command::Analytics(UserMonth { user, month }) => {
            print(&engine.monthly_analytics(&user, month).await?)
        }
        Command::Insights(UserMonth { user, month }) => {
            for line in engine.financial_insights(&user, month).await? {
                println!("{line}");
            }
            Ok(())
        }
        Command::Breakdown(UserMonth { user, month }) => {
            print(&engine.category_breakdown(&user, month).await?)
        }
        Command::Categories(UserArg { user }) => print(&engine.category_options(&user).await?),
        Command::Months(UserArg { user }) => {
            print(&engine.months_with_transactions(&user).await?)
        }
    }
}

async fn run_tx(engine: &Engine, command: TxCommand) -> AppResult<()> {
    match command {
        TxCommand::Add {
            user,
            kind,
            amount,
            category,
            description,
            date,
        } => {
            let tx = Transaction::new(
                user,
                kind.into(),
                amount,
                category,
                description,
                date.unwrap_or_else(Utc::now),
            )?;
            print(&engine.create_transaction(tx).await?)
        }
        TxCommand::Get { user, id } => print(&engine.transaction(&user, &id).await?),
        TxCommand::List {
            user,
            month,
            category,
            limit,
            cursor,
        } => {
            let cursor = cursor.as_deref();
            let page = match (month, category) {
                (Some(month), _) => {
                    engine
                        .transactions_by_month(&user, month, limit, cursor)
                        .await?
                }
                (None, Some(category)) => {
                    engine
                        .transactions_by_category(&user, &category, limit, cursor)
                        .await?
                }
                (None, None) => engine.transactions_by_user(&user, limit, cursor).await?,
            };
            print(&page)
        }
        TxCommand::Update {
            user,
            id,
            version,
            kind,
            amount,
            category,
            description,
            date,
        } => {
            let mut tx = engine.transaction(&user, &id).await?;
            if let Some(version) = version {
                tx.version = version;
            }
            if let Some(kind) = kind {
                tx.kind = kind.into();
                tx.amount = tx.kind.signed(tx.amount);
            }
            if let Some(amount) = amount {
                tx.amount = tx.kind.signed(amount);
            }
            if let Some(category) = category {
                tx.category = category.trim().to_string();
            }
            if let Some(description) = description {
                tx.description = description.trim().to_string();
            }
            if let Some(date) = date {
                tx.date = date;
            }
            print(&engine.update_transaction(tx).await?)
        }
        TxCommand::Delete { user, id } => {
            engine.delete_transaction(&user, &id).await?;
            tracing::info!(id, "deleted");
            Ok(())
        }
    }
}

async fn run_budget(engine: &Engine, command: BudgetCommand) -> AppResult<()> {
    match command {
        BudgetCommand::Set {
            user,
            month,
            category,
            amount,
        } => print(&engine.set_budget(&user, month, &category, amount).await?),
        BudgetCommand::Get {
            user,
            month,
            category,
        } => print(&engine.budget(&user, month, &category).await?),
        BudgetCommand::List(UserMonth { user, month }) => {
            print(&engine.budgets_by_month(&user, month).await?)
        }
        BudgetCommand::Delete {
            user,
            month,
            category,
        } => {
            engine.delete_budget(&user, month, &category).await?;
            Ok(())
        }
        BudgetCommand::Utilization(UserMonth { user, month }) => {
            print(&engine.budget_utilization(&user, month).await?)
        }
    }
}
