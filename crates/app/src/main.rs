use std::{error::Error, fs, path::Path, path::PathBuf};

use chrono::TimeDelta;
use clap::{Args, Parser, Subcommand};
use remit_engine::{
    AmountColumn, CatalogSnapshot, ColumnSelection, DEFAULT_TTL, Engine, Payment, RuleCatalog,
    RuleId, RuleState, TripRequest,
};
use serde::{Serialize, de::DeserializeOwned};

use distance::MatrixDistanceResolver;

mod distance;
mod settings;

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "remit")]
#[command(about = "Compute travel expenses and payment transaction lines from a rule catalog")]
struct Cli {
    /// Settings file, extension optional (also read from `REMIT_SETTINGS`).
    #[arg(long, global = true, env = "REMIT_SETTINGS", default_value = "settings")]
    settings: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Price the expense lines of a trip.
    Expenses(ExpensesArgs),
    /// Compute the transaction lines of a payment.
    Transactions(TransactionsArgs),
    /// Validate a catalog snapshot and summarize it.
    Catalog(CatalogArgs),
}

#[derive(Args, Debug)]
struct CatalogArgs {
    /// JSON catalog snapshot.
    #[arg(long)]
    catalog: PathBuf,
}

#[derive(Args, Debug)]
struct ExpensesArgs {
    #[command(flatten)]
    catalog: CatalogArgs,
    /// JSON trip request.
    #[arg(long)]
    trip: PathBuf,
}

#[derive(Args, Debug)]
struct TransactionsArgs {
    #[command(flatten)]
    catalog: CatalogArgs,
    /// JSON payment.
    #[arg(long)]
    payment: PathBuf,
    /// Journal rule ids in application order. Defaults to every optional
    /// rule of the catalog by precedence.
    #[arg(long = "rule", value_delimiter = ',')]
    rules: Vec<RuleId>,
    /// Payment column to remit instead of `total_approved_amount`.
    #[arg(long, value_parser = parse_column)]
    column: Option<AmountColumn>,
    /// Payment column to tax instead of `total_taxable_amount`.
    #[arg(long, value_parser = parse_column)]
    taxable_column: Option<AmountColumn>,
}

#[derive(Serialize, Debug)]
struct CatalogSummary {
    allowances: usize,
    journal_types: usize,
    cities: usize,
    gross: Option<RuleId>,
    vat: Option<RuleId>,
    net: Option<RuleId>,
    reimbursement: Option<RuleId>,
}

fn parse_column(raw: &str) -> Result<AmountColumn, String> {
    raw.parse::<AmountColumn>().map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(&cli.settings)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "remit={level},remit_engine={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Catalog(args) => {
            let catalog = load_catalog(&args.catalog)?;
            print_json(&CatalogSummary {
                allowances: catalog.allowances().len(),
                journal_types: catalog.journal_types().len(),
                cities: catalog.cities().len(),
                gross: catalog.gross().map(|r| r.id),
                vat: catalog.vat().map(|r| r.id),
                net: catalog.net().map(|r| r.id),
                reimbursement: catalog.reimbursement().map(|r| r.id),
            })
        }
        Command::Expenses(args) => {
            let engine = build_engine(&settings, load_catalog(&args.catalog.catalog)?);
            let trip: TripRequest = read_json(&args.trip)?;
            let trip = match &settings.distance {
                Some(distance) => {
                    tracing::info!("Found distance settings...");
                    let resolver = MatrixDistanceResolver::new(distance)?;
                    engine.with_resolved_distance(trip, &resolver).await
                }
                None => trip,
            };
            print_json(&engine.compute_expenses(&trip)?)
        }
        Command::Transactions(args) => {
            let engine = build_engine(&settings, load_catalog(&args.catalog.catalog)?);
            let payment: Payment = read_json(&args.payment)?;
            let rule_ids = if args.rules.is_empty() {
                optional_rules(engine.catalog())
            } else {
                args.rules
            };
            let columns = ColumnSelection {
                payable: args.column,
                taxable: args.taxable_column,
            };
            print_json(&engine.compute_transaction_lines(&payment, &rule_ids, columns)?)
        }
    }
}

fn build_engine(settings: &settings::Settings, catalog: RuleCatalog) -> Engine {
    let ttl = |secs: i64| TimeDelta::try_seconds(secs).unwrap_or(DEFAULT_TTL);
    Engine::builder()
        .catalog(catalog)
        .expenses_ttl(ttl(settings.cache.expenses_ttl_secs))
        .transactions_ttl(ttl(settings.cache.transactions_ttl_secs))
        .build()
}

fn load_catalog(path: &Path) -> Result<RuleCatalog, BoxError> {
    let snapshot: CatalogSnapshot = read_json(path)?;
    let catalog = RuleCatalog::new(snapshot)?;
    tracing::debug!(
        allowances = catalog.allowances().len(),
        journal_types = catalog.journal_types().len(),
        cities = catalog.cities().len(),
        "catalog loaded"
    );
    Ok(catalog)
}

fn optional_rules(catalog: &RuleCatalog) -> Vec<RuleId> {
    let mut rules: Vec<_> = catalog
        .journal_types()
        .iter()
        .filter(|r| r.state != RuleState::Fixed)
        .collect();
    rules.sort_by_key(|r| r.precedence);
    rules.iter().map(|r| r.id).collect()
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, BoxError> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    Ok(serde_json::from_str(&raw)
        .map_err(|err| format!("invalid JSON in {}: {err}", path.display()))?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), BoxError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
