use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use super::format::{format_amount, truncate};
use super::serve;
use crate::config::{Config, ENV_SECRET};
use crate::db::Database;
use crate::{dashboard, service};

/// Flags that take a value and may appear anywhere on the command line.
const VALUE_FLAGS: &[&str] = &["--db", "--bind"];

pub(crate) fn as_cli(args: &[String], config: Config) -> Result<()> {
    let config = apply_flags(args, config)?;
    let positional = positional(args);

    match positional.first().map(String::as_str) {
        None | Some("serve") => serve::serve(&config),
        Some("add-user") => cli_add_user(&positional[1..], &config),
        Some("token") => cli_token(&positional[1..], &config),
        Some("summary" | "s") => cli_summary(&positional[1..], &config),
        Some("sync-status") => cli_sync_status(&positional[1..], &config),
        Some("categories" | "c") => cli_categories(&positional[1..], &config),
        Some("--help" | "-h" | "help") => {
            print_usage();
            Ok(())
        }
        Some("--version" | "-V" | "version") => {
            println!("ledgersync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(other) => {
            print_usage();
            anyhow::bail!("Unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("ledgersync: offline-first personal finance sync server");
    println!();
    println!("Usage: ledgersync [command] [--db <path>] [--bind <addr>]");
    println!();
    println!("Commands:");
    println!("  serve (default)               Run the HTTP API");
    println!("  add-user <email>              Create a user and print an access token");
    println!("  token <email>                 Print a fresh access token for a user");
    println!("  summary <email>               Print a user's income, expenses and budgets");
    println!("  sync-status <email>           Print a user's recent sync attempts");
    println!("  categories <email>            List the categories a user can file under");
    println!("  --help, -h                    Show this help");
    println!("  --version, -V                 Show version");
    println!();
    println!("Options:");
    println!("  --db <path>                   Database file (env LEDGERSYNC_DB)");
    println!("  --bind <addr>                 Listen address (env LEDGERSYNC_BIND)");
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn apply_flags(args: &[String], mut config: Config) -> Result<Config> {
    if let Some(path) = flag_value(args, "--db") {
        config = config.with_db_path(PathBuf::from(shellexpand(path)));
    }
    if let Some(addr) = flag_value(args, "--bind") {
        let addr = addr
            .parse()
            .with_context(|| format!("--bind is not a socket address: {addr}"))?;
        config = config.with_bind_addr(addr);
    }
    Ok(config)
}

/// Arguments after the program name, minus flags and their values.
fn positional(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            iter.next();
        } else {
            out.push(arg.clone());
        }
    }
    out
}

fn open_db(config: &Config) -> Result<Database> {
    Database::open(&config.resolve_db_path()?)
}

fn require_email<'a>(args: &'a [String], usage: &str) -> Result<&'a str> {
    args.first()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Usage: ledgersync {usage} <email>"))
}

fn find_user(db: &Database, email: &str) -> Result<uuid::Uuid> {
    Ok(db
        .find_user_by_email(email)?
        .ok_or_else(|| anyhow!("No user with email {email}"))?
        .id)
}

fn cli_add_user(args: &[String], config: &Config) -> Result<()> {
    let email = require_email(args, "add-user")?;
    let mut db = open_db(config)?;
    let user = db.insert_user(email)?;
    println!("Created user {} ({})", user.email, user.id);

    match config.token_issuer() {
        Ok(tokens) => {
            println!("Token: {}", tokens.issue(user.id));
            println!("Expires in {} hours", tokens.ttl().num_hours());
        }
        Err(e) => println!(
            "No token issued: {e}. Set {ENV_SECRET} and run `ledgersync token {}`.",
            user.email
        ),
    }
    Ok(())
}

fn cli_token(args: &[String], config: &Config) -> Result<()> {
    let email = require_email(args, "token")?;
    let tokens = config.token_issuer()?;
    let db = open_db(config)?;
    let user_id = find_user(&db, email)?;
    println!("{}", tokens.issue(user_id));
    Ok(())
}

fn cli_summary(args: &[String], config: &Config) -> Result<()> {
    let email = require_email(args, "summary")?;
    let mut db = open_db(config)?;
    let user_id = find_user(&db, email)?;
    let dash = dashboard::build(&mut db, Some(user_id))?;

    println!("ledgersync: {email}");
    println!("{}", "─".repeat(40));
    println!("  Income:     {}", format_amount(dash.total_income));
    println!("  Expenses:   {}", format_amount(dash.total_expenses));
    match dash.net() {
        Some(net) => println!("  Net:        {}", format_amount(net)),
        None => println!("  Net:        out of range"),
    }

    if !dash.budgets.is_empty() {
        println!();
        println!("Budgets:");
        let today = chrono::Utc::now().date_naive();
        for view in &dash.budgets {
            let state = if view.budget.is_active_on(today) { "" } else { "  (inactive)" };
            println!(
                "  {:<24} {:>12}/month from {}{state}",
                truncate(&view.category_name, 24),
                format_amount(view.budget.monthly_limit),
                view.budget.start_date
            );
        }
    }

    if !dash.recent_transactions.is_empty() {
        println!();
        println!("Recent:");
        for t in &dash.recent_transactions {
            println!(
                "  {}  {:<8} {:>12}  {}",
                t.date.format("%Y-%m-%d"),
                t.kind,
                format_amount(t.amount),
                truncate(t.notes.as_deref().unwrap_or(""), 30)
            );
        }
    }

    Ok(())
}

fn cli_sync_status(args: &[String], config: &Config) -> Result<()> {
    let email = require_email(args, "sync-status")?;
    let db = open_db(config)?;
    let user_id = find_user(&db, email)?;
    let report = service::sync_status(&db, Some(user_id))?;

    println!("Store version: {}", report.version);
    if report.recent.is_empty() {
        println!("No sync attempts");
        return Ok(());
    }

    println!();
    println!("{:<32} {:<10} {:<6} Version", "When", "Status", "Scope");
    println!("{}", "─".repeat(60));
    for attempt in &report.recent {
        println!(
            "{:<32} {:<10} {:<6} {}",
            attempt.last_attempt.to_rfc3339(),
            attempt.status,
            attempt.scope,
            attempt.sequence
        );
    }
    Ok(())
}

fn cli_categories(args: &[String], config: &Config) -> Result<()> {
    let email = require_email(args, "categories")?;
    let db = open_db(config)?;
    let user_id = find_user(&db, email)?;

    for cat in service::categories(&db, Some(user_id))? {
        let owner = if cat.is_shared() { "shared" } else { "own" };
        println!("  {:<6} {:<24} {}", owner, truncate(&cat.name, 24), cat.id);
    }
    Ok(())
}

pub(crate) fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        format!("{home}/{rest}")
    } else {
        path.to_string()
    }
}
