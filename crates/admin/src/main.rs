mod cli;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use cli::{AdminConfig, CliArgs, Command};
use internhub_identity::{IdentityRecord, NewAccount, Prefix, RoleCode};
use internhub_infra::PostgresIdentityStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AdminConfig::try_from(args.settings)?;

    internhub_observability::init(config.log_format);

    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PostgresIdentityStore::new(pool);

    match args.command {
        Command::Migrate => {
            store.ensure_schema().await?;
            info!("identity schema is up to date");
        }
        Command::Genesis {
            email,
            first_name,
            last_name,
        } => {
            if store.role_exists(RoleCode::SuperAdmin).await? {
                warn!("genesis admin already exists");
                return Ok(());
            }
            let cmd = NewAccount::superuser(email, first_name, last_name, Utc::now());
            let record = create(&store, &config, &cmd).await?;
            print_record(&record)?;
            info!("no credential issued; set one through the authentication service");
        }
        Command::CreateUser {
            email,
            first_name,
            last_name,
            role,
            department,
        } => {
            let cmd = NewAccount {
                email,
                first_name,
                last_name,
                role,
                department,
                occurred_at: Utc::now(),
            };
            let record = create(&store, &config, &cmd).await?;
            print_record(&record)?;
        }
        Command::Show { display_id } => {
            let record = store
                .get(&display_id)
                .await?
                .with_context(|| format!("no identity with display id {display_id}"))?;
            print_record(&record)?;
        }
        Command::List { role, date } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let prefix = Prefix::compute(role, date);
            let records = store.list_by_prefix(&prefix).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "prefix": prefix, "records": records }))?
            );
        }
    }

    Ok(())
}

async fn create(
    store: &PostgresIdentityStore,
    config: &AdminConfig,
    cmd: &NewAccount,
) -> anyhow::Result<IdentityRecord> {
    let record = store.create_account(cmd, &config.allocator).await?;
    info!(display_id = %record.display_id(), role = record.role().label(), "account created");
    Ok(record)
}

fn print_record(record: &IdentityRecord) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}
