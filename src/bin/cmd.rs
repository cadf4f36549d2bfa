//! rateio-cmd: drive a split draft from the command line.
//!
//! Usage:
//!   rateio-cmd create "Friday dinner"
//!   rateio-cmd add-person <split-id> "Alice"
//!   rateio-cmd add-item <split-id> "Pizza" 5000
//!   rateio-cmd share <split-id> <item-id> <person-id>...
//!   rateio-cmd review <split-id>
//!
//! The bearer token is read from the env var named by the config
//! (RATEIO_TOKEN by default).

use clap::{Parser, Subcommand};
use std::sync::Arc;

use rateio_sync::api::{EnvToken, HttpSplitApi};
use rateio_sync::{ApiConfig, PayOutcome, SplitStore};

#[derive(Parser)]
#[command(name = "rateio-cmd", about = "Manage split drafts from the terminal")]
struct Args {
    /// API base URL (overrides config and RATEIO_API_URL)
    #[arg(long, env = "RATEIO_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new split (server seeds two default participants)
    Create { name: String },
    /// List your splits
    List,
    /// Show a split's full state
    Show { id: String },
    /// Delete a split
    Delete { id: String },
    /// Add a participant
    AddPerson { id: String, name: String },
    /// Add an item priced in cents
    AddItem {
        id: String,
        name: String,
        amount_cents: i64,
    },
    /// Set exactly which participants consume an item
    Share {
        id: String,
        item_id: String,
        participant_ids: Vec<String>,
    },
    /// Compute the settlement
    Review { id: String },
    /// Pay the split
    Pay {
        id: String,
        #[arg(long, default_value_t = 0)]
        topup_cents: i64,
        #[arg(long)]
        wallet: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rateio_sync=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = ApiConfig::from_env();
    if let Some(url) = args.api_url {
        config.base_url = url;
    }

    let api = Arc::new(HttpSplitApi::new(
        config.base_url.clone(),
        Arc::new(EnvToken::new(config.token_env.clone())),
    ));
    let store = SplitStore::with_debounce(api, config.debounce());

    match args.command {
        Command::Create { name } => {
            let id = store.create_draft(&name).await?;
            println!("Created split {}", id);
        }
        Command::List => {
            for summary in store.list_drafts().await? {
                println!(
                    "{}  {:?}  {}  {}",
                    summary.id, summary.status, summary.created_at, summary.name
                );
            }
        }
        Command::Show { id } => {
            load(&store, &id).await?;
            let draft = store.draft().await.ok_or("no draft loaded")?;
            println!("{}", serde_json::to_string_pretty(&draft)?);
        }
        Command::Delete { id } => {
            store.delete_draft(&id).await?;
            println!("Deleted split {}", id);
        }
        Command::AddPerson { id, name } => {
            load(&store, &id).await?;
            let pid = store.add_participant(&name).await.ok_or("no draft loaded")?;
            store.ensure_participants_synced().await?;
            println!("Added participant {}", pid);
        }
        Command::AddItem {
            id,
            name,
            amount_cents,
        } => {
            load(&store, &id).await?;
            let item_id = store
                .add_item(&name, amount_cents)
                .await
                .ok_or("no draft loaded")?;
            store.ensure_items_synced().await?;
            println!("Added item {}", item_id);
        }
        Command::Share {
            id,
            item_id,
            participant_ids,
        } => {
            load(&store, &id).await?;
            store.set_all_shares(&item_id, &participant_ids).await;
            store.ensure_items_synced().await?;
            println!(
                "Item {} now has consumers: {:?}",
                item_id,
                store.item_consumers(&item_id).await
            );
        }
        Command::Review { id } => {
            load(&store, &id).await?;
            match store.compute_review().await {
                Some(calculation) => {
                    println!("Total: {} cents", calculation.total_cents);
                    for total in calculation.participant_totals {
                        println!("  {}: {} cents", total.participant_id, total.amount_cents);
                    }
                }
                None => {
                    return Err(store
                        .save_error()
                        .await
                        .unwrap_or_else(|| "settlement unavailable".to_string())
                        .into());
                }
            }
        }
        Command::Pay {
            id,
            topup_cents,
            wallet,
        } => {
            load(&store, &id).await?;
            match store.pay_split(topup_cents, wallet).await? {
                PayOutcome::Paid => println!("Split paid"),
                PayOutcome::Pending {
                    qr_code,
                    copy_paste,
                    payment_id,
                } => {
                    println!("Payment pending (id: {})", payment_id.unwrap_or_default());
                    if let Some(qr) = qr_code {
                        println!("QR: {}", qr);
                    }
                    if let Some(code) = copy_paste {
                        println!("Copy & paste: {}", code);
                    }
                }
            }
        }
    }

    Ok(())
}

async fn load(store: &SplitStore, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    if store.fetch_draft(id).await {
        Ok(())
    } else {
        Err(store
            .load_error()
            .await
            .unwrap_or_else(|| format!("failed to load split {}", id))
            .into())
    }
}
