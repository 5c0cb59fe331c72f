use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::utils::{output_error, output_success};
use crate::cli::{connect_store, OutputFormat};
use crate::database::models::{ActiveIdentity, LedgerTotals};
use crate::database::SharedStore;

#[derive(Subcommand)]
pub enum LedgerCommands {
    #[command(about = "Check balance == earned - spent for a parent and each child")]
    Verify {
        #[arg(long, help = "Parent account id")]
        parent: Uuid,
    },
}

/// Ledger totals for every identity in the household, parent first.
pub async fn household_totals(
    store: &SharedStore,
    parent_id: Uuid,
) -> anyhow::Result<Vec<(ActiveIdentity, LedgerTotals)>> {
    let household = store
        .load_household(parent_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Parent account {} not found", parent_id))?;

    let mut identities = vec![ActiveIdentity::for_parent(&household.parent)];
    identities.extend(household.children.iter().map(ActiveIdentity::for_child));

    let mut rows = Vec::with_capacity(identities.len());
    for identity in identities {
        let totals = store.totals(&identity.owner).await?;
        rows.push((identity, totals));
    }
    Ok(rows)
}

pub async fn handle(cmd: LedgerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        LedgerCommands::Verify { parent } => {
            let store = connect_store().await?;
            let rows = household_totals(&store, parent).await?;

            let mismatches: Vec<_> = rows
                .iter()
                .filter(|(_, totals)| !totals.is_consistent())
                .map(|(identity, totals)| {
                    json!({
                        "id": identity.id,
                        "name": identity.display_name,
                        "balance": totals.balance,
                        "earned": totals.earned,
                        "spent": totals.spent
                    })
                })
                .collect();

            if output_format == OutputFormat::Text {
                for (identity, totals) in &rows {
                    println!(
                        "{:<40} balance={:<6} earned={:<6} spent={:<6} {}",
                        identity.id,
                        totals.balance,
                        totals.earned,
                        totals.spent,
                        if totals.is_consistent() { "ok" } else { "MISMATCH" }
                    );
                }
            }

            if mismatches.is_empty() {
                output_success(
                    output_format,
                    &format!("Ledger consistent for {} identities", rows.len()),
                    Some(json!({ "checked": rows.len() })),
                )
            } else {
                output_error(
                    output_format,
                    &format!("{} identities have a balance that does not match their ledger", mismatches.len()),
                    Some("LEDGER_MISMATCH"),
                )?;
                if output_format == OutputFormat::Json {
                    println!("{}", serde_json::to_string_pretty(&json!({ "mismatches": mismatches }))?);
                }
                anyhow::bail!("ledger verification failed")
            }
        }
    }
}
