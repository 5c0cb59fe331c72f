use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::{connect_store, OutputFormat};
use crate::services::catalog::seed_if_empty;

#[derive(Subcommand)]
pub enum CatalogCommands {
    #[command(about = "Insert the default achievements and badges into empty catalogs")]
    Seed,
}

pub async fn handle(cmd: CatalogCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        CatalogCommands::Seed => {
            let store = connect_store().await?;
            let report = seed_if_empty(&store).await?;

            output_success(
                output_format,
                &format!(
                    "Seeded {} achievements and {} badges",
                    report.achievements, report.badges
                ),
                Some(json!({
                    "achievements": report.achievements,
                    "badges": report.badges
                })),
            )
        }
    }
}
