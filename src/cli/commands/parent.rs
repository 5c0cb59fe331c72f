use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::{connect_store, OutputFormat};
use crate::database::models::NewParent;

#[derive(Subcommand)]
pub enum ParentCommands {
    #[command(about = "Create a parent account and print its id")]
    Create {
        #[arg(long, help = "First name")]
        first_name: String,

        #[arg(long, help = "Last name")]
        last_name: String,

        #[arg(long, help = "Email address (unique)")]
        email: String,

        #[arg(long, help = "Avatar image URL")]
        avatar_url: Option<String>,
    },
}

pub async fn handle(cmd: ParentCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ParentCommands::Create {
            first_name,
            last_name,
            email,
            avatar_url,
        } => {
            let email = email.trim().to_lowercase();
            if first_name.trim().is_empty() || last_name.trim().is_empty() || email.is_empty() {
                anyhow::bail!("first name, last name and email are all required");
            }

            let store = connect_store().await?;
            let parent = store
                .create_parent(
                    &NewParent {
                        first_name: first_name.trim().to_string(),
                        last_name: last_name.trim().to_string(),
                        email,
                        avatar_url,
                    },
                    Utc::now(),
                )
                .await?;

            output_success(
                output_format,
                &format!("Created parent {} ({})", parent.full_name(), parent.id),
                Some(json!({ "id": parent.id, "email": parent.email })),
            )
        }
    }
}
