use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::auth::JwtKeys;
use crate::cli::OutputFormat;
use crate::config::config;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Print a JWT for a parent account, signed with JWT_SECRET")]
    Mint {
        #[arg(long, help = "Parent account id")]
        parent: Uuid,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Mint { parent } => {
            let security = &config().security;
            let token = JwtKeys::from_config(security).generate_jwt(parent)?;

            match output_format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "token": token,
                        "parentId": parent,
                        "expiresInHours": security.jwt_expiry_hours
                    }))?
                ),
                OutputFormat::Text => println!("{}", token),
            }
            Ok(())
        }
    }
}
