//! Propose the removal of a federation member through the federation's multisig owner

use anyhow::{Context, Result};
use bridge_federator::federation::remove_member_proposal;
use bridge_federator::{init_logging, Settings, TransactionSender};
use clap::Parser;
use ethers::types::Address;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "remove-member")]
#[command(
    about = "Submit a multisig proposal removing a member from the federation",
    long_about = None
)]
struct Args {
    /// Address of the member to remove
    member: String,

    /// Federation contract address (defaults to [federation].address in the config)
    #[arg(long)]
    federation: Option<String>,

    /// Configuration file (defaults to $FEDERATOR_CONFIG or config/default.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    let member: Address = args
        .member
        .parse()
        .with_context(|| format!("Invalid member address: {}", args.member))?;

    let federation = args
        .federation
        .or_else(|| settings.federation.as_ref().map(|f| f.address.clone()))
        .context("No federation address given; pass --federation or set [federation].address")?;
    let federation: Address = federation
        .parse()
        .with_context(|| format!("Invalid federation address: {}", federation))?;

    println!("The address {:?} will be removed from federation", member);
    println!("Federation address: {:?}", federation);

    let sender = TransactionSender::from_settings(&settings)?;
    let client = sender.client();

    let (multisig, data) = remove_member_proposal(client.as_ref(), federation, member).await?;
    info!("Submitting removal proposal to multisig {:?}", multisig);

    match sender.send_transaction(multisig, data, None).await {
        Ok(submission) => {
            println!("{}", serde_json::to_string_pretty(&submission)?);
            Ok(())
        }
        Err(e) => {
            error!("Removal proposal failed: {}", e);
            Err(e.into())
        }
    }
}
