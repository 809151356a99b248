use anyhow::Result;
use clap::{Parser, Subcommand};
use forumbridge_backend::config::BridgeConfig;
use forumbridge_backend::database::repositories::LedgerRepository;
use forumbridge_backend::ledger::{REPLY_PREFIX, TOPIC_PREFIX};
use forumbridge_backend::node::BridgeNode;
use forumbridge_backend::telemetry;
use forumbridge_backend::utils;

#[derive(Parser)]
#[command(author, version, about = "Mirror a forum feed into Slack threads")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server and the periodic mirroring scheduler
    Serve,
    /// Run a single mirror pass and print its summary as JSON
    Sync,
    /// Print how many topics and replies the ledger has recorded
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::print_banner();
    telemetry::init_tracing();

    let args = Args::parse();
    let config = BridgeConfig::from_env()?;
    let node = BridgeNode::start(config).await?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => node.run_server().await,
        Command::Sync => {
            let summary = node.engine().run_pass().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if !summary.is_success() {
                anyhow::bail!("mirror pass finished with {} error(s)", summary.errors.len());
            }
            Ok(())
        }
        Command::Status => {
            let (topics, replies) = node.database().with_repositories(|repos| {
                let ledger = repos.ledger();
                Ok((
                    ledger.count_with_prefix(TOPIC_PREFIX)?,
                    ledger.count_with_prefix(REPLY_PREFIX)?,
                ))
            })?;
            println!("mirrored topics:  {topics}");
            println!("mirrored replies: {replies}");
            Ok(())
        }
    }
}
