use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use newswatch_common::Config;
use newswatch_engine::cycle::{CycleOutcome, CycleRunner};
use newswatch_engine::dispatcher::Dispatcher;
use newswatch_engine::launcher::SpawnLauncher;
use newswatch_engine::monitor::CompletionMonitor;
use newswatch_engine::notify::HttpMailer;
use newswatch_engine::report::ReportAssembler;
use newswatch_engine::scorer::OpenAiScorer;
use newswatch_engine::source::GoogleNewsSource;
use newswatch_engine::traits::ReportSink;
use newswatch_engine::worker::Worker;
use newswatch_engine::commands::{apply_commands, parse_commands};
use newswatch_store::{
    EntityStore, PgEntityStore, PgRecipientDirectory, RecipientDirectory,
};

#[derive(Parser)]
#[command(name = "newswatch", about = "Entity news monitoring and digests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the tenant's tracking table and register recipients.
    Setup {
        #[arg(long)]
        tenant: String,
        /// Entity names to track.
        #[arg(long)]
        entity: Vec<String>,
        /// Report recipients.
        #[arg(long)]
        email: Vec<String>,
    },
    /// Run one full processing cycle: clear, dispatch, wait, report.
    Cycle {
        #[arg(long)]
        tenant: String,
    },
    /// Apply plain-text commands (ADD/DELETE/LIST, one per line) from stdin.
    Inbox {
        #[arg(long)]
        tenant: String,
    },
    /// Show completion state for a tenant.
    Status {
        #[arg(long)]
        tenant: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("newswatch=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_redacted();

    let pool = PgPool::connect(&config.database_url).await?;
    let store: Arc<dyn EntityStore> = Arc::new(PgEntityStore::new(pool.clone()));
    let directory = PgRecipientDirectory::new(pool);
    directory.migrate().await?;
    let directory: Arc<dyn RecipientDirectory> = Arc::new(directory);

    match cli.command {
        Commands::Setup {
            tenant,
            entity,
            email,
        } => {
            if !store.table_exists(&tenant).await? {
                store.create_table(&tenant).await?;
            }
            if !entity.is_empty() {
                let outcome = store.add_entities(&tenant, &entity).await?;
                info!(
                    added = outcome.added.len(),
                    failed = outcome.failed.len(),
                    "Entities registered"
                );
            }
            if !email.is_empty() {
                directory.setup(&tenant, &email).await?;
                info!(recipients = email.len(), "Recipient list registered");
            }
        }
        Commands::Cycle { tenant } => {
            let sink: Arc<dyn ReportSink> = Arc::new(HttpMailer::new(
                config.mail_api_url.clone(),
                config.mail_api_key.clone(),
                config.mail_from.clone(),
            ));
            let worker = Arc::new(Worker::new(
                Arc::clone(&store),
                Arc::new(GoogleNewsSource::new(
                    &config.google_api_key,
                    &config.google_cse_id,
                )),
                Arc::new(OpenAiScorer::new(
                    &config.openai_api_key,
                    &config.openai_model,
                )),
            ));
            let runner = CycleRunner::new(
                Arc::clone(&store),
                Dispatcher::new(
                    Arc::clone(&store),
                    Arc::new(SpawnLauncher::new(worker)),
                    config.batch_size,
                ),
                CompletionMonitor::new(
                    Arc::clone(&store),
                    Duration::from_secs(config.poll_interval_secs),
                    config.poll_max_attempts,
                ),
                ReportAssembler::new(
                    Arc::clone(&store),
                    directory,
                    Arc::clone(&sink),
                    config.operator_email.clone(),
                ),
                sink,
                config.operator_email.clone(),
            );

            match runner.run(&tenant).await? {
                CycleOutcome::NothingToProcess => {
                    info!(tenant, "Nothing to process");
                }
                CycleOutcome::Reported { dispatch, delivery } => {
                    info!(
                        tenant,
                        batches = dispatch.batches_dispatched,
                        delivered = delivery.delivered.len(),
                        "Cycle reported"
                    );
                }
            }
        }
        Commands::Inbox { tenant } => {
            let mut text = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut text)?;
            let (commands, rejected) = parse_commands(&text);
            for line in &rejected {
                info!(line, "Ignoring unparseable command line");
            }
            let reply = apply_commands(&store, &tenant, &commands).await?;
            println!("{reply}");
        }
        Commands::Status { tenant } => {
            let status = store.check_completion(&tenant).await?;
            println!("{status:?}");
        }
    }

    Ok(())
}
