use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use ticket_triage_ml::{
    config::{Config, StorageBackend},
    error::AppError,
    ml::{gather_metrics, init_ml_metrics, CorpusWindow, TicketMlService},
    models::Ticket,
    seed::generate_tickets,
    state::InMemoryTicketSource,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Exit code for a training run skipped for lack of data
const EXIT_INSUFFICIENT_DATA: u8 = 2;

#[derive(Parser)]
#[command(name = "ticket-ml")]
#[command(about = "Ticket category classifier and similarity search", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON file holding an array of tickets
    #[arg(short, long, env = "TICKET_ML_TICKETS", default_value = "data/tickets.json")]
    tickets: PathBuf,

    /// Override the configured artifact location
    #[arg(short, long, env = "TICKET_ML_MODEL_PATH")]
    model_path: Option<PathBuf>,

    /// Print Prometheus metrics to stdout before exiting
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write synthetic labeled tickets to a JSON file
    Seed {
        #[arg(short = 'n', long, default_value = "200")]
        count: usize,

        /// Destination (defaults to the --tickets path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Train the classifier on every labeled ticket
    Train,

    /// Predict the category of a ticket
    Predict {
        #[arg(long)]
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// List tickets similar to an existing one
    Similar {
        #[arg(value_name = "TICKET_ID")]
        id: Uuid,

        /// Number of results, clamped to the configured range
        #[arg(long, allow_negative_numbers = true)]
        top: Option<i64>,

        /// Number of recent tickets to compare against
        #[arg(long)]
        max_corpus: Option<i64>,
    },

    /// Show the current model
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    init_tracing(&config);
    // Eager registration only; ML_METRICS is created on first record anyway
    if config.observability.metrics_enabled {
        init_ml_metrics();
    }

    if let Some(path) = cli.model_path.clone() {
        if matches!(config.storage.backend, StorageBackend::Memory) {
            config.storage.backend = StorageBackend::File;
        }
        config.storage.path = Some(path);
    }

    let print_metrics = cli.print_metrics;
    let code = match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    };

    if print_metrics {
        print!("{}", gather_metrics());
    }
    code
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("ticket_triage_ml={}", config.observability.log_level).into()
    });

    let json = config.observability.json_logs;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Seed { count, output } => {
            let output = output.unwrap_or(cli.tickets);
            let tickets = generate_tickets(count, chrono::Utc::now());
            write_tickets(&output, &tickets)?;
            println!("Created {} synthetic tickets in {}", tickets.len(), output.display());
        }

        Commands::Train => {
            let (service, _) = open_service(&cli.tickets, config, true)?;
            match service.train().await {
                Ok(summary) => {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                Err(AppError::InsufficientTrainingData { .. }) => {
                    eprintln!("No data (or only one class)");
                    return Ok(ExitCode::from(EXIT_INSUFFICIENT_DATA));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Predict { title, description } => {
            let (service, _) = open_service(&cli.tickets, config, false)?;
            let ticket = Ticket::new(title, description);
            match service.predict(&ticket).await {
                Ok(prediction) => {
                    println!("{}", serde_json::to_string_pretty(&prediction)?);
                }
                Err(AppError::ModelNotTrained) => {
                    eprintln!("Model not trained");
                    return Ok(ExitCode::from(EXIT_INSUFFICIENT_DATA));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Similar {
            id,
            top,
            max_corpus,
        } => {
            let (service, source) = open_service(&cli.tickets, config, true)?;
            let ticket = source
                .get(&id)
                .with_context(|| format!("ticket {} not found", id))?;
            let similarity = &service.config().similarity;
            let top_k = service.top_k(top.unwrap_or(similarity.default_top_k as i64));
            let window = CorpusWindow::clamped(max_corpus.unwrap_or(similarity.max_corpus as i64));

            let results = service.find_similar(&ticket, top_k, window).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "ticket_id": id,
                    "top_k": top_k.get(),
                    "results": results,
                }))?
            );
        }

        Commands::Status => {
            let (service, _) = open_service(&cli.tickets, config, false)?;
            let status = service.model_status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// `predict` and `status` never read the corpus, so they tolerate a missing file
fn open_service(
    tickets: &Path,
    config: Config,
    corpus_required: bool,
) -> anyhow::Result<(TicketMlService, Arc<InMemoryTicketSource>)> {
    let source = if corpus_required || tickets.exists() {
        InMemoryTicketSource::from_json_file(tickets)
            .with_context(|| format!("loading tickets from {}", tickets.display()))?
    } else {
        InMemoryTicketSource::new()
    };
    let source = Arc::new(source);
    tracing::info!(tickets = source.len(), "Loaded ticket corpus");

    let service = TicketMlService::from_config(config, source.clone())
        .context("initializing ML service")?;
    Ok((service, source))
}

fn write_tickets(path: &Path, tickets: &[Ticket]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(tickets)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticket_triage_ml::ml::TopK;

    #[test]
    fn test_cli_parses_similar() {
        let id = Uuid::new_v4();
        let id_arg = id.to_string();
        let cli = Cli::try_parse_from([
            "ticket-ml",
            "--tickets",
            "t.json",
            "similar",
            id_arg.as_str(),
            "--top",
            "-3",
        ])
        .unwrap();

        match cli.command {
            Commands::Similar { id: parsed, top, .. } => {
                assert_eq!(parsed, id);
                assert_eq!(top, Some(-3));
                assert_eq!(TopK::clamped(top.unwrap(), TopK::MAX).get(), 1);
            }
            _ => panic!("expected similar command"),
        }
    }

    #[test]
    fn test_cli_parses_seed_defaults() {
        let cli = Cli::try_parse_from(["ticket-ml", "seed"]).unwrap();
        match cli.command {
            Commands::Seed { count, output } => {
                assert_eq!(count, 200);
                assert!(output.is_none());
            }
            _ => panic!("expected seed command"),
        }
    }
}
