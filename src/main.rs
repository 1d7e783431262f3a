mod cli;
mod ui;

use std::io::{BufRead, BufReader};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use console::Style;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use graphscribe::{GraphScribeConfig, ReportError};
use graphscribe::graph::GraphRetriever;
use graphscribe::ingest::GraphMemoryManager;
use graphscribe::llm::Message;
use graphscribe::report::{ReportService, ReportStatus};
use graphscribe::store::ReportStore;
use ui::JobProgress;

fn init_tracing(verbose: bool) {
    let default = if verbose { "graphscribe=debug" } else { "graphscribe=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = GraphScribeConfig::load().context("failed to load graphscribe.toml")?;
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(dir) = cli.reports_dir {
        config.reports_dir = dir;
    }
    let service = build_service(&config)?;

    match cli.command {
        Command::Generate {
            simulation_id,
            graph_id,
            requirement,
        } => {
            let progress = JobProgress::start(&format!("report for {simulation_id}"));
            let callback = |stage: &str, percent: i32, message: &str| {
                progress.update(stage, percent, message)
            };
            let report = service
                .run_job(&simulation_id, &graph_id, &requirement, Some(&callback))
                .await;
            progress.complete(&report);
            if report.status == ReportStatus::Failed {
                bail!("report {} failed", report.id);
            }
        }
        Command::Status { id } => match service.get_progress(&id)? {
            Some(snapshot) => ui::print_json("Progress", snapshot.status, &snapshot),
            None => bail!("no progress recorded for {id}"),
        },
        Command::Show { id } => {
            let report = service.require_job(&id)?;
            if report.markdown_content.is_empty() {
                println!(
                    "{}",
                    ui::status_style(report.status)
                        .apply_to(format!("{} has no content yet ({})", report.id, report.status))
                );
            } else {
                println!("{}", report.markdown_content);
            }
        }
        Command::List {
            simulation_id,
            limit,
        } => {
            for report in service.list_jobs(simulation_id.as_deref(), limit)? {
                println!(
                    "{}  {}  {}  {}",
                    report.id,
                    ui::status_style(report.status).apply_to(format!("{:<10}", report.status)),
                    report.simulation_id,
                    report.created_at.to_rfc3339()
                );
            }
        }
        Command::Sections { id } => {
            let dim = Style::new().dim();
            for record in service.get_sections(&id)? {
                println!("{}", dim.apply_to(&record.filename));
                println!("{}\n", record.content);
            }
        }
        Command::Delete { id } => {
            if !service.delete_job(&id)? {
                return Err(ReportError::ReportNotFound(id).into());
            }
            println!("deleted {id}");
        }
        Command::Chat {
            graph_id,
            requirement,
            history,
            message,
        } => {
            let history: Vec<Message> = match history {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    serde_json::from_str(&raw)?
                }
                None => Vec::new(),
            };
            let reply = service
                .converse(&graph_id, &requirement, &message, &history)
                .await?;
            println!("{}", reply.response);
            if !reply.tool_calls.is_empty() {
                let names: Vec<_> = reply.tool_calls.iter().map(|c| c.name.as_str()).collect();
                eprintln!("{}", Style::new().dim().apply_to(format!("tools: {}", names.join(", "))));
            }
        }
        Command::Ingest {
            simulation_id,
            graph_id,
            platform,
            file,
        } => {
            let writer = Arc::new(config.graph_client()?);
            let manager = GraphMemoryManager::new(writer, config.updater_settings());
            let updater = manager.create_updater(&simulation_id, &graph_id).await;

            let reader = BufReader::new(
                std::fs::File::open(&file)
                    .with_context(|| format!("failed to open {}", file.display()))?,
            );
            for (n, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(e) = updater.add_line(&line, &platform).await {
                    warn!(line = n + 1, "skipping malformed action line: {e}");
                }
            }

            manager.stop_all().await;
            let stats = updater.stats();
            ui::print_json(
                "Ingestion",
                if stats.failed_count == 0 {
                    ReportStatus::Completed
                } else {
                    ReportStatus::Failed
                },
                &stats,
            );
        }
    }

    Ok(())
}

/// Credentials are required up front, for every subcommand.
fn build_service(
    config: &GraphScribeConfig,
) -> Result<ReportService<graphscribe::llm::AnthropicClient, graphscribe::graph::ZepClient>> {
    let retriever = GraphRetriever::new(config.graph_client()?, config.retry_policy());
    let store = ReportStore::new(config.reports_dir.clone());
    Ok(ReportService::new(config.llm_client()?, retriever, store)
        .with_limits(config.max_tool_calls_per_section, config.chat_max_rounds))
}
