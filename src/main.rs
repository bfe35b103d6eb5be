use anyhow::Context;
use clap::{Parser, Subcommand};
use qbank::extraction::PlainTextExtractor;
use qbank::generation;
use qbank::pipeline::{PipelineService, PipelineSettings};
use qbank::store::FsStore;
use qbank::{config, logging};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "qbank", about = "Generate assessment questions from documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline on a document and print the output location.
    Generate {
        /// Path to the source document.
        file: PathBuf,
    },
    /// Print the stored status of a job.
    Status {
        /// Job identifier returned by `generate`.
        job_id: String,
    },
    /// Print the generated question set of a completed job as JSON.
    Show {
        /// Job identifier returned by `generate`.
        job_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_config();
    logging::init_tracing();
    let cli = Cli::parse();

    let service = build_service()?;
    match cli.command {
        Command::Generate { file } => generate(&service, &file).await,
        Command::Status { job_id } => status(&service, &job_id).await,
        Command::Show { job_id } => show(&service, &job_id).await,
    }
}

fn build_service() -> anyhow::Result<PipelineService> {
    let config = config::get_config();
    let store = Arc::new(
        FsStore::new(&config.data_dir)
            .with_context(|| format!("Failed to open data directory {}", config.data_dir))?,
    );
    let client =
        generation::get_completion_client(config).context("Failed to build completion client")?;
    Ok(PipelineService::new(
        client,
        store.clone(),
        store.clone(),
        store,
        Arc::new(PlainTextExtractor),
        PipelineSettings::from_config(config),
    ))
}

async fn generate(service: &PipelineService, file: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let job = service.submit_document(&bytes).await?;
    println!("Job {}", job.id);

    service.extract_text(&job.id).await?;
    let outcome = service.generate_questions(&job.id).await?;

    let job = service.get_job(&job.id).await?;
    println!(
        "Generated {} questions from {} chunks ({} failed)",
        outcome.set.questions.len(),
        outcome.report.chunks_total,
        outcome.report.chunks_failed
    );
    for failure in &outcome.report.failures {
        println!("  chunk {}: {}", failure.index + 1, failure.reason);
    }
    if let Some(output_ref) = job.output_ref {
        println!("Output: {output_ref}");
    }
    Ok(())
}

async fn status(service: &PipelineService, job_id: &str) -> anyhow::Result<()> {
    let job = service.get_job(job_id).await?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}

async fn show(service: &PipelineService, job_id: &str) -> anyhow::Result<()> {
    match service.get_generated_set(job_id).await? {
        Some(set) => println!("{}", serde_json::to_string_pretty(&set)?),
        None => println!("Job {job_id} has no generated questions yet"),
    }
    Ok(())
}
