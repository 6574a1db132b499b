// This is the entry point of the image analysis pipeline.
//
// **Architecture Overview:**
// - `core/` = The pipeline itself and the service contracts it needs
// - `infra/` = Implementations of those contracts (Google REST APIs)
// - `cli/` = Command-line parsing and console output
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize service clients (dependency injection)
// 3. Run the pipeline once and report the outcome

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "cli/cli_layer.rs"]
mod cli;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::Level;

use crate::cli::{summary, Cli};
use crate::core::pipeline::{AnalyzePipeline, PipelineError, PipelineReport};
use crate::infra::ai::GeminiClient;
use crate::infra::google::{
    token_source_from_env, DriveClient, GoogleApi, SheetsClient, StorageClient, VisionClient,
};

async fn run(cli: &Cli) -> anyhow::Result<PipelineReport> {
    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // One token source and one HTTP client shared by all four services.

    let tokens = token_source_from_env()
        .await
        .context("cannot load Google credentials")?;
    let api = GoogleApi::new(tokens).context("cannot build HTTP client")?;

    let mut pipeline = AnalyzePipeline::new(
        DriveClient::new(api.clone()),
        StorageClient::new(api.clone()),
        VisionClient::new(api.clone()),
        SheetsClient::new(api),
    );

    if cli.describe {
        let gemini = GeminiClient::from_env().context("--describe needs Gemini configuration")?;
        pipeline = pipeline.with_describer(Box::new(gemini));
    }

    let request = cli.run_request();
    let layout = pipeline.row_layout(&request);
    tracing::debug!(
        count = layout.column_count(),
        columns = ?layout.header(),
        "Report row layout"
    );

    Ok(pipeline.run(&request).await?)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file (if it exists) before clap
    // reads its env fallbacks.
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    println!("Processing file '{}'... please wait", cli.imgfile);
    println!("{}", "-".repeat(65));

    match run(&cli).await {
        Ok(report) => {
            tracing::debug!(cells = ?report.row.cells, "Appended row");
            for line in summary::render(&report) {
                println!("\n{}", line);
            }
            println!("\n* DONE: {}", cli.sheet_url());
            ExitCode::SUCCESS
        }
        Err(err) => {
            match err.downcast_ref::<PipelineError>() {
                Some(failure) => {
                    tracing::error!(stage = %failure.stage(), "Pipeline failed: {:#}", err)
                }
                None => tracing::error!("Pipeline failed: {:#}", err),
            }
            eprintln!("\n* ERROR: could not process '{}': {:#}", cli.imgfile, err);
            ExitCode::FAILURE
        }
    }
}
