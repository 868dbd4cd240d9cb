use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use etf_ingest::download::Downloader;
use etf_ingest::http::{ReqwestHttp, RetryPolicy};
use etf_ingest::logging::RunLog;
use etf_ingest::parsing::StrategyRegistry;
use etf_ingest::pipeline::{Pipeline, RunParams};
use etf_ingest::run::{DataLayout, RunContext, Timecode};
use etf_ingest::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "etf_ingest")]
#[command(about = "Download ETF reference data and parse it into CSV")]
#[command(version)]
struct Cli {
    /// YAML catalog of ETFs and their data sources
    #[arg(long, default_value = "config/etf_config.yaml")]
    etf_config_path: PathBuf,

    /// JSON Schema the catalog must satisfy
    #[arg(long, default_value = "config/etf_config_schema.json")]
    etf_config_schema_path: PathBuf,

    /// Root for raw/ and parsed/ data
    #[arg(long, default_value = "data")]
    data_path: PathBuf,

    /// Root for info/ and errors/ logs
    #[arg(long, default_value = "logs")]
    logs_path: PathBuf,

    /// Only download raw files, skip parsing
    #[arg(long)]
    download_only: bool,

    /// Restrict the run to these tickers
    #[arg(long, num_args = 1..)]
    etfs: Option<Vec<String>>,

    /// Optional TOML file with HTTP settings
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let settings = Settings::load_or_default(cli.settings.as_deref())?;

    let layout = DataLayout::new(&cli.data_path, &cli.logs_path);
    layout
        .bootstrap()
        .context("Failed to create data and log directories")?;

    // one timecode per run, shared by every artifact and both log files
    let timecode = Timecode::now();
    let run_log = RunLog::open(&timecode, &layout.logs_info, &layout.logs_errors);

    let http = Arc::new(ReqwestHttp::new(&settings.http)?);
    let downloader = Downloader::new(http, RetryPolicy::from(&settings.http));
    let pipeline = Pipeline::new(downloader, StrategyRegistry::new(), RunContext::new(timecode, &layout));

    let params = RunParams {
        etf_config_path: cli.etf_config_path,
        etf_config_schema_path: cli.etf_config_schema_path,
        download_only: cli.download_only,
        tickers: cli.etfs.map(|t| t.into_iter().collect::<HashSet<_>>()),
    };

    let outcome = run_log.scope(pipeline.run(&params)).await;
    run_log.close();

    Ok(match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    })
}
