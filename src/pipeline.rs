use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn, Instrument};

use crate::config::{filter_by_tickers, load_instruments, InstrumentConfig};
use crate::download::{DownloadOutcome, Downloader};
use crate::error::Result;
use crate::output::write_table;
use crate::parsing::StrategyRegistry;
use crate::run::RunContext;

/// Inputs of a single run.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub etf_config_path: PathBuf,
    pub etf_config_schema_path: PathBuf,
    pub download_only: bool,
    /// Restrict the run to these tickers when set.
    pub tickers: Option<HashSet<String>>,
}

/// Download, then parse, every selected instrument in catalog order.
pub struct Pipeline {
    downloader: Downloader,
    registry: StrategyRegistry,
    ctx: RunContext,
}

impl Pipeline {
    pub fn new(downloader: Downloader, registry: StrategyRegistry, ctx: RunContext) -> Self {
        Self {
            downloader,
            registry,
            ctx,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Execute one run.
    ///
    /// Returns `Err` only when the catalog cannot be loaded; every per-source
    /// and per-file failure is logged and skipped.
    pub async fn run(&self, params: &RunParams) -> Result<()> {
        info!(timecode = %self.ctx.timecode, "Loading ETF configs from file");
        let instruments = match load_instruments(&params.etf_config_path, &params.etf_config_schema_path) {
            Ok(i) => i,
            Err(e) => {
                error!("{}", e);
                return Err(e);
            }
        };

        let instruments = match &params.tickers {
            Some(tickers) => {
                warn_unknown_tickers(&instruments, tickers);
                filter_by_tickers(instruments, tickers)
            }
            None => instruments,
        };

        info!(count = instruments.len(), "Starting ETF processing");
        for instrument in &instruments {
            let span = tracing::info_span!("instrument", ticker = %instrument.ticker_symbol);
            self.process_instrument(instrument, params.download_only)
                .instrument(span)
                .await;
        }
        info!("Run complete");
        Ok(())
    }

    /// Download every source of `instrument`, then parse the successes unless `download_only`.
    ///
    /// Returns the parsed files that were written.
    pub async fn process_instrument(&self, instrument: &InstrumentConfig, download_only: bool) -> Vec<PathBuf> {
        info!("Processing: {}", instrument.ticker_symbol);
        let outcomes = self.downloader.process_downloads(instrument, &self.ctx).await;
        if download_only {
            return Vec::new();
        }
        outcomes
            .iter()
            .filter_map(|outcome| self.parse_download(outcome))
            .collect()
    }

    /// Parse one raw artifact and write its CSV.
    ///
    /// `None` when the outcome carries the empty strategy or when parsing or
    /// writing failed (the failure is logged).
    pub fn parse_download(&self, outcome: &DownloadOutcome) -> Option<PathBuf> {
        if outcome.parsing_strategy.is_empty() {
            return None;
        }
        match parse_and_write(&self.registry, outcome, &self.ctx.parsed_output_dir) {
            Ok(path) => Some(path),
            Err(e) => {
                error!(path = %outcome.file_path.display(), "{}", e);
                None
            }
        }
    }
}

fn parse_and_write(registry: &StrategyRegistry, outcome: &DownloadOutcome, output_dir: &Path) -> Result<PathBuf> {
    info!(path = %outcome.file_path.display(), strategy = %outcome.parsing_strategy, "Parsing file");
    let table = registry.parse(&outcome.parsing_strategy, &outcome.file_path)?;
    let path = write_table(&table, output_dir, &outcome.file_path)?;
    info!(path = %path.display(), rows = table.len(), "Wrote file");
    Ok(path)
}

fn warn_unknown_tickers(instruments: &[InstrumentConfig], tickers: &HashSet<String>) {
    let known: HashSet<&str> = instruments.iter().map(|i| i.ticker_symbol.as_str()).collect();
    let mut missing: Vec<&str> = tickers
        .iter()
        .map(String::as_str)
        .filter(|t| !known.contains(t))
        .collect();
    missing.sort_unstable();
    for ticker in missing {
        warn!(ticker, "Requested ticker not found in config");
    }
}
