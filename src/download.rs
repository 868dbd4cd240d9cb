use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::{DataSourceSpec, InstrumentConfig};
use crate::error::{IngestError, Result};
use crate::http::{fetch_with_retry, HttpClientPort, RetryPolicy};
use crate::run::{RunContext, Timecode};

/// A raw artifact that was fetched and written, handed to the parse stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub file_path: PathBuf,
    pub parsing_strategy: String,
}

/// `{timecode}_{ticker_symbol}_{source_id}.{extension}`
///
/// Two runs in the same minute for the same source produce the same name and
/// the later write wins.
pub fn create_data_raw_filename(
    timecode: &Timecode,
    ticker_symbol: &str,
    source_id: &str,
    file_extension: &str,
) -> String {
    format!("{}_{}_{}.{}", timecode, ticker_symbol, source_id, file_extension)
}

/// Text after the last `.` of the URL's final path segment, or empty.
pub fn file_extension_from_url(url: &str) -> String {
    let last_segment = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segs| segs.next_back().map(str::to_string))
            .unwrap_or_default(),
        Err(_) => {
            let no_query = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
            no_query.rsplit('/').next().unwrap_or(no_query).to_string()
        }
    };
    last_segment
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_default()
}

/// Fetches every declared source of an instrument, one at a time.
pub struct Downloader {
    http: Arc<dyn HttpClientPort>,
    policy: RetryPolicy,
}

impl Downloader {
    pub fn new(http: Arc<dyn HttpClientPort>, policy: RetryPolicy) -> Self {
        Self { http, policy }
    }

    /// Fetch one source and write it under the run's raw directory.
    pub async fn download_source(
        &self,
        instrument: &InstrumentConfig,
        source: &DataSourceSpec,
        ctx: &RunContext,
    ) -> Result<DownloadOutcome> {
        info!(url = %source.url, source_id = %source.source_id, "Downloading data source");
        let bytes = fetch_with_retry(self.http.as_ref(), &source.url, &self.policy).await?;

        let filename = create_data_raw_filename(
            &ctx.timecode,
            &instrument.ticker_symbol,
            &source.source_id,
            &file_extension_from_url(&source.url),
        );
        let file_path = ctx.raw_output_dir.join(filename);

        info!(path = %file_path.display(), bytes = bytes.len(), "Writing file");
        fs::write(&file_path, &bytes).map_err(|e| IngestError::SourceWrite {
            path: file_path.clone(),
            source: e,
        })?;

        Ok(DownloadOutcome {
            file_path,
            parsing_strategy: source.parsing_strategy.clone(),
        })
    }

    /// One result per declared source, in declaration order.
    pub async fn download_all(
        &self,
        instrument: &InstrumentConfig,
        ctx: &RunContext,
    ) -> Vec<Result<DownloadOutcome>> {
        let mut results = Vec::with_capacity(instrument.sources.len());
        for source in &instrument.sources {
            results.push(self.download_source(instrument, source, ctx).await);
        }
        results
    }

    /// Download every source, logging each failure and keeping only the successes.
    pub async fn process_downloads(
        &self,
        instrument: &InstrumentConfig,
        ctx: &RunContext,
    ) -> Vec<DownloadOutcome> {
        let results = self.download_all(instrument, ctx).await;
        collect_successes(instrument, results)
    }
}

fn collect_successes(
    instrument: &InstrumentConfig,
    results: Vec<Result<DownloadOutcome>>,
) -> Vec<DownloadOutcome> {
    results
        .into_iter()
        .zip(&instrument.sources)
        .filter_map(|(result, source)| match result {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(ticker = %instrument.ticker_symbol, source_id = %source.source_id, "{}", e);
                None
            }
        })
        .collect()
}
