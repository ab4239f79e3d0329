use kwcannibal_core::{Observer, PipelineEvent};

/// Forwards pipeline events to `tracing`: milestones and capped pages at info, fetch failures
/// at warn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::UrlsLoaded { count } => {
                tracing::info!("{count} URLs loaded. Fetching content...");
            }
            PipelineEvent::FetchFailed { index, url, cause } => {
                tracing::warn!(index, "Failed to fetch {url}: {cause}");
            }
            PipelineEvent::PageTruncated {
                index,
                url,
                max_bytes,
            } => {
                tracing::info!(
                    index,
                    "Page {url} exceeds {max_bytes} bytes; analyzing the first {max_bytes}"
                );
            }
            PipelineEvent::AnalysisStarted { pages } => {
                tracing::info!(pages, "Similarity analysis using TF-IDF...");
            }
            PipelineEvent::PairsFound { count, policy } => {
                tracing::info!(%policy, "Found {count} cannibalized page matches");
            }
            PipelineEvent::ReportSaved { path } => {
                tracing::info!("Report saved to {}", path.display());
            }
        }
    }
}
