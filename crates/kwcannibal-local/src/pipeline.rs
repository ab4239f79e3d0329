//! End-to-end analysis: corpus -> similarity matrix -> report.

use crate::corpus::build_corpus;
use crate::report::{self, Report};
use crate::similarity::{compute_similarity, SimilarityMatrix};
use kwcannibal_core::{
    AnalysisConfig, FetchBackend, Observer, PageRecord, PipelineEvent, Result,
};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Analysis {
    pub corpus: Vec<PageRecord>,
    pub matrix: SimilarityMatrix,
    pub threshold: f64,
    pub report: Report,
}

/// Pure part of the pipeline: score an already-built corpus and apply the configured policy.
pub fn analyze_corpus(
    corpus: Vec<PageRecord>,
    cfg: &AnalysisConfig,
    observer: &dyn Observer,
) -> Analysis {
    observer.on_event(&PipelineEvent::AnalysisStarted {
        pages: corpus.len(),
    });
    let matrix = compute_similarity(&corpus);
    let threshold = cfg.effective_threshold();
    let report = report::build_report(cfg.policy, &corpus, &matrix, threshold);
    observer.on_event(&PipelineEvent::PairsFound {
        count: report.len(),
        policy: cfg.policy,
    });
    Analysis {
        corpus,
        matrix,
        threshold,
        report,
    }
}

pub async fn analyze_urls(
    backend: &dyn FetchBackend,
    urls: &[String],
    cfg: &AnalysisConfig,
    observer: &dyn Observer,
) -> Result<Analysis> {
    cfg.validate()?;
    observer.on_event(&PipelineEvent::UrlsLoaded { count: urls.len() });
    let corpus = build_corpus(backend, urls, cfg, observer).await;
    Ok(analyze_corpus(corpus, cfg, observer))
}

pub fn save_report(
    analysis: &Analysis,
    cfg: &AnalysisConfig,
    path: &Path,
    observer: &dyn Observer,
) -> Result<()> {
    report::save_csv(&analysis.report, cfg.report_shape, path)?;
    observer.on_event(&PipelineEvent::ReportSaved {
        path: path.to_path_buf(),
    });
    Ok(())
}
