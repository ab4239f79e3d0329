use crate::{extract, fetch_html};
use futures_util::stream::{self, StreamExt};
use kwcannibal_core::{
    AnalysisConfig, Error, FetchBackend, FetchOutcome, Observer, PageRecord, PipelineEvent, Result,
};
use std::path::Path;

/// One URL per line; lines that are blank after trimming are skipped. No other validation:
/// a malformed URL surfaces later as a fetch failure.
pub fn parse_urls(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect()
}

pub fn load_urls(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::Input {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(parse_urls(&text))
}

async fn fetch_page(
    backend: &dyn FetchBackend,
    cfg: &AnalysisConfig,
    observer: &dyn Observer,
    index: usize,
    url: &str,
) -> PageRecord {
    match fetch_html(backend, &cfg.fetch_request(url)).await {
        FetchOutcome::Fetched { html, truncated } => {
            if truncated {
                observer.on_event(&PipelineEvent::PageTruncated {
                    index,
                    url: url.to_string(),
                    max_bytes: cfg.max_bytes,
                });
            }
            extract::extract(&html).into_record(index, url)
        }
        FetchOutcome::Failed { cause } => {
            observer.on_event(&PipelineEvent::FetchFailed {
                index,
                url: url.to_string(),
                cause: cause.to_string(),
            });
            PageRecord::empty(index, url)
        }
    }
}

/// Fetch and extract every URL, at most `cfg.concurrency` at a time.
///
/// The result has exactly one record per input URL, sorted so that `corpus[i].index == i`.
pub async fn build_corpus(
    backend: &dyn FetchBackend,
    urls: &[String],
    cfg: &AnalysisConfig,
    observer: &dyn Observer,
) -> Vec<PageRecord> {
    let mut corpus: Vec<PageRecord> = stream::iter(urls.iter().enumerate())
        .map(|(index, url)| fetch_page(backend, cfg, observer, index, url))
        .buffer_unordered(cfg.concurrency.max(1))
        .collect()
        .await;
    corpus.sort_by_key(|p| p.index);
    corpus
}

#[cfg(test)]
mod tests {
    use super::*;
    use kwcannibal_core::{FetchRequest, FetchResponse};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves canned pages; unknown URLs fail. Optional per-URL delays shuffle completion order.
    /// Bodies longer than `max_bytes` are cut the way `LocalFetcher` cuts them.
    struct StubBackend {
        pages: HashMap<String, String>,
        delays_ms: HashMap<String, u64>,
    }

    #[async_trait::async_trait]
    impl FetchBackend for StubBackend {
        async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse> {
            if let Some(ms) = self.delays_ms.get(&req.url) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            let body = self
                .pages
                .get(&req.url)
                .ok_or_else(|| Error::Fetch(format!("connection refused: {}", req.url)))?;
            let mut bytes = body.clone().into_bytes();
            let cap = req.max_bytes.map_or(usize::MAX, |m| m as usize);
            let truncated = bytes.len() > cap;
            bytes.truncate(cap);
            Ok(FetchResponse {
                url: req.url.clone(),
                status: 200,
                content_type: Some("text/html".to_string()),
                bytes,
                truncated,
            })
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<PipelineEvent>>,
    }

    impl Observer for RecordingObserver {
        fn on_event(&self, event: &PipelineEvent) {
            self.events
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event.clone());
        }
    }

    fn html(title: &str) -> String {
        format!("<html><head><title>{title}</title></head><body><p>{title} body</p></body></html>")
    }

    #[test]
    fn parse_urls_skips_blank_lines_and_trims() {
        let urls = parse_urls("https://a.example/\n\n   \n  https://b.example/  \r\nhttps://a.example/\n");
        assert_eq!(
            urls,
            vec!["https://a.example/", "https://b.example/", "https://a.example/"]
        );
        assert!(parse_urls("").is_empty());
    }

    #[test]
    fn load_urls_reports_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_urls(&tmp.path().join("urls.txt")).unwrap_err();
        assert!(matches!(err, Error::Input { .. }));
        assert!(err.to_string().contains("urls.txt"));
    }

    #[tokio::test]
    async fn corpus_preserves_input_order_and_duplicates_under_concurrency() {
        let urls: Vec<String> = ["u0", "u1", "u2", "u1"].iter().map(|s| s.to_string()).collect();
        let backend = StubBackend {
            pages: urls.iter().map(|u| (u.clone(), html(u))).collect(),
            // First URL finishes last.
            delays_ms: HashMap::from([("u0".to_string(), 50), ("u2".to_string(), 10)]),
        };
        let cfg = AnalysisConfig {
            concurrency: 4,
            ..AnalysisConfig::default()
        };

        let corpus = build_corpus(&backend, &urls, &cfg, &RecordingObserver::default()).await;
        assert_eq!(corpus.len(), urls.len());
        for (i, (page, url)) in corpus.iter().zip(&urls).enumerate() {
            assert_eq!(page.index, i);
            assert_eq!(&page.url, url);
            assert_eq!(page.title, *url);
        }
    }

    #[tokio::test]
    async fn failed_fetch_degrades_to_empty_record_and_emits_event() {
        let urls = vec!["ok".to_string(), "down".to_string(), "ok2".to_string()];
        let backend = StubBackend {
            pages: HashMap::from([
                ("ok".to_string(), html("Red shoes")),
                ("ok2".to_string(), html("Blue shoes")),
            ]),
            delays_ms: HashMap::new(),
        };
        let observer = RecordingObserver::default();

        let corpus = build_corpus(&backend, &urls, &AnalysisConfig::default(), &observer).await;
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus[1], PageRecord::empty(1, "down"));
        assert_eq!(corpus[2].title, "Blue shoes");

        let events = observer.events.lock().unwrap().clone();
        assert_eq!(events.len(), 1);
        match &events[0] {
            PipelineEvent::FetchFailed { index, url, cause } => {
                assert_eq!(*index, 1);
                assert_eq!(url, "down");
                assert!(cause.contains("connection refused"), "cause={cause}");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn capped_page_is_kept_and_reported() {
        let long = format!(
            "<html><head><title>Short</title></head><body><p>{}</p></body></html>",
            "shoes ".repeat(200)
        );
        let urls = vec!["short".to_string(), "long".to_string()];
        let backend = StubBackend {
            pages: HashMap::from([
                ("short".to_string(), html("Short")),
                ("long".to_string(), long),
            ]),
            delays_ms: HashMap::new(),
        };
        let cfg = AnalysisConfig {
            max_bytes: 200,
            ..AnalysisConfig::default()
        };
        let observer = RecordingObserver::default();

        let corpus = build_corpus(&backend, &urls, &cfg, &observer).await;
        assert_eq!(corpus[1].title, "Short");
        assert!(corpus[1].full_content.len() < 200);

        let events = observer.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![PipelineEvent::PageTruncated {
                index: 1,
                url: "long".to_string(),
                max_bytes: 200,
            }]
        );
    }

    #[tokio::test]
    async fn empty_url_list_gives_empty_corpus() {
        let backend = StubBackend {
            pages: HashMap::new(),
            delays_ms: HashMap::new(),
        };
        let corpus = build_corpus(&backend, &[], &AnalysisConfig::default(), &RecordingObserver::default()).await;
        assert!(corpus.is_empty());
    }
}
