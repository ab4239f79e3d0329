use kwcannibal_core::{Error, FetchBackend, FetchOutcome, FetchRequest, FetchResponse, Result};
use std::time::Duration;

pub mod corpus;
pub mod extract;
pub mod observe;
pub mod pipeline;
pub mod report;
pub mod similarity;
pub mod textprep;

#[derive(Debug, Clone)]
pub struct LocalFetcher {
    client: reqwest::Client,
}

impl LocalFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            // Per-request timeouts (FetchRequest.timeout_ms) override the overall cap.
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl FetchBackend for LocalFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse> {
        let url = req.parsed_url()?;

        let mut rb = self.client.get(url);
        if let Some(to) = req.timeout() {
            rb = rb.timeout(to);
        }
        let resp = rb.send().await.map_err(|e| Error::Fetch(e.to_string()))?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let max_bytes = usize::try_from(req.max_bytes.unwrap_or(u64::MAX)).unwrap_or(usize::MAX);
        let mut truncated = false;
        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Fetch(e.to_string()))?;
            if bytes.len().saturating_add(chunk.len()) > max_bytes {
                let can_take = max_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchResponse {
            url: req.url.clone(),
            status,
            content_type,
            bytes,
            truncated,
        })
    }
}

/// Single best-effort attempt: any transport error, non-2xx status or non-HTML body becomes
/// `FetchOutcome::Failed`.
pub async fn fetch_html(backend: &dyn FetchBackend, req: &FetchRequest) -> FetchOutcome {
    let resp = match backend.fetch(req).await {
        Ok(resp) => resp,
        Err(cause) => return FetchOutcome::Failed { cause },
    };
    if !resp.is_success() {
        return FetchOutcome::Failed {
            cause: Error::Status(resp.status),
        };
    }
    if !resp.is_html() {
        return FetchOutcome::Failed {
            cause: Error::NotHtml(resp.content_type.unwrap_or_default()),
        };
    }
    FetchOutcome::Fetched {
        html: resp.text_lossy(),
        truncated: resp.truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::header, http::StatusCode, routing::get, Router};
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn req(url: String) -> FetchRequest {
        FetchRequest {
            url,
            timeout_ms: Some(2_000),
            max_bytes: Some(1_000_000),
        }
    }

    #[tokio::test]
    async fn fetch_html_returns_body_for_html_pages() {
        let app = Router::new().route(
            "/",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                    "<html><head><title>Red shoes</title></head></html>",
                )
            }),
        );
        let addr = serve(app).await;
        let fetcher = LocalFetcher::new("kwcannibal-test").unwrap();

        let out = fetch_html(&fetcher, &req(format!("http://{addr}/"))).await;
        assert!(out.html().unwrap().contains("Red shoes"));
    }

    #[tokio::test]
    async fn fetch_html_fails_open_on_error_status_and_non_html() {
        let app = Router::new()
            .route(
                "/missing",
                get(|| async { (StatusCode::NOT_FOUND, "<html>gone</html>") }),
            )
            .route(
                "/json",
                get(|| async { ([(header::CONTENT_TYPE, "application/json")], "{}") }),
            );
        let addr = serve(app).await;
        let fetcher = LocalFetcher::new("kwcannibal-test").unwrap();

        let out = fetch_html(&fetcher, &req(format!("http://{addr}/missing"))).await;
        assert!(matches!(
            out,
            FetchOutcome::Failed {
                cause: Error::Status(404)
            }
        ));

        let out = fetch_html(&fetcher, &req(format!("http://{addr}/json"))).await;
        assert!(matches!(
            out,
            FetchOutcome::Failed {
                cause: Error::NotHtml(_)
            }
        ));
    }

    #[tokio::test]
    async fn fetch_html_fails_open_on_invalid_url_and_refused_connection() {
        let fetcher = LocalFetcher::new("kwcannibal-test").unwrap();

        let out = fetch_html(&fetcher, &req("not a url".to_string())).await;
        assert!(matches!(
            out,
            FetchOutcome::Failed {
                cause: Error::InvalidUrl(_)
            }
        ));

        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let out = fetch_html(&fetcher, &req(format!("http://{addr}/"))).await;
        assert!(matches!(
            out,
            FetchOutcome::Failed {
                cause: Error::Fetch(_)
            }
        ));
    }

    #[tokio::test]
    async fn fetch_times_out_on_slow_server() {
        let app = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "<html></html>"
            }),
        );
        let addr = serve(app).await;
        let fetcher = LocalFetcher::new("kwcannibal-test").unwrap();

        let mut r = req(format!("http://{addr}/slow"));
        r.timeout_ms = Some(200);
        let out = fetch_html(&fetcher, &r).await;
        assert!(matches!(
            out,
            FetchOutcome::Failed {
                cause: Error::Fetch(_)
            }
        ));
    }

    #[tokio::test]
    async fn body_is_truncated_at_max_bytes() {
        let app = Router::new().route(
            "/",
            get(|| async { ([(header::CONTENT_TYPE, "text/html")], "x".repeat(4096)) }),
        );
        let addr = serve(app).await;
        let fetcher = LocalFetcher::new("kwcannibal-test").unwrap();

        let mut r = req(format!("http://{addr}/"));
        r.max_bytes = Some(100);
        let resp = fetcher.fetch(&r).await.unwrap();
        assert!(resp.truncated);
        assert_eq!(resp.bytes.len(), 100);

        match fetch_html(&fetcher, &r).await {
            FetchOutcome::Fetched { html, truncated } => {
                assert!(truncated);
                assert_eq!(html.len(), 100);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        r.max_bytes = Some(1_000_000);
        match fetch_html(&fetcher, &r).await {
            FetchOutcome::Fetched { truncated, .. } => assert!(!truncated),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
