use std::time::Duration;

use clap::Parser;
use reqwest::{Client, Url};
use serde::Serialize;

use crate::{coordinator::Status, prelude::*};

#[derive(Parser)]
pub struct HeartbeatArgs {
    /// Dead man's switch URL to report every refresh to.
    ///
    /// Failed refreshes go to the same URL with `/fail` appended.
    #[clap(long = "heartbeat-url", env = "HEARTBEAT_URL")]
    pub url: Option<Url>,
}

/// Refresh outcome as posted to the heartbeat URL.
#[derive(Serialize)]
struct Report<'a> {
    plant_id: Option<&'a str>,
    is_available: bool,
    consecutive_failures: u32,
    last_error: Option<&'a str>,
}

impl<'a> From<&'a Status> for Report<'a> {
    fn from(status: &'a Status) -> Self {
        Self {
            plant_id: status.snapshot.as_deref().map(|snapshot| snapshot.account_id.as_str()),
            is_available: status.is_available,
            consecutive_failures: status.consecutive_failures,
            last_error: status.last_error.as_deref(),
        }
    }
}

impl HeartbeatArgs {
    pub async fn send(&self, status: &Status) {
        if let Some(url) = &self.url
            && let Err(error) = Self::send_fallible(url, status).await
        {
            warn!("failed to send the heartbeat: {error:#}");
        }
    }

    #[instrument(skip_all, fields(is_available = status.is_available))]
    async fn send_fallible(url: &Url, status: &Status) -> Result {
        let url = if status.consecutive_failures == 0 { url.clone() } else { failure_url(url)? };
        info!("sending a heartbeat…");
        Client::builder()
            .timeout(Duration::from_secs(3))
            .build()?
            .post(url)
            .json(&Report::from(status))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

fn failure_url(url: &Url) -> Result<Url> {
    let mut failure_url = url.clone();
    failure_url
        .path_segments_mut()
        .map_err(|()| anyhow!("`{url}` cannot be a base URL"))?
        .pop_if_empty()
        .push("fail");
    Ok(failure_url)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Json, Router, extract::State, http::Uri, routing::post};
    use chrono::Local;
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    use super::*;
    use crate::coordinator::Snapshot;

    type Received = Arc<Mutex<Vec<(String, Value)>>>;

    async fn receive(State(received): State<Received>, uri: Uri, Json(body): Json<Value>) {
        received.lock().unwrap().push((uri.path().to_owned(), body));
    }

    fn status(consecutive_failures: u32) -> Status {
        Status {
            snapshot: Some(Arc::new(Snapshot {
                account_id: "4321".to_owned(),
                flow: json!({}),
                day: None,
                fetched_at: Local::now(),
            })),
            is_available: consecutive_failures == 0,
            consecutive_failures,
            last_error: (consecutive_failures != 0).then(|| "timed out".to_owned()),
        }
    }

    #[tokio::test]
    async fn send_reports_outcome() -> Result {
        let received = Received::default();
        let router = Router::new()
            .route("/ping/abc", post(receive))
            .route("/ping/abc/fail", post(receive))
            .with_state(Arc::clone(&received));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = Url::parse(&format!("http://{}/ping/abc", listener.local_addr()?))?;
        tokio::spawn(async move { axum::serve(listener, router).await });

        let heartbeat = HeartbeatArgs { url: Some(url) };
        heartbeat.send(&status(0)).await;
        heartbeat.send(&status(2)).await;

        let received = received.lock().unwrap().clone();
        assert_eq!(
            received,
            [
                (
                    "/ping/abc".to_owned(),
                    json!({
                        "plant_id": "4321",
                        "is_available": true,
                        "consecutive_failures": 0,
                        "last_error": null,
                    }),
                ),
                (
                    "/ping/abc/fail".to_owned(),
                    json!({
                        "plant_id": "4321",
                        "is_available": false,
                        "consecutive_failures": 2,
                        "last_error": "timed out",
                    }),
                ),
            ]
        );
        Ok(())
    }

    #[test]
    fn failure_url_ok() -> Result {
        let url = Url::parse("https://hc-ping.com/abc/")?;
        assert_eq!(failure_url(&url)?.as_str(), "https://hc-ping.com/abc/fail");
        Ok(())
    }

    #[tokio::test]
    async fn send_without_url_is_noop() {
        HeartbeatArgs { url: None }.send(&status(1)).await;
    }
}
