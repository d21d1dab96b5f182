use super::derive::ProcessedReading;
use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardSummary {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ForwardSummary {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Clone)]
pub struct OpenhabClient {
    client: Client,
    base_url: String,
    items: BTreeMap<String, String>,
}

impl OpenhabClient {
    pub fn new(base_url: &str, items: BTreeMap<String, String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            items,
        })
    }

    pub fn item_url(&self, item: &str) -> String {
        format!("{}/rest/items/{}/state", self.base_url, item)
    }

    /// PUT every mapped value the reading carries. Failures are logged and
    /// counted, never returned.
    pub async fn send(&self, reading: &ProcessedReading) -> ForwardSummary {
        let mut summary = ForwardSummary::default();

        for (key, item) in &self.items {
            let Some(value) = reading.field(key) else {
                tracing::warn!("Skipping invalid or unavailable {} value", key);
                summary.skipped += 1;
                continue;
            };

            match self.put_state(item, &value.to_string()).await {
                Ok(()) => {
                    tracing::debug!("Sent {}={} to {}", key, value, item);
                    summary.sent += 1;
                }
                Err(e) => {
                    tracing::error!("Error sending {} to openHAB: {:#}", key, e);
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    async fn put_state(&self, item: &str, value: &str) -> Result<()> {
        let response = self
            .client
            .put(self.item_url(item))
            .header(CONTENT_TYPE, "text/plain")
            .body(value.to_string())
            .send()
            .await
            .with_context(|| format!("PUT {} failed", self.item_url(item)))?;

        // openHAB answers 202 Accepted for state updates; older releases used 200.
        match response.status() {
            StatusCode::OK | StatusCode::ACCEPTED => Ok(()),
            status => anyhow::bail!("HTTP {}", status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::derive::DEFAULT_SEA_LEVEL_HPA;
    use crate::receiver::packet::{SensorReading, SENTINEL};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Minimal HTTP server recording `(request line, body)` and answering
    /// with `status` for every request.
    async fn fake_openhab(status: &'static str) -> (String, mpsc::UnboundedReceiver<(String, String)>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                let (head_end, content_length) = loop {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                        let length = head
                            .lines()
                            .find_map(|l| l.strip_prefix("content-length:"))
                            .and_then(|v| v.trim().parse::<usize>().ok())
                            .unwrap_or(0);
                        break (pos + 4, length);
                    }
                };
                while buf.len() < head_end + content_length {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let text = String::from_utf8_lossy(&buf).to_string();
                let request_line = text.lines().next().unwrap_or_default().to_string();
                let body = String::from_utf8_lossy(&buf[head_end..]).to_string();
                let _ = tx.send((request_line, body));
                let response = format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}"), rx)
    }

    fn processed(pressure_pa: f32) -> ProcessedReading {
        ProcessedReading::new(
            SensorReading {
                temperature: 21.5,
                pressure_pa,
                humidity: 40.0,
                wind_direction_raw: 1024,
                wind_speed: 2.0,
            },
            DEFAULT_SEA_LEVEL_HPA,
        )
    }

    fn items(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn builds_item_state_url() {
        let client = OpenhabClient::new("http://openhab:8080/", BTreeMap::new(), Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.item_url("WeatherStation_Temperature"),
            "http://openhab:8080/rest/items/WeatherStation_Temperature/state"
        );
    }

    #[tokio::test]
    async fn puts_each_mapped_value() {
        let (url, mut requests) = fake_openhab("200 OK").await;
        let client = OpenhabClient::new(
            &url,
            items(&[("temp", "Temp"), ("wind_direction_deg", "WindDir")]),
            Duration::from_secs(5),
        )
        .unwrap();

        let summary = client.send(&processed(101_325.0)).await;
        assert_eq!(summary, ForwardSummary { sent: 2, skipped: 0, failed: 0 });

        let mut seen = vec![requests.recv().await.unwrap(), requests.recv().await.unwrap()];
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("PUT /rest/items/Temp/state HTTP/1.1".to_string(), "21.50".to_string()),
                ("PUT /rest/items/WindDir/state HTTP/1.1".to_string(), "90.00".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn sentinel_fields_are_not_sent() {
        let (url, mut requests) = fake_openhab("202 Accepted").await;
        let client = OpenhabClient::new(
            &url,
            items(&[("altitude", "Alt"), ("pressure", "Pressure"), ("humidity", "Hum")]),
            Duration::from_secs(5),
        )
        .unwrap();

        let summary = client.send(&processed(SENTINEL)).await;
        assert_eq!(summary, ForwardSummary { sent: 1, skipped: 2, failed: 0 });
        let (line, body) = requests.recv().await.unwrap();
        assert_eq!(line, "PUT /rest/items/Hum/state HTTP/1.1");
        assert_eq!(body, "40.00");
    }

    #[tokio::test]
    async fn http_errors_are_counted_not_raised() {
        let (url, _requests) = fake_openhab("404 Not Found").await;
        let client = OpenhabClient::new(&url, items(&[("temp", "Missing")]), Duration::from_secs(5)).unwrap();

        let summary = client.send(&processed(101_325.0)).await;
        assert_eq!(summary.failed, 1);
        assert!(!summary.success());
    }

    #[tokio::test]
    async fn unreachable_server_is_counted() {
        let client = OpenhabClient::new(
            "http://127.0.0.1:9",
            items(&[("temp", "Temp")]),
            Duration::from_millis(500),
        )
        .unwrap();

        let summary = client.send(&processed(101_325.0)).await;
        assert_eq!(summary, ForwardSummary { sent: 0, skipped: 0, failed: 1 });
    }
}
