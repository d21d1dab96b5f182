pub mod config;
pub mod derive;
pub mod openhab;
pub mod packet;
pub mod radio;

use anyhow::Result;
use std::future::Future;
use std::time::Duration;

pub use config::ReceiverConfig;
use derive::ProcessedReading;
use openhab::{ForwardSummary, OpenhabClient};
use packet::SensorReading;
use radio::Radio;

/// Open the Pi radio and run until interrupted.
pub async fn serve(config: &ReceiverConfig) -> Result<()> {
    let mut radio = radio::open_pi_radio(
        config.radio_ce_pin,
        config.radio_csn_pin,
        config.radio_channel,
    )?;
    let client = OpenhabClient::new(
        &config.openhab_url,
        config.openhab_items.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?;
    run(&mut radio, &client, config, shutdown_signal()).await
}

/// Poll until `shutdown` resolves or the radio fails. The radio is powered
/// down on every exit path.
pub async fn run<R, F>(
    radio: &mut R,
    client: &OpenhabClient,
    config: &ReceiverConfig,
    shutdown: F,
) -> Result<()>
where
    R: Radio,
    F: Future<Output = ()>,
{
    tracing::info!("Starting receiver loop...");
    let interval = Duration::from_millis(config.poll_interval_ms);
    tokio::pin!(shutdown);

    let result = loop {
        if let Err(e) = poll_once(radio, client, config.sea_level_pressure).await {
            tracing::error!("Radio error: {:#}", e);
            break Err(e);
        }

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Receiver stopped by user");
                break Ok(());
            }
            _ = tokio::time::sleep(interval) => {}
        }
    };

    match radio.power_down() {
        Ok(()) => tracing::info!("Radio powered down"),
        Err(e) => tracing::warn!("Failed to power down radio: {:#}", e),
    }
    result
}

/// One poll. Only radio errors are returned; bad payloads and forwarding
/// failures are logged.
pub async fn poll_once<R: Radio>(
    radio: &mut R,
    client: &OpenhabClient,
    sea_level_hpa: f64,
) -> Result<Option<ForwardSummary>> {
    if !radio.available()? {
        return Ok(None);
    }
    let Some(payload) = radio.read_payload()? else {
        return Ok(None);
    };

    let reading = match SensorReading::decode(&payload) {
        Ok(reading) => reading,
        Err(e) => {
            tracing::warn!("Dropping payload: {}", e);
            return Ok(None);
        }
    };
    tracing::info!("Received raw sensor data: {:?}", reading);

    let processed = ProcessedReading::new(reading, sea_level_hpa);
    tracing::info!("Processed sensor data: {}", processed);

    let summary = client.send(&processed).await;
    if summary.success() {
        tracing::info!("Data successfully sent to openHAB");
    } else {
        tracing::warn!(
            "Failed to send some data to openHAB ({} of {} items)",
            summary.failed,
            summary.sent + summary.failed
        );
    }
    Ok(Some(summary))
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::packet::SENTINEL;
    use std::collections::{BTreeMap, VecDeque};

    #[derive(Default)]
    struct FakeRadio {
        queue: VecDeque<Vec<u8>>,
        polls: usize,
        fail_after: Option<usize>,
        powered_down: bool,
    }

    impl Radio for FakeRadio {
        fn available(&mut self) -> Result<bool> {
            self.polls += 1;
            if self.fail_after.is_some_and(|n| self.polls > n) {
                anyhow::bail!("SPI transfer failed");
            }
            Ok(!self.queue.is_empty())
        }

        fn read_payload(&mut self) -> Result<Option<Vec<u8>>> {
            Ok(self.queue.pop_front())
        }

        fn power_down(&mut self) -> Result<()> {
            self.powered_down = true;
            Ok(())
        }
    }

    fn offline_client() -> OpenhabClient {
        OpenhabClient::new("http://127.0.0.1:9", BTreeMap::new(), Duration::from_millis(200)).unwrap()
    }

    fn quick_config() -> ReceiverConfig {
        ReceiverConfig {
            poll_interval_ms: 1,
            ..ReceiverConfig::default()
        }
    }

    fn payload() -> Vec<u8> {
        SensorReading {
            temperature: 12.0,
            pressure_pa: SENTINEL,
            humidity: 70.0,
            wind_direction_raw: 0,
            wind_speed: 1.0,
        }
        .encode()
        .to_vec()
    }

    #[tokio::test]
    async fn short_payload_is_dropped() {
        let mut radio = FakeRadio::default();
        radio.queue.push_back(vec![0; 10]);
        let result = poll_once(&mut radio, &offline_client(), 1013.25).await.unwrap();
        assert!(result.is_none());
        assert!(radio.queue.is_empty());
    }

    #[tokio::test]
    async fn valid_payload_is_forwarded() {
        let mut radio = FakeRadio::default();
        radio.queue.push_back(payload());
        let summary = poll_once(&mut radio, &offline_client(), 1013.25)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary, ForwardSummary::default());
    }

    #[tokio::test]
    async fn shutdown_powers_down_radio() {
        let mut radio = FakeRadio::default();
        radio.queue.extend([payload(), vec![1, 2, 3], payload()]);

        run(
            &mut radio,
            &offline_client(),
            &quick_config(),
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await
        .unwrap();

        assert!(radio.queue.is_empty());
        assert!(radio.powered_down);
    }

    #[tokio::test]
    async fn radio_error_ends_loop() {
        let mut radio = FakeRadio {
            fail_after: Some(3),
            ..FakeRadio::default()
        };

        let result = run(
            &mut radio,
            &offline_client(),
            &quick_config(),
            std::future::pending::<()>(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(radio.polls, 4);
        assert!(radio.powered_down);
    }
}
