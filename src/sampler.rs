use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Error};
use log::{info, warn};
use tokio::{sync::watch, time::sleep};

use crate::{
    adc::AdcLines,
    config::SamplingConfig,
    measurement::MeasurementState,
    scale::{SharedEstimator, WeightEstimator},
};

/// Runs `f` against the estimator on the blocking pool.
///
/// ADC reads busy-wait on the converter, so they never run on an async
/// worker and never while the measurement lock is held.
pub async fn with_estimator<L, T, F>(estimator: &SharedEstimator<L>, f: F) -> Result<T, Error>
where
    L: AdcLines + 'static,
    T: Send + 'static,
    F: FnOnce(&mut WeightEstimator<L>) -> T + Send + 'static,
{
    let estimator = estimator.clone();
    tokio::task::spawn_blocking(move || {
        let mut estimator = estimator
            .lock()
            .map_err(|_| anyhow!("ADC lock poisoned by an earlier panic"))?;
        Ok(f(&mut estimator))
    })
    .await?
}

/// Periodically reads the scale and publishes the result.
pub struct Sampler<L> {
    estimator: SharedEstimator<L>,
    state: Arc<MeasurementState>,
    samples: usize,
    interval: Duration,
}

impl<L: AdcLines + 'static> Sampler<L> {
    pub fn new(
        estimator: SharedEstimator<L>,
        state: Arc<MeasurementState>,
        config: &SamplingConfig,
    ) -> Self {
        Self {
            estimator,
            state,
            samples: config.samples,
            interval: config.interval(),
        }
    }

    /// Loops until `shutdown` flips to true or its sender goes away.
    ///
    /// A stop request abandons a read that is still waiting on the
    /// converter. The blocking thread behind it keeps the ADC lock until its
    /// own clock sequence completes, so a read is never cut off mid-pulse.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), Error> {
        info!(
            "Sampler: averaging {} reads every {:?}",
            self.samples, self.interval
        );

        loop {
            let samples = self.samples;
            let weight = tokio::select! {
                weight = with_estimator(&self.estimator, move |scale| scale.to_units(samples)) => weight?,
                _ = stop_requested(&mut shutdown) => {
                    warn!("Sampler: abandoning a read still waiting on the converter");
                    break;
                }
            };
            self.state.publish(weight);

            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = stop_requested(&mut shutdown) => break,
            }
        }

        info!("Sampler: stopped");
        Ok(())
    }
}

/// Resolves once the flag is true or its sender has been dropped.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use tokio::time::{timeout, Instant};

    use super::*;
    use crate::{
        adc::{
            testing::{SimulatedConverter, StalledConverter},
            Gain, Hx711,
        },
        scale::Calibration,
    };

    fn shared(code: u32) -> SharedEstimator<SimulatedConverter> {
        WeightEstimator::new(
            Hx711::new(SimulatedConverter::steady(code), Gain::A128),
            Calibration::new(2.0).unwrap(),
        )
        .into_shared()
    }

    #[tokio::test]
    async fn test_sampler_publishes_and_stops() {
        let state = Arc::new(MeasurementState::new());
        state.set_container_weight(100.0);

        let config = SamplingConfig {
            samples: 5,
            interval_ms: 10,
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sampler = Sampler::new(shared(1000), state.clone(), &config);
        let handle = tokio::spawn(sampler.run(shutdown_rx));

        let deadline = Instant::now() + Duration::from_secs(5);
        while state.read().current_weight != 500.0 {
            assert!(Instant::now() < deadline, "sampler never published");
            sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(state.read().net_weight, 400.0);

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("sampler did not stop within a cycle")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_sampler_stops_when_flag_dropped() {
        let state = Arc::new(MeasurementState::new());
        let config = SamplingConfig {
            samples: 1,
            interval_ms: 10_000,
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(Sampler::new(shared(2), state, &config).run(shutdown_rx));

        sleep(Duration::from_millis(50)).await;
        drop(shutdown_tx);

        timeout(Duration::from_secs(1), handle)
            .await
            .expect("sampler ignored a dropped flag")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_sampler_stops_while_converter_stalled() {
        let (converter, release) = StalledConverter::new();
        let estimator = WeightEstimator::new(
            Hx711::new(converter, Gain::A128),
            Calibration::new(1.0).unwrap(),
        )
        .into_shared();
        let state = Arc::new(MeasurementState::new());
        let config = SamplingConfig {
            samples: 1,
            interval_ms: 10,
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(Sampler::new(estimator, state.clone(), &config).run(shutdown_rx));

        sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        let stopped = timeout(Duration::from_millis(500), handle).await;

        // Lets the abandoned blocking read finish before the runtime drops
        release.store(true, Ordering::SeqCst);

        stopped
            .expect("sampler ignored shutdown while the converter was stalled")
            .unwrap()
            .unwrap();
        assert_eq!(state.read().current_weight, 0.0);
    }

    #[tokio::test]
    async fn test_with_estimator_tares() {
        let estimator = shared(4242);
        with_estimator(&estimator, |scale| scale.tare(3)).await.unwrap();

        let offset = estimator.lock().unwrap().calibration().offset();
        assert_eq!(offset, 4242);
    }
}
