//! Decides at boot whether this process provisions Wi-Fi or measures.
//!
//! Modes only move forward within a process. Finishing provisioning ends
//! the process; the supervisor's restart finds the credential record and
//! boots straight into `Operational`. Nothing ever tries to turn a live
//! access point back into a client interface and carry on serving.

use std::{future::Future, sync::Arc};

use anyhow::{Context, Error};
use log::info;
use tokio::{
    net::TcpListener,
    sync::{oneshot, watch, Notify},
    time::sleep,
};

use crate::{
    adc::{AdcLines, Hx711},
    config::{AdcConfig, Config},
    error::{HardwareInitError, ModeError},
    measurement::MeasurementState,
    network::{
        credentials,
        provision::{self, SetupState},
        server::{self, DataService},
        system::NetworkControl,
    },
    sampler::{with_estimator, Sampler},
    scale::{Calibration, WeightEstimator},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    /// No usable credential record was found.
    Unconfigured,
    /// Running the setup access point and form.
    Provisioning,
    /// Sampling the scale and serving measurements.
    Operational,
}

impl DeviceMode {
    pub fn at_boot(configured: bool) -> Self {
        match configured {
            true => DeviceMode::Operational,
            false => DeviceMode::Unconfigured,
        }
    }

    pub fn can_transition_to(self, next: DeviceMode) -> bool {
        matches!(
            (self, next),
            (DeviceMode::Unconfigured, DeviceMode::Provisioning)
        )
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Credentials were stored; the process should exit and be restarted.
    RestartRequired,
    /// A shutdown signal arrived.
    Shutdown,
}

pub struct ModeController<N> {
    config: Config,
    network: Arc<N>,
    mode: DeviceMode,
}

impl<N: NetworkControl> ModeController<N> {
    pub fn boot(config: Config, network: Arc<N>) -> Self {
        let path = &config.provisioning.credentials_path;
        let mode = DeviceMode::at_boot(credentials::is_configured(path));
        info!("Boot: {} -> {:?}", path.display(), mode);

        Self {
            config,
            network,
            mode,
        }
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    /// The port this mode serves on.
    pub fn port(&self) -> u16 {
        match self.mode {
            DeviceMode::Operational => self.config.server.port,
            DeviceMode::Unconfigured | DeviceMode::Provisioning => self.config.provisioning.port,
        }
    }

    pub fn transition(&mut self, next: DeviceMode) -> Result<(), ModeError> {
        if !self.mode.can_transition_to(next) {
            return Err(ModeError {
                from: self.mode,
                to: next,
            });
        }
        info!("Mode: {:?} -> {:?}", self.mode, next);
        self.mode = next;
        Ok(())
    }

    pub async fn run<L, F, S>(self, open_adc: F, shutdown: S) -> Result<Outcome, Error>
    where
        L: AdcLines + 'static,
        F: FnOnce(&AdcConfig) -> Result<Hx711<L>, HardwareInitError>,
        S: Future<Output = ()> + Send + 'static,
    {
        let port = self.port();
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("binding port {port}"))?;
        self.run_on(listener, open_adc, shutdown).await
    }

    /// `open_adc` is only called in `Operational`; provisioning never
    /// touches the converter.
    pub async fn run_on<L, F, S>(
        mut self,
        listener: TcpListener,
        open_adc: F,
        shutdown: S,
    ) -> Result<Outcome, Error>
    where
        L: AdcLines + 'static,
        F: FnOnce(&AdcConfig) -> Result<Hx711<L>, HardwareInitError>,
        S: Future<Output = ()> + Send + 'static,
    {
        match self.mode {
            DeviceMode::Unconfigured => {
                self.transition(DeviceMode::Provisioning)?;
                self.provision(listener, shutdown).await
            }
            DeviceMode::Provisioning => self.provision(listener, shutdown).await,
            DeviceMode::Operational => self.operate(listener, open_adc, shutdown).await,
        }
    }

    async fn provision<S>(&self, listener: TcpListener, shutdown: S) -> Result<Outcome, Error>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let setup = &self.config.provisioning;

        let network = self.network.clone();
        tokio::task::spawn_blocking(move || network.apply_access_point_config()).await??;
        info!(
            "Access point started. SSID: {}, Password: {}",
            setup.ssid, setup.passphrase
        );

        let completed = Arc::new(Notify::new());
        let app = provision::router(SetupState::new(
            self.network.clone(),
            setup.clone(),
            completed.clone(),
        ));

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let signal = async move {
            let outcome = tokio::select! {
                _ = completed.notified() => Outcome::RestartRequired,
                _ = shutdown => Outcome::Shutdown,
            };
            let _ = outcome_tx.send(outcome);
        };

        info!("Setup server listening on {}", listener.local_addr()?);
        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
            .context("setup server failed")?;

        let outcome = outcome_rx.await.unwrap_or(Outcome::Shutdown);
        if outcome == Outcome::RestartRequired {
            // Give the browser time to show the success page before the
            // access point disappears under it
            sleep(setup.teardown_delay()).await;

            let network = self.network.clone();
            tokio::task::spawn_blocking(move || network.restore_station_config()).await??;
            info!("Wi-Fi configuration complete. Exiting so the next start joins the network");
        }

        Ok(outcome)
    }

    async fn operate<L, F, S>(
        &self,
        listener: TcpListener,
        open_adc: F,
        shutdown: S,
    ) -> Result<Outcome, Error>
    where
        L: AdcLines + 'static,
        F: FnOnce(&AdcConfig) -> Result<Hx711<L>, HardwareInitError>,
        S: Future<Output = ()> + Send + 'static,
    {
        let adc = open_adc(&self.config.adc)?;
        let calibration = Calibration::new(self.config.calibration.scale)?;
        let estimator = WeightEstimator::new(adc, calibration).into_shared();

        let tare_samples = self.config.calibration.tare_samples;
        info!("Taring over {} reads", tare_samples);
        with_estimator(&estimator, move |scale| scale.tare(tare_samples)).await?;

        let measurements = Arc::new(MeasurementState::new());
        let (stop_tx, stop_rx) = watch::channel(false);
        let sampler = Sampler::new(
            estimator.clone(),
            measurements.clone(),
            &self.config.sampling,
        );
        let sampler = tokio::spawn(sampler.run(stop_rx));

        let app = server::router(DataService::new(
            measurements,
            estimator,
            self.config.server.web_root.clone(),
            tare_samples,
        ));

        info!("Data server listening on {}", listener.local_addr()?);
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        let _ = stop_tx.send(true);
        sampler.await??;
        served.context("data server failed")?;

        Ok(Outcome::Shutdown)
    }
}
