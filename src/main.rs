use std::{sync::Arc, time::Duration};

use anyhow::Error;
use fluid_scale::network::system::SystemNetwork;
use fluid_scale::prelude::*;
use log::{error, info};
use tokio::signal::{
    self,
    unix::{signal as unix_signal, SignalKind},
};

/// How long exit waits on a blocking ADC read abandoned at shutdown.
const BLOCKING_GRACE: Duration = Duration::from_secs(1);

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("HX711 Fluid Measurement System");

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run());
    runtime.shutdown_timeout(BLOCKING_GRACE);
    result
}

async fn run() -> Result<(), Error> {
    let config = Config::load()?;
    let network = Arc::new(SystemNetwork::new(config.provisioning.clone()));
    let controller = ModeController::boot(config, network);

    match controller.run(open_gpio, shutdown_signal()).await? {
        Outcome::RestartRequired => info!("Setup mode complete. Restart to apply Wi-Fi configuration"),
        Outcome::Shutdown => info!("Stopped"),
    }

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM. A handler that cannot be installed never
/// fires rather than shutting down straight away.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match unix_signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown requested");
}
