use std::path::PathBuf;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};

use crate::config::Configuration;
use crate::core::builder::ParachainStarter;
use crate::logging::pretty_json;

#[derive(Debug, Clone, Parser)]
pub struct RunNodeCmd {
    #[clap(short, long)]
    pub config_file: String,
}

impl RunNodeCmd {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let conf = match Configuration::try_load(PathBuf::from(self.config_file.as_str())) {
            Ok(conf) => conf,
            Err(err) => anyhow::bail!("Error loading configuration file: {err:?}"),
        };

        log::info!("Configuration: {}", pretty_json(&conf));

        let parachain = ParachainStarter::new(conf).init_tasks().await?;
        let parachain_shutdown = parachain.shutdown_handle();
        let mut parachain_handle = tokio::spawn(parachain.run());

        let mut stream_int = signal(SignalKind::interrupt())?;
        let mut stream_term = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = stream_int.recv() => {
                log::info!("Received SIGINT");
                parachain_shutdown.shutdown();
            }
            _ = stream_term.recv() => {
                log::info!("Received SIGTERM");
                parachain_shutdown.shutdown();
            }
            //driver stopped on its own
            stopped = &mut parachain_handle => {
                return stopped?;
            }
        }

        parachain_handle.await?
    }
}
