use std::sync::Arc;

use futures::future::select_all;
use log::{error, info};

use crate::block::manager::BlockManager;
use crate::block::types::block::Block;
use crate::chain::LocalChain;
use crate::core::context::SyncContext;
use crate::core::shutdown::{task_result, ShutdownHandle, ShutdownManager};

enum Stop {
    Requested,
    TaskFinished(usize, anyhow::Result<()>),
}

/// Running parachain driver: the sequence reconciler and the block producer.
pub struct Parachain<C: LocalChain + ?Sized> {
    manager: Arc<BlockManager<C>>,
    shutdown_manager: ShutdownManager,
    shutdown_handle: ShutdownHandle,
}

impl<C: LocalChain + ?Sized> Parachain<C> {
    pub(crate) fn new(
        manager: Arc<BlockManager<C>>,
        shutdown_manager: ShutdownManager,
        shutdown_handle: ShutdownHandle,
    ) -> Self {
        Self {
            manager,
            shutdown_manager,
            shutdown_handle,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown_handle.clone()
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        self.manager.context()
    }

    pub fn current_block(&self) -> Block {
        self.manager.current_block()
    }

    /// Runs until shutdown is requested or one of the tasks stops.
    ///
    /// A task stopping on its own takes the others down with it, its error is returned.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(
            "Starting parachain driver at sequence {}, head {}",
            self.context().current_seq(),
            self.current_block()
        );
        let mut handles = self.shutdown_manager.take_handles();
        if handles.is_empty() {
            anyhow::bail!("Parachain driver has no tasks to run");
        }

        let stop = tokio::select! {
            _ = self.shutdown_manager.external_shutdown.recv() => Stop::Requested,
            (joined, index, _) = select_all(handles.iter_mut()) => {
                Stop::TaskFinished(index, task_result(joined))
            }
        };

        match stop {
            Stop::Requested => {
                info!("Shutting down parachain driver");
                self.shutdown_manager.stop(handles).await
            }
            Stop::TaskFinished(index, result) => {
                handles.remove(index);
                match &result {
                    Ok(_) => error!("Parachain task stopped unexpectedly"),
                    Err(err) => error!("Parachain task failed: {err}"),
                }
                let stopped = self.shutdown_manager.stop(handles).await;
                result.and(stopped)
            }
        }
    }
}
