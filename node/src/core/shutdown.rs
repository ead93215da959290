use log::{error, info};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

pub(crate) type TaskHandle = JoinHandle<anyhow::Result<()>>;

pub(crate) struct ShutdownManager {
    pub(crate) shutdown_tx: broadcast::Sender<()>,
    pub(crate) _shutdown_rcv: broadcast::Receiver<()>,
    pub(crate) external_shutdown: mpsc::UnboundedReceiver<()>,
    handles: Vec<TaskHandle>,
}

pub(crate) struct Shutdown {
    pub(crate) shutdown_signal_rcv: broadcast::Receiver<()>,
}

#[derive(Clone)]
pub struct ShutdownHandle {
    pub(crate) external_shutdown: mpsc::UnboundedSender<()>,
}

impl ShutdownHandle {
    /// Asks the parachain driver to stop its tasks and return.
    pub fn shutdown(&self) {
        if self.external_shutdown.send(()).is_err() {
            info!("Parachain driver already stopped");
        }
    }
}

impl ShutdownManager {
    pub(crate) fn init() -> (ShutdownManager, ShutdownHandle) {
        let (shutdown_tx, shutdown_rcv) = broadcast::channel(1);
        let (external_tx, external_rcv) = mpsc::unbounded_channel();
        let shutdown_handle = ShutdownHandle {
            external_shutdown: external_tx,
        };
        let manager = Self {
            shutdown_tx,
            _shutdown_rcv: shutdown_rcv,
            external_shutdown: external_rcv,
            handles: vec![],
        };
        (manager, shutdown_handle)
    }

    /// Signals all tasks and waits for them to finish.
    /// Returns the first error any of them finished with.
    pub(crate) async fn stop(self, handles: Vec<TaskHandle>) -> anyhow::Result<()> {
        info!("Starting parachain shutdown");
        if self.shutdown_tx.send(()).is_err() {
            error!("No task listens for shutdown signal");
        }
        info!("Waiting for tasks to finish");
        let mut result = Ok(());
        for handle in handles {
            match task_result(handle.await) {
                Ok(_) => info!("Task finished successfully"),
                Err(err) => {
                    error!("Task finished with error: {err}");
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            }
        }
        result
    }

    pub(crate) fn subscribe(&self) -> Shutdown {
        let shutdown = self.shutdown_tx.subscribe();
        Shutdown {
            shutdown_signal_rcv: shutdown,
        }
    }

    pub(crate) fn add_handle(&mut self, handle: TaskHandle) {
        self.handles.push(handle);
    }

    pub(crate) fn take_handles(&mut self) -> Vec<TaskHandle> {
        std::mem::take(&mut self.handles)
    }
}

pub(crate) fn task_result(
    joined: Result<anyhow::Result<()>, tokio::task::JoinError>,
) -> anyhow::Result<()> {
    match joined {
        Ok(result) => result,
        Err(err) => Err(anyhow::anyhow!("Task panicked or was cancelled: {err}")),
    }
}
