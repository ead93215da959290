use std::sync::Arc;
use std::time::Duration;

use crate::block::manager::BlockManager;
use crate::block::types::block::Block;
use crate::chain::LocalChain;
use crate::config::BlockConfiguration;
use crate::core::shutdown::Shutdown;

const NOT_READY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, PartialEq, Eq)]
pub enum ProduceOutcome {
    /// Local node isn't ready to mine
    NotReady,
    EmptyBlock(Block),
    Block(Block),
    /// Nothing eligible in the cache
    Idle,
    /// Block was built but didn't make it to the chain
    Failed,
}

/// Periodically packs cached transactions into local blocks.
///
/// When there is nothing to pack for a long time while the node lags behind the main chain,
/// empty blocks keep the local height moving.
pub struct BlockProducer<C: LocalChain + ?Sized> {
    manager: Arc<BlockManager<C>>,
    config: BlockConfiguration,
    seq_range: i64,
    ///Ticks since the last committed block
    idle_ticks: u64,
}

impl<C: LocalChain + ?Sized> BlockProducer<C> {
    pub fn new(manager: Arc<BlockManager<C>>, config: BlockConfiguration, seq_range: i64) -> Self {
        Self {
            manager,
            config,
            seq_range,
            idle_ticks: 0,
        }
    }

    pub(crate) async fn run(mut self, mut shutdown: Shutdown) -> anyhow::Result<()> {
        log::info!(
            "Block producer started, interval {}s, empty block after {} idle ticks",
            self.config.interval_sec,
            self.config.empty_block_ticks()
        );
        loop {
            let delay = if self.manager.chain().is_mining_ready() {
                self.config.interval()
            } else {
                NOT_READY_DELAY
            };

            tokio::select! {
                _ = shutdown.shutdown_signal_rcv.recv() => {
                    log::info!("Shutting down block producer");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            match self.produce() {
                ProduceOutcome::NotReady => log::trace!("Waiting for the local node to become ready"),
                ProduceOutcome::Idle => log::trace!("No transactions to pack, idle ticks: {}", self.idle_ticks),
                ProduceOutcome::Failed | ProduceOutcome::Block(_) | ProduceOutcome::EmptyBlock(_) => {}
            }
        }
        Ok(())
    }

    /// One production tick.
    pub fn produce(&mut self) -> ProduceOutcome {
        if !self.manager.chain().is_mining_ready() {
            return ProduceOutcome::NotReady;
        }

        let mut head = self.manager.lock_head();
        let parent = head.clone();
        let context = self.manager.context();

        let gap = context.sequence_gap();
        if self.idle_ticks >= self.config.empty_block_ticks()
            && gap > self.config.empty_block_seq_threshold
        {
            log::info!(
                "Idle for {} ticks with sequence gap {gap}, creating an empty block",
                self.idle_ticks
            );
            return match self.manager.create_empty_block(&mut head, &parent) {
                Ok(block) => {
                    self.idle_ticks = 0;
                    ProduceOutcome::EmptyBlock(block)
                }
                Err(err) => {
                    log::error!("Failed to write empty block: {err}");
                    self.idle_ticks += 1;
                    ProduceOutcome::Failed
                }
            };
        }

        let parameter = self.manager.chain().chain_parameter(parent.height + 1);
        let txs = context
            .cache
            .pull(parameter.max_tx_number, self.seq_range, &[]);
        if txs.is_empty() {
            self.idle_ticks += 1;
            return ProduceOutcome::Idle;
        }

        log::debug!("Packing {} txs on top of height {}", txs.len(), parent.height);
        match self.manager.create_block(&mut head, &parent, txs) {
            Ok(block) => {
                self.idle_ticks = 0;
                ProduceOutcome::Block(block)
            }
            Err(err) => {
                log::error!("Failed to write block at height {}: {err}", parent.height + 1);
                self.idle_ticks += 1;
                ProduceOutcome::Failed
            }
        }
    }
}
