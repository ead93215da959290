use std::sync::Arc;

use log::info;

use crate::block::cache::TxCache;
use crate::block::manager::BlockManager;
use crate::block::producer::BlockProducer;
use crate::block::types::block::Block;
use crate::block::watermark::{BlockedSeqTracker, SequenceStore};
use crate::chain::node::LocalNode;
use crate::chain::LocalChain;
use crate::config::Configuration;
use crate::core::context::SyncContext;
use crate::core::parachain::Parachain;
use crate::core::shutdown::ShutdownManager;
use crate::mainchain::http::MainChainHttpClient;
use crate::mainchain::MainChainClient;
use crate::sequence::reconciler::SequenceReconciler;
use crate::storage::rocksdb::RocksDbStorage;
use crate::utilities::hash::Hash;
use crate::utilities::time::BlockTime;

pub struct ParachainStarter {
    config: Configuration,
}

impl ParachainStarter {
    pub fn new(config: Configuration) -> Self {
        Self { config }
    }

    //opens database, connects main chain and spawns the tasks
    pub async fn init_tasks(self) -> anyhow::Result<Parachain<LocalNode<RocksDbStorage>>> {
        info!("Initializing parachain tasks...");

        info!("Opening database...");
        let database = Arc::new(RocksDbStorage::open(self.config.database.clone())?);
        let chain = Arc::new(LocalNode::new(database.clone(), self.config.node.mine));
        let main_chain = Arc::new(MainChainHttpClient::new(&self.config.main_chain)?);
        info!("Main chain endpoint: {}", self.config.main_chain.url);

        self.init_with(main_chain, chain, database)
    }

    pub(crate) fn init_with<M, C>(
        self,
        main_chain: Arc<M>,
        chain: Arc<C>,
        store: Arc<dyn SequenceStore>,
    ) -> anyhow::Result<Parachain<C>>
    where
        M: MainChainClient + 'static,
        C: LocalChain + 'static,
    {
        let head = Self::init_head(chain.as_ref())?;
        let watermark = BlockedSeqTracker::load(store)?;
        let context = Arc::new(SyncContext::new(
            TxCache::new(self.config.cache.capacity),
            watermark,
        ));
        let manager = Arc::new(BlockManager::new(chain, context, head));

        let (mut shutdown_manager, shutdown_handle) = ShutdownManager::init();

        info!("Starting sequence reconciler...");
        let reconciler = SequenceReconciler::new(
            main_chain,
            manager.clone(),
            self.config.sequence.clone(),
            self.config.node.executor_filter.clone(),
        );
        shutdown_manager.add_handle(tokio::spawn(reconciler.run(shutdown_manager.subscribe())));

        info!("Starting block producer...");
        let producer = BlockProducer::new(
            manager.clone(),
            self.config.block.clone(),
            self.config.cache.seq_range,
        );
        shutdown_manager.add_handle(tokio::spawn(producer.run(shutdown_manager.subscribe())));

        Ok(Parachain::new(manager, shutdown_manager, shutdown_handle))
    }

    /// Last local block, committing genesis into an empty chain.
    fn init_head<C: LocalChain + ?Sized>(chain: &C) -> anyhow::Result<Block> {
        if let Some(block) = chain.last_block()? {
            info!("Local chain head: {block}");
            return Ok(block);
        }

        info!("Local chain is empty, committing genesis block");
        let parameter = chain.chain_parameter(0);
        let genesis = Block::new_genesis_block(parameter.difficulty, BlockTime::now());
        let executed = chain.execute_block(&Hash::ZERO, genesis)?;
        chain.commit_block(&executed.detail)?;
        Ok(executed.detail.block)
    }
}
