//! Parallel block miner
//!
//! Each worker thread loops: snapshot the tip, build a candidate, search
//! nonces, submit. A worker abandons its candidate as soon as it notices the
//! tip moved. Failures inside one cycle never kill the worker.

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{AssembleError, BlockAssembler, ChainBackend, MinerConfig, TipSnapshot};
use crate::consensus::{Block, PowPurpose, ProofOfWork, StandardPow};
use crate::script::Script;

/// How a nonce search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Header satisfies the proof of work; the auxiliary hash is stored
    Found,
    /// Try budget or nonce space used up
    Exhausted,
    /// Tip changed under the candidate
    StaleTip,
    Shutdown,
}

/// Failure inside one worker cycle
#[derive(Debug, Error)]
pub enum MiningError {
    #[error("Block assembly failed: {0}")]
    Assemble(#[from] AssembleError),
    #[error("Miner thread panicked: {0}")]
    Panic(String),
    #[error("Failed to spawn miner thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// State shared by the controller and every worker
struct MinerShared {
    enabled: AtomicBool,
    shutdown: AtomicBool,
    blocks_mined: AtomicU64,
    sleep_lock: Mutex<()>,
    wake: Condvar,
}

impl MinerShared {
    fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            blocks_mined: AtomicU64::new(0),
            sleep_lock: Mutex::new(()),
            wake: Condvar::new(),
        }
    }

    fn should_stop(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` or until shutdown is signalled
    fn backoff(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let mut guard = self.sleep_lock.lock();
        while !self.should_stop() {
            if self.wake.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
    }

    fn signal_shutdown(&self) {
        // flag is set under the lock so a worker about to wait cannot miss it
        let _guard = self.sleep_lock.lock();
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_all();
    }
}

/// Block miner
pub struct Miner {
    config: MinerConfig,
    coinbase_script: Script,
    pow: Arc<dyn ProofOfWork>,
    shared: Arc<MinerShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Miner {
    /// Create a miner paying to `coinbase_script`
    pub fn new(config: MinerConfig, coinbase_script: Script) -> Self {
        Self {
            config,
            coinbase_script,
            pow: Arc::new(StandardPow),
            shared: Arc::new(MinerShared::new()),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Replace the proof-of-work predicate
    pub fn with_pow(mut self, pow: Arc<dyn ProofOfWork>) -> Self {
        self.pow = pow;
        self
    }

    /// Spawn the configured number of worker threads. Calling this again
    /// without [`Miner::stop`] adds another set of workers.
    pub fn start(
        &self,
        chain: Arc<dyn ChainBackend>,
        assembler: Arc<dyn BlockAssembler>,
    ) -> Result<(), MiningError> {
        self.shared.enabled.store(true, Ordering::SeqCst);
        self.shared.shutdown.store(false, Ordering::SeqCst);

        let threads = self.config.threads;
        let mut workers = self.workers.lock();
        for id in 0..threads {
            let worker = Worker {
                id,
                start_nonce: (id as u64 * (u32::MAX as u64 / threads as u64)) as u32,
                config: self.config.clone(),
                coinbase_script: self.coinbase_script.clone(),
                pow: Arc::clone(&self.pow),
                shared: Arc::clone(&self.shared),
                chain: Arc::clone(&chain),
                assembler: Arc::clone(&assembler),
            };
            let handle = thread::Builder::new()
                .name(format!("miner-{id}"))
                .spawn(move || worker.run())?;
            workers.push(handle);
        }

        info!(threads, "Miner started");
        Ok(())
    }

    /// Signal every worker, wake the sleeping ones and wait for all of them
    pub fn stop(&self) {
        if !self.shared.enabled.load(Ordering::SeqCst) {
            return;
        }

        self.shared.signal_shutdown();
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.join().is_err() {
                warn!("Miner thread exited with a panic");
            }
        }

        self.shared.enabled.store(false, Ordering::SeqCst);
        info!(blocks_mined = self.blocks_mined(), "Miner stopped");
    }

    /// Blocks that became the new best tip
    pub fn blocks_mined(&self) -> u64 {
        self.shared.blocks_mined.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }
}

impl Drop for Miner {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    id: usize,
    start_nonce: u32,
    config: MinerConfig,
    coinbase_script: Script,
    pow: Arc<dyn ProofOfWork>,
    shared: Arc<MinerShared>,
    chain: Arc<dyn ChainBackend>,
    assembler: Arc<dyn BlockAssembler>,
}

impl Worker {
    fn run(self) {
        debug!(worker = self.id, "Miner thread started");

        while !self.shared.should_stop() {
            let result = catch_unwind(AssertUnwindSafe(|| self.mine_once()))
                .unwrap_or_else(|payload| Err(MiningError::Panic(panic_message(&*payload))));

            if let Err(e) = result {
                match e {
                    MiningError::Assemble(_) => warn!(worker = self.id, "{}", e),
                    _ => error!(worker = self.id, "{}", e),
                }
                self.shared.backoff(self.config.build_failure_backoff());
            }
        }

        debug!(worker = self.id, "Miner thread stopped");
    }

    /// One build, search and submit cycle
    fn mine_once(&self) -> Result<(), MiningError> {
        let tip = self.chain.tip();

        let Some(template) = self.assembler.create_new_block(&self.coinbase_script)? else {
            debug!(worker = self.id, "No block template available");
            self.shared.backoff(self.config.empty_template_backoff());
            return Ok(());
        };

        let height = template.height;
        let mut block = template.block;
        block.header.merkle_root = block.compute_merkle_root();
        block.header.nonce = self.start_nonce;

        match self.search(&mut block, height, &tip) {
            SearchOutcome::Found => self.submit(block, height),
            SearchOutcome::StaleTip => debug!(worker = self.id, height, "Tip changed, rebuilding template"),
            SearchOutcome::Exhausted => debug!(worker = self.id, height, "Nonce budget exhausted"),
            SearchOutcome::Shutdown => {}
        }
        Ok(())
    }

    fn search(&self, block: &mut Block, height: u32, tip: &TipSnapshot) -> SearchOutcome {
        let params = &self.chain.params().consensus;
        let mut tries = 0u64;

        loop {
            if self.shared.should_stop() {
                return SearchOutcome::Shutdown;
            }

            let result = self.pow.check(&block.header, height, params, PowPurpose::Mining);
            if result.valid {
                if let Some(aux_hash) = result.aux_hash {
                    block.header.aux_pow_hash = aux_hash;
                }
                return SearchOutcome::Found;
            }

            tries += 1;
            if tries >= self.config.max_tries || block.header.nonce == u32::MAX {
                return SearchOutcome::Exhausted;
            }
            block.header.nonce += 1;

            if self.config.tip_check_interval > 0
                && tries % self.config.tip_check_interval == 0
                && self.chain.tip().hash != tip.hash
            {
                return SearchOutcome::StaleTip;
            }
        }
    }

    fn submit(&self, block: Block, height: u32) {
        let hash = block.hash();
        let outcome = self.chain.process_new_block(Arc::new(block), true, true);

        if outcome.accepted && outcome.new_block {
            let total = self.shared.blocks_mined.fetch_add(1, Ordering::SeqCst) + 1;
            info!(worker = self.id, height, %hash, total, "Mined new block");
        } else if outcome.accepted {
            debug!(worker = self.id, height, %hash, "Mined block was not new");
        } else {
            warn!(worker = self.id, height, %hash, "Mined block was rejected");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
