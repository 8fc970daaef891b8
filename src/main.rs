//! Alpha Node
//!
//! Builds the parameters of the selected network and mines on an in-memory
//! chain until interrupted.

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use alpha_core::chainparams::{create_chain_params, ChainArgs, ChainType};
use alpha_core::crypto::PrivateKey;
use alpha_core::mining::{ChainBackend, Miner, MinerConfig};
use alpha_core::node::{MemoryAssembler, MemoryChain, TxPool};
use alpha_core::script::opcodes::OP_CHECKSIG;
use alpha_core::script::Script;

#[derive(Parser)]
#[command(name = "alpha-node")]
#[command(about = "Alpha chain node with a built-in parallel miner", long_about = None)]
struct Cli {
    /// Network to run
    #[arg(long, default_value = "alpharegtest")]
    chain: ChainType,

    /// Signet block challenge (hex script)
    #[arg(long = "signetchallenge")]
    signet_challenge: Vec<String>,

    /// Signet seed node, repeatable
    #[arg(long = "signetseednode")]
    signet_seed_nodes: Vec<String>,

    /// Use tiny block files (regression test chains only)
    #[arg(long = "fastprune")]
    fast_prune: Option<bool>,

    /// Buried deployment activation override, name@height
    #[arg(long = "testactivationheight")]
    test_activation_heights: Vec<String>,

    /// Version bits override, deployment:start:end[:min_activation_height]
    #[arg(long = "vbparams")]
    vbparams: Vec<String>,

    /// Height from which blocks must satisfy the fork challenge
    #[arg(long = "signetforkheight")]
    signet_fork_height: Option<String>,

    /// Comma separated compressed public keys of the fork signers
    #[arg(long = "signetforkpubkeys")]
    signet_fork_pubkeys: Option<String>,

    /// Private key (hex) used to sign blocks, repeatable
    #[arg(long = "signkey")]
    sign_keys: Vec<String>,

    /// Coinbase output script (hex); defaults to a fresh pay-to-pubkey
    #[arg(long)]
    payto: Option<String>,

    /// Mining threads; defaults to the number of cores
    #[arg(long)]
    threads: Option<usize>,

    /// Print the chain parameters as JSON and exit
    #[arg(long)]
    dump_params: bool,
}

impl Cli {
    fn chain_args(&self) -> ChainArgs {
        ChainArgs {
            signet_seed_nodes: self.signet_seed_nodes.clone(),
            signet_challenge: self.signet_challenge.clone(),
            fast_prune: self.fast_prune,
            test_activation_heights: self.test_activation_heights.clone(),
            vbparams: self.vbparams.clone(),
            signet_fork_height: self.signet_fork_height.clone(),
            signet_fork_pubkeys: self.signet_fork_pubkeys.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let params = Arc::new(create_chain_params(&cli.chain_args(), cli.chain)?);
    if cli.dump_params {
        println!("{}", serde_json::to_string_pretty(params.as_ref())?);
        return Ok(());
    }

    info!(
        chain = %params.chain,
        genesis = %params.genesis_hash(),
        port = params.default_port,
        "Chain parameters loaded"
    );
    if params.consensus.signet_activation_height > 0 {
        info!(
            height = params.consensus.signet_activation_height,
            challenge = %params.consensus.signet_challenge_alpha.to_hex(),
            "Signet fork configured"
        );
    }

    let sign_keys = cli
        .sign_keys
        .iter()
        .map(|hex| PrivateKey::from_hex(hex))
        .collect::<Result<Vec<_>, _>>()?;

    let coinbase_script = match &cli.payto {
        Some(hex) => Script::from_hex(hex)?,
        None => {
            let key = sign_keys.first().cloned().unwrap_or_else(PrivateKey::generate);
            info!(pubkey = %key.public_key(), "Paying coinbase to key");
            Script::builder()
                .push_slice(key.public_key().as_bytes())
                .push_opcode(OP_CHECKSIG)
                .into_script()
        }
    };

    let pool = Arc::new(TxPool::new());
    let chain = Arc::new(MemoryChain::new(Arc::clone(&params), Arc::clone(&pool)));
    let assembler = Arc::new(MemoryAssembler::new(Arc::clone(&chain), pool).with_signing_keys(sign_keys));

    let config = match cli.threads {
        Some(threads) => MinerConfig::with_threads(threads),
        None => MinerConfig::default(),
    };
    let miner = Miner::new(config, coinbase_script);
    miner.start(chain.clone(), assembler)?;

    let mut status = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = status.tick() => {
                let tip = chain.tip();
                info!(height = tip.height, tip = %tip.hash, mined = miner.blocks_mined(), "Status");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    tokio::task::spawn_blocking(move || miner.stop()).await?;
    info!(height = chain.height(), "Node stopped");
    Ok(())
}
