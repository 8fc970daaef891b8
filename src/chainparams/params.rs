//! Per-network consensus and chain parameters
//!
//! Every network is derived from one template by overriding the fields it
//! changes. Parameters are built once at startup and shared read-only.

use serde::Serialize;

use super::genesis::create_genesis_block;
use super::options::{
    ChainArgs, ChainOptions, ConfigError, RegTestOptions, SigNetOptions, SignetForkOptions,
};
use super::{Bip9Deployment, BuriedDeployment, ChainType, DeploymentPos, MAX_VERSION_BITS_DEPLOYMENTS};
use crate::consensus::encode::write_var_bytes;
use crate::consensus::{compact_to_target, Block, Target};
use crate::crypto::{hash_bytes, Hash};
use crate::script::Script;
use crate::COIN;

/// Challenge of the default public signet, a 1-of-2 bare multisig
const DEFAULT_SIGNET_CHALLENGE: [u8; 71] = [
    0x51, 0x21, 0x03, 0xad, 0x5e, 0x0e, 0xda, 0xd1, 0x8c, 0xb1, 0xf0, 0xfc,
    0x0d, 0x28, 0xa3, 0xd4, 0xf1, 0xf3, 0xe4, 0x45, 0x64, 0x03, 0x37, 0x48,
    0x9a, 0xbb, 0x10, 0x40, 0x4f, 0x2d, 0x1e, 0x08, 0x6b, 0xe4, 0x30, 0x21,
    0x03, 0x59, 0xef, 0x50, 0x21, 0x96, 0x4f, 0xe2, 0x2d, 0x6f, 0x8e, 0x05,
    0xb2, 0x46, 0x3c, 0x95, 0x40, 0xce, 0x96, 0x88, 0x3f, 0xe3, 0xb2, 0x78,
    0x76, 0x0f, 0x04, 0x8f, 0x51, 0x89, 0xf2, 0xe6, 0xc4, 0x52, 0xae,
];

const TWO_WEEKS: i64 = 14 * 24 * 60 * 60;

/// Consensus rules of one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsensusParams {
    pub hash_genesis_block: Hash,
    pub subsidy_halving_interval: u32,
    /// Subsidy of the first halving period, in base units
    pub initial_subsidy: u64,
    pub bip34_height: u32,
    /// Height of the CHECKLOCKTIMEVERIFY soft fork
    pub bip65_height: u32,
    /// Height of the strict DER soft fork
    pub bip66_height: u32,
    pub csv_height: u32,
    pub segwit_height: u32,
    pub rule_change_activation_threshold: u32,
    pub miner_confirmation_window: u32,
    pub deployments: [Bip9Deployment; MAX_VERSION_BITS_DEPLOYMENTS],
    /// Easiest allowed target, compact
    pub pow_limit_bits: u32,
    pub pow_target_spacing: i64,
    pub pow_target_timespan: i64,
    pub pow_allow_min_difficulty_blocks: bool,
    pub pow_no_retargeting: bool,
    /// Every block must satisfy the primary signet challenge
    pub signet_blocks: bool,
    pub signet_challenge: Script,
    /// Challenge that replaces the primary one from the activation height
    pub signet_challenge_alpha: Script,
    /// 0 disables the signet fork
    pub signet_activation_height: u32,
    /// First height using the alternate proof of work, 0 for never
    pub randomx_height: u32,
    /// Below this height legacy work is still accepted on verification
    pub randomx_enforcement_height: u32,
    /// Alternate proof-of-work target multiplier
    pub randomx_diff_mult: u32,
}

impl ConsensusParams {
    /// Shared template every network starts from
    fn template() -> Self {
        Self {
            hash_genesis_block: Hash::zero(),
            subsidy_halving_interval: 210_000,
            initial_subsidy: 50 * COIN,
            bip34_height: 0,
            bip65_height: 0,
            bip66_height: 0,
            csv_height: 0,
            segwit_height: 0,
            rule_change_activation_threshold: 1815,
            miner_confirmation_window: 2016,
            deployments: [
                Bip9Deployment::new(28, Bip9Deployment::NEVER_ACTIVE, Bip9Deployment::NO_TIMEOUT, 0),
                Bip9Deployment::new(2, Bip9Deployment::ALWAYS_ACTIVE, Bip9Deployment::NO_TIMEOUT, 0),
            ],
            pow_limit_bits: 0x1d00ffff,
            pow_target_spacing: 10 * 60,
            pow_target_timespan: TWO_WEEKS,
            pow_allow_min_difficulty_blocks: false,
            pow_no_retargeting: false,
            signet_blocks: false,
            signet_challenge: Script::new(),
            signet_challenge_alpha: Script::new(),
            signet_activation_height: 0,
            randomx_height: 0,
            randomx_enforcement_height: 0,
            randomx_diff_mult: 1,
        }
    }

    /// Easiest allowed target, expanded
    pub fn pow_limit(&self) -> Target {
        compact_to_target(self.pow_limit_bits)
    }

    /// Blocks between retargets
    pub fn difficulty_adjustment_interval(&self) -> u32 {
        if self.pow_target_spacing <= 0 {
            return 0;
        }
        (self.pow_target_timespan / self.pow_target_spacing) as u32
    }

    pub fn deployment_height(&self, dep: BuriedDeployment) -> u32 {
        match dep {
            BuriedDeployment::Segwit => self.segwit_height,
            BuriedDeployment::Bip34 => self.bip34_height,
            BuriedDeployment::Dersig => self.bip66_height,
            BuriedDeployment::Cltv => self.bip65_height,
            BuriedDeployment::Csv => self.csv_height,
        }
    }

    fn set_deployment_height(&mut self, dep: BuriedDeployment, height: u32) {
        let field = match dep {
            BuriedDeployment::Segwit => &mut self.segwit_height,
            BuriedDeployment::Bip34 => &mut self.bip34_height,
            BuriedDeployment::Dersig => &mut self.bip66_height,
            BuriedDeployment::Cltv => &mut self.bip65_height,
            BuriedDeployment::Csv => &mut self.csv_height,
        };
        *field = height;
    }

    pub fn deployment(&self, pos: DeploymentPos) -> &Bip9Deployment {
        &self.deployments[pos.index()]
    }

    fn apply_regtest_options(&mut self, options: &RegTestOptions) {
        for (&dep, &height) in &options.activation_heights {
            self.set_deployment_height(dep, height);
        }
        for (&pos, vb) in &options.version_bits_parameters {
            let deployment = &mut self.deployments[pos.index()];
            deployment.start_time = vb.start_time;
            deployment.timeout = vb.timeout;
            deployment.min_activation_height = vb.min_activation_height;
        }
    }

    /// Switch to a 1-of-N multisig over the fork keys from the fork height
    fn apply_fork_options(&mut self, options: &SignetForkOptions) {
        if let Some((height, keys)) = options.activation() {
            self.signet_challenge_alpha = Script::new_multisig(1, keys);
            self.signet_activation_height = height;
        }
    }
}

/// Everything that identifies and configures one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainParams {
    pub chain: ChainType,
    pub consensus: ConsensusParams,
    /// Network magic prefixing every p2p message
    pub message_start: [u8; 4],
    pub default_port: u16,
    pub seeds: Vec<String>,
    pub fast_prune: bool,
    pub is_test_chain: bool,
    pub genesis: Block,
}

struct GenesisSpec {
    time: u32,
    nonce: u32,
    bits: u32,
    version: i32,
    reward: u64,
}

impl ChainParams {
    /// Build the parameters for `chain`. Options that do not apply to the
    /// chain are ignored.
    pub fn create(chain: ChainType, options: &ChainOptions) -> ChainParams {
        match chain {
            ChainType::Main => Self::main(),
            ChainType::Testnet => Self::testnet(),
            ChainType::Signet => Self::signet(&options.signet),
            ChainType::Regtest => Self::regtest(&options.regtest),
            ChainType::ScashMain => Self::scash_main(),
            ChainType::ScashTestnet => Self::scash_testnet(),
            ChainType::ScashRegtest => Self::scash_regtest(&options.regtest),
            ChainType::AlphaMain => Self::alpha_main(),
            ChainType::AlphaTestnet => Self::alpha_testnet(&options.fork),
            ChainType::AlphaRegtest => Self::alpha_regtest(&options.regtest, &options.fork),
        }
    }

    fn build(
        chain: ChainType,
        mut consensus: ConsensusParams,
        message_start: [u8; 4],
        default_port: u16,
        seeds: &[&str],
        genesis: GenesisSpec,
    ) -> ChainParams {
        let genesis = create_genesis_block(
            genesis.time,
            genesis.nonce,
            genesis.bits,
            genesis.version,
            genesis.reward,
        );
        consensus.hash_genesis_block = genesis.hash();
        ChainParams {
            chain,
            consensus,
            message_start,
            default_port,
            seeds: seeds.iter().map(|s| s.to_string()).collect(),
            fast_prune: false,
            is_test_chain: !matches!(chain, ChainType::Main | ChainType::ScashMain | ChainType::AlphaMain),
            genesis,
        }
    }

    pub fn main() -> ChainParams {
        let consensus = ConsensusParams {
            bip34_height: 227_931,
            bip65_height: 388_381,
            bip66_height: 363_725,
            csv_height: 419_328,
            segwit_height: 481_824,
            deployments: [
                Bip9Deployment::new(28, Bip9Deployment::NEVER_ACTIVE, Bip9Deployment::NO_TIMEOUT, 0),
                Bip9Deployment::new(2, 1_619_222_400, 1_628_640_000, 709_632),
            ],
            ..ConsensusParams::template()
        };
        Self::build(
            ChainType::Main,
            consensus,
            [0xf9, 0xbe, 0xb4, 0xd9],
            8333,
            &["seed.bitcoin.sipa.be", "dnsseed.bluematt.me", "seed.bitcoinstats.com"],
            GenesisSpec { time: 1_231_006_505, nonce: 2_083_236_893, bits: 0x1d00ffff, version: 1, reward: 50 * COIN },
        )
    }

    pub fn testnet() -> ChainParams {
        let consensus = ConsensusParams {
            bip34_height: 21_111,
            bip65_height: 581_885,
            bip66_height: 330_776,
            csv_height: 770_112,
            segwit_height: 834_624,
            rule_change_activation_threshold: 1512,
            deployments: [
                Bip9Deployment::new(28, Bip9Deployment::NEVER_ACTIVE, Bip9Deployment::NO_TIMEOUT, 0),
                Bip9Deployment::new(2, 1_619_222_400, 1_628_640_000, 0),
            ],
            pow_allow_min_difficulty_blocks: true,
            ..ConsensusParams::template()
        };
        Self::build(
            ChainType::Testnet,
            consensus,
            [0x0b, 0x11, 0x09, 0x07],
            18333,
            &["testnet-seed.bitcoin.jonasschnelli.ch", "seed.tbtc.petertodd.net"],
            GenesisSpec { time: 1_296_688_602, nonce: 414_098_458, bits: 0x1d00ffff, version: 1, reward: 50 * COIN },
        )
    }

    pub fn signet(options: &SigNetOptions) -> ChainParams {
        let (challenge, default_seeds): (Script, &[&str]) = match &options.challenge {
            Some(challenge) => (challenge.clone(), &[]),
            None => (
                Script::from_bytes(DEFAULT_SIGNET_CHALLENGE.to_vec()),
                &["seed.signet.bitcoin.sprovoost.nl"],
            ),
        };

        let consensus = ConsensusParams {
            bip34_height: 1,
            bip65_height: 1,
            bip66_height: 1,
            csv_height: 1,
            segwit_height: 1,
            signet_blocks: true,
            signet_challenge: challenge.clone(),
            pow_limit_bits: 0x1e0377ae,
            ..ConsensusParams::template()
        };
        let mut params = Self::build(
            ChainType::Signet,
            consensus,
            signet_message_start(&challenge),
            38333,
            default_seeds,
            GenesisSpec { time: 1_598_918_400, nonce: 52_613_770, bits: 0x1e0377ae, version: 1, reward: 50 * COIN },
        );
        if let Some(seeds) = &options.seeds {
            params.seeds = seeds.clone();
        }
        params
    }

    fn regtest_consensus() -> ConsensusParams {
        ConsensusParams {
            subsidy_halving_interval: 150,
            bip34_height: 1,
            bip65_height: 1,
            bip66_height: 1,
            csv_height: 1,
            segwit_height: 0,
            rule_change_activation_threshold: 108,
            miner_confirmation_window: 144,
            deployments: [
                Bip9Deployment::new(28, 0, Bip9Deployment::NO_TIMEOUT, 0),
                Bip9Deployment::new(2, Bip9Deployment::ALWAYS_ACTIVE, Bip9Deployment::NO_TIMEOUT, 0),
            ],
            pow_limit_bits: 0x207fffff,
            pow_allow_min_difficulty_blocks: true,
            pow_no_retargeting: true,
            ..ConsensusParams::template()
        }
    }

    pub fn regtest(options: &RegTestOptions) -> ChainParams {
        let mut consensus = Self::regtest_consensus();
        consensus.apply_regtest_options(options);
        let mut params = Self::build(
            ChainType::Regtest,
            consensus,
            [0xfa, 0xbf, 0xb5, 0xda],
            18444,
            &[],
            GenesisSpec { time: 1_296_688_602, nonce: 2, bits: 0x207fffff, version: 1, reward: 50 * COIN },
        );
        params.fast_prune = options.fast_prune;
        params
    }

    fn scash_consensus() -> ConsensusParams {
        ConsensusParams {
            bip34_height: 1,
            bip65_height: 1,
            bip66_height: 1,
            csv_height: 1,
            segwit_height: 1,
            pow_limit_bits: 0x1f00ffff,
            randomx_height: 1,
            randomx_enforcement_height: 1,
            randomx_diff_mult: 100_000,
            ..ConsensusParams::template()
        }
    }

    pub fn scash_main() -> ChainParams {
        Self::build(
            ChainType::ScashMain,
            Self::scash_consensus(),
            [0xd1, 0xd1, 0xd1, 0xd1],
            8342,
            &["seed.scash.network"],
            GenesisSpec { time: 1_708_650_456, nonce: 0, bits: 0x1f00ffff, version: 1, reward: 50 * COIN },
        )
    }

    pub fn scash_testnet() -> ChainParams {
        let consensus = ConsensusParams {
            rule_change_activation_threshold: 1512,
            pow_allow_min_difficulty_blocks: true,
            ..Self::scash_consensus()
        };
        Self::build(
            ChainType::ScashTestnet,
            consensus,
            [0xd2, 0xd2, 0xd2, 0xd2],
            18342,
            &[],
            GenesisSpec { time: 1_708_650_457, nonce: 0, bits: 0x1f00ffff, version: 1, reward: 50 * COIN },
        )
    }

    pub fn scash_regtest(options: &RegTestOptions) -> ChainParams {
        let mut consensus = ConsensusParams {
            randomx_height: 1,
            randomx_enforcement_height: 1,
            randomx_diff_mult: 1,
            ..Self::regtest_consensus()
        };
        consensus.apply_regtest_options(options);
        let mut params = Self::build(
            ChainType::ScashRegtest,
            consensus,
            [0xd3, 0xd3, 0xd3, 0xd3],
            18444,
            &[],
            GenesisSpec { time: 1_708_650_458, nonce: 0, bits: 0x207fffff, version: 1, reward: 50 * COIN },
        );
        params.fast_prune = options.fast_prune;
        params
    }

    fn alpha_consensus() -> ConsensusParams {
        ConsensusParams {
            subsidy_halving_interval: 840_000,
            initial_subsidy: 10 * COIN,
            pow_target_spacing: 2 * 60,
            pow_target_timespan: 24 * 60 * 60,
            ..Self::scash_consensus()
        }
    }

    pub fn alpha_main() -> ChainParams {
        Self::build(
            ChainType::AlphaMain,
            Self::alpha_consensus(),
            [0x7a, 0x6c, 0x70, 0x68],
            8590,
            &["seed.alpha.unicity.network"],
            GenesisSpec { time: 1_718_524_492, nonce: 0, bits: 0x1f00ffff, version: 1, reward: 10 * COIN },
        )
    }

    pub fn alpha_testnet(fork: &SignetForkOptions) -> ChainParams {
        let mut consensus = ConsensusParams {
            rule_change_activation_threshold: 540,
            miner_confirmation_window: 720,
            pow_allow_min_difficulty_blocks: true,
            ..Self::alpha_consensus()
        };
        consensus.apply_fork_options(fork);
        Self::build(
            ChainType::AlphaTestnet,
            consensus,
            [0x7a, 0x6c, 0x74, 0x73],
            18590,
            &[],
            GenesisSpec { time: 1_718_524_493, nonce: 0, bits: 0x1f00ffff, version: 1, reward: 10 * COIN },
        )
    }

    pub fn alpha_regtest(options: &RegTestOptions, fork: &SignetForkOptions) -> ChainParams {
        let mut consensus = ConsensusParams {
            subsidy_halving_interval: 840_000,
            initial_subsidy: 10 * COIN,
            pow_target_spacing: 2 * 60,
            pow_target_timespan: 24 * 60 * 60,
            randomx_height: 1,
            randomx_enforcement_height: 1,
            randomx_diff_mult: 1,
            ..Self::regtest_consensus()
        };
        consensus.apply_regtest_options(options);
        consensus.apply_fork_options(fork);
        let mut params = Self::build(
            ChainType::AlphaRegtest,
            consensus,
            [0x7a, 0x6c, 0x72, 0x74],
            28590,
            &[],
            GenesisSpec { time: 1_718_524_494, nonce: 0, bits: 0x207fffff, version: 1, reward: 10 * COIN },
        );
        params.fast_prune = options.fast_prune;
        params
    }

    pub fn genesis_hash(&self) -> Hash {
        self.consensus.hash_genesis_block
    }
}

/// Network magic of a signet: the first four bytes of the double SHA-256 of
/// the length-prefixed challenge
pub fn signet_message_start(challenge: &Script) -> [u8; 4] {
    let mut data = Vec::with_capacity(challenge.len() + 9);
    write_var_bytes(&mut data, challenge.as_bytes());
    let hash = hash_bytes(&data);
    let mut magic = [0u8; 4];
    magic.copy_from_slice(&hash.0[..4]);
    magic
}

/// Validate `args` and build the parameters for `chain`
pub fn create_chain_params(args: &ChainArgs, chain: ChainType) -> Result<ChainParams, ConfigError> {
    let mut options = ChainOptions::default();
    match chain {
        ChainType::Main
        | ChainType::Testnet
        | ChainType::ScashMain
        | ChainType::ScashTestnet
        | ChainType::AlphaMain => {}
        ChainType::Signet => options.signet = super::read_signet_args(args)?,
        ChainType::Regtest | ChainType::ScashRegtest => {
            options.regtest = super::read_regtest_args(args)?;
        }
        ChainType::AlphaRegtest => {
            options.regtest = super::read_regtest_args(args)?;
            options.fork = super::read_signet_fork_args(args)?;
        }
        ChainType::AlphaTestnet => options.fork = super::read_signet_fork_args(args)?,
    }
    Ok(ChainParams::create(chain, &options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;

    #[test]
    fn test_create_is_total_and_deterministic() {
        for chain in ChainType::ALL {
            let a = ChainParams::create(chain, &ChainOptions::default());
            let b = ChainParams::create(chain, &ChainOptions::default());
            assert_eq!(a, b);
            assert_eq!(a.chain, chain);
            assert_eq!(a.genesis.hash(), a.consensus.hash_genesis_block);
        }
    }

    #[test]
    fn test_default_signet_magic() {
        let params = ChainParams::create(ChainType::Signet, &ChainOptions::default());
        assert_eq!(params.message_start, [0x0a, 0x03, 0xcf, 0x40]);
        assert!(params.consensus.signet_blocks);
        assert!(!params.seeds.is_empty());
    }

    #[test]
    fn test_default_signet_challenge_is_one_of_two() {
        let params = ChainParams::create(ChainType::Signet, &ChainOptions::default());
        let challenge = &params.consensus.signet_challenge;
        assert_eq!(challenge.len(), 71);
        assert_eq!(challenge.as_bytes().first(), Some(&0x51));
        assert_eq!(challenge.as_bytes().last(), Some(&0xae));
        assert_eq!(crate::consensus::extract_pubkeys_from_challenge(challenge).len(), 2);
    }

    #[test]
    fn test_custom_signet_challenge_clears_seeds() {
        let args = ChainArgs {
            signet_challenge: vec!["51".to_string()],
            ..Default::default()
        };
        let params = create_chain_params(&args, ChainType::Signet).unwrap();
        assert_eq!(params.consensus.signet_challenge, Script::from_bytes(vec![0x51]));
        assert!(params.seeds.is_empty());
        assert_ne!(params.message_start, [0x0a, 0x03, 0xcf, 0x40]);
    }

    #[test]
    fn test_regtest_overrides_merge() {
        let args = ChainArgs {
            test_activation_heights: vec!["segwit@100".to_string()],
            vbparams: vec!["testdummy:100:200:50".to_string()],
            fast_prune: Some(true),
            ..Default::default()
        };
        let params = create_chain_params(&args, ChainType::Regtest).unwrap();
        assert_eq!(params.consensus.deployment_height(BuriedDeployment::Segwit), 100);
        assert_eq!(params.consensus.deployment_height(BuriedDeployment::Bip34), 1);
        let dummy = params.consensus.deployment(DeploymentPos::TestDummy);
        assert_eq!((dummy.start_time, dummy.timeout, dummy.min_activation_height), (100, 200, 50));
        assert!(params.fast_prune);
    }

    #[test]
    fn test_fixed_chains_ignore_options() {
        let args = ChainArgs {
            test_activation_heights: vec!["bogus".to_string()],
            signet_fork_height: Some("10".to_string()),
            ..Default::default()
        };
        assert!(create_chain_params(&args, ChainType::Main).is_ok());
        assert!(create_chain_params(&args, ChainType::AlphaMain).is_ok());
        // signet only reads its own options
        assert!(create_chain_params(&args, ChainType::Signet).is_ok());
        assert!(create_chain_params(&args, ChainType::Regtest).is_err());
        assert!(create_chain_params(&args, ChainType::AlphaTestnet).is_err());
    }

    #[test]
    fn test_fork_options_set_alternate_challenge() {
        let keys: Vec<_> = (0..2).map(|_| PrivateKey::generate().public_key()).collect();
        let args = ChainArgs {
            signet_fork_height: Some("50".to_string()),
            signet_fork_pubkeys: Some(keys.iter().map(|k| k.to_hex()).collect::<Vec<_>>().join(",")),
            ..Default::default()
        };
        let params = create_chain_params(&args, ChainType::AlphaRegtest).unwrap();
        assert_eq!(params.consensus.signet_activation_height, 50);
        assert_eq!(params.consensus.signet_challenge_alpha, Script::new_multisig(1, &keys));
        assert!(params.consensus.signet_challenge.is_empty());
    }

    #[test]
    fn test_alpha_economics() {
        let params = ChainParams::create(ChainType::AlphaMain, &ChainOptions::default());
        assert_eq!(params.consensus.initial_subsidy, 10 * COIN);
        assert_eq!(params.consensus.pow_target_spacing, 120);
        assert_eq!(params.consensus.difficulty_adjustment_interval(), 720);
        assert!(!params.is_test_chain);
    }

    #[test]
    fn test_params_serialize_to_json() {
        let params = ChainParams::create(ChainType::Regtest, &ChainOptions::default());
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["chain"], "regtest");
        assert_eq!(json["default_port"], 18444);
    }
}
