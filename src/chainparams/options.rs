//! Startup option parsing and cross-validation
//!
//! Raw override values arrive as [`ChainArgs`] (from the command line or a
//! config file) and are turned into the typed option sets the parameter
//! factory consumes. Every failure here is fatal at startup.

use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

use super::{BuriedDeployment, DeploymentPos};
use crate::crypto::{CompressedPubKey, KeyError};
use crate::script::Script;

/// Invalid or contradictory startup configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown chain {0}.")]
    UnknownChain(String),
    #[error("-signetchallenge cannot be multiple values.")]
    MultipleSignetChallenges,
    #[error("-signetchallenge must be hex, not '{0}'.")]
    InvalidSignetChallenge(String),
    #[error("Invalid format ({0}) for -testactivationheight=name@height.")]
    ActivationHeightFormat(String),
    #[error("Invalid height value ({0}) for -testactivationheight=name@height.")]
    ActivationHeightValue(String),
    #[error("Invalid name ({0}) for -testactivationheight=name@height.")]
    ActivationHeightName(String),
    #[error("Version bits parameters malformed, expecting deployment:start:end[:min_activation_height]")]
    VersionBitsMalformed,
    #[error("Invalid nStartTime ({0})")]
    InvalidStartTime(String),
    #[error("Invalid nTimeout ({0})")]
    InvalidTimeout(String),
    #[error("Invalid min_activation_height ({0})")]
    InvalidMinActivationHeight(String),
    #[error("Invalid deployment ({0})")]
    InvalidDeployment(String),
    #[error("-signetforkheight must be a non-negative integer.")]
    InvalidForkHeight,
    #[error("-signetforkpubkeys must not be empty.")]
    EmptyForkPubkeys,
    #[error("-signetforkpubkeys: '{0}' is not a valid 33-byte compressed pubkey hex.")]
    InvalidForkPubkeyEncoding(String),
    #[error("-signetforkpubkeys: '{0}' is not a valid secp256k1 point.")]
    InvalidForkPubkeyPoint(String),
    #[error("-signetforkheight > 0 requires -signetforkpubkeys.")]
    ForkHeightRequiresPubkeys,
    #[error("-signetforkpubkeys requires -signetforkheight > 0.")]
    PubkeysRequireForkHeight,
}

/// Raw chain-selection overrides, exactly as supplied by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChainArgs {
    /// `-signetseednode`, repeatable
    pub signet_seed_nodes: Vec<String>,
    /// `-signetchallenge`, at most one hex value
    pub signet_challenge: Vec<String>,
    /// `-fastprune`
    pub fast_prune: Option<bool>,
    /// `-testactivationheight=name@height`, repeatable
    pub test_activation_heights: Vec<String>,
    /// `-vbparams=deployment:start:end[:min_activation_height]`, repeatable
    pub vbparams: Vec<String>,
    /// `-signetforkheight`
    pub signet_fork_height: Option<String>,
    /// `-signetforkpubkeys`, comma separated hex keys
    pub signet_fork_pubkeys: Option<String>,
}

/// Signet overrides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigNetOptions {
    pub challenge: Option<Script>,
    pub seeds: Option<Vec<String>>,
}

/// Version bits window override for one deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionBitsParameters {
    pub start_time: i64,
    pub timeout: i64,
    pub min_activation_height: i32,
}

/// Regression test overrides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegTestOptions {
    pub activation_heights: BTreeMap<BuriedDeployment, u32>,
    pub version_bits_parameters: BTreeMap<DeploymentPos, VersionBitsParameters>,
    pub fast_prune: bool,
}

/// Signet fork configuration: an activation height and the keys allowed to
/// sign blocks from that height on. Either both are set or neither is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignetForkOptions {
    fork_height: Option<u32>,
    pubkeys: Option<Vec<CompressedPubKey>>,
}

impl SignetForkOptions {
    pub fn new(
        fork_height: Option<u32>,
        pubkeys: Option<Vec<CompressedPubKey>>,
    ) -> Result<Self, ConfigError> {
        let height_set = matches!(fork_height, Some(h) if h > 0);
        match &pubkeys {
            Some(keys) if keys.is_empty() => return Err(ConfigError::EmptyForkPubkeys),
            Some(_) if !height_set => return Err(ConfigError::PubkeysRequireForkHeight),
            None if height_set => return Err(ConfigError::ForkHeightRequiresPubkeys),
            _ => {}
        }
        Ok(Self { fork_height, pubkeys })
    }

    pub fn fork_height(&self) -> Option<u32> {
        self.fork_height
    }

    pub fn pubkeys(&self) -> Option<&[CompressedPubKey]> {
        self.pubkeys.as_deref()
    }

    /// Height and keys, when the fork is configured
    pub fn activation(&self) -> Option<(u32, &[CompressedPubKey])> {
        match (self.fork_height, self.pubkeys.as_deref()) {
            (Some(height), Some(keys)) if height > 0 => Some((height, keys)),
            _ => None,
        }
    }
}

/// All validated option sets; each chain reads the ones that apply to it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainOptions {
    pub signet: SigNetOptions,
    pub regtest: RegTestOptions,
    pub fork: SignetForkOptions,
}

pub fn read_signet_args(args: &ChainArgs) -> Result<SigNetOptions, ConfigError> {
    let mut options = SigNetOptions::default();

    if !args.signet_seed_nodes.is_empty() {
        options.seeds = Some(args.signet_seed_nodes.clone());
    }

    match args.signet_challenge.as_slice() {
        [] => {}
        [challenge] => {
            let script = Script::from_hex(challenge)
                .map_err(|_| ConfigError::InvalidSignetChallenge(challenge.clone()))?;
            options.challenge = Some(script);
        }
        _ => return Err(ConfigError::MultipleSignetChallenges),
    }

    Ok(options)
}

pub fn read_regtest_args(args: &ChainArgs) -> Result<RegTestOptions, ConfigError> {
    let mut options = RegTestOptions::default();

    if let Some(value) = args.fast_prune {
        options.fast_prune = value;
    }

    for arg in &args.test_activation_heights {
        let (name, value) = arg
            .split_once('@')
            .ok_or_else(|| ConfigError::ActivationHeightFormat(arg.clone()))?;

        let height = match value.parse::<i32>() {
            Ok(h) if (0..i32::MAX).contains(&h) => h as u32,
            _ => return Err(ConfigError::ActivationHeightValue(arg.clone())),
        };

        let deployment = BuriedDeployment::from_name(name)
            .ok_or_else(|| ConfigError::ActivationHeightName(arg.clone()))?;
        options.activation_heights.insert(deployment, height);
    }

    for arg in &args.vbparams {
        let fields: Vec<&str> = arg.split(':').collect();
        if !(3..=4).contains(&fields.len()) {
            return Err(ConfigError::VersionBitsMalformed);
        }

        let start_time = fields[1]
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidStartTime(fields[1].to_string()))?;
        let timeout = fields[2]
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidTimeout(fields[2].to_string()))?;
        let min_activation_height = match fields.get(3) {
            Some(value) => value
                .parse::<i32>()
                .map_err(|_| ConfigError::InvalidMinActivationHeight(value.to_string()))?,
            None => 0,
        };

        let pos = DeploymentPos::from_name(fields[0])
            .ok_or_else(|| ConfigError::InvalidDeployment(fields[0].to_string()))?;
        info!(
            "Setting version bits activation parameters for {} to start={}, timeout={}, min_activation_height={}",
            fields[0], start_time, timeout, min_activation_height
        );
        options.version_bits_parameters.insert(
            pos,
            VersionBitsParameters {
                start_time,
                timeout,
                min_activation_height,
            },
        );
    }

    Ok(options)
}

pub fn read_signet_fork_args(args: &ChainArgs) -> Result<SignetForkOptions, ConfigError> {
    let fork_height = match &args.signet_fork_height {
        Some(value) => match value.parse::<i32>() {
            Ok(h) if h >= 0 => Some(h as u32),
            _ => return Err(ConfigError::InvalidForkHeight),
        },
        None => None,
    };

    let pubkeys = match &args.signet_fork_pubkeys {
        Some(value) if value.is_empty() => return Err(ConfigError::EmptyForkPubkeys),
        Some(value) => Some(
            value
                .split(',')
                .map(parse_fork_pubkey)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        None => None,
    };

    SignetForkOptions::new(fork_height, pubkeys)
}

fn parse_fork_pubkey(hex_key: &str) -> Result<CompressedPubKey, ConfigError> {
    let bytes = hex::decode(hex_key)
        .map_err(|_| ConfigError::InvalidForkPubkeyEncoding(hex_key.to_string()))?;
    CompressedPubKey::from_slice(&bytes).map_err(|e| match e {
        KeyError::InvalidPoint => ConfigError::InvalidForkPubkeyPoint(hex_key.to_string()),
        _ => ConfigError::InvalidForkPubkeyEncoding(hex_key.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;

    fn regtest_args(heights: &[&str], vbparams: &[&str]) -> ChainArgs {
        ChainArgs {
            test_activation_heights: heights.iter().map(|s| s.to_string()).collect(),
            vbparams: vbparams.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn fork_args(height: Option<&str>, pubkeys: Option<&str>) -> ChainArgs {
        ChainArgs {
            signet_fork_height: height.map(str::to_string),
            signet_fork_pubkeys: pubkeys.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_activation_height_parsing() {
        let options = read_regtest_args(&regtest_args(&["segwit@100"], &[])).unwrap();
        assert_eq!(options.activation_heights.get(&BuriedDeployment::Segwit), Some(&100));

        for bad in ["segwit@-1", "segwit@notanumber", "segwit@2147483647"] {
            assert_eq!(
                read_regtest_args(&regtest_args(&[bad], &[])),
                Err(ConfigError::ActivationHeightValue(bad.to_string()))
            );
        }
        assert_eq!(
            read_regtest_args(&regtest_args(&["segwit100"], &[])),
            Err(ConfigError::ActivationHeightFormat("segwit100".to_string()))
        );
        assert_eq!(
            read_regtest_args(&regtest_args(&["nosuch@1"], &[])),
            Err(ConfigError::ActivationHeightName("nosuch@1".to_string()))
        );
    }

    #[test]
    fn test_repeated_activation_height_overwrites() {
        let options = read_regtest_args(&regtest_args(&["csv@5", "csv@7"], &[])).unwrap();
        assert_eq!(options.activation_heights.get(&BuriedDeployment::Csv), Some(&7));
    }

    #[test]
    fn test_vbparams_parsing() {
        let options = read_regtest_args(&regtest_args(&[], &["testdummy:100:200"])).unwrap();
        assert_eq!(
            options.version_bits_parameters.get(&DeploymentPos::TestDummy),
            Some(&VersionBitsParameters { start_time: 100, timeout: 200, min_activation_height: 0 })
        );

        let options = read_regtest_args(&regtest_args(&[], &["testdummy:100:200:50"])).unwrap();
        assert_eq!(
            options.version_bits_parameters[&DeploymentPos::TestDummy].min_activation_height,
            50
        );

        assert_eq!(
            read_regtest_args(&regtest_args(&[], &["testdummy:100"])),
            Err(ConfigError::VersionBitsMalformed)
        );
        assert_eq!(
            read_regtest_args(&regtest_args(&[], &["testdummy:1:2:3:4"])),
            Err(ConfigError::VersionBitsMalformed)
        );
        assert_eq!(
            read_regtest_args(&regtest_args(&[], &["unknown:1:2"])),
            Err(ConfigError::InvalidDeployment("unknown".to_string()))
        );
        assert_eq!(
            read_regtest_args(&regtest_args(&[], &["taproot:x:2"])),
            Err(ConfigError::InvalidStartTime("x".to_string()))
        );
    }

    #[test]
    fn test_signet_challenge() {
        let args = ChainArgs {
            signet_challenge: vec!["51".to_string()],
            ..Default::default()
        };
        let options = read_signet_args(&args).unwrap();
        assert_eq!(options.challenge, Some(Script::from_bytes(vec![0x51])));

        let args = ChainArgs {
            signet_challenge: vec!["51".to_string(), "52".to_string()],
            ..Default::default()
        };
        assert_eq!(read_signet_args(&args), Err(ConfigError::MultipleSignetChallenges));

        let args = ChainArgs {
            signet_challenge: vec!["zz".to_string()],
            ..Default::default()
        };
        assert_eq!(
            read_signet_args(&args),
            Err(ConfigError::InvalidSignetChallenge("zz".to_string()))
        );
    }

    #[test]
    fn test_fork_both_or_neither() {
        let key = PrivateKey::generate().public_key().to_hex();

        assert_eq!(read_signet_fork_args(&fork_args(None, None)), Ok(SignetForkOptions::default()));
        assert_eq!(
            read_signet_fork_args(&fork_args(Some("10"), None)),
            Err(ConfigError::ForkHeightRequiresPubkeys)
        );
        assert_eq!(
            read_signet_fork_args(&fork_args(None, Some(&key))),
            Err(ConfigError::PubkeysRequireForkHeight)
        );
        assert_eq!(
            read_signet_fork_args(&fork_args(Some("0"), Some(&key))),
            Err(ConfigError::PubkeysRequireForkHeight)
        );

        let options = read_signet_fork_args(&fork_args(Some("10"), Some(&key))).unwrap();
        assert_eq!(options.fork_height(), Some(10));
        assert_eq!(options.pubkeys().map(<[_]>::len), Some(1));
        assert!(options.activation().is_some());
    }

    #[test]
    fn test_fork_zero_height_alone_is_disabled() {
        let options = read_signet_fork_args(&fork_args(Some("0"), None)).unwrap();
        assert_eq!(options.fork_height(), Some(0));
        assert!(options.activation().is_none());
    }

    #[test]
    fn test_fork_pubkey_validation() {
        assert_eq!(
            read_signet_fork_args(&fork_args(Some("10"), Some(""))),
            Err(ConfigError::EmptyForkPubkeys)
        );
        assert_eq!(
            read_signet_fork_args(&fork_args(Some("10"), Some("02abcd"))),
            Err(ConfigError::InvalidForkPubkeyEncoding("02abcd".to_string()))
        );
        let off_curve = format!("02{}", "ff".repeat(32));
        assert_eq!(
            read_signet_fork_args(&fork_args(Some("10"), Some(&off_curve))),
            Err(ConfigError::InvalidForkPubkeyPoint(off_curve.clone()))
        );
        assert_eq!(
            read_signet_fork_args(&fork_args(Some("-1"), None)),
            Err(ConfigError::InvalidForkHeight)
        );
    }

    #[test]
    fn test_fork_keys_in_order() {
        let keys: Vec<_> = (0..3).map(|_| PrivateKey::generate().public_key()).collect();
        let joined = keys.iter().map(|k| k.to_hex()).collect::<Vec<_>>().join(",");
        let options = read_signet_fork_args(&fork_args(Some("5"), Some(&joined))).unwrap();
        assert_eq!(options.pubkeys(), Some(keys.as_slice()));
    }

    #[test]
    fn test_chain_args_deserialize_with_defaults() {
        let args: ChainArgs = serde_json::from_str(r#"{"vbparams": ["taproot:1:2"]}"#).unwrap();
        assert_eq!(args.vbparams, vec!["taproot:1:2".to_string()]);
        assert!(args.signet_challenge.is_empty());
        assert_eq!(args.signet_fork_height, None);
    }
}
