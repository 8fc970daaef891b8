//! Soft fork deployment catalogues

use serde::{Deserialize, Serialize};

/// Deployments activated at a fixed height
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuriedDeployment {
    Segwit,
    Bip34,
    Dersig,
    Cltv,
    Csv,
}

impl BuriedDeployment {
    pub const ALL: [BuriedDeployment; 5] = [
        BuriedDeployment::Segwit,
        BuriedDeployment::Bip34,
        BuriedDeployment::Dersig,
        BuriedDeployment::Cltv,
        BuriedDeployment::Csv,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BuriedDeployment::Segwit => "segwit",
            BuriedDeployment::Bip34 => "bip34",
            BuriedDeployment::Dersig => "dersig",
            BuriedDeployment::Cltv => "cltv",
            BuriedDeployment::Csv => "csv",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }
}

/// Version bits deployments, indexing [`super::ConsensusParams::deployments`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentPos {
    TestDummy,
    Taproot,
}

pub const MAX_VERSION_BITS_DEPLOYMENTS: usize = 2;

impl DeploymentPos {
    pub const ALL: [DeploymentPos; MAX_VERSION_BITS_DEPLOYMENTS] =
        [DeploymentPos::TestDummy, DeploymentPos::Taproot];

    pub fn name(&self) -> &'static str {
        match self {
            DeploymentPos::TestDummy => "testdummy",
            DeploymentPos::Taproot => "taproot",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// A BIP9 signalling window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bip9Deployment {
    /// Bit position to signal with
    pub bit: u8,
    pub start_time: i64,
    pub timeout: i64,
    /// Lowest height at which the deployment may become active
    pub min_activation_height: i32,
}

impl Bip9Deployment {
    /// Start time marking a deployment active from genesis
    pub const ALWAYS_ACTIVE: i64 = -1;
    /// Start time marking a deployment that never activates
    pub const NEVER_ACTIVE: i64 = -2;
    pub const NO_TIMEOUT: i64 = i64::MAX;

    pub const fn new(bit: u8, start_time: i64, timeout: i64, min_activation_height: i32) -> Self {
        Self {
            bit,
            start_time,
            timeout,
            min_activation_height,
        }
    }
}
