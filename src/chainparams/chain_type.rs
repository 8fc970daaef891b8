//! Network identities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ConfigError;

/// The closed set of networks this node can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChainType {
    Main,
    Testnet,
    Signet,
    Regtest,
    ScashMain,
    ScashTestnet,
    ScashRegtest,
    AlphaMain,
    AlphaTestnet,
    AlphaRegtest,
}

impl ChainType {
    pub const ALL: [ChainType; 10] = [
        ChainType::Main,
        ChainType::Testnet,
        ChainType::Signet,
        ChainType::Regtest,
        ChainType::ScashMain,
        ChainType::ScashTestnet,
        ChainType::ScashRegtest,
        ChainType::AlphaMain,
        ChainType::AlphaTestnet,
        ChainType::AlphaRegtest,
    ];

    /// Name used on the command line and in data directories
    pub fn name(&self) -> &'static str {
        match self {
            ChainType::Main => "main",
            ChainType::Testnet => "test",
            ChainType::Signet => "signet",
            ChainType::Regtest => "regtest",
            ChainType::ScashMain => "scashmain",
            ChainType::ScashTestnet => "scashtest",
            ChainType::ScashRegtest => "scashregtest",
            ChainType::AlphaMain => "alphamain",
            ChainType::AlphaTestnet => "alphatest",
            ChainType::AlphaRegtest => "alpharegtest",
        }
    }

    pub fn is_alpha(&self) -> bool {
        matches!(self, ChainType::AlphaMain | ChainType::AlphaTestnet | ChainType::AlphaRegtest)
    }

    pub fn is_scash(&self) -> bool {
        matches!(self, ChainType::ScashMain | ChainType::ScashTestnet | ChainType::ScashRegtest)
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChainType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChainType::ALL
            .into_iter()
            .find(|chain| chain.name() == s)
            .ok_or_else(|| ConfigError::UnknownChain(s.to_string()))
    }
}

impl TryFrom<String> for ChainType {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ChainType> for String {
    fn from(chain: ChainType) -> Self {
        chain.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_roundtrip() {
        for chain in ChainType::ALL {
            assert_eq!(chain.name().parse::<ChainType>(), Ok(chain));
        }
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(
            "mainnet".parse::<ChainType>(),
            Err(ConfigError::UnknownChain("mainnet".to_string()))
        );
    }

    #[test]
    fn test_serde_uses_names() {
        assert_eq!(serde_json::to_string(&ChainType::AlphaTestnet).unwrap(), "\"alphatest\"");
        let parsed: ChainType = serde_json::from_str("\"scashregtest\"").unwrap();
        assert_eq!(parsed, ChainType::ScashRegtest);
    }
}
