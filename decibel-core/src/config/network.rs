//! Venue deployments and named network presets.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::traits::{Configurable, Validatable};
use super::validation::{EnvOverride, ValidationContext, Validator};
use crate::error::ConfigError;
use crate::types::{AccountAddress, bcs_encode_str};

/// Names accepted by [`DecibelConfig::named`].
pub const NAMED_NETWORKS: [&str; 5] = ["mainnet", "netna", "testnet", "local", "docker"];

/// Contract compatibility version assumed by this SDK.
pub const DEFAULT_COMPAT_VERSION: CompatVersion = CompatVersion::V0_4;

const MAINNET_PACKAGE: &str = "0xe6683d451db246750f180fb78d9b5e0a855dacba64ddf5810dffdaeb221e46bf";
const MAINNET_USDC: &str = "0xbae207659db88bea0cbead6da0ed00aac12edcdda169e591cd41c94180b46f3b";
const TESTNET_PACKAGE: &str = "0x952535c3049e52f195f26798c2f1340d7dd5100edbe0f464e520a974d16fbe9f";
// netna, local and docker share one package.
const STAGING_PACKAGE: &str = "0xb8a5788314451ce4d2fbbad32e1bad88d4184b73943b7fe5166eab93cf1a5a95";

/// Network a deployment lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production.
    Mainnet,
    /// Public testnet.
    Testnet,
    /// Staging, local or self-hosted.
    Custom,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Custom => "custom",
        })
    }
}

/// On-chain contract version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompatVersion {
    /// `v0.4`
    #[default]
    #[serde(rename = "v0.4")]
    V0_4,
}

/// Contract addresses of one deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Package address.
    pub package: AccountAddress,
    /// USDC collateral token.
    pub usdc: AccountAddress,
    /// Test collateral token.
    pub testc: AccountAddress,
    /// Perp engine global object; the creator of every market object.
    pub perp_engine_global: AccountAddress,
}

impl Deployment {
    /// Derives every address from the package address.
    #[must_use]
    pub fn from_package(package: AccountAddress) -> Self {
        Self {
            package,
            usdc: AccountAddress::for_named_object(&package, b"USDC"),
            testc: AccountAddress::for_named_object(&package, b"TESTC"),
            perp_engine_global: AccountAddress::for_named_object(&package, b"GlobalPerpEngine"),
        }
    }

    /// Address of the market object named `name` (e.g. `"BTC/USD"`).
    #[must_use]
    pub fn market_address(&self, name: &str) -> AccountAddress {
        AccountAddress::for_named_object(&self.perp_engine_global, &bcs_encode_str(name))
    }
}

/// Endpoints and contract addresses for one venue deployment.
///
/// # Example
///
/// ```
/// use decibel_core::config::{DecibelConfig, Network};
///
/// let config = DecibelConfig::named("testnet").unwrap();
/// assert_eq!(config.network, Network::Testnet);
/// assert_eq!(config.chain_id, Some(2));
/// assert!(DecibelConfig::named("devnet").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecibelConfig {
    /// Network kind.
    pub network: Network,
    /// Chain fullnode REST endpoint.
    pub fullnode_url: String,
    /// Trading REST endpoint.
    pub trading_http_url: String,
    /// Trading WebSocket endpoint.
    pub trading_ws_url: String,
    /// Fee payer endpoint.
    #[serde(default)]
    pub gas_station_url: Option<String>,
    /// Fee payer API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_station_api_key: Option<String>,
    /// Contract addresses.
    pub deployment: Deployment,
    /// Chain id, unknown for local deployments.
    #[serde(default)]
    pub chain_id: Option<u8>,
    /// Contract compatibility version.
    #[serde(default)]
    pub compat_version: CompatVersion,
}

impl DecibelConfig {
    /// Returns the preset registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownNetwork` for names outside [`NAMED_NETWORKS`].
    pub fn named(name: &str) -> Result<Self, ConfigError> {
        match name {
            "mainnet" => Ok(Self::mainnet()),
            "testnet" => Ok(Self::testnet()),
            "netna" => Ok(Self::netna()),
            "local" => Ok(Self::local()),
            "docker" => Ok(Self::docker()),
            other => Err(ConfigError::UnknownNetwork {
                name: other.to_string(),
                known: NAMED_NETWORKS.join(", "),
            }),
        }
    }

    /// Production deployment.
    #[must_use]
    pub fn mainnet() -> Self {
        let package = preset_address(MAINNET_PACKAGE);
        let deployment = Deployment {
            usdc: preset_address(MAINNET_USDC),
            ..Deployment::from_package(package)
        };
        Self::hosted(Network::Mainnet, "mainnet", deployment, Some(1))
    }

    /// Public testnet deployment.
    #[must_use]
    pub fn testnet() -> Self {
        let deployment = Deployment::from_package(preset_address(TESTNET_PACKAGE));
        Self::hosted(Network::Testnet, "testnet", deployment, Some(2))
    }

    /// Staging deployment.
    #[must_use]
    pub fn netna() -> Self {
        let deployment = Deployment::from_package(preset_address(STAGING_PACKAGE));
        Self::hosted(Network::Custom, "netna.staging", deployment, Some(208))
    }

    /// Services running on localhost.
    #[must_use]
    pub fn local() -> Self {
        Self {
            network: Network::Custom,
            fullnode_url: "http://localhost:8080/v1".to_string(),
            trading_http_url: "http://localhost:8084".to_string(),
            trading_ws_url: "ws://localhost:8083".to_string(),
            gas_station_url: Some("http://localhost:8085".to_string()),
            gas_station_api_key: None,
            deployment: Deployment::from_package(preset_address(STAGING_PACKAGE)),
            chain_id: None,
            compat_version: DEFAULT_COMPAT_VERSION,
        }
    }

    /// Services running in the docker compose network.
    #[must_use]
    pub fn docker() -> Self {
        Self {
            network: Network::Custom,
            fullnode_url: "http://tradenet:8080/v1".to_string(),
            trading_http_url: "http://trading-api-http:8080".to_string(),
            trading_ws_url: "ws://trading-api-ws:8080".to_string(),
            gas_station_url: Some("http://fee-payer:8080".to_string()),
            gas_station_api_key: None,
            deployment: Deployment::from_package(preset_address(STAGING_PACKAGE)),
            chain_id: None,
            compat_version: DEFAULT_COMPAT_VERSION,
        }
    }

    fn hosted(network: Network, host: &str, deployment: Deployment, chain_id: Option<u8>) -> Self {
        let base = format!("api.{host}.aptoslabs.com");
        Self {
            network,
            fullnode_url: format!("https://{base}/v1"),
            trading_http_url: format!("https://{base}/decibel"),
            trading_ws_url: format!("wss://{base}/decibel/ws"),
            gas_station_url: Some(format!("https://{base}/gs/v1")),
            gas_station_api_key: None,
            deployment,
            chain_id,
            compat_version: DEFAULT_COMPAT_VERSION,
        }
    }

    /// Address of the market object named `name`.
    #[must_use]
    pub fn market_address(&self, name: &str) -> AccountAddress {
        self.deployment.market_address(name)
    }
}

// Preset constants are compile-time literals and always parse.
fn preset_address(hex: &str) -> AccountAddress {
    hex.parse().unwrap_or_else(|_| AccountAddress::new([0; 32]))
}

impl fmt::Debug for DecibelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecibelConfig")
            .field("network", &self.network)
            .field("fullnode_url", &self.fullnode_url)
            .field("trading_http_url", &self.trading_http_url)
            .field("trading_ws_url", &self.trading_ws_url)
            .field("gas_station_url", &self.gas_station_url)
            .field(
                "gas_station_api_key",
                &self.gas_station_api_key.as_ref().map(|_| "***"),
            )
            .field("deployment", &self.deployment)
            .field("chain_id", &self.chain_id)
            .field("compat_version", &self.compat_version)
            .finish()
    }
}

impl Validatable for DecibelConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let mut ctx = ValidationContext::new();
        let mut v = Validator::new(&mut ctx);
        v.require_non_empty("fullnode_url", &self.fullnode_url)
            .http_url("fullnode_url", &self.fullnode_url)
            .require_non_empty("trading_http_url", &self.trading_http_url)
            .http_url("trading_http_url", &self.trading_http_url)
            .require_non_empty("trading_ws_url", &self.trading_ws_url)
            .ws_url("trading_ws_url", &self.trading_ws_url);
        if let Some(url) = &self.gas_station_url {
            v.http_url("gas_station_url", url);
        }
        ctx.into_result()
    }
}

impl Configurable for DecibelConfig {
    fn apply_env_overrides(&mut self, prefix: &str) {
        EnvOverride::apply_string(&format!("{prefix}_FULLNODE_URL"), &mut self.fullnode_url);
        EnvOverride::apply_string(&format!("{prefix}_TRADING_HTTP_URL"), &mut self.trading_http_url);
        EnvOverride::apply_string(&format!("{prefix}_TRADING_WS_URL"), &mut self.trading_ws_url);
        EnvOverride::apply_optional_string(
            &format!("{prefix}_GAS_STATION_URL"),
            &mut self.gas_station_url,
        );
        EnvOverride::apply_optional_string(
            &format!("{prefix}_GAS_STATION_API_KEY"),
            &mut self.gas_station_api_key,
        );
    }

    fn env_var_names(prefix: &str) -> Vec<String> {
        [
            "FULLNODE_URL",
            "TRADING_HTTP_URL",
            "TRADING_WS_URL",
            "GAS_STATION_URL",
            "GAS_STATION_API_KEY",
        ]
        .iter()
        .map(|name| format!("{prefix}_{name}"))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_named_presets() {
        for name in NAMED_NETWORKS {
            let config = DecibelConfig::named(name).unwrap();
            assert!(config.validate().is_ok(), "{name} should validate");
            assert_eq!(config.compat_version, CompatVersion::V0_4);
        }
    }

    #[test]
    fn test_unknown_network() {
        match DecibelConfig::named("devnet") {
            Err(ConfigError::UnknownNetwork { name, known }) => {
                assert_eq!(name, "devnet");
                assert!(known.contains("mainnet"));
                assert!(known.contains("docker"));
            }
            other => panic!("expected UnknownNetwork, got {other:?}"),
        }
    }

    #[test]
    fn test_mainnet_urls() {
        let config = DecibelConfig::mainnet();
        assert_eq!(config.trading_ws_url, "wss://api.mainnet.aptoslabs.com/decibel/ws");
        assert_eq!(config.trading_http_url, "https://api.mainnet.aptoslabs.com/decibel");
        assert_eq!(config.fullnode_url, "https://api.mainnet.aptoslabs.com/v1");
        assert_eq!(config.chain_id, Some(1));
        assert_eq!(config.deployment.usdc.to_string(), MAINNET_USDC);
        assert_ne!(
            config.deployment.usdc,
            AccountAddress::for_named_object(&config.deployment.package, b"USDC")
        );
    }

    #[test]
    fn test_netna_urls() {
        let config = DecibelConfig::netna();
        assert_eq!(
            config.trading_ws_url,
            "wss://api.netna.staging.aptoslabs.com/decibel/ws"
        );
        assert_eq!(config.chain_id, Some(208));
        assert_eq!(config.network, Network::Custom);
    }

    #[test]
    fn test_local_and_docker_share_package() {
        let local = DecibelConfig::local();
        let docker = DecibelConfig::docker();
        assert_eq!(local.deployment, docker.deployment);
        assert_eq!(local.deployment, DecibelConfig::netna().deployment);
        assert_eq!(local.chain_id, None);
        assert_eq!(docker.trading_ws_url, "ws://trading-api-ws:8080");
    }

    #[test]
    fn test_deployment_derivation() {
        let package = preset_address(TESTNET_PACKAGE);
        let deployment = Deployment::from_package(package);
        assert_eq!(
            deployment.perp_engine_global,
            AccountAddress::for_named_object(&package, b"GlobalPerpEngine")
        );
        assert_ne!(deployment.usdc, deployment.testc);
    }

    #[test]
    fn test_market_address_uses_bcs_seed() {
        let config = DecibelConfig::testnet();
        let expected = AccountAddress::for_named_object(
            &config.deployment.perp_engine_global,
            b"\x07BTC/USD",
        );
        assert_eq!(config.market_address("BTC/USD"), expected);
        assert_ne!(config.market_address("BTC/USD"), config.market_address("ETH/USD"));
    }

    #[test]
    fn test_validation_rejects_bad_scheme() {
        let mut config = DecibelConfig::local();
        config.trading_ws_url = "http://localhost:8083".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("trading_ws_url"));
    }

    #[test]
    fn test_debug_masks_api_key() {
        let mut config = DecibelConfig::testnet();
        config.gas_station_api_key = Some("secret-key".to_string());
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = DecibelConfig::testnet();
        let yaml = ConfigLoader::serialize(&config, ConfigFormat::Yaml).unwrap();
        assert!(yaml.contains("network: testnet"));
        assert!(yaml.contains("compat_version: v0.4"));
        let parsed: DecibelConfig = ConfigLoader::new().load_str(&yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_env_overrides() {
        // SAFETY: prefix is unique to this test
        unsafe {
            std::env::set_var("DECIBEL_NET_TEST_TRADING_WS_URL", "ws://127.0.0.1:9000");
        }
        let mut config = DecibelConfig::local();
        config.apply_env_overrides("DECIBEL_NET_TEST");
        assert_eq!(config.trading_ws_url, "ws://127.0.0.1:9000");
        assert_eq!(DecibelConfig::env_var_names("DECIBEL").len(), 5);
    }
}
