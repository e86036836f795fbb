//! Configuration management module.
//!
//! - YAML, TOML and JSON configuration files, detected by extension
//! - Validation with descriptive error messages
//! - `DECIBEL_*` environment variable overrides
//! - Named venue deployments (`mainnet`, `testnet`, `netna`, `local`, `docker`)
//!
//! # Example
//!
//! ```rust,ignore
//! use decibel_core::config::{ConfigLoader, DecibelConfig};
//!
//! let config = DecibelConfig::named("testnet")?;
//! let custom: DecibelConfig = ConfigLoader::new().load_file("decibel.yaml")?;
//! ```

mod loader;
mod network;
mod traits;
pub mod validation;

pub use loader::{ConfigFormat, ConfigLoader};
pub use network::{
    CompatVersion, DEFAULT_COMPAT_VERSION, DecibelConfig, Deployment, NAMED_NETWORKS, Network,
};
pub use traits::{Configurable, Validatable};
pub use validation::{EnvOverride, ValidationContext, ValidationResult, Validator};
