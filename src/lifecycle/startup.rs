//! Startup helpers shared by the binary and the integration tests.

use std::net::SocketAddr;

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::registry::Registry;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid bind address {address}: {source}")]
    BindAddress {
        address: String,
        source: std::net::AddrParseError,
    },
    #[error("failed to seed registry: {0}")]
    Seed(#[from] RegistryError),
}

/// Empty registry, or the demo registry when `seed_demo_data` is set.
pub fn build_registry(config: &RegistryConfig) -> Result<Registry, StartupError> {
    if config.seed_demo_data {
        Ok(Registry::seeded()?)
    } else {
        Ok(Registry::new())
    }
}

/// Parse the configured bind address.
pub fn bind_address(config: &RegistryConfig) -> Result<SocketAddr, StartupError> {
    let address = &config.listener.bind_address;
    address.parse().map_err(|source| StartupError::BindAddress {
        address: address.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_registry_honors_seed_flag() {
        let mut config = RegistryConfig::default();
        config.seed_demo_data = false;
        assert!(build_registry(&config).unwrap().configs.is_empty());

        config.seed_demo_data = true;
        let registry = build_registry(&config).unwrap();
        assert!(registry.configs.get("db_config", 2).is_ok());
        assert!(registry.groups.get("web_configs", 1).is_ok());
    }

    #[test]
    fn test_bind_address() {
        let mut config = RegistryConfig::default();
        assert_eq!(bind_address(&config).unwrap().port(), 8000);

        config.listener.bind_address = "localhost-ish".into();
        assert!(matches!(
            bind_address(&config),
            Err(StartupError::BindAddress { .. })
        ));
    }
}
