use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::types::{
    APP_DIR_NAME, BridgeConfig, ENV_BRIDGE_ADDRESS, ENV_CERT_DIRECTORY, ENV_PAIRING_IDENTITY_DIR,
    LEGACY_ENV_BRIDGE_ADDRESS, LEGACY_ENV_CERT_DIRECTORY,
};
use crate::security::{validate_cert_directory, validate_environment_variable, validate_host_ip};

/// Read a variable from the process environment.
#[must_use]
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Load configuration from the process environment.
#[must_use]
pub fn load_config() -> BridgeConfig {
    load_config_from(env_lookup)
}

/// Load configuration through an arbitrary variable lookup.
///
/// An address that is not a valid IP literal is logged and treated as
/// unset, leaving the configuration in the unpaired state.
pub fn load_config_from<F>(lookup: F) -> BridgeConfig
where
    F: Fn(&str) -> Option<String>,
{
    let cert_dir = resolve_cert_dir(&lookup);

    let bridge_address = read_with_legacy(&lookup, ENV_BRIDGE_ADDRESS, LEGACY_ENV_BRIDGE_ADDRESS)
        .and_then(|raw| match validate_host_ip(&raw) {
            Ok(address) => Some(address),
            Err(e) => {
                warn!(error = %e, "Ignoring invalid bridge address from environment");
                None
            }
        });

    debug!(
        bridge_address = bridge_address.as_deref().unwrap_or("<unset>"),
        cert_dir = %cert_dir.display(),
        "Configuration loaded from environment"
    );

    BridgeConfig::new(bridge_address, cert_dir)
}

/// Resolve the certificate directory.
///
/// An override is validated; if validation fails the cause is logged and
/// the default directory is used instead of failing.
pub fn resolve_cert_dir<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = read_with_legacy(lookup, ENV_CERT_DIRECTORY, LEGACY_ENV_CERT_DIRECTORY) else {
        return default_cert_dir();
    };

    match validate_cert_directory(&raw) {
        Ok(dir) => {
            info!(cert_dir = %dir.display(), "Using certificate directory override");
            dir
        }
        Err(e) => {
            let fallback = default_cert_dir();
            warn!(
                error = %e,
                fallback = %fallback.display(),
                "Invalid certificate directory override, using default"
            );
            fallback
        }
    }
}

/// Optional directory holding the client identity presented on the
/// pairing port.
pub fn pairing_identity_dir<F>(lookup: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    validate_environment_variable(ENV_PAIRING_IDENTITY_DIR, false, lookup)
        .ok()
        .flatten()
        .map(|raw| PathBuf::from(shellexpand::tilde(&raw).as_ref()))
}

fn read_with_legacy<F>(lookup: &F, primary: &str, legacy: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| {
        validate_environment_variable(name, false, lookup)
            .ok()
            .flatten()
    };
    read(primary).or_else(|| {
        let value = read(legacy);
        if value.is_some() {
            debug!(variable = legacy, "Using legacy environment variable");
        }
        value
    })
}

/// Get the default certificate directory
#[must_use]
pub fn default_cert_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_default_cert_dir() {
        let path = default_cert_dir();
        assert!(path.ends_with("lutron-caseta-mcp"));
    }

    #[test]
    fn test_empty_environment_is_unpaired() {
        let config = load_config_from(lookup_from(&[]));
        assert!(config.bridge_address.is_none());
        assert_eq!(config.cert_dir, default_cert_dir());
    }

    #[test]
    fn test_address_and_override() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("certs");
        let config = load_config_from(lookup_from(&[
            ("BRIDGE_ADDRESS", " 192.168.1.40 "),
            ("CERT_DIRECTORY", dir.to_str().unwrap()),
        ]));

        assert_eq!(config.bridge_address.as_deref(), Some("192.168.1.40"));
        assert!(config.cert_dir.ends_with("certs"));
        assert!(config.credentials.key.ends_with("certs/caseta.key"));
    }

    #[test]
    fn test_invalid_address_is_treated_as_unset() {
        let config = load_config_from(lookup_from(&[("BRIDGE_ADDRESS", "not-an-ip")]));
        assert!(config.bridge_address.is_none());
    }

    #[test]
    fn test_invalid_override_falls_back_to_default() {
        let lookup = lookup_from(&[("CERT_DIRECTORY", "/etc/ssl")]);
        assert_eq!(resolve_cert_dir(&lookup), default_cert_dir());
    }

    #[test]
    fn test_blank_override_uses_default() {
        let lookup = lookup_from(&[("CERT_DIRECTORY", "   ")]);
        assert_eq!(resolve_cert_dir(&lookup), default_cert_dir());
    }

    #[test]
    fn test_legacy_variables_are_read() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load_config_from(lookup_from(&[
            ("LUTRON_BRIDGE_IP", "10.1.1.1"),
            ("LUTRON_CERT_DIR", tmp.path().to_str().unwrap()),
        ]));
        assert_eq!(config.bridge_address.as_deref(), Some("10.1.1.1"));
        assert_ne!(config.cert_dir, default_cert_dir());
    }

    #[test]
    fn test_primary_variable_wins_over_legacy() {
        let config = load_config_from(lookup_from(&[
            ("BRIDGE_ADDRESS", "10.0.0.1"),
            ("LUTRON_BRIDGE_IP", "10.0.0.2"),
        ]));
        assert_eq!(config.bridge_address.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_pairing_identity_dir() {
        let lookup = lookup_from(&[("PAIRING_IDENTITY_DIR", "/opt/lap")]);
        assert_eq!(pairing_identity_dir(&lookup), Some(PathBuf::from("/opt/lap")));
        assert_eq!(pairing_identity_dir(&lookup_from(&[])), None);
    }
}
