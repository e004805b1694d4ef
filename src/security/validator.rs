//! Input validation for every value that crosses the tool boundary.
//!
//! Each check is pure: it either returns the normalized value or a
//! [`BridgeError::Validation`] carrying a human-readable cause.

use std::net::IpAddr;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;

use crate::domain::DeviceDomain;
use crate::error::{BridgeError, Result};

/// Inclusive bounds for a device level.
pub const MIN_LEVEL: u8 = 0;
pub const MAX_LEVEL: u8 = 100;

/// Validate a bridge address.
///
/// Surrounding whitespace is ignored and the trimmed IPv4 or IPv6 literal
/// is returned unchanged.
///
/// # Errors
///
/// Returns a validation error if the address is blank or not an IP literal.
pub fn validate_host_ip(host: &str) -> Result<String> {
    let host = host.trim();
    if host.is_empty() {
        return Err(BridgeError::validation("Host IP cannot be empty"));
    }

    host.parse::<IpAddr>()
        .map(|_| host.to_string())
        .map_err(|_| BridgeError::validation(format!("Invalid IP address format: {host}")))
}

/// Validate a device level given as an untyped JSON value.
///
/// Only JSON integers are accepted; numeric strings and floats are rejected
/// rather than coerced.
///
/// # Errors
///
/// Returns a validation error for non-integer values or values outside
/// `0..=100`.
pub fn validate_device_level(level: &Value) -> Result<u8> {
    let Value::Number(number) = level else {
        return Err(BridgeError::validation(format!(
            "Device level must be an integer, got {}",
            json_type_name(level)
        )));
    };

    if let Some(n) = number.as_i64() {
        return u8::try_from(n)
            .ok()
            .filter(|v| *v <= MAX_LEVEL)
            .ok_or_else(|| level_out_of_range(n));
    }
    if let Some(n) = number.as_u64() {
        return Err(level_out_of_range(n));
    }

    Err(BridgeError::validation(
        "Device level must be an integer, got float",
    ))
}

/// Validate an already-typed integer level.
///
/// # Errors
///
/// Returns a validation error for values outside `0..=100`.
pub fn validate_level_value(level: i64) -> Result<u8> {
    u8::try_from(level)
        .ok()
        .filter(|v| *v <= MAX_LEVEL)
        .ok_or_else(|| level_out_of_range(level))
}

fn level_out_of_range(level: impl std::fmt::Display) -> BridgeError {
    BridgeError::validation(format!(
        "Device level must be between {MIN_LEVEL} and {MAX_LEVEL}, got {level}"
    ))
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate a device domain. Case-insensitive, whitespace-tolerant.
///
/// # Errors
///
/// Returns a validation error listing the valid domains if the value is not
/// one of them.
pub fn validate_domain(domain: &str) -> Result<DeviceDomain> {
    let normalized = domain.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(BridgeError::validation("Domain cannot be empty"));
    }

    DeviceDomain::from_name(&normalized).ok_or_else(|| {
        BridgeError::validation(format!(
            "Invalid domain '{normalized}'. Valid domains are: {}",
            DeviceDomain::names()
        ))
    })
}

/// Validate a device identifier.
///
/// # Errors
///
/// Returns a validation error if the id is blank.
pub fn validate_device_id(device_id: &str) -> Result<String> {
    let device_id = device_id.trim();
    if device_id.is_empty() {
        return Err(BridgeError::validation("Device ID cannot be empty"));
    }
    Ok(device_id.to_string())
}

/// Validate a certificate directory against the current user's home and the
/// system temp directory.
///
/// # Errors
///
/// Returns a validation error if the path is blank, cannot be resolved, or
/// resolves outside both allowed roots.
pub fn validate_cert_directory(cert_dir: &str) -> Result<PathBuf> {
    let home = dirs::home_dir();
    validate_cert_directory_within(cert_dir, home.as_deref(), &std::env::temp_dir())
}

/// Validate a certificate directory against explicit allowed roots.
///
/// `~` is expanded, relative paths are taken from the working directory and
/// symlinks are resolved for every component that already exists,
/// including links whose target does not exist yet.
///
/// # Errors
///
/// See [`validate_cert_directory`].
pub fn validate_cert_directory_within(
    cert_dir: &str,
    home: Option<&Path>,
    temp: &Path,
) -> Result<PathBuf> {
    if cert_dir.trim().is_empty() {
        return Err(BridgeError::validation(
            "Certificate directory cannot be empty",
        ));
    }

    let invalid = || BridgeError::validation(format!("Invalid certificate directory path: {cert_dir}"));

    let expanded = shellexpand::tilde(cert_dir);
    let path = Path::new(expanded.as_ref());
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_err(|_| invalid())?.join(path)
    };
    let resolved = resolve_lenient(&absolute).map_err(|_| invalid())?;

    let roots = [home, Some(temp)];
    let allowed = roots
        .into_iter()
        .flatten()
        .filter_map(|root| resolve_lenient(root).ok())
        .any(|root| resolved.starts_with(&root));

    if !allowed {
        return Err(BridgeError::validation(format!(
            "Certificate directory must be within home directory or temp directory: {}",
            resolved.display()
        )));
    }

    Ok(resolved)
}

/// Symlink hops followed while resolving a certificate directory.
const MAX_LINK_DEPTH: usize = 40;

/// Canonicalize the longest existing ancestor of `path` and append the
/// remaining components lexically. Dangling symlinks are followed to
/// their target.
fn resolve_lenient(path: &Path) -> std::io::Result<PathBuf> {
    resolve_from(path, 0)
}

fn resolve_from(path: &Path, depth: usize) -> std::io::Result<PathBuf> {
    if depth > MAX_LINK_DEPTH {
        return Err(std::io::Error::other("too many levels of symbolic links"));
    }

    let mut existing = path;
    let mut tail = Vec::new();
    while std::fs::symlink_metadata(existing).is_err() {
        let (Some(parent), Some(last)) = (existing.parent(), existing.components().next_back())
        else {
            break;
        };
        tail.push(last.as_os_str().to_os_string());
        existing = parent;
    }

    let mut resolved = if existing.exists() {
        existing.canonicalize()?
    } else {
        let target = std::fs::read_link(existing)?;
        let target = match existing.parent() {
            Some(parent) if target.is_relative() => parent.join(target),
            _ => target,
        };
        resolve_from(&target, depth + 1)?
    };
    for component in tail.iter().rev().map(Path::new).flat_map(Path::components) {
        match component {
            Component::Normal(name) => resolved.push(name),
            Component::ParentDir => {
                resolved.pop();
            }
            _ => {}
        }
    }
    Ok(resolved)
}

/// Read and validate an environment variable through `lookup`.
///
/// Blank values are treated as unset.
///
/// # Errors
///
/// Returns a validation error if `required` is set and the variable is
/// missing or blank.
pub fn validate_environment_variable<F>(
    name: &str,
    required: bool,
    lookup: F,
) -> Result<Option<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    if required && value.is_none() {
        return Err(BridgeError::validation(format!(
            "Required environment variable {name} is not set"
        )));
    }

    Ok(value)
}
