use crate::utils::error::{DeployError, Result};
use std::net::Ipv4Addr;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: impl ToString, reason: impl Into<String>) -> DeployError {
    DeployError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

/// Compose extension keys must start with `x-`.
pub fn validate_extension_key(field_name: &str, key: &str) -> Result<()> {
    if !key.starts_with("x-") || key.len() <= 2 {
        return Err(invalid(
            field_name,
            key,
            "Extension keys must start with 'x-'",
        ));
    }
    Ok(())
}

/// An IPv4 CIDR block such as `10.0.0.0/16`.
pub fn validate_cidr(field_name: &str, cidr: &str) -> Result<()> {
    let (address, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| invalid(field_name, cidr, "Expected <address>/<prefix>"))?;

    address
        .parse::<Ipv4Addr>()
        .map_err(|e| invalid(field_name, cidr, format!("Invalid address: {}", e)))?;

    let prefix: u8 = prefix
        .parse()
        .map_err(|_| invalid(field_name, cidr, "Prefix must be a number"))?;
    validate_range(field_name, prefix, 16, 28)
}
