use crate::utils::error::{Result, StorageError};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(StorageError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(StorageError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(StorageError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value
        .as_ref()
        .ok_or_else(|| StorageError::MissingConfigError {
            field: field_name.to_string(),
        })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StorageError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
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
        return Err(StorageError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Keys are relative, `/`-separated and may not climb out of the adapter root.
pub fn validate_key(key: &str) -> Result<()> {
    let reject = |reason: &str| {
        Err(StorageError::InvalidKeyError {
            key: key.to_string(),
            reason: reason.to_string(),
        })
    };

    if key.is_empty() {
        return reject("key cannot be empty");
    }
    if key.starts_with('/') || key.contains('\\') {
        return reject("key must be relative and use '/' separators");
    }
    if key.contains('\0') {
        return reject("key contains null bytes");
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return reject("key contains an empty, '.' or '..' segment");
    }
    Ok(())
}

/// List prefixes follow key rules but may be empty (whole root) or end with '/'.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(());
    }
    validate_key(trimmed)
}

pub fn validate_domain(domain: &str) -> Result<()> {
    let valid = !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.contains("..")
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '*'));

    if !valid {
        return Err(StorageError::InvalidConfigValueError {
            field: "domain".to_string(),
            value: domain.to_string(),
            reason: "Domain may only contain letters, digits, '.', '-', '_' and '*'".to_string(),
        });
    }
    Ok(())
}

pub fn validate_pem(key: &str, pem: &str) -> Result<()> {
    let trimmed = pem.trim_start();
    if !trimmed.starts_with("-----BEGIN ") || !pem.contains("-----END ") {
        return Err(StorageError::InvalidMaterialError {
            key: key.to_string(),
            reason: "payload is not PEM armored".to_string(),
        });
    }
    Ok(())
}
