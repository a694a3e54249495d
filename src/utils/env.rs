use regex::{Captures, Regex};

use crate::utils::error::{DeployError, Result};

/// Replaces `${VAR}` and `${VAR:-default}` with environment values.
///
/// Unset variables without a default become empty, with a warning.
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").map_err(|e| {
        DeployError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        }
    })?;

    let result = re.replace_all(content, |caps: &Captures| {
        let var_name = &caps[1];
        match (std::env::var(var_name), caps.get(2)) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.as_str().to_string(),
            (Err(_), None) => {
                tracing::warn!("{} is not set, substituting an empty string", var_name);
                String::new()
            }
        }
    });

    Ok(result.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_set_and_unset_vars() {
        std::env::set_var("AUTODOCK_TEST_REGION", "eu-west-1");
        std::env::remove_var("AUTODOCK_TEST_MISSING");

        let out = substitute_env_vars(
            "region = \"${AUTODOCK_TEST_REGION}\"\nname = \"${AUTODOCK_TEST_MISSING}\"",
        )
        .unwrap();
        assert!(out.contains("region = \"eu-west-1\""));
        assert!(out.contains("name = \"\""));
        assert!(!out.contains("${"));
    }

    #[test]
    fn test_substitute_default_value() {
        std::env::remove_var("AUTODOCK_TEST_TAG");
        let out = substitute_env_vars("image: shop/web:${AUTODOCK_TEST_TAG:-latest}").unwrap();
        assert_eq!(out, "image: shop/web:latest");
    }
}
