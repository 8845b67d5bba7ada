use thiserror::Error;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads an environment variable, returning a structured error if it's missing.
///
/// This is a thin wrapper around `std::env::var` that provides a more
/// ergonomic and specific error type for missing variables. A variable that is
/// set but blank counts as missing.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    lookup_env_var(name).ok_or_else(|| MissingEnvVarError(name.to_string()))
}

/// Reads an optional environment variable, trimming whitespace.
///
/// Returns `None` when the variable is unset, not valid unicode, or blank.
pub fn lookup_env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(non_blank)
}

/// Reads a boolean flag such as `SIMULATION_MODE`.
///
/// Accepts `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off` (case-insensitive).
/// Anything else, including an unset variable, yields `None`.
pub fn lookup_env_bool(name: &str) -> Option<bool> {
    lookup_env_var(name).and_then(|v| parse_bool(&v))
}

/// Parses the boolean spellings accepted by [`lookup_env_bool`].
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_blank(v: String) -> Option<String> {
    let trimmed = v.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" on "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("No"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn missing_variable_is_reported_by_name() {
        let err = get_env_var("SHARED_UTILS_SURELY_UNSET_VARIABLE").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing environment variable: SHARED_UTILS_SURELY_UNSET_VARIABLE"
        );
    }

    #[test]
    fn blank_values_are_dropped() {
        assert_eq!(non_blank("   ".to_string()), None);
        assert_eq!(non_blank(" AAPL ".to_string()), Some("AAPL".to_string()));
    }
}
