// ABOUTME: Environment variable readers shared by the worker configuration
// ABOUTME: Trimmed string lookup, lenient validated parsing and boolean flags

use std::fmt::Display;
use std::str::FromStr;

/// Read a variable, trimmed; unset and blank values are both `None`
pub fn non_empty_env(var_name: &str) -> Option<String> {
    std::env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable, falling back to `default` when it is unset, unparseable
/// or rejected by `accept`. Set-but-bad values are logged.
pub fn parse_env_or_default_with_validation<T, F>(var_name: &str, default: T, accept: F) -> T
where
    T: FromStr + Copy + Display,
    F: Fn(T) -> bool,
{
    let Some(raw_value) = non_empty_env(var_name) else {
        return default;
    };

    match raw_value.parse::<T>() {
        Ok(parsed) if accept(parsed) => parsed,
        Ok(_) => {
            tracing::warn!(
                "{} value '{}' is out of range, using default: {}",
                var_name,
                raw_value,
                default
            );
            default
        }
        Err(_) => {
            tracing::warn!(
                "{} value '{}' could not be parsed, using default: {}",
                var_name,
                raw_value,
                default
            );
            default
        }
    }
}

/// Parse a boolean flag, accepting `1/0`, `yes/no` and `on/off` besides `true/false`
pub fn parse_bool_env(var_name: &str, default: bool) -> bool {
    let Some(raw_value) = non_empty_env(var_name) else {
        return default;
    };

    match raw_value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => {
            tracing::warn!(
                "{} value '{}' is not a boolean, using default: {}",
                var_name,
                raw_value,
                default
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_non_empty_env() {
        std::env::set_var("FLOWBOX_TEST_STR", "   ");
        assert_eq!(non_empty_env("FLOWBOX_TEST_STR"), None);

        std::env::set_var("FLOWBOX_TEST_STR", " value ");
        assert_eq!(non_empty_env("FLOWBOX_TEST_STR"), Some("value".to_string()));

        std::env::remove_var("FLOWBOX_TEST_STR");
        assert_eq!(non_empty_env("FLOWBOX_TEST_STR"), None);
    }

    #[test]
    #[serial]
    fn test_validated_parse_accepts_in_range() {
        std::env::set_var("FLOWBOX_TEST_SIZE", " 4096 ");
        let size: usize = parse_env_or_default_with_validation("FLOWBOX_TEST_SIZE", 1024, |v| v > 0);
        assert_eq!(size, 4096);
        std::env::remove_var("FLOWBOX_TEST_SIZE");
    }

    #[test]
    #[serial]
    fn test_validated_parse_falls_back() {
        std::env::set_var("FLOWBOX_TEST_SIZE", "0");
        let size: usize = parse_env_or_default_with_validation("FLOWBOX_TEST_SIZE", 1024, |v| v > 0);
        assert_eq!(size, 1024);

        std::env::set_var("FLOWBOX_TEST_SIZE", "2MB");
        let size: usize = parse_env_or_default_with_validation("FLOWBOX_TEST_SIZE", 1024, |v| v > 0);
        assert_eq!(size, 1024);

        std::env::remove_var("FLOWBOX_TEST_SIZE");
        let size: usize = parse_env_or_default_with_validation("FLOWBOX_TEST_SIZE", 1024, |v| v > 0);
        assert_eq!(size, 1024);
    }

    #[test]
    #[serial]
    fn test_parse_bool_env_variants() {
        std::env::set_var("FLOWBOX_TEST_BOOL", "off");
        assert!(!parse_bool_env("FLOWBOX_TEST_BOOL", true));

        std::env::set_var("FLOWBOX_TEST_BOOL", "YES");
        assert!(parse_bool_env("FLOWBOX_TEST_BOOL", false));

        std::env::set_var("FLOWBOX_TEST_BOOL", "maybe");
        assert!(parse_bool_env("FLOWBOX_TEST_BOOL", true));

        std::env::remove_var("FLOWBOX_TEST_BOOL");
        assert!(!parse_bool_env("FLOWBOX_TEST_BOOL", false));
    }
}
