// src/settings/secret.rs
//! Environment/secret-file resolution.
//!
//! Grounded on `original_source/src/utils/env.py::read_secret`: a secret
//! named `FOO` may be supplied either directly as the `FOO` env var, or
//! indirectly via `FOO_FILE` pointing at a file whose (whitespace-trimmed)
//! contents are the value. The file wins when both are present.

use std::env;
use std::fs;

/// Resolve a secret by name, returning `None` if neither form is set.
pub fn read_secret(name: &str) -> Option<String> {
    if let Ok(path) = env::var(format!("{name}_FILE")) {
        match fs::read_to_string(&path) {
            Ok(contents) => return Some(contents.trim().to_string()),
            Err(err) => {
                tracing::warn!(secret = name, %path, %err, "failed to read secret file");
            }
        }
    }

    env::var(name).ok().map(|v| v.trim().to_string())
}

/// Like [`read_secret`] but falls back to `default` instead of `None`.
pub fn read_secret_or(name: &str, default: &str) -> String {
    read_secret(name).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn env_var_wins_when_no_file_set() {
        unsafe { env::set_var("RAGCORE_TEST_SECRET_A", "plain-value") };
        assert_eq!(read_secret("RAGCORE_TEST_SECRET_A").as_deref(), Some("plain-value"));
        unsafe { env::remove_var("RAGCORE_TEST_SECRET_A") };
    }

    #[test]
    fn file_wins_over_plain_env_var() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  from-file-value  ").unwrap();

        unsafe {
            env::set_var("RAGCORE_TEST_SECRET_B", "plain-value");
            env::set_var("RAGCORE_TEST_SECRET_B_FILE", file.path());
        }

        assert_eq!(read_secret("RAGCORE_TEST_SECRET_B").as_deref(), Some("from-file-value"));

        unsafe {
            env::remove_var("RAGCORE_TEST_SECRET_B");
            env::remove_var("RAGCORE_TEST_SECRET_B_FILE");
        }
    }

    #[test]
    fn missing_secret_is_none() {
        assert_eq!(read_secret("RAGCORE_TEST_SECRET_NOPE"), None);
    }
}
