use anyhow::{Context, Result};
use std::path::Path;

pub const API_KEYS_ENV: &str = "SCRIPT2AUDIO_API_KEYS";

/// Splits a newline-delimited key list, dropping blank entries.
pub fn parse_keys(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn load_keys_file(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read API keys from {:?}", path))?;
    Ok(parse_keys(&content))
}

/// Keys are taken from the environment, then the inline config list, then the keys file.
pub fn resolve_keys(inline: Option<&str>, file: &Path) -> Result<Vec<String>> {
    if let Ok(value) = std::env::var(API_KEYS_ENV) {
        let keys = parse_keys(&value);
        if !keys.is_empty() {
            return Ok(keys);
        }
    }
    if let Some(inline) = inline {
        let keys = parse_keys(inline);
        if !keys.is_empty() {
            return Ok(keys);
        }
    }
    load_keys_file(file)
}

/// Short, log-safe label for a key.
pub fn redact(key: &str) -> String {
    let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("…{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drops_blank_entries() {
        let keys = parse_keys("key-one\n\n   \n  key-two  \r\nkey-three\n");
        assert_eq!(keys, vec!["key-one", "key-two", "key-three"]);
        assert!(parse_keys("\n \n").is_empty());
    }

    #[test]
    fn test_missing_file_yields_no_keys() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(load_keys_file(&dir.path().join("absent.txt"))?.is_empty());
        Ok(())
    }

    #[test]
    fn test_inline_keys_take_precedence_over_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("keys.txt");
        std::fs::write(&path, "file-key\n")?;

        if std::env::var(API_KEYS_ENV).is_err() {
            assert_eq!(resolve_keys(Some("inline-key\n"), &path)?, vec!["inline-key"]);
            assert_eq!(resolve_keys(Some("  \n"), &path)?, vec!["file-key"]);
            assert_eq!(resolve_keys(None, &path)?, vec!["file-key"]);
        }
        Ok(())
    }

    #[test]
    fn test_redact_keeps_only_tail() {
        assert_eq!(redact("AIzaSyABCDEF1234"), "…1234");
        assert_eq!(redact("ab"), "…ab");
    }
}
