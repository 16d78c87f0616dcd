//! `.env` rendering for environment restores

use std::collections::BTreeMap;

use crate::errors::EngineError;
use crate::remote::builder::shell_quote;

/// Heredoc terminator used when writing `.env` files
pub const ENV_HEREDOC_MARKER: &str = "DEVFLOW_ENV_EOF";

/// Render a snapshot as `KEY="value"` lines, sorted by key.
///
/// Values are double-quoted with `\`, `"`, `$` and backticks escaped and
/// newlines folded to `\n`, so every entry stays on one line and nothing
/// expands when the file is sourced.
pub fn render_env_file(snapshot: &BTreeMap<String, String>) -> Result<String, EngineError> {
    let mut rendered = String::new();
    for (key, value) in snapshot {
        if !is_valid_key(key) {
            return Err(EngineError::Precondition(format!(
                "Invalid environment variable name: {:?}",
                key
            )));
        }
        rendered.push_str(key);
        rendered.push_str("=\"");
        rendered.push_str(&escape_value(value));
        rendered.push_str("\"\n");
    }
    Ok(rendered)
}

/// Command writing `contents` to `<project_path>/.env` through a quoted heredoc
pub fn write_env_command(project_path: &str, contents: &str) -> String {
    format!(
        "cat > {} << '{marker}'\n{}{marker}",
        shell_quote(&format!("{}/.env", project_path)),
        contents,
        marker = ENV_HEREDOC_MARKER
    )
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '$' => escaped.push_str("\\$"),
            '`' => escaped.push_str("\\`"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_renders_sorted_lines() {
        let rendered = render_env_file(&snapshot(&[("DB_HOST", "db"), ("APP_ENV", "production")])).unwrap();
        assert_eq!(rendered, "APP_ENV=\"production\"\nDB_HOST=\"db\"\n");
    }

    #[test]
    fn test_escapes_metacharacters() {
        let rendered = render_env_file(&snapshot(&[("SECRET", "a\"b$c`d\\e\nf")])).unwrap();
        assert_eq!(rendered, "SECRET=\"a\\\"b\\$c\\`d\\\\e\\nf\"\n");
        assert_eq!(rendered.lines().count(), 1);
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(render_env_file(&snapshot(&[("1ABC", "x")])).is_err());
        assert!(render_env_file(&snapshot(&[("A B", "x")])).is_err());
        assert!(render_env_file(&snapshot(&[("A;rm -rf /", "x")])).is_err());
        assert!(render_env_file(&snapshot(&[("_OK_1", "x")])).is_ok());
    }

    #[test]
    fn test_write_command_uses_quoted_heredoc() {
        let command = write_env_command("/var/www/shop", "A=\"1\"\n");
        assert_eq!(
            command,
            "cat > '/var/www/shop/.env' << 'DEVFLOW_ENV_EOF'\nA=\"1\"\nDEVFLOW_ENV_EOF"
        );
    }
}
