//! `KEY=VALUE` text handling for the environment-update contract.

use std::collections::BTreeMap;

/// Parses one variable per line.
///
/// Lines without `=` or with a blank key are dropped; keys and values are
/// trimmed, and only the first `=` separates them. A later duplicate key wins.
pub fn parse_env_vars(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .filter_map(|(key, value)| {
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Variable names in `text`, for logs and notifications that must not leak values.
pub fn variable_names(text: &str) -> Vec<String> {
    parse_env_vars(text).into_keys().collect()
}
