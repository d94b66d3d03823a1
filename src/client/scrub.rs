use std::borrow::Cow;

const MAX_ERROR_BODY_CHARS: usize = 200;
const REDACTED: &str = "[REDACTED]";
const REDACTED_PEM: &str = "[REDACTED-PEM]";

/// Token prefixes of common provider keys. The text after the prefix is
/// redacted up to the first character that cannot belong to a key.
const KEY_PREFIXES: [&str; 12] = [
    "sk-", "sk_", "ghp_", "github_pat_", "hf_", "glpat-", "xoxb-", "xoxp-", "AIza", "AKIA",
    "ya29.", "eyJ",
];

/// Assignment and header markers whose value is redacted.
const VALUE_MARKERS: [&str; 12] = [
    "Authorization: Bearer ",
    "authorization: bearer ",
    "\"authorization\":\"Bearer ",
    "api_key=",
    "API_KEY=",
    "access_token=",
    "\"api_key\":\"",
    "\"access_token\":\"",
    "\"token\":\"",
    "\"secret\":\"",
    "password=",
    "secret=",
];

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '+' | '/' | '=')
}

fn key_end(input: &str, from: usize) -> usize {
    input[from..]
        .char_indices()
        .find(|&(_, c)| !is_key_char(c))
        .map_or(input.len(), |(offset, _)| from + offset)
}

fn redact_after(text: &mut String, marker: &str, keep_marker: bool) {
    let mut search_from = 0;
    while let Some(found) = text[search_from..].find(marker) {
        let start = search_from + found;
        let value_start = start + marker.len();
        let end = key_end(text, value_start);
        if end == value_start {
            search_from = value_start;
            continue;
        }
        let replace_from = if keep_marker { value_start } else { start };
        text.replace_range(replace_from..end, REDACTED);
        search_from = replace_from + REDACTED.len();
    }
}

fn redact_pem_blocks(text: &mut String) {
    const BEGIN: &str = "-----BEGIN ";
    let mut search_from = 0;
    while let Some(found) = text[search_from..].find(BEGIN) {
        let begin = search_from + found;
        let kind_start = begin + BEGIN.len();
        let Some(kind_len) = text[kind_start..].find("-----") else {
            break;
        };
        let end_marker = format!("-----END {}-----", &text[kind_start..kind_start + kind_len]);
        let Some(end_found) = text[kind_start..].find(&end_marker) else {
            search_from = kind_start;
            continue;
        };
        let end = kind_start + end_found + end_marker.len();
        text.replace_range(begin..end, REDACTED_PEM);
        search_from = begin + REDACTED_PEM.len();
    }
}

/// Redacts API keys, bearer tokens and PEM blocks from backend error text.
///
/// Environment text pushed to the backend is full of provider keys, and
/// backends happily echo them back in error bodies.
pub fn scrub_secret_patterns(input: &str) -> Cow<'_, str> {
    let suspicious = KEY_PREFIXES
        .iter()
        .chain(VALUE_MARKERS.iter())
        .chain(std::iter::once(&"-----BEGIN "))
        .any(|pattern| input.contains(pattern));
    if !suspicious {
        return Cow::Borrowed(input);
    }

    let mut scrubbed = input.to_string();
    redact_pem_blocks(&mut scrubbed);
    for marker in VALUE_MARKERS {
        redact_after(&mut scrubbed, marker, true);
    }
    for prefix in KEY_PREFIXES {
        redact_after(&mut scrubbed, prefix, false);
    }
    Cow::Owned(scrubbed)
}

/// Scrubs secrets and truncates to a length fit for a one-line notification.
pub fn sanitize_error_body(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input.trim());
    match scrubbed.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        None => scrubbed.into_owned(),
        Some((cut, _)) => format!("{}...", &scrubbed[..cut]),
    }
}
