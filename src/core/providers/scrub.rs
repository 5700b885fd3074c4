use std::borrow::Cow;

const MAX_API_ERROR_CHARS: usize = 200;

const PREFIX_PATTERNS: [&str; 3] = ["sk-or-", "sk-", "AIza"];

const MARKER_PATTERNS: [&str; 5] = [
    "Authorization: Bearer ",
    "authorization: bearer ",
    "\"authorization\":\"Bearer ",
    "api_key=",
    "\"api_key\":\"",
];

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '+' | '/' | '=')
}

fn token_end(input: &str, from: usize) -> usize {
    input[from..]
        .char_indices()
        .find(|(_, c)| !is_secret_char(*c))
        .map_or(input.len(), |(i, _)| from + i)
}

fn scrub_after_marker(scrubbed: &mut String, marker: &str) {
    let mut search_from = 0;
    while let Some(rel) = scrubbed[search_from..].find(marker) {
        let start = search_from + rel;
        let content_start = start + marker.len();
        let end = token_end(scrubbed, content_start);

        // Bare marker without a token value.
        if end == content_start {
            search_from = content_start;
            continue;
        }

        scrubbed.replace_range(start..end, "[REDACTED]");
        search_from = start + "[REDACTED]".len();
    }
}

/// Redact API keys and bearer tokens from provider error text.
pub fn scrub_secret_patterns(input: &str) -> Cow<'_, str> {
    let needs = PREFIX_PATTERNS
        .iter()
        .chain(MARKER_PATTERNS.iter())
        .any(|p| input.contains(p));
    if !needs {
        return Cow::Borrowed(input);
    }

    let mut scrubbed = input.to_string();
    for pattern in PREFIX_PATTERNS.iter().chain(MARKER_PATTERNS.iter()) {
        scrub_after_marker(&mut scrubbed, pattern);
    }
    Cow::Owned(scrubbed)
}

/// Scrub secrets and truncate.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);
    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed.into_owned();
    }

    let scrubbed = scrubbed.as_ref();
    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized error from a failed HTTP response. The status code
/// stays in the message so retry classification can read it.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    anyhow::anyhow!("{provider} API error ({status}): {}", sanitize_api_error(&body))
}
