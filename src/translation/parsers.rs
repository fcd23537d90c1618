/// Longest fragment reported in an escape syntax error.
const MAX_FRAGMENT_CHARS: usize = 32;

/// A recognized escape keyword following an open brace.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct EscapeMatch {
    /// Native text replacing the keyword, `None` when the keyword is elided.
    pub(super) replacement: Option<&'static str>,
    /// Byte index just past the keyword.
    pub(super) end: usize,
}

const KEYWORDS: &[(&str, Option<&str>)] = &[
    ("call", Some("CALL")),
    ("escape", None),
    ("fn", None),
    ("oj", None),
    ("ts", Some("TIMESTAMP")),
    ("t", Some("TIME")),
    ("d", Some("DATE")),
];

pub(super) fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while bytes.get(idx).is_some_and(|b| *b == b' ') {
        idx += 1;
    }
    idx
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Case-insensitive keyword match that must end on a non-identifier byte.
fn matches_keyword(bytes: &[u8], idx: usize, keyword: &str) -> Option<usize> {
    let end = idx + keyword.len();
    let candidate = bytes.get(idx..end)?;
    if !candidate.eq_ignore_ascii_case(keyword.as_bytes()) {
        return None;
    }
    match bytes.get(end) {
        Some(b) if is_identifier_byte(*b) => None,
        _ => Some(end),
    }
}

/// `?= call` and `? = call`: the return-value form of a procedure call.
fn match_return_call(bytes: &[u8], idx: usize) -> Option<usize> {
    if bytes.get(idx) != Some(&b'?') {
        return None;
    }
    let eq = skip_spaces(bytes, idx + 1);
    if bytes.get(eq) != Some(&b'=') {
        return None;
    }
    let call = skip_spaces(bytes, eq + 1);
    matches_keyword(bytes, call, "call")
}

/// Match the keyword of an escape whose open brace sits just before `start`.
pub(super) fn match_escape_keyword(bytes: &[u8], start: usize) -> Option<EscapeMatch> {
    let idx = skip_spaces(bytes, start);
    if let Some(end) = match_return_call(bytes, idx) {
        return Some(EscapeMatch {
            replacement: Some("CALL"),
            end,
        });
    }
    KEYWORDS.iter().find_map(|(keyword, replacement)| {
        matches_keyword(bytes, idx, keyword).map(|end| EscapeMatch {
            replacement: *replacement,
            end,
        })
    })
}

/// Text reported for a bad escape: from the brace through the next `}`, capped in length.
pub(super) fn error_fragment(sql: &str, start: usize) -> String {
    let tail = &sql[start..];
    let through_close = tail.find('}').map_or(tail, |close| &tail[..=close]);
    through_close.chars().take(MAX_FRAGMENT_CHARS).collect()
}
