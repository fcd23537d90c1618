use std::borrow::Cow;

mod parsers;
mod scanner;

use parsers::{error_fragment, match_escape_keyword};
use scanner::State;

use crate::error::EscapeSyntaxError;

/// How to resolve escape processing for a prepare call relative to the session default.
///
/// # Examples
/// ```rust
/// use sql_driver_core::prelude::*;
///
/// let options = PrepareOptions::default().with_escape(EscapeMode::ForceOff);
/// # let _ = options;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeMode {
    /// Follow the session's `escape_processing` setting.
    SessionDefault,
    /// Translate escapes regardless of the session setting.
    ForceOn,
    /// Send the SQL untouched regardless of the session setting.
    ForceOff,
}

impl EscapeMode {
    #[must_use]
    pub fn resolve(self, session_default: bool) -> bool {
        match self {
            EscapeMode::SessionDefault => session_default,
            EscapeMode::ForceOn => true,
            EscapeMode::ForceOff => false,
        }
    }
}

/// Per-call options for prepare paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareOptions {
    pub escape: EscapeMode,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            escape: EscapeMode::SessionDefault,
        }
    }
}

impl PrepareOptions {
    #[must_use]
    pub fn with_escape(mut self, escape: EscapeMode) -> Self {
        self.escape = escape;
        self
    }
}

/// Translate vendor-neutral `{...}` escapes into native SQL.
///
/// Recognized escapes are `{call ...}`, `{?= call ...}`, `{fn ...}`, `{oj ...}`, `{d '...'}`,
/// `{t '...'}`, `{ts '...'}` and `{escape '...'}`. Each brace becomes a single space, call forms
/// become `CALL`, date/time literals gain their `DATE`/`TIME`/`TIMESTAMP` keyword and the other
/// markers are dropped. Escapes may nest; braces inside quoted literals are left alone.
///
/// ```rust
/// use sql_driver_core::translation::translate_escapes;
///
/// let sql = translate_escapes("select * from t where d > {d '2020-01-02'}").unwrap();
/// assert!(sql.contains("DATE '2020-01-02'"));
/// ```
///
/// Returns a borrowed `Cow` when the SQL holds no open brace.
///
/// # Errors
/// Returns [`EscapeSyntaxError`] for an open brace that starts no recognized escape, or for an
/// escape still open at the end of the input.
pub fn translate_escapes(sql: &str) -> Result<Cow<'_, str>, EscapeSyntaxError> {
    if !sql.contains('{') {
        return Ok(Cow::Borrowed(sql));
    }

    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len() + 16);
    let mut state = State::Outside;
    // Byte offsets of the currently open braces, innermost last.
    let mut open: Vec<usize> = Vec::new();
    // Start of the span not yet copied to `out`.
    let mut copied = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        if let Some(next) = state.after_quote(b) {
            state = next;
        } else if state.sees_braces() && b == b'{' {
            let Some(found) = match_escape_keyword(bytes, idx + 1) else {
                return Err(EscapeSyntaxError {
                    fragment: error_fragment(sql, idx),
                    position: idx,
                });
            };
            out.push_str(&sql[copied..idx]);
            out.push(' ');
            if let Some(replacement) = found.replacement {
                out.push_str(replacement);
                if bytes.get(found.end).is_some_and(|b| !b.is_ascii_whitespace()) {
                    out.push(' ');
                }
            }
            open.push(idx);
            state = State::InsideEscape;
            copied = found.end;
            idx = found.end;
            continue;
        } else if state == State::InsideEscape && b == b'}' {
            out.push_str(&sql[copied..idx]);
            out.push(' ');
            copied = idx + 1;
            open.pop();
            if open.is_empty() {
                state = State::Outside;
            }
        }
        idx += 1;
    }

    if let Some(&position) = open.last() {
        return Err(EscapeSyntaxError {
            fragment: error_fragment(sql, position),
            position,
        });
    }

    out.push_str(&sql[copied..]);
    Ok(Cow::Owned(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_without_braces() {
        let sql = "select * from t where a = ? and b = '}'";
        let res = translate_escapes(sql).unwrap();
        assert!(matches!(res, Cow::Borrowed(_)));
        assert_eq!(res, sql);
    }

    #[test]
    fn elides_function_marker() {
        let res = translate_escapes("{fn ABS(?)}").unwrap();
        assert_eq!(res, "  ABS(?) ");
    }

    #[test]
    fn call_forms_become_call() {
        assert_eq!(translate_escapes("{call p(?)}").unwrap(), " CALL p(?) ");
        assert_eq!(translate_escapes("{?= call f(?)}").unwrap(), " CALL f(?) ");
        assert_eq!(translate_escapes("{ ? = CALL f}").unwrap(), " CALL f ");
    }

    #[test]
    fn temporal_literals_gain_keywords() {
        assert_eq!(
            translate_escapes("{d '2020-01-02'}").unwrap(),
            " DATE '2020-01-02' "
        );
        assert_eq!(
            translate_escapes("select {d'2020-01-02'}").unwrap(),
            "select  DATE '2020-01-02' "
        );
        assert_eq!(
            translate_escapes("{ts'2020-01-02 03:04:05'}").unwrap(),
            " TIMESTAMP '2020-01-02 03:04:05' "
        );
        assert_eq!(translate_escapes("{t '10:11:12'}").unwrap(), " TIME '10:11:12' ");
        assert_eq!(
            translate_escapes("{TS '2020-01-02 10:11:12'}").unwrap(),
            " TIMESTAMP '2020-01-02 10:11:12' "
        );
    }

    #[test]
    fn braces_in_literals_are_ignored() {
        let sql = "select '{fn x}', \"{weird}\" from t";
        assert_eq!(translate_escapes(sql).unwrap(), sql);
    }

    #[test]
    fn quotes_inside_escape_do_not_leak() {
        let res = translate_escapes("select {fn concat('}', ?)} from t where a = '{'").unwrap();
        assert_eq!(res, "select   concat('}', ?)  from t where a = '{'");
    }

    #[test]
    fn nested_escapes() {
        let res = translate_escapes("{call p({fn f(?)})}").unwrap();
        assert!(!res.contains('{'));
        assert!(!res.contains('}'));
        assert!(res.contains("CALL p("));
        assert!(res.contains(" f(?)"));
    }

    #[test]
    fn unclosed_nested_escape_fails() {
        let err = translate_escapes("{call p({fn f(?)})").unwrap_err();
        assert_eq!(err.position, 0);
    }

    #[test]
    fn unknown_escape_reports_fragment() {
        let err = translate_escapes("select {limit 10} from t").unwrap_err();
        assert_eq!(err.position, 7);
        assert_eq!(err.fragment, "{limit 10}");
    }

    #[test]
    fn keeps_multibyte_text() {
        let res = translate_escapes("select 'é', {fn lower('Ü')}").unwrap();
        assert_eq!(res, "select 'é',   lower('Ü') ");
    }

    #[test]
    fn escape_mode_resolution() {
        assert!(EscapeMode::ForceOn.resolve(false));
        assert!(!EscapeMode::ForceOff.resolve(true));
        assert!(EscapeMode::SessionDefault.resolve(true));
        assert!(!EscapeMode::SessionDefault.resolve(false));
    }
}
