/// Scanner position relative to quotes and open escapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum State {
    Outside,
    SingleQuoted,
    DoubleQuoted,
    InsideEscape,
    InsideEscapeSingleQuoted,
    InsideEscapeDoubleQuoted,
}

impl State {
    /// State after reading a quote byte, or `None` if `b` does not toggle quoting here.
    ///
    /// Entering and leaving a quote of the same kind are symmetric, and quotes opened inside an
    /// escape return to `InsideEscape` rather than the outer state.
    pub(super) fn after_quote(self, b: u8) -> Option<State> {
        match (self, b) {
            (State::Outside, b'\'') => Some(State::SingleQuoted),
            (State::Outside, b'"') => Some(State::DoubleQuoted),
            (State::SingleQuoted, b'\'') | (State::DoubleQuoted, b'"') => Some(State::Outside),
            (State::InsideEscape, b'\'') => Some(State::InsideEscapeSingleQuoted),
            (State::InsideEscape, b'"') => Some(State::InsideEscapeDoubleQuoted),
            (State::InsideEscapeSingleQuoted, b'\'') | (State::InsideEscapeDoubleQuoted, b'"') => {
                Some(State::InsideEscape)
            }
            _ => None,
        }
    }

    /// Braces are only significant outside quoted literals.
    pub(super) fn sees_braces(self) -> bool {
        matches!(self, State::Outside | State::InsideEscape)
    }
}
