use std::fmt;

/// Lifecycle of one client/host channel.
///
/// `Uninitialized -> Ready` happens once, through `initialize`. Any state can
/// move to `Closed`, which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Ready,
    Closed,
}

impl SessionState {
    pub fn is_ready(self) -> bool {
        self == SessionState::Ready
    }

    pub fn is_closed(self) -> bool {
        self == SessionState::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Ready => "ready",
            SessionState::Closed => "closed",
        })
    }
}
