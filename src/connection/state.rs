/// Lifecycle of one publishing connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not initialized
    Uninitialized,

    /// Performing handshake
    Handshaking,

    /// Handshake complete, running the command exchange
    Negotiating,

    /// Publishing stream; media may be sent
    Running,

    /// Connection closing
    Closing,

    /// Connection closed
    Closed,

    /// Fatal error, terminal
    Failed,
}

impl ConnectionState {
    /// Check if connected
    pub fn is_connected(&self) -> bool {
        matches!(self,
            ConnectionState::Negotiating |
            ConnectionState::Running)
    }

    /// Check if media can be sent
    pub fn can_publish(&self) -> bool {
        *self == ConnectionState::Running
    }

    /// Closed or failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }

    /// Validate transition
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        match (*self, next) {
            (ConnectionState::Uninitialized, ConnectionState::Handshaking) => true,
            (ConnectionState::Handshaking, ConnectionState::Negotiating) => true,
            (ConnectionState::Negotiating, ConnectionState::Running) => true,
            (ConnectionState::Closed, _) | (ConnectionState::Failed, _) => false,
            (_, ConnectionState::Closing) => true,
            (_, ConnectionState::Failed) => true,
            (ConnectionState::Closing, ConnectionState::Closed) => true,
            _ => false,
        }
    }
}
