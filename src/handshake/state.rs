use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing sent yet
    Init,

    /// Sent C0+C1, waiting for S0+S1
    C0C1Sent,

    /// Received a valid S0+S1
    S0S1Received,

    /// Sent C2, waiting for S2
    C2Sent,

    /// S2 echoed C1, handshake complete
    Handshaked,

    /// Error occurred
    Failed,
}

impl HandshakeState {
    /// Initial state
    pub fn new() -> Self {
        HandshakeState::Init
    }

    /// Check if handshake is complete
    pub fn is_done(&self) -> bool {
        *self == HandshakeState::Handshaked
    }

    /// Check if handshake failed
    pub fn is_failed(&self) -> bool {
        *self == HandshakeState::Failed
    }

    /// Transition to next state
    pub fn transition(&mut self, event: HandshakeEvent) -> Result<()> {
        let next = match (*self, event) {
            (HandshakeState::Init, HandshakeEvent::SentC0C1) => HandshakeState::C0C1Sent,
            (HandshakeState::C0C1Sent, HandshakeEvent::ReceivedS0S1) => HandshakeState::S0S1Received,
            (HandshakeState::S0S1Received, HandshakeEvent::SentC2) => HandshakeState::C2Sent,
            (HandshakeState::C2Sent, HandshakeEvent::ReceivedS2) => HandshakeState::Handshaked,
            (_, HandshakeEvent::Error) => {
                *self = HandshakeState::Failed;
                return Err(Error::handshake("Handshake failed"));
            }
            _ => {
                return Err(Error::handshake(format!(
                    "Invalid transition from {:?} with event {:?}",
                    self, event
                )));
            }
        };
        *self = next;
        Ok(())
    }
}

impl Default for HandshakeState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeEvent {
    SentC0C1,
    ReceivedS0S1,
    SentC2,
    ReceivedS2,
    Error,
}
