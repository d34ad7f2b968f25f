mod state;
mod c0c1;
mod s0s1s2;

pub use state::*;
pub use c0c1::*;
pub use s0s1s2::*;

use crate::{Error, Result};

/// Client side of the simple handshake, free of any I/O.
///
/// The caller writes what `start` and `on_s0s1` return and feeds back the
/// exact byte counts it reads. Any failure leaves the state at `Failed`.
pub struct ClientHandshake {
    state: HandshakeState,
    c0c1: C0C1,
}

impl ClientHandshake {
    pub fn new(epoch: u32) -> Self {
        ClientHandshake {
            state: HandshakeState::new(),
            c0c1: C0C1::create_client(epoch),
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn c0c1(&self) -> &C0C1 {
        &self.c0c1
    }

    /// Produce C0+C1
    pub fn start(&mut self) -> Result<Vec<u8>> {
        let bytes = self.c0c1.encode()?;
        self.state.transition(HandshakeEvent::SentC0C1)?;
        Ok(bytes)
    }

    /// Consume S0+S1 and produce C2
    pub fn on_s0s1(&mut self, data: &[u8], receipt_time: u32) -> Result<Vec<u8>> {
        if self.state != HandshakeState::C0C1Sent {
            return Err(Error::handshake(format!("Unexpected S0+S1 in state {:?}", self.state)));
        }
        let s0s1 = self.fail_on_error(S0S1::parse(data))?;
        self.state.transition(HandshakeEvent::ReceivedS0S1)?;

        let c2 = s0s1.create_c2(receipt_time)?;
        self.state.transition(HandshakeEvent::SentC2)?;
        Ok(c2)
    }

    /// Consume S2
    pub fn on_s2(&mut self, data: &[u8]) -> Result<()> {
        if self.state != HandshakeState::C2Sent {
            return Err(Error::handshake(format!("Unexpected S2 in state {:?}", self.state)));
        }
        let checked = validate_s2(data, &self.c0c1);
        self.fail_on_error(checked)?;
        self.state.transition(HandshakeEvent::ReceivedS2)
    }

    fn fail_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            // The Error event only records the failure
            let _ = self.state.transition(HandshakeEvent::Error);
        }
        result
    }
}
