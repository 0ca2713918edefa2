// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! CRYPTO stream offsets.
//!
//! Each encryption level carries its own ordered byte stream of handshake
//! records. Delivery is strictly in order: a record below the receive
//! offset is a repeat, a record past it is a gap the caller must buffer.

/// Send and receive offsets for one level's CRYPTO stream
#[derive(Clone, Copy, Debug, Default)]
pub struct CryptoStream {
    send_offset: u64,
    recv_offset: u64,
}

/// Where an incoming frame's offset lands relative to the stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The next expected bytes
    Expected,
    /// Already consumed; must not mutate state
    Repeat,
    /// Beyond the expected next byte; the caller buffers and retries
    Gap,
}

impl CryptoStream {
    #[inline]
    pub fn send_offset(&self) -> u64 {
        self.send_offset
    }

    #[inline]
    pub fn recv_offset(&self) -> u64 {
        self.recv_offset
    }

    #[inline]
    pub fn check_recv(&self, offset: u64) -> ReceiveOutcome {
        use core::cmp::Ordering::*;
        match offset.cmp(&self.recv_offset) {
            Less => ReceiveOutcome::Repeat,
            Equal => ReceiveOutcome::Expected,
            Greater => ReceiveOutcome::Gap,
        }
    }

    #[inline]
    pub fn advance_recv(&mut self, len: usize) {
        self.recv_offset += len as u64;
    }

    #[inline]
    pub fn advance_send(&mut self, len: usize) {
        self.send_offset += len as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_test() {
        let mut stream = CryptoStream::default();
        assert_eq!(stream.check_recv(0), ReceiveOutcome::Expected);
        assert_eq!(stream.check_recv(1), ReceiveOutcome::Gap);

        stream.advance_recv(10);
        assert_eq!(stream.check_recv(0), ReceiveOutcome::Repeat);
        assert_eq!(stream.check_recv(9), ReceiveOutcome::Repeat);
        assert_eq!(stream.check_recv(10), ReceiveOutcome::Expected);
        assert_eq!(stream.check_recv(11), ReceiveOutcome::Gap);
    }
}
