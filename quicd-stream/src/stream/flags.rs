//! Stream shutdown and reset flags.

#![forbid(unsafe_code)]

use bitflags::bitflags;

bitflags! {
    /// Per-stream shutdown/reset flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StreamFlags: u32 {
        /// Further reception of stream data is not allowed.
        const SHUT_RD = 0x01;
        /// Further transmission of stream data is not allowed.
        const SHUT_WR = 0x02;
        /// RESET_STREAM was sent. Implies `SHUT_WR`.
        const SENT_RESET = 0x04;
        /// RESET_STREAM was received. Implies `SHUT_RD`.
        const RECV_RESET = 0x08;
        /// STOP_SENDING was sent.
        const STOP_SENDING = 0x10;
        /// The peer acknowledged our RESET_STREAM.
        const RESET_ACKED = 0x20;
    }
}

impl StreamFlags {
    pub const NONE: Self = Self::empty();
    pub const SHUT_RDWR: Self = Self::SHUT_RD.union(Self::SHUT_WR);

    /// Add the shutdown bits implied by reset bits.
    pub const fn with_implied(self) -> Self {
        let mut flags = self;
        if self.contains(Self::SENT_RESET) {
            flags = flags.union(Self::SHUT_WR);
        }
        if self.contains(Self::RECV_RESET) {
            flags = flags.union(Self::SHUT_RD);
        }
        flags
    }
}
