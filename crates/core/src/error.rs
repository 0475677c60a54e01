//! Error types for board setup and sequencer hand-off.
//!
//! Nothing in the running system is recoverable: once the board is laid out
//! and the sequencer is armed, bad timing shows up only as wrong cartridge
//! selection on the console. These errors cover the points before that.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("pin {pin} is outside the {bank}-pin GPIO bank")]
    PinOutOfRange { pin: u8, bank: u8 },

    #[error("{group} pins overlap with {other} pins at GPIO {pin}")]
    Overlap {
        group: &'static str,
        other: &'static str,
        pin: u8,
    },

    #[error("at least one cartridge button and a trigger button are required, got {0} buttons")]
    TooFewButtons(u8),

    #[error("no cartridge select lines configured")]
    NoCartridges,

    #[error("{buttons} cartridge buttons but only {carts} select lines")]
    ButtonsExceedCartridges { buttons: u8, carts: u8 },
}

#[derive(Error, Debug)]
pub enum ArmError {
    /// The write-once armed flag was already set. Ownership of the select
    /// lines has been handed off and cannot be taken back.
    #[error("sequencer already armed")]
    AlreadyArmed,

    #[error("sequencer hand-off channel closed before the clock period was delivered")]
    HandoffClosed,

    #[error("failed to start sequencer thread: {0}")]
    Spawn(#[from] std::io::Error),
}
