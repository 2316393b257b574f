pub mod engine;
pub mod patch;
pub mod session;

use serde::Serialize;
use thiserror::Error;

use crate::codec::block::BlockError;

// Well-known link bytes (Gen I Cable Club).
pub const BLANK: u8 = 0x00;
pub const MASTER: u8 = 0x01;
pub const SLAVE: u8 = 0x02;
pub const CONNECTED: u8 = 0x60;
pub const TRADE_REJECT: u8 = 0x61;
pub const TRADE_ACCEPT: u8 = 0x62;
pub const TABLE_LEAVE: u8 = 0x6F;
pub const SEL_MON_BASE: u8 = 0x60;
pub const MENU_TRADE_CENTRE_HIGHLIGHTED: u8 = 0xD0;
pub const MENU_COLOSSEUM_HIGHLIGHTED: u8 = 0xD1;
pub const MENU_CANCEL_HIGHLIGHTED: u8 = 0xD2;
pub const MENU_TRADE_CENTRE_SELECTED: u8 = 0xD4;
pub const MENU_CANCEL_SELECTED: u8 = 0xD6;
pub const PREAMBLE: u8 = 0xFD;
pub const PATCH_TERMINATOR: u8 = 0xFF;
pub const NO_DATA: u8 = 0xFE;

/// Preamble bytes before the random-number exchange, and the number of
/// random bytes themselves.
pub const RNS_LENGTH: usize = 10;
/// Preamble bytes between the random numbers and the trade block.
pub const TRADE_BLOCK_PREAMBLE_LENGTH: usize = 9;
/// Preamble bytes before the patch-list blob.
pub const PATCH_PREAMBLE_LENGTH: usize = 3;
/// Fixed length of the patch-list blob each side transmits.
pub const PATCH_BLOB_LENGTH: usize = 197;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Idle,
    Negotiating,
    Menu,
    Ready,
    PreambleIn,
    Randoms,
    BlockSwap,
    PatchSwap,
    Select,
    Confirm,
    Commit,
    Abort,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Negotiating => "NEGOTIATING",
            Self::Menu => "MENU",
            Self::Ready => "READY",
            Self::PreambleIn => "PREAMBLE_IN",
            Self::Randoms => "RANDOMS",
            Self::BlockSwap => "BLOCK_SWAP",
            Self::PatchSwap => "PATCH_SWAP",
            Self::Select => "SELECT",
            Self::Confirm => "CONFIRM",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a trade attempt ended short of COMMIT.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum AbortCause {
    #[error("unexpected byte during preamble")]
    UnexpectedInPreamble,
    #[error("trade block invalid: {0}")]
    BlockInvalid(#[from] BlockError),
    #[error("peer cancelled the trade")]
    PeerCancelled,
    #[error("storage full")]
    StorageFull,
    #[error("watchdog reset")]
    WatchdogReset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display_matches_as_str() {
        assert_eq!(Phase::BlockSwap.to_string(), "BLOCK_SWAP");
        assert_eq!(Phase::Idle.to_string(), "IDLE");
    }

    #[test]
    fn test_selection_byte_mask() {
        // SELECT bytes carry the party index in the low nibble.
        for index in 0u8..6 {
            assert_eq!((SEL_MON_BASE | index) & 0x0F, index);
        }
    }

    #[test]
    fn test_abort_cause_from_block_error() {
        let cause: AbortCause = BlockError::PartyCountOutOfRange(9).into();
        assert_eq!(cause, AbortCause::BlockInvalid(BlockError::PartyCountOutOfRange(9)));
    }
}
