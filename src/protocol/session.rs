use crate::codec::block::{TradeBlock, BLOCK_WIRE_SIZE};
use crate::types::SessionSnapshot;

use super::{AbortCause, Phase, PATCH_BLOB_LENGTH};

/// Identity stamped on the outgoing trade block.
#[derive(Debug, Clone)]
pub struct TrainerIdentity {
    pub id: u16,
    pub name: String,
}

/// All mutable state for one trade attempt, owned exclusively by the engine.
/// Returning to IDLE clears the per-trade fields but keeps the trainer
/// identity and the lifetime error counter.
#[derive(Debug)]
pub struct Session {
    pub phase: Phase,
    /// Byte counter within the current sub-phase (preamble, randoms, patch).
    pub counter: usize,
    /// Next byte index for the block swap; RX and TX share it.
    pub block_index: usize,
    pub incoming_wire: [u8; BLOCK_WIRE_SIZE],
    pub incoming_patch: [u8; PATCH_BLOB_LENGTH],
    /// Parsed, patch-applied partner block, set once the patch swap is done.
    pub incoming_block: Option<TradeBlock>,
    pub outgoing_block: Option<TradeBlock>,
    pub outgoing_wire: [u8; BLOCK_WIRE_SIZE],
    pub outgoing_patch: [u8; PATCH_BLOB_LENGTH],
    pub outgoing_sent: bool,
    /// Party index the partner picked for their side of the trade.
    pub partner_index: usize,
    pub started_at_ms: i64,
    pub trainer: TrainerIdentity,
    pub error_count: u64,
    pub last_error: Option<AbortCause>,
}

impl Session {
    pub fn new(trainer: TrainerIdentity) -> Self {
        Self {
            phase: Phase::Idle,
            counter: 0,
            block_index: 0,
            incoming_wire: [0; BLOCK_WIRE_SIZE],
            incoming_patch: [0; PATCH_BLOB_LENGTH],
            incoming_block: None,
            outgoing_block: None,
            outgoing_wire: [0; BLOCK_WIRE_SIZE],
            outgoing_patch: [0; PATCH_BLOB_LENGTH],
            outgoing_sent: false,
            partner_index: 0,
            started_at_ms: 0,
            trainer,
            error_count: 0,
            last_error: None,
        }
    }

    /// Reset everything tied to the current trade attempt.
    pub fn clear_trade(&mut self) {
        self.phase = Phase::Idle;
        self.counter = 0;
        self.block_index = 0;
        self.incoming_wire = [0; BLOCK_WIRE_SIZE];
        self.incoming_patch = [0; PATCH_BLOB_LENGTH];
        self.incoming_block = None;
        self.outgoing_block = None;
        self.outgoing_wire = [0; BLOCK_WIRE_SIZE];
        self.outgoing_patch = [0; PATCH_BLOB_LENGTH];
        self.outgoing_sent = false;
        self.partner_index = 0;
        self.started_at_ms = 0;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            counter: self.counter,
            block_index: self.block_index,
            partner_index: self.partner_index,
            incoming_block_ready: self.incoming_block.is_some(),
            outgoing_ready: self.outgoing_block.is_some(),
            outgoing_sent: self.outgoing_sent,
            started_at_ms: self.started_at_ms,
            error_count: self.error_count,
            last_error: self.last_error.as_ref().map(ToString::to_string),
            trainer_id: self.trainer.id,
            trainer_name: self.trainer.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(TrainerIdentity { id: 7, name: "RED".into() })
    }

    #[test]
    fn test_clear_trade_preserves_identity_and_errors() {
        let mut s = session();
        s.phase = Phase::BlockSwap;
        s.block_index = 200;
        s.error_count = 3;
        s.last_error = Some(AbortCause::PeerCancelled);
        s.clear_trade();
        assert_eq!(s.phase, Phase::Idle);
        assert_eq!(s.block_index, 0);
        assert_eq!(s.error_count, 3);
        assert_eq!(s.last_error, Some(AbortCause::PeerCancelled));
        assert_eq!(s.trainer.name, "RED");
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut s = session();
        s.phase = Phase::Select;
        s.partner_index = 2;
        let snap = s.snapshot();
        assert_eq!(snap.phase, Phase::Select);
        assert_eq!(snap.partner_index, 2);
        assert_eq!(snap.trainer_id, 7);
        assert!(!snap.incoming_block_ready);
        assert!(!snap.outgoing_sent);
    }
}
