use serde::Serialize;

use crate::codec::block::TradeBlock;
use crate::protocol::{AbortCause, Phase};
use crate::storage::StoredPokemon;

/// Structured events emitted by the protocol engine. Subscribers must be
/// non-blocking; dropped events are tolerated.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TradeEvent {
    StateChange {
        from: Phase,
        to: Phase,
    },
    ByteExchanged {
        rx: u8,
        tx: u8,
        phase: Phase,
        index: usize,
    },
    BlockReceived {
        block: Box<TradeBlock>,
    },
    Committed {
        received: StoredPokemon,
        sent: StoredPokemon,
        slot: usize,
        ts: i64,
    },
    Aborted {
        cause: AbortCause,
        ts: i64,
    },
}

/// Point-in-time view of the engine for the control surface.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub counter: usize,
    pub block_index: usize,
    pub partner_index: usize,
    pub incoming_block_ready: bool,
    pub outgoing_ready: bool,
    pub outgoing_sent: bool,
    pub started_at_ms: i64,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub trainer_id: u16,
    pub trainer_name: String,
}
