//! The link-cable trade partner itself: a byte-synchronous state machine.
//!
//! The engine is re-entered exclusively through [`TradeEngine::step`]: one
//! byte in from the peer, exactly one byte back, no blocking, no panics.
//! Every response is echo-or-replace; bytes that match no rule in the
//! current phase are echoed and the phase is preserved.

use tracing::{debug, info, warn};

use crate::codec::block::{self, TradeBlock, BLOCK_WIRE_SIZE};
use crate::species::species_name;
use crate::storage::{StoredPokemon, TradeStorage};
use crate::types::{SessionSnapshot, TradeEvent};

use super::patch::{apply_patch_list, build_patch_list};
use super::session::{Session, TrainerIdentity};
use super::{
    AbortCause, Phase, BLANK, CONNECTED, MASTER, MENU_CANCEL_HIGHLIGHTED, MENU_CANCEL_SELECTED,
    MENU_TRADE_CENTRE_HIGHLIGHTED, MENU_TRADE_CENTRE_SELECTED, PATCH_BLOB_LENGTH,
    PATCH_PREAMBLE_LENGTH, PREAMBLE, RNS_LENGTH, SEL_MON_BASE, SLAVE, TABLE_LEAVE, TRADE_ACCEPT,
    TRADE_BLOCK_PREAMBLE_LENGTH, TRADE_REJECT,
};

/// Highest selection byte: `SEL_MON_BASE | 5` for the sixth party slot.
const SEL_MON_MAX: u8 = SEL_MON_BASE | 0x05;

fn is_cancel(byte: u8) -> bool {
    byte == MENU_CANCEL_SELECTED || byte == TABLE_LEAVE
}

pub struct TradeEngine {
    session: Session,
    storage: Box<dyn TradeStorage + Send>,
    events: Vec<TradeEvent>,
}

impl TradeEngine {
    pub fn new(storage: Box<dyn TradeStorage + Send>, trainer: TrainerIdentity) -> Self {
        Self {
            session: Session::new(trainer),
            storage,
            events: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn set_local_trainer(&mut self, id: u16, name: &str) {
        self.session.trainer = TrainerIdentity { id, name: name.to_string() };
    }

    /// Drain the events produced since the last call.
    pub fn take_events(&mut self) -> Vec<TradeEvent> {
        std::mem::take(&mut self.events)
    }

    /// External watchdog reset: back to IDLE immediately. Unlike an
    /// in-protocol abort this emits no `Aborted` event, but a reset that
    /// interrupts a live trade still counts against the error counter.
    pub fn reset(&mut self) {
        let from = self.session.phase;
        if from != Phase::Idle {
            self.session.error_count += 1;
            self.session.last_error = Some(AbortCause::WatchdogReset);
            warn!(phase = %from, "watchdog reset during trade");
        }
        self.session.clear_trade();
        if from != Phase::Idle {
            self.events.push(TradeEvent::StateChange { from, to: Phase::Idle });
        }
    }

    /// Consume one byte from the peer and produce exactly one response byte.
    /// Total over every (phase, byte) pair.
    pub fn step(&mut self, rx: u8) -> u8 {
        let from = self.session.phase;
        let index = match from {
            Phase::BlockSwap => self.session.block_index,
            Phase::PreambleIn | Phase::Randoms | Phase::PatchSwap => self.session.counter,
            _ => 0,
        };
        let tx = match from {
            Phase::Idle => self.step_idle(rx),
            Phase::Negotiating => self.step_negotiating(rx),
            Phase::Menu => self.step_menu(rx),
            Phase::Ready => self.step_ready(rx),
            Phase::PreambleIn => self.step_preamble_in(rx),
            Phase::Randoms => self.step_randoms(rx),
            Phase::BlockSwap => self.step_block_swap(rx),
            Phase::PatchSwap => self.step_patch_swap(rx),
            Phase::Select => self.step_select(rx),
            Phase::Confirm => self.step_confirm(rx),
            Phase::Commit | Phase::Abort => {
                self.session.clear_trade();
                BLANK
            }
        };
        let to = self.session.phase;
        self.events.push(TradeEvent::ByteExchanged { rx, tx, phase: from, index });
        if to != from {
            debug!(from = %from, to = %to, rx, tx, "phase transition");
            if from == Phase::Idle {
                self.session.started_at_ms = chrono::Utc::now().timestamp_millis();
            }
            self.events.push(TradeEvent::StateChange { from, to });
        }
        tx
    }

    fn step_idle(&mut self, rx: u8) -> u8 {
        match rx {
            MASTER => {
                self.session.phase = Phase::Negotiating;
                SLAVE
            }
            CONNECTED => {
                self.session.phase = Phase::Menu;
                CONNECTED
            }
            PREAMBLE => {
                // Recovery path: the peer is already clocking a preamble.
                self.session.phase = Phase::PreambleIn;
                self.session.counter = 1;
                PREAMBLE
            }
            MENU_TRADE_CENTRE_HIGHLIGHTED..=MENU_CANCEL_HIGHLIGHTED => {
                self.session.phase = Phase::Menu;
                rx
            }
            _ => BLANK,
        }
    }

    fn step_negotiating(&mut self, rx: u8) -> u8 {
        match rx {
            CONNECTED => {
                self.session.phase = Phase::Menu;
                rx
            }
            // Peer restarted its handshake.
            MASTER => {
                self.session.clear_trade();
                rx
            }
            _ if is_cancel(rx) => self.abort(AbortCause::PeerCancelled, rx),
            _ => rx,
        }
    }

    fn step_menu(&mut self, rx: u8) -> u8 {
        match rx {
            MENU_TRADE_CENTRE_SELECTED => {
                self.session.phase = Phase::Ready;
                BLANK
            }
            MENU_CANCEL_SELECTED | TABLE_LEAVE => self.abort_to_idle(AbortCause::PeerCancelled, rx),
            _ => rx,
        }
    }

    fn step_ready(&mut self, rx: u8) -> u8 {
        match rx {
            PREAMBLE => {
                self.session.phase = Phase::PreambleIn;
                self.session.counter = 1;
                PREAMBLE
            }
            _ if is_cancel(rx) => self.abort(AbortCause::PeerCancelled, rx),
            _ => rx,
        }
    }

    fn step_preamble_in(&mut self, rx: u8) -> u8 {
        match rx {
            PREAMBLE => {
                self.session.counter += 1;
                if self.session.counter == RNS_LENGTH {
                    self.session.phase = Phase::Randoms;
                    self.session.counter = 0;
                }
                PREAMBLE
            }
            // Cancel wins over the preamble error.
            _ if is_cancel(rx) => self.abort_to_idle(AbortCause::PeerCancelled, rx),
            _ => self.abort_to_idle(AbortCause::UnexpectedInPreamble, rx),
        }
    }

    fn step_randoms(&mut self, rx: u8) -> u8 {
        if is_cancel(rx) {
            return self.abort(AbortCause::PeerCancelled, rx);
        }
        self.session.counter += 1;
        if self.session.counter == RNS_LENGTH + TRADE_BLOCK_PREAMBLE_LENGTH {
            self.prepare_outgoing();
            self.session.incoming_wire = [0; BLOCK_WIRE_SIZE];
            self.session.block_index = 0;
            self.session.phase = Phase::BlockSwap;
        }
        rx
    }

    fn step_block_swap(&mut self, rx: u8) -> u8 {
        let i = self.session.block_index;
        self.session.incoming_wire[i] = rx;
        let tx = self.session.outgoing_wire[i];
        self.session.block_index = i + 1;
        if self.session.block_index == BLOCK_WIRE_SIZE {
            // Provisional check before the patch exchange; the authoritative
            // parse happens once the partner's patch list is applied.
            if let Err(err) = block::parse(&self.session.incoming_wire) {
                self.abort(AbortCause::BlockInvalid(err), tx);
            } else {
                self.session.phase = Phase::PatchSwap;
                self.session.counter = 0;
            }
        }
        tx
    }

    fn step_patch_swap(&mut self, rx: u8) -> u8 {
        let counter = self.session.counter;
        self.session.counter = counter + 1;
        if counter < PATCH_PREAMBLE_LENGTH {
            if is_cancel(rx) {
                return self.abort(AbortCause::PeerCancelled, rx);
            }
            return PREAMBLE;
        }
        let i = counter - PATCH_PREAMBLE_LENGTH;
        self.session.incoming_patch[i] = rx;
        let tx = self.session.outgoing_patch[i];
        if i + 1 == PATCH_BLOB_LENGTH {
            let patch = self.session.incoming_patch;
            apply_patch_list(&mut self.session.incoming_wire, &patch);
            match block::parse(&self.session.incoming_wire) {
                Ok(parsed) => {
                    info!(
                        trainer = %parsed.trainer_name,
                        party = parsed.party_count,
                        "trade block received"
                    );
                    self.events.push(TradeEvent::BlockReceived { block: Box::new(parsed.clone()) });
                    self.session.incoming_block = Some(parsed);
                    self.session.phase = Phase::Select;
                }
                Err(err) => {
                    self.abort(AbortCause::BlockInvalid(err), tx);
                }
            }
        }
        tx
    }

    fn step_select(&mut self, rx: u8) -> u8 {
        match rx {
            TABLE_LEAVE | MENU_CANCEL_SELECTED => self.abort(AbortCause::PeerCancelled, rx),
            // Reselect request: stay at the table.
            TRADE_REJECT => rx,
            SEL_MON_BASE..=SEL_MON_MAX => {
                self.session.partner_index = (rx & 0x0F) as usize;
                self.session.phase = Phase::Confirm;
                // We always offer the first mon of our block.
                SEL_MON_BASE
            }
            _ => rx,
        }
    }

    fn step_confirm(&mut self, rx: u8) -> u8 {
        match rx {
            TRADE_ACCEPT => self.commit(),
            TRADE_REJECT => {
                self.session.phase = Phase::Select;
                rx
            }
            TABLE_LEAVE | MENU_CANCEL_SELECTED => self.abort(AbortCause::PeerCancelled, rx),
            _ => rx,
        }
    }

    /// Build the outgoing wire image and patch list from storage.
    fn prepare_outgoing(&mut self) {
        let mut outgoing = self.storage.take_outgoing();
        outgoing.trainer_name = self.session.trainer.name.clone();
        let mut wire = block::serialize(&outgoing);
        self.session.outgoing_patch = build_patch_list(&mut wire);
        self.session.outgoing_wire = wire;
        self.session.outgoing_block = Some(outgoing);
    }

    /// Persist the partner's Pokémon and finish the trade.
    fn commit(&mut self) -> u8 {
        let Some(incoming) = self.session.incoming_block.take() else {
            // Unreachable through the normal flow; recover instead of trusting it.
            warn!("confirm without a received block, resetting");
            self.session.clear_trade();
            return BLANK;
        };
        let received = pick_partner_mon(&incoming, self.session.partner_index);
        let sent = self
            .session
            .outgoing_block
            .as_ref()
            .map(|b| StoredPokemon {
                core: b.pokemon[0].clone(),
                nickname: b.nicknames[0].clone(),
                ot_name: b.ot_names[0].clone(),
            })
            .unwrap_or_else(|| StoredPokemon {
                core: Default::default(),
                nickname: String::new(),
                ot_name: String::new(),
            });
        match self.storage.store(received.clone(), "LINK_CABLE") {
            Ok(slot) => {
                info!(
                    received = species_name(received.core.species),
                    sent = species_name(sent.core.species),
                    slot,
                    "trade committed"
                );
                self.session.outgoing_sent = true;
                self.session.phase = Phase::Commit;
                self.events.push(TradeEvent::Committed {
                    received,
                    sent,
                    slot,
                    ts: chrono::Utc::now().timestamp_millis(),
                });
                TRADE_ACCEPT
            }
            Err(_) => self.abort(AbortCause::StorageFull, TRADE_ACCEPT),
        }
    }

    /// In-protocol abort: park in ABORT until the next byte reopens IDLE.
    fn abort(&mut self, cause: AbortCause, tx: u8) -> u8 {
        warn!(phase = %self.session.phase, %cause, "trade aborted");
        self.session.error_count += 1;
        self.session.last_error = Some(cause.clone());
        self.session.phase = Phase::Abort;
        self.events.push(TradeEvent::Aborted {
            cause,
            ts: chrono::Utc::now().timestamp_millis(),
        });
        tx
    }

    /// Abort that lands straight back in IDLE, for the phases whose contract
    /// says so (menu cancels, preamble errors).
    fn abort_to_idle(&mut self, cause: AbortCause, tx: u8) -> u8 {
        warn!(phase = %self.session.phase, %cause, "trade aborted");
        self.session.error_count += 1;
        self.session.last_error = Some(cause.clone());
        self.events.push(TradeEvent::Aborted {
            cause,
            ts: chrono::Utc::now().timestamp_millis(),
        });
        self.session.clear_trade();
        tx
    }
}

fn pick_partner_mon(block: &TradeBlock, index: usize) -> StoredPokemon {
    let count = (block.party_count as usize).clamp(1, 6);
    let slot = if index < count { index } else { 0 };
    StoredPokemon {
        core: block.pokemon[slot].clone(),
        nickname: block.nicknames[slot].clone(),
        ot_name: block.ot_names[slot].clone(),
    }
}
