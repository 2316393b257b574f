use parking_lot::Mutex;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::codec::block::{PokemonRecord, TradeBlock};
use crate::species::species_name;

/// A Pokémon as it lives outside a trade block: core record plus the two
/// name fields Gen I stores separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredPokemon {
    pub core: PokemonRecord,
    pub nickname: String,
    pub ot_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("storage full")]
pub struct StorageFull;

/// The two operations the protocol engine is allowed to perform on storage.
pub trait TradeStorage {
    /// Persist a received Pokémon; returns the slot it landed in.
    fn store(&mut self, pokemon: StoredPokemon, source: &str) -> Result<usize, StorageFull>;
    /// Build the trade block this side offers.
    fn take_outgoing(&mut self) -> TradeBlock;
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredSlot {
    pub pokemon: StoredPokemon,
    pub source: String,
    pub stored_at_ms: i64,
}

/// Bounded in-memory slot table. Slots keep their index for their lifetime;
/// a deleted slot becomes free for the next `store`.
pub struct SlotTable {
    slots: Vec<Option<StoredSlot>>,
    outgoing_index: usize,
}

impl SlotTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            outgoing_index: 0,
        }
    }

    /// Seed a few well-formed starters so a fresh table has something to
    /// offer over the link.
    pub fn seed_demo(&mut self) {
        let mut rng = SmallRng::from_entropy();
        for (species, level, nickname, ot_name) in [
            (0x19, 25, "PIKACHU", "ASH"),
            (0x04, 15, "CHARMANDER", "RED"),
            (0x07, 20, "SQUIRTLE", "BLUE"),
        ] {
            let mon = demo_pokemon(&mut rng, species, level, nickname, ot_name);
            if self.store(mon, "SEED").is_err() {
                break;
            }
        }
    }

    /// Which slot `take_outgoing` offers. Out-of-range or empty slots fall
    /// back to the first occupied one.
    pub fn set_outgoing(&mut self, index: usize) {
        self.outgoing_index = index;
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn list(&self) -> Vec<(usize, &StoredSlot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|slot| (i, slot)))
            .collect()
    }

    pub fn delete(&mut self, index: usize) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    fn outgoing_pokemon(&self) -> StoredPokemon {
        self.slots
            .get(self.outgoing_index)
            .and_then(|s| s.as_ref())
            .or_else(|| self.slots.iter().flatten().next())
            .map(|slot| slot.pokemon.clone())
            .unwrap_or_else(|| {
                // Empty table: offer a stock Pikachu rather than stall the link.
                let mut rng = SmallRng::from_entropy();
                demo_pokemon(&mut rng, 0x19, 25, "PIKACHU", "ASH")
            })
    }
}

impl TradeStorage for SlotTable {
    fn store(&mut self, pokemon: StoredPokemon, source: &str) -> Result<usize, StorageFull> {
        let index = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(StorageFull)?;
        info!(
            slot = index,
            species = species_name(pokemon.core.species),
            level = pokemon.core.level,
            source,
            "stored pokemon"
        );
        self.slots[index] = Some(StoredSlot {
            pokemon,
            source: source.to_string(),
            stored_at_ms: chrono::Utc::now().timestamp_millis(),
        });
        Ok(index)
    }

    fn take_outgoing(&mut self) -> TradeBlock {
        let mon = self.outgoing_pokemon();
        let mut block = TradeBlock {
            party_count: 1,
            ..TradeBlock::default()
        };
        block.party_species[0] = mon.core.species;
        block.pokemon[0] = mon.core;
        block.ot_names[0] = mon.ot_name;
        block.nicknames[0] = mon.nickname;
        block
    }
}

/// Shared handle used when the engine and the admin surface both need the
/// table: the engine consumes it through the trait, the admin side locks it
/// directly for listings.
impl TradeStorage for Arc<Mutex<SlotTable>> {
    fn store(&mut self, pokemon: StoredPokemon, source: &str) -> Result<usize, StorageFull> {
        self.lock().store(pokemon, source)
    }

    fn take_outgoing(&mut self) -> TradeBlock {
        self.lock().take_outgoing()
    }
}

/// A well-formed demo Pokémon in the shape the original Cable Club expects:
/// simple derived stats, randomised DVs.
pub fn demo_pokemon(
    rng: &mut SmallRng,
    species: u8,
    level: u8,
    nickname: &str,
    ot_name: &str,
) -> StoredPokemon {
    let hp = level as u16 * 2 + 50;
    let (type1, type2) = match species {
        0x01 => (22, 3),  // grass/poison
        0x04 => (20, 20), // fire
        0x07 => (21, 21), // water
        0x19 => (23, 23), // electric
        _ => (0, 0),
    };
    let core = PokemonRecord {
        species,
        current_hp: hp,
        level,
        status: 0,
        type1,
        type2,
        catch_rate: 45,
        moves: [1, 0, 0, 0],
        ot_id: rng.gen(),
        experience: (level as u32).pow(3),
        hp_exp: 1000,
        attack_exp: 1000,
        defense_exp: 1000,
        speed_exp: 1000,
        special_exp: 1000,
        ivs: [rng.gen(), rng.gen()],
        pp: [35, 0, 0, 0],
        level_copy: level,
        max_hp: hp,
        attack: level as u16 + 20,
        defense: level as u16 + 15,
        speed: level as u16 + 10,
        special: level as u16 + 25,
    };
    StoredPokemon {
        core,
        nickname: nickname.to_string(),
        ot_name: ot_name.to_string(),
    }
}
