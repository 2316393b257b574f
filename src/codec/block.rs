use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::charmap;

/// Size of the party trade block on the wire.
pub const BLOCK_WIRE_SIZE: usize = 415;
/// Fixed width of every name field, terminator included.
pub const NAME_FIELD_LENGTH: usize = 11;
/// Core record size for a single Pokémon.
pub const RECORD_SIZE: usize = 44;
/// Maximum party size.
pub const PARTY_CAPACITY: usize = 6;

const OFF_TRAINER_NAME: usize = 0;
const OFF_PARTY_COUNT: usize = 11;
const OFF_SPECIES_LIST: usize = 12;
const OFF_RECORDS: usize = 19;
const OFF_OT_NAMES: usize = 283;
const OFF_NICKNAMES: usize = 349;

/// Byte range of the six core records within the wire block. The patch-list
/// exchange covers exactly this region.
pub const CORE_REGION: std::ops::Range<usize> = OFF_RECORDS..OFF_OT_NAMES;

const SPECIES_MAX: u8 = 151;

/// Host-order view of a 44-byte Gen I core record. Wire layout exists only
/// inside `write` / `read`; multi-byte fields are big-endian on the wire
/// except experience, which travels as 3 little-endian bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokemonRecord {
    pub species: u8,
    pub current_hp: u16,
    pub level: u8,
    pub status: u8,
    pub type1: u8,
    pub type2: u8,
    pub catch_rate: u8,
    pub moves: [u8; 4],
    pub ot_id: u16,
    pub experience: u32,
    pub hp_exp: u16,
    pub attack_exp: u16,
    pub defense_exp: u16,
    pub speed_exp: u16,
    pub special_exp: u16,
    pub ivs: [u8; 2],
    pub pp: [u8; 4],
    pub level_copy: u8,
    pub max_hp: u16,
    pub attack: u16,
    pub defense: u16,
    pub speed: u16,
    pub special: u16,
}

impl PokemonRecord {
    fn write(&self, out: &mut [u8]) {
        out[0] = self.species;
        out[1..3].copy_from_slice(&self.current_hp.to_be_bytes());
        out[3] = self.level;
        out[4] = self.status;
        out[5] = self.type1;
        out[6] = self.type2;
        out[7] = self.catch_rate;
        out[8..12].copy_from_slice(&self.moves);
        out[12..14].copy_from_slice(&self.ot_id.to_be_bytes());
        let exp = self.experience.to_le_bytes();
        out[14..17].copy_from_slice(&exp[..3]);
        out[17..19].copy_from_slice(&self.hp_exp.to_be_bytes());
        out[19..21].copy_from_slice(&self.attack_exp.to_be_bytes());
        out[21..23].copy_from_slice(&self.defense_exp.to_be_bytes());
        out[23..25].copy_from_slice(&self.speed_exp.to_be_bytes());
        out[25..27].copy_from_slice(&self.special_exp.to_be_bytes());
        out[27..29].copy_from_slice(&self.ivs);
        out[29..33].copy_from_slice(&self.pp);
        out[33] = self.level_copy;
        out[34..36].copy_from_slice(&self.max_hp.to_be_bytes());
        out[36..38].copy_from_slice(&self.attack.to_be_bytes());
        out[38..40].copy_from_slice(&self.defense.to_be_bytes());
        out[40..42].copy_from_slice(&self.speed.to_be_bytes());
        out[42..44].copy_from_slice(&self.special.to_be_bytes());
    }

    fn read(buf: &[u8]) -> Self {
        Self {
            species: buf[0],
            current_hp: u16::from_be_bytes([buf[1], buf[2]]),
            level: buf[3],
            status: buf[4],
            type1: buf[5],
            type2: buf[6],
            catch_rate: buf[7],
            moves: [buf[8], buf[9], buf[10], buf[11]],
            ot_id: u16::from_be_bytes([buf[12], buf[13]]),
            experience: u32::from_le_bytes([buf[14], buf[15], buf[16], 0]),
            hp_exp: u16::from_be_bytes([buf[17], buf[18]]),
            attack_exp: u16::from_be_bytes([buf[19], buf[20]]),
            defense_exp: u16::from_be_bytes([buf[21], buf[22]]),
            speed_exp: u16::from_be_bytes([buf[23], buf[24]]),
            special_exp: u16::from_be_bytes([buf[25], buf[26]]),
            ivs: [buf[27], buf[28]],
            pp: [buf[29], buf[30], buf[31], buf[32]],
            level_copy: buf[33],
            max_hp: u16::from_be_bytes([buf[34], buf[35]]),
            attack: u16::from_be_bytes([buf[36], buf[37]]),
            defense: u16::from_be_bytes([buf[38], buf[39]]),
            speed: u16::from_be_bytes([buf[40], buf[41]]),
            special: u16::from_be_bytes([buf[42], buf[43]]),
        }
    }
}

/// Host-order view of the full 415-byte party trade block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeBlock {
    pub trainer_name: String,
    pub party_count: u8,
    pub party_species: [u8; 7],
    pub pokemon: [PokemonRecord; 6],
    pub ot_names: [String; 6],
    pub nicknames: [String; 6],
}

impl Default for TradeBlock {
    fn default() -> Self {
        Self {
            trainer_name: String::new(),
            party_count: 0,
            party_species: [0xFF; 7],
            pokemon: Default::default(),
            ot_names: std::array::from_fn(|_| String::new()),
            nicknames: std::array::from_fn(|_| String::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum BlockError {
    #[error("party count {0} out of range")]
    PartyCountOutOfRange(u8),
    #[error("species list does not match lead record")]
    SpeciesListMismatch,
    #[error("level copy mismatch in slot {0}")]
    LevelCopyMismatch(usize),
    #[error("species {species} out of range in slot {slot}")]
    SpeciesOutOfRange { slot: usize, species: u8 },
    #[error("current hp exceeds max hp in slot {0}")]
    HpExceedsMax(usize),
}

fn name_at(wire: &[u8], offset: usize) -> String {
    charmap::decode_until_terminator(&wire[offset..offset + NAME_FIELD_LENGTH])
}

/// Write a block to its 415-byte wire form. The species list tail is
/// normalised to 0xFF and every name field is 0x50-terminated.
pub fn serialize(block: &TradeBlock) -> [u8; BLOCK_WIRE_SIZE] {
    let mut wire = [0u8; BLOCK_WIRE_SIZE];
    let name = charmap::encode_fixed::<NAME_FIELD_LENGTH>(&block.trainer_name);
    wire[OFF_TRAINER_NAME..OFF_TRAINER_NAME + NAME_FIELD_LENGTH].copy_from_slice(&name);
    wire[OFF_PARTY_COUNT] = block.party_count;
    let count = (block.party_count as usize).min(PARTY_CAPACITY);
    for i in 0..7 {
        wire[OFF_SPECIES_LIST + i] = if i < count { block.party_species[i] } else { 0xFF };
    }
    for (i, mon) in block.pokemon.iter().enumerate() {
        let at = OFF_RECORDS + i * RECORD_SIZE;
        mon.write(&mut wire[at..at + RECORD_SIZE]);
    }
    for i in 0..PARTY_CAPACITY {
        let ot = charmap::encode_fixed::<NAME_FIELD_LENGTH>(&block.ot_names[i]);
        let at = OFF_OT_NAMES + i * NAME_FIELD_LENGTH;
        wire[at..at + NAME_FIELD_LENGTH].copy_from_slice(&ot);
        let nick = charmap::encode_fixed::<NAME_FIELD_LENGTH>(&block.nicknames[i]);
        let at = OFF_NICKNAMES + i * NAME_FIELD_LENGTH;
        wire[at..at + NAME_FIELD_LENGTH].copy_from_slice(&nick);
    }
    wire
}

/// Decode the wire layout without judging the content.
pub fn decode(wire: &[u8; BLOCK_WIRE_SIZE]) -> TradeBlock {
    let mut species = [0xFFu8; 7];
    species.copy_from_slice(&wire[OFF_SPECIES_LIST..OFF_SPECIES_LIST + 7]);
    TradeBlock {
        trainer_name: name_at(wire, OFF_TRAINER_NAME),
        party_count: wire[OFF_PARTY_COUNT],
        party_species: species,
        pokemon: std::array::from_fn(|i| {
            let at = OFF_RECORDS + i * RECORD_SIZE;
            PokemonRecord::read(&wire[at..at + RECORD_SIZE])
        }),
        ot_names: std::array::from_fn(|i| name_at(wire, OFF_OT_NAMES + i * NAME_FIELD_LENGTH)),
        nicknames: std::array::from_fn(|i| name_at(wire, OFF_NICKNAMES + i * NAME_FIELD_LENGTH)),
    }
}

/// Content checks applied to every parsed block before it may be committed.
pub fn validate(block: &TradeBlock) -> Result<(), BlockError> {
    if block.party_count == 0 || block.party_count as usize > PARTY_CAPACITY {
        return Err(BlockError::PartyCountOutOfRange(block.party_count));
    }
    if block.party_species[0] != block.pokemon[0].species {
        return Err(BlockError::SpeciesListMismatch);
    }
    for slot in 0..block.party_count as usize {
        let mon = &block.pokemon[slot];
        if mon.species == 0 || mon.species > SPECIES_MAX {
            return Err(BlockError::SpeciesOutOfRange { slot, species: mon.species });
        }
        if mon.level != mon.level_copy {
            return Err(BlockError::LevelCopyMismatch(slot));
        }
        if mon.current_hp > mon.max_hp {
            return Err(BlockError::HpExceedsMax(slot));
        }
    }
    Ok(())
}

/// Decode and validate in one step.
pub fn parse(wire: &[u8; BLOCK_WIRE_SIZE]) -> Result<TradeBlock, BlockError> {
    let block = decode(wire);
    validate(&block)?;
    Ok(block)
}
