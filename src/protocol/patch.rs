//! Patch-list handling for the 0xFE "no data" byte.
//!
//! The Game Boy link hardware treats 0xFE as an in-band no-data signal in
//! some modes, so the core-record region of the trade block must never carry
//! it raw. Before the block swap every 0xFE in that region is replaced with
//! 0xFF and its position recorded; after the swap each side applies the
//! partner's list to put the 0xFE bytes back.

use tracing::warn;

use crate::codec::block::{BLOCK_WIRE_SIZE, CORE_REGION};

use super::{NO_DATA, PATCH_BLOB_LENGTH, PATCH_TERMINATOR};

/// Offsets below this go in part 1 of the list, the rest in part 2.
/// Entries are stored as `offset + 1` so 0x00 can pad and 0xFF can terminate.
const PART_ONE_SPAN: usize = 252;

/// Substitute every 0xFE in the core-record region of `wire` and return the
/// fixed-size patch blob describing where they were. Positions that do not
/// fit the blob are dropped (a realistic block has at most a handful).
pub fn build_patch_list(wire: &mut [u8; BLOCK_WIRE_SIZE]) -> [u8; PATCH_BLOB_LENGTH] {
    let mut blob = [0u8; PATCH_BLOB_LENGTH];
    let mut at = 0;
    let mut dropped = 0usize;
    let mut push = |blob: &mut [u8; PATCH_BLOB_LENGTH], entry: u8| {
        if at < PATCH_BLOB_LENGTH {
            blob[at] = entry;
            at += 1;
            true
        } else {
            false
        }
    };

    let core = &mut wire[CORE_REGION];
    // Part 1: offsets 0..PART_ONE_SPAN.
    for offset in 0..PART_ONE_SPAN.min(core.len()) {
        if core[offset] == NO_DATA {
            core[offset] = PATCH_TERMINATOR;
            if !push(&mut blob, (offset + 1) as u8) {
                dropped += 1;
            }
        }
    }
    push(&mut blob, PATCH_TERMINATOR);
    // Part 2: offsets PART_ONE_SPAN.. relative to the part boundary.
    for offset in PART_ONE_SPAN..core.len() {
        if core[offset] == NO_DATA {
            core[offset] = PATCH_TERMINATOR;
            if !push(&mut blob, (offset - PART_ONE_SPAN + 1) as u8) {
                dropped += 1;
            }
        }
    }
    push(&mut blob, PATCH_TERMINATOR);

    if dropped > 0 {
        warn!(dropped, "patch list full, some 0xFE positions not recorded");
    }
    blob
}

/// Apply a partner's patch blob to the received wire block, restoring 0xFE
/// at every recorded core-region offset. Entries past the second terminator
/// are padding; out-of-range entries are ignored.
pub fn apply_patch_list(wire: &mut [u8; BLOCK_WIRE_SIZE], blob: &[u8]) {
    let core = &mut wire[CORE_REGION];
    let mut part = 0usize;
    for &entry in blob {
        match entry {
            PATCH_TERMINATOR => {
                part += 1;
                if part == 2 {
                    return;
                }
            }
            0 => {}
            _ => {
                let offset = if part == 0 {
                    entry as usize - 1
                } else {
                    PART_ONE_SPAN + entry as usize - 1
                };
                match core.get_mut(offset) {
                    Some(byte) => *byte = NO_DATA,
                    None => warn!(entry, part, "patch entry out of range, ignored"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_with_no_data_at(offsets: &[usize]) -> [u8; BLOCK_WIRE_SIZE] {
        let mut wire = [0u8; BLOCK_WIRE_SIZE];
        for &off in offsets {
            wire[CORE_REGION.start + off] = NO_DATA;
        }
        wire
    }

    #[test]
    fn test_build_substitutes_and_records_part_one() {
        let mut wire = wire_with_no_data_at(&[0, 5, 100]);
        let blob = build_patch_list(&mut wire);
        assert_eq!(wire[CORE_REGION.start], PATCH_TERMINATOR);
        assert_eq!(wire[CORE_REGION.start + 5], PATCH_TERMINATOR);
        assert_eq!(wire[CORE_REGION.start + 100], PATCH_TERMINATOR);
        assert_eq!(blob[0], 1);
        assert_eq!(blob[1], 6);
        assert_eq!(blob[2], 101);
        assert_eq!(blob[3], PATCH_TERMINATOR);
        assert_eq!(blob[4], PATCH_TERMINATOR);
    }

    #[test]
    fn test_build_splits_parts_at_boundary() {
        // 252 is the first offset of part 2.
        let mut wire = wire_with_no_data_at(&[10, 252, 260]);
        let blob = build_patch_list(&mut wire);
        assert_eq!(blob[0], 11);
        assert_eq!(blob[1], PATCH_TERMINATOR);
        assert_eq!(blob[2], 1); // 252 - 252 + 1
        assert_eq!(blob[3], 9); // 260 - 252 + 1
        assert_eq!(blob[4], PATCH_TERMINATOR);
    }

    #[test]
    fn test_clean_block_yields_empty_list() {
        let mut wire = [0u8; BLOCK_WIRE_SIZE];
        let blob = build_patch_list(&mut wire);
        assert_eq!(blob[0], PATCH_TERMINATOR);
        assert_eq!(blob[1], PATCH_TERMINATOR);
        assert!(blob[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_apply_restores_original_bytes() {
        let offsets = [3, 44, 200, 252, 263];
        let mut wire = wire_with_no_data_at(&offsets);
        let original = wire;
        let blob = build_patch_list(&mut wire);
        assert!(offsets.iter().all(|&o| wire[CORE_REGION.start + o] == PATCH_TERMINATOR));
        apply_patch_list(&mut wire, &blob);
        assert_eq!(wire, original);
    }

    #[test]
    fn test_apply_ignores_padding_and_out_of_range() {
        let mut wire = [0u8; BLOCK_WIRE_SIZE];
        // Entry 13 in part 2 would land past the core region (252 + 12 = 264).
        let blob = [PATCH_TERMINATOR, 13, PATCH_TERMINATOR, 0, 0];
        apply_patch_list(&mut wire, &blob);
        assert_eq!(wire, [0u8; BLOCK_WIRE_SIZE]);
    }

    #[test]
    fn test_apply_stops_after_second_terminator() {
        let mut wire = [0u8; BLOCK_WIRE_SIZE];
        // A stray entry after both terminators must not be applied.
        let blob = [PATCH_TERMINATOR, PATCH_TERMINATOR, 5, 0];
        apply_patch_list(&mut wire, &blob);
        assert_eq!(wire, [0u8; BLOCK_WIRE_SIZE]);
    }

    #[test]
    fn test_name_regions_are_not_patched() {
        let mut wire = [0u8; BLOCK_WIRE_SIZE];
        // 0xFE inside a nickname field stays untouched.
        wire[360] = NO_DATA;
        let blob = build_patch_list(&mut wire);
        assert_eq!(wire[360], NO_DATA);
        assert_eq!(blob[0], PATCH_TERMINATOR);
    }
}
