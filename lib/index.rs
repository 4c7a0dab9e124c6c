//! Open-addressing hash table mapping basis states to slots of a register's
//! amplitude store.
//!
//! The table owns no amplitudes; it is purely a lookup accelerator. Each
//! cell holds a 1-based slot number (zero marks an empty cell), and probing
//! is linear with wraparound from a fixed multiplicative hash of the basis
//! state. There is no deletion primitive: operations that remove slots mark
//! the table dirty and it is rebuilt in full before the next lookup is
//! trusted.

use crate::{
    error::{ Error, Result },
    register::Slot,
};

/// Cap on the cell-count exponent.
///
/// The sizing policy (`width + 2` bits) is capped here; registers wide
/// enough to hit the cap can still saturate the table, which is reported as
/// [`Error::IndexFull`] rather than probing forever.
pub const MAX_INDEX_BITS: u32 = 26;

/// Multiplicative hash of the low `bits` of a scrambled 64-bit fold of a
/// basis state. Deterministic and pure.
pub fn hash64(state: u64, bits: u32) -> usize {
    let k32: u32 = ((state & 0xffff_ffff) as u32) ^ ((state >> 32) as u32);
    let k32 = k32.wrapping_mul(0x9e37_0001);
    (k32 >> (32 - bits)) as usize
}

/// Basis state → slot lookup table over a register's slot array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparseIndex {
    bits: u32,
    cells: Vec<u32>, // slot number + 1; 0 = empty
    dirty: bool,
    generation: u64, // bumped on every rebuild
}

impl SparseIndex {
    /// Create a table of `2^bits` cells, all empty.
    ///
    /// The new table starts dirty and must be rebuilt before lookups are
    /// trusted.
    ///
    /// *Panics* if `bits` lies outside `[1, MAX_INDEX_BITS]`; the hash is
    /// undefined there.
    pub fn new(bits: u32) -> Self {
        assert!((1..=MAX_INDEX_BITS).contains(&bits));
        Self { bits, cells: vec![0; 1_usize << bits], dirty: true, generation: 0 }
    }

    /// Return the cell-count exponent.
    pub fn bits(&self) -> u32 { self.bits }

    /// Return the number of cells.
    pub fn len(&self) -> usize { self.cells.len() }

    /// Return `true` if the table has no cells.
    pub fn is_empty(&self) -> bool { self.cells.is_empty() }

    /// Return `true` if the table may disagree with the slots it was built
    /// for and must be rebuilt before use.
    pub fn is_dirty(&self) -> bool { self.dirty }

    /// Flag the table as out of sync with its register's slots.
    pub fn mark_dirty(&mut self) { self.dirty = true; }

    /// Monotonic rebuild counter, used by registers sharing one table to
    /// detect that it was last rebuilt for somebody else's slots.
    pub fn generation(&self) -> u64 { self.generation }

    /// Find the slot holding `state`, probing from its hash until an empty
    /// cell (absent) or a referenced slot with a matching basis state.
    pub fn lookup(&self, state: u64, slots: &[Slot]) -> Option<usize> {
        debug_assert!(!self.dirty);
        let n = self.cells.len();
        let mut i = hash64(state, self.bits);
        // probe cap so a completely full table cannot loop on a miss
        for _ in 0..n {
            match self.cells[i] {
                0 => return None,
                c => {
                    let s = c as usize - 1;
                    if slots[s].state == state { return Some(s); }
                }
            }
            i += 1;
            if i == n { i = 0; }
        }
        None
    }

    /// Record that `slot` holds `state`.
    ///
    /// Fails with [`Error::IndexFull`] if every cell is occupied; the table
    /// never loops forever or overwrites a live cell.
    pub fn insert(&mut self, state: u64, slot: usize) -> Result<()> {
        let n = self.cells.len();
        let mut i = hash64(state, self.bits);
        let mut probed = 0_usize;
        while self.cells[i] != 0 {
            probed += 1;
            if probed == n { return Err(Error::IndexFull { bits: self.bits }); }
            i += 1;
            if i == n { i = 0; }
        }
        self.cells[i] = slot as u32 + 1;
        Ok(())
    }

    /// Clear the table and reinsert every slot in slot order.
    ///
    /// After a successful rebuild every occupied slot is reachable by
    /// probing from its hash, and the table is clean.
    pub fn rebuild(&mut self, slots: &[Slot]) -> Result<()> {
        self.cells.fill(0);
        for (i, s) in slots.iter().enumerate() {
            self.insert(s.state, i)?;
        }
        self.dirty = false;
        self.generation += 1;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use num_complex::Complex64 as C64;
    use super::*;

    fn slots(states: &[u64]) -> Vec<Slot> {
        states.iter()
            .map(|s| Slot { state: *s, amp: C64::from(1.0) })
            .collect()
    }

    #[test]
    fn rebuild_is_total() {
        let sl = slots(&[3, 7, 1, 0, 12, u64::MAX]);
        let mut ix = SparseIndex::new(4);
        ix.rebuild(&sl).unwrap();
        assert!(!ix.is_dirty());
        for (i, s) in sl.iter().enumerate() {
            assert_eq!(ix.lookup(s.state, &sl), Some(i));
        }
        assert_eq!(ix.lookup(5, &sl), None);
        assert_eq!(ix.lookup(2, &sl), None);
    }

    #[test]
    fn rebuild_after_mutation() {
        let mut sl = slots(&[0, 1, 2, 3]);
        let mut ix = SparseIndex::new(4);
        ix.rebuild(&sl).unwrap();
        let g = ix.generation();
        sl.swap_remove(1);
        ix.mark_dirty();
        assert!(ix.is_dirty());
        ix.rebuild(&sl).unwrap();
        assert_eq!(ix.generation(), g + 1);
        assert_eq!(ix.lookup(3, &sl), Some(1));
        assert_eq!(ix.lookup(1, &sl), None);
    }

    #[test]
    #[should_panic]
    fn zero_bits_is_rejected() {
        let _ = SparseIndex::new(0);
    }

    #[test]
    #[should_panic]
    fn oversized_table_is_rejected() {
        let _ = SparseIndex::new(MAX_INDEX_BITS + 1);
    }

    #[test]
    fn saturation_is_reported() {
        let sl = slots(&[0, 1, 2, 3]);
        let mut ix = SparseIndex::new(2); // 4 cells
        ix.rebuild(&sl).unwrap();
        assert_eq!(ix.insert(9, 4), Err(Error::IndexFull { bits: 2 }));
        let sl5 = slots(&[0, 1, 2, 3, 4]);
        assert_eq!(ix.rebuild(&sl5), Err(Error::IndexFull { bits: 2 }));
    }
}
