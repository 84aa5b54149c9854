use std::ops::BitOr;
use worldcell_common::CellIndex;

/// Bit set stored per cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CellFlag(pub u32);

impl CellFlag {
    pub const EMPTY: Self = Self(0);
    /// The tracked entity is inside this cell.
    pub const OCCUPIED: Self = Self(1 << 0);
    /// The cell is within the presence neighbourhood.
    pub const VISIBLE: Self = Self(1 << 1);
    /// The cell is, or has been, the active cell.
    pub const ACTIVE: Self = Self(1 << 2);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for CellFlag {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One [`CellFlag`] word per grid cell. Sized once, never resized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFlags {
    bits: Vec<u32>,
}

impl CellFlags {
    pub fn new(cell_count: usize) -> Self {
        Self {
            bits: vec![0; cell_count],
        }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Flags of a cell; `EMPTY` for indices outside the array.
    pub fn get(&self, index: CellIndex) -> CellFlag {
        self.bits.get(index).copied().map(CellFlag).unwrap_or_default()
    }

    /// Set `flag` on a cell. Returns false (and changes nothing) when the
    /// index is outside the array.
    pub fn insert(&mut self, index: CellIndex, flag: CellFlag) -> bool {
        match self.bits.get_mut(index) {
            Some(word) => {
                *word |= flag.0;
                true
            }
            None => {
                tracing::warn!(index, len = self.bits.len(), "cell flag index out of range");
                false
            }
        }
    }

    /// Clear `flag` on a cell. Out-of-range indices are ignored.
    pub fn remove(&mut self, index: CellIndex, flag: CellFlag) -> bool {
        match self.bits.get_mut(index) {
            Some(word) => {
                *word &= !flag.0;
                true
            }
            None => false,
        }
    }

    pub fn clear_all(&mut self) {
        self.bits.fill(0);
    }

    /// Indices of cells carrying every bit of `flag`, ascending.
    pub fn cells_with(&self, flag: CellFlag) -> impl Iterator<Item = CellIndex> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(move |(_, word)| CellFlag(**word).contains(flag) && !flag.is_empty())
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove_bits() {
        let mut flags = CellFlags::new(4);
        assert!(flags.insert(2, CellFlag::OCCUPIED | CellFlag::VISIBLE));
        assert!(flags.get(2).contains(CellFlag::OCCUPIED));

        flags.remove(2, CellFlag::OCCUPIED);
        assert!(!flags.get(2).contains(CellFlag::OCCUPIED));
        assert!(flags.get(2).contains(CellFlag::VISIBLE));
    }

    #[test]
    fn out_of_range_is_ignored() {
        let mut flags = CellFlags::new(4);
        assert!(!flags.insert(4, CellFlag::ACTIVE));
        assert!(!flags.remove(99, CellFlag::ACTIVE));
        assert_eq!(flags.get(99), CellFlag::EMPTY);
        assert_eq!(flags.len(), 4);
    }

    #[test]
    fn cells_with_lists_matching_cells() {
        let mut flags = CellFlags::new(6);
        flags.insert(1, CellFlag::VISIBLE);
        flags.insert(4, CellFlag::VISIBLE | CellFlag::ACTIVE);
        let visible: Vec<_> = flags.cells_with(CellFlag::VISIBLE).collect();
        assert_eq!(visible, vec![1, 4]);
        let active: Vec<_> = flags.cells_with(CellFlag::ACTIVE).collect();
        assert_eq!(active, vec![4]);
        assert_eq!(flags.cells_with(CellFlag::EMPTY).count(), 0);

        flags.clear_all();
        assert_eq!(flags.cells_with(CellFlag::VISIBLE).count(), 0);
    }
}
