use serde::{Deserialize, Serialize};

/// Flat index of a cell in a row-major `width × height` grid.
pub type CellIndex = usize;

/// Identifier of a grid cell. Its textual form is `Cell_<index>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(pub CellIndex);

impl CellId {
    pub const PREFIX: &'static str = "Cell_";

    pub fn index(self) -> CellIndex {
        self.0
    }

    /// Recover a cell id from its textual form.
    ///
    /// Only the digits carry information: every ASCII digit in `s` is
    /// concatenated and parsed. A string without digits, or one whose digits
    /// overflow, maps to cell 0.
    pub fn parse_lossy(s: &str) -> Self {
        let digits: String = s.chars().filter(char::is_ascii_digit).collect();
        Self(digits.parse().unwrap_or(0))
    }
}

impl From<CellIndex> for CellId {
    fn from(index: CellIndex) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_cell_prefix() {
        assert_eq!(CellId(26).to_string(), "Cell_26");
    }

    #[test]
    fn parse_lossy_reads_digits() {
        assert_eq!(CellId::parse_lossy("Cell_27"), CellId(27));
        assert_eq!(CellId::parse_lossy("x1y2"), CellId(12));
    }

    #[test]
    fn parse_lossy_without_digits_is_origin() {
        assert_eq!(CellId::parse_lossy("Cell_"), CellId(0));
        assert_eq!(CellId::parse_lossy(""), CellId(0));
    }

    #[test]
    fn parse_lossy_overflow_is_origin() {
        let huge = "9".repeat(64);
        assert_eq!(CellId::parse_lossy(&huge), CellId(0));
    }

    #[test]
    fn display_then_parse_is_identity() {
        for i in [0, 7, 63, 4096] {
            let id = CellId(i);
            assert_eq!(CellId::parse_lossy(&id.to_string()), id);
        }
    }
}
