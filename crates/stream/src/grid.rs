use glam::Vec3;
use worldcell_common::{CellId, CellIndex};

/// Errors from constructing a grid with unusable dimensions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("grid must have at least one cell, got {width}x{height}")]
    Empty { width: usize, height: usize },
    #[error("grid of {width}x{height} cells exceeds {max} cells")]
    TooLarge {
        width: usize,
        height: usize,
        max: usize,
    },
    #[error("cell size must be positive and finite, got {0}")]
    InvalidCellSize(f32),
}

/// A 2D cell coordinate in the world grid (ignoring Y axis for partitioning).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoord {
    pub x: usize,
    pub z: usize,
}

impl CellCoord {
    pub fn new(x: usize, z: usize) -> Self {
        Self { x, z }
    }
}

/// Fixed-size uniform grid laid over the XZ plane, starting at the origin.
///
/// Immutable once built. Maps positions to row-major cell indices:
/// `index = x + width · z`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    cell_size: f32,
}

impl Grid {
    /// Upper bound on `width · height`; flag arrays are allocated per cell.
    pub const MAX_CELLS: usize = 1 << 24;

    pub fn new(width: usize, height: usize, cell_size: f32) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::Empty { width, height });
        }
        if width
            .checked_mul(height)
            .is_none_or(|count| count > Self::MAX_CELLS)
        {
            return Err(GridError::TooLarge {
                width,
                height,
                max: Self::MAX_CELLS,
            });
        }
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(GridError::InvalidCellSize(cell_size));
        }
        Ok(Self {
            width,
            height,
            cell_size,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// World units per cell side.
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    pub fn contains(&self, index: CellIndex) -> bool {
        index < self.cell_count()
    }

    /// Cell coordinate of a world position, saturated to the grid border.
    pub fn coord_of(&self, pos: Vec3) -> CellCoord {
        CellCoord {
            x: axis_cell(pos.x, self.cell_size, self.width),
            z: axis_cell(pos.z, self.cell_size, self.height),
        }
    }

    /// Cell index of a world position. Total: never fails, never leaves the grid.
    pub fn index(&self, pos: Vec3) -> CellIndex {
        self.index_of(self.coord_of(pos))
    }

    pub fn cell_id(&self, pos: Vec3) -> CellId {
        CellId(self.index(pos))
    }

    pub fn index_of(&self, coord: CellCoord) -> CellIndex {
        coord.x + self.width * coord.z
    }

    /// Decompose a flat index into grid coordinates.
    pub fn coords(&self, index: CellIndex) -> CellCoord {
        CellCoord {
            x: index % self.width,
            z: index / self.width,
        }
    }

    /// World-space center of a cell, at height 0.
    ///
    /// Ids past the end of the grid are clamped to the last cell.
    pub fn cell_center(&self, cell: CellId) -> Vec3 {
        let coord = self.coords(cell.index().min(self.cell_count() - 1));
        Vec3::new(
            (coord.x as f32 + 0.5) * self.cell_size,
            0.0,
            (coord.z as f32 + 0.5) * self.cell_size,
        )
    }

    /// True when `a` and `b` are the same cell or one of its 8 neighbours
    /// (Chebyshev distance ≤ 1). Symmetric.
    pub fn is_cell_visible(&self, a: CellIndex, b: CellIndex) -> bool {
        let a = self.coords(a);
        let b = self.coords(b);
        a.x.abs_diff(b.x) <= 1 && a.z.abs_diff(b.z) <= 1
    }

    /// In-grid cells of the 3×3 block centred on `index`, including itself.
    pub fn neighborhood(&self, index: CellIndex) -> Vec<CellIndex> {
        let center = self.coords(index);
        let x_range = center.x.saturating_sub(1)..=(center.x + 1).min(self.width - 1);
        let z_range = center.z.saturating_sub(1)..=(center.z + 1).min(self.height - 1);
        let mut cells = Vec::with_capacity(9);
        for z in z_range {
            for x in x_range.clone() {
                cells.push(self.index_of(CellCoord::new(x, z)));
            }
        }
        cells
    }
}

fn axis_cell(v: f32, cell_size: f32, count: usize) -> usize {
    let cell = (v / cell_size).floor();
    if cell.is_nan() || cell <= 0.0 {
        0
    } else {
        // Float-to-int casts saturate, so +inf lands on usize::MAX.
        (cell as usize).min(count - 1)
    }
}
