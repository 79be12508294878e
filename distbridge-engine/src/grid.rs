//! Process grids.

use crate::comm::Comm;
use crate::{EngineError, Result};

/// Position of one rank in an `height x width` grid.
///
/// Ranks are laid out column-major: rank `r` sits at row `r % height`,
/// column `r / height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub height: usize,
    pub width: usize,
    pub rank: usize,
}

impl GridLayout {
    pub fn new(height: usize, width: usize, rank: usize) -> Self {
        debug_assert!(rank < height * width);
        Self {
            height,
            width,
            rank,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.height * self.width
    }

    #[inline]
    pub fn row(&self) -> usize {
        self.rank % self.height
    }

    #[inline]
    pub fn col(&self) -> usize {
        self.rank / self.height
    }

    /// Rank in the column-major ordering of the grid.
    #[inline]
    pub fn vc_rank(&self) -> usize {
        self.row() + self.col() * self.height
    }

    /// Rank in the row-major ordering of the grid.
    #[inline]
    pub fn vr_rank(&self) -> usize {
        self.col() + self.row() * self.width
    }

    pub fn gcd(&self) -> usize {
        gcd(self.height, self.width)
    }

    pub fn lcm(&self) -> usize {
        self.height / self.gcd() * self.width
    }
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// A communicator arranged as a two-dimensional grid.
#[derive(Debug)]
pub struct Grid {
    comm: Comm,
    height: usize,
    width: usize,
}

impl Grid {
    /// Grid with the most nearly square shape, height not above width.
    pub fn new(comm: Comm) -> Self {
        let size = comm.size();
        let mut height = (size as f64).sqrt() as usize;
        while height > 1 && size % height != 0 {
            height -= 1;
        }
        let height = height.max(1);
        tracing::debug!(size, height, width = size / height, "grid created");
        Self {
            width: size / height,
            height,
            comm,
        }
    }

    pub fn with_height(comm: Comm, height: usize) -> Result<Self> {
        let size = comm.size();
        if height == 0 || size % height != 0 {
            return Err(EngineError::InvalidGridHeight { height, size });
        }
        Ok(Self {
            width: size / height,
            height,
            comm,
        })
    }

    #[inline]
    pub fn comm(&self) -> &Comm {
        &self.comm
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.comm.size()
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn layout(&self) -> GridLayout {
        GridLayout::new(self.height, self.width, self.comm.rank())
    }
}
