//! Layout arithmetic for element-wrapped distributions.
//!
//! Under element wrapping, each matrix dimension is dealt out with a fixed
//! stride starting from a per-rank shift: global index `g` lives on a rank
//! iff `g = shift + k * stride`, at local index `k`.

use distbridge_traits::{Dist, DistributionDescriptor};
use distbridge_view::MatrixSize;

use crate::grid::GridLayout;

/// Placement of one dimension on one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisLayout {
    pub stride: usize,
    pub shift: usize,
    /// Whether this rank holds any part of the dimension.
    pub active: bool,
}

/// Number of indices in `[0, n)` congruent to `shift` modulo `stride`.
#[inline]
pub fn local_length(n: usize, shift: usize, stride: usize) -> usize {
    if n > shift {
        (n - shift - 1) / stride + 1
    } else {
        0
    }
}

impl AxisLayout {
    pub fn for_dist(dist: Dist, grid: &GridLayout) -> Self {
        let (stride, shift, active) = match dist {
            Dist::Mc => (grid.height, grid.row(), true),
            Dist::Mr => (grid.width, grid.col(), true),
            Dist::Vc => (grid.size(), grid.vc_rank(), true),
            Dist::Vr => (grid.size(), grid.vr_rank(), true),
            Dist::Star => (1, 0, true),
            Dist::Circ => (1, 0, grid.rank == 0),
            Dist::Md => {
                // Diagonal index k with k = row (mod height), k = col (mod width).
                let lcm = grid.lcm();
                match (0..lcm).find(|k| k % grid.height == grid.row() && k % grid.width == grid.col()) {
                    Some(shift) => (lcm, shift, true),
                    None => (lcm, 0, false),
                }
            }
        };
        Self {
            stride,
            shift,
            active,
        }
    }

    #[inline]
    pub fn local_length(&self, n: usize) -> usize {
        if self.active {
            local_length(n, self.shift, self.stride)
        } else {
            0
        }
    }

    #[inline]
    pub fn global_index(&self, local: usize) -> usize {
        self.shift + local * self.stride
    }
}

/// Placement of both dimensions on one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistLayout {
    pub rows: AxisLayout,
    pub cols: AxisLayout,
}

impl DistLayout {
    pub fn new(distribution: DistributionDescriptor, grid: &GridLayout) -> Self {
        Self {
            rows: AxisLayout::for_dist(distribution.columnwise, grid),
            cols: AxisLayout::for_dist(distribution.rowwise, grid),
        }
    }

    pub fn local_size(&self, global: MatrixSize) -> MatrixSize {
        MatrixSize::new(
            self.rows.local_length(global.m),
            self.cols.local_length(global.n),
        )
    }

    #[inline]
    pub fn participating(&self) -> bool {
        self.rows.active && self.cols.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distbridge_traits::{CircCirc, Distribution, McMr, SUPPORTED_DISTRIBUTIONS};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_local_length() {
        assert_eq!(local_length(10, 0, 3), 4);
        assert_eq!(local_length(10, 1, 3), 3);
        assert_eq!(local_length(10, 2, 3), 3);
        assert_eq!(local_length(2, 2, 3), 0);
        assert_eq!(local_length(0, 0, 1), 0);
    }

    #[test]
    fn test_single_rank_owns_everything() {
        let grid = GridLayout::new(1, 1, 0);
        for &d in SUPPORTED_DISTRIBUTIONS {
            let l = DistLayout::new(d, &grid);
            assert!(l.participating(), "{d}");
            assert_eq!(l.local_size(MatrixSize::new(4, 7)), MatrixSize::new(4, 7), "{d}");
        }
    }

    /// Every global index is held by as many ranks as the placement
    /// replicates it.
    #[test]
    fn test_partition_covers_each_index() {
        let mut rng = StdRng::seed_from_u64(11);
        for (h, w) in [(2, 3), (3, 2), (2, 2), (4, 6)] {
            let n = rng.gen_range(1..40);
            for dist in [Dist::Mc, Dist::Mr, Dist::Vc, Dist::Vr, Dist::Md] {
                let mut count = vec![0usize; n];
                let mut owners = 0usize;
                for rank in 0..h * w {
                    let axis = AxisLayout::for_dist(dist, &GridLayout::new(h, w, rank));
                    if axis.active {
                        owners += 1;
                    }
                    for k in 0..axis.local_length(n) {
                        count[axis.global_index(k)] += 1;
                    }
                }
                // Replication factor: ranks sharing the same shift.
                let copies = match dist {
                    Dist::Mc => w,
                    Dist::Mr => h,
                    _ => 1,
                };
                assert!(count.iter().all(|&c| c == copies), "{dist} on {h}x{w}: {count:?}");
                if dist == Dist::Md {
                    assert_eq!(owners, GridLayout::new(h, w, 0).lcm());
                }
            }
        }
    }

    #[test]
    fn test_md_participation() {
        // 2 x 2 grid: only the diagonal ranks 0 (0,0) and 3 (1,1) hold MD data.
        let active: Vec<_> = (0..4)
            .map(|r| AxisLayout::for_dist(Dist::Md, &GridLayout::new(2, 2, r)).active)
            .collect();
        assert_eq!(active, vec![true, false, false, true]);
    }

    #[test]
    fn test_circ_only_root() {
        for rank in 0..4 {
            let l = DistLayout::new(CircCirc::DESCRIPTOR, &GridLayout::new(2, 2, rank));
            assert_eq!(l.participating(), rank == 0);
            let expected = if rank == 0 { MatrixSize::new(3, 3) } else { MatrixSize::new(0, 0) };
            assert_eq!(l.local_size(MatrixSize::new(3, 3)), expected);
        }
    }

    #[test]
    fn test_mc_mr_block() {
        // 5 x 7 on a 2 x 3 grid, rank 4 = (0, 2): rows 0,2,4 and columns 2,5.
        let l = DistLayout::new(McMr::DESCRIPTOR, &GridLayout::new(2, 3, 4));
        assert_eq!(l.local_size(MatrixSize::new(5, 7)), MatrixSize::new(3, 2));
        assert_eq!(l.cols.global_index(1), 5);
        assert_eq!(l.rows.global_index(2), 4);
    }
}
