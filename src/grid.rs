use hcc_common::Vec2;

/// Sparse uniform-bucket spatial index over a fixed set of points.
///
/// Only occupied buckets are stored, so memory follows the number of points
/// rather than the area they span. Built with a sort: tag every point with its
/// bucket key, sort point indices by key, then record one run per occupied bucket.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    inv_cell_size: f64,
    positions: Vec<Vec2>,

    // --- Occupied buckets, sorted by (gy, gx) ---
    // Bucket coordinates of each occupied bucket
    bucket_keys: Vec<(i64, i64)>,
    // Start index in cell_point_indices for each occupied bucket
    bucket_starts: Vec<u32>,
    // Number of points in each occupied bucket
    bucket_counts: Vec<u32>,
    // Point indices sorted by bucket key
    cell_point_indices: Vec<u32>,
}

impl SpatialGrid {
    /// Buckets `positions` into square cells of side `cell_size`.
    /// A non-positive or non-finite `cell_size` collapses the grid to one bucket.
    pub fn build(positions: Vec<Vec2>, cell_size: f64) -> Self {
        let usable = cell_size.is_finite() && cell_size > 0.0;
        let inv_cell_size = if usable { 1.0 / cell_size } else { 0.0 };

        let mut grid = SpatialGrid {
            inv_cell_size,
            positions,
            bucket_keys: Vec::new(),
            bucket_starts: Vec::new(),
            bucket_counts: Vec::new(),
            cell_point_indices: Vec::new(),
        };

        // Phase 1: bucket key for each point.
        let point_keys: Vec<(i64, i64)> = grid.positions.iter().map(|p| grid.bucket_key(*p)).collect();

        // Phase 2: sort point indices by key; the sort is stable so ties keep index order.
        grid.cell_point_indices = (0..grid.positions.len() as u32).collect();
        grid.cell_point_indices.sort_by_key(|&i| point_keys[i as usize]);

        // Phase 3: one run per occupied bucket.
        for (offset, &point_idx) in grid.cell_point_indices.iter().enumerate() {
            let key = point_keys[point_idx as usize];
            if grid.bucket_keys.last() == Some(&key) {
                if let Some(count) = grid.bucket_counts.last_mut() {
                    *count += 1;
                }
            } else {
                grid.bucket_keys.push(key);
                grid.bucket_starts.push(offset as u32);
                grid.bucket_counts.push(1);
            }
        }

        grid
    }

    pub fn len(&self) -> usize { self.positions.len() }

    pub fn is_empty(&self) -> bool { self.positions.is_empty() }

    /// Number of buckets holding at least one point.
    pub fn occupied_buckets(&self) -> usize { self.bucket_keys.len() }

    /// Bucket key `(gy, gx)` of a position.
    #[inline(always)]
    fn bucket_key(&self, pos: Vec2) -> (i64, i64) {
        // NaN casts to 0 and infinities saturate.
        let gx = (pos.x * self.inv_cell_size).floor() as i64;
        let gy = (pos.y * self.inv_cell_size).floor() as i64;
        (gy, gx)
    }

    #[inline(always)]
    fn bucket_points(&self, bucket: usize) -> &[u32] {
        let start = self.bucket_starts[bucket] as usize;
        let end = start + self.bucket_counts[bucket] as usize;
        &self.cell_point_indices[start..end]
    }

    /// Calls `f(point_idx, dist_sq)` for every indexed point within `max_dist` of `pos`
    /// (inclusive). Stops early when `f` returns `false`.
    pub fn for_each_neighbor<F>(&self, pos: Vec2, max_dist: f64, mut f: F)
    where
        F: FnMut(u32, f64) -> bool,
    {
        if self.positions.is_empty() || !(max_dist >= 0.0) {
            return;
        }
        let max_dist_sq = max_dist * max_dist;
        let reach = if self.inv_cell_size > 0.0 {
            (max_dist * self.inv_cell_size).ceil().min(i32::MAX as f64) as i64
        } else {
            0
        };
        let (cy, cx) = self.bucket_key(pos);
        let (y_lo, y_hi) = (cy.saturating_sub(reach), cy.saturating_add(reach));
        let (x_lo, x_hi) = (cx.saturating_sub(reach), cx.saturating_add(reach));

        let mut visit = |bucket: usize| -> bool {
            for &point_idx in self.bucket_points(bucket) {
                let dist_sq = pos.distance_squared(self.positions[point_idx as usize]);
                if dist_sq <= max_dist_sq && !f(point_idx, dist_sq) {
                    return false;
                }
            }
            true
        };

        // Look up each bucket of the window, or scan the occupied buckets when that is shorter.
        let window = (y_hi as i128 - y_lo as i128 + 1) * (x_hi as i128 - x_lo as i128 + 1);
        if window <= self.bucket_keys.len() as i128 {
            for gy in y_lo..=y_hi {
                for gx in x_lo..=x_hi {
                    if let Ok(bucket) = self.bucket_keys.binary_search(&(gy, gx)) {
                        if !visit(bucket) {
                            return;
                        }
                    }
                }
            }
        } else {
            for (bucket, &(gy, gx)) in self.bucket_keys.iter().enumerate() {
                let in_window = (y_lo..=y_hi).contains(&gy) && (x_lo..=x_hi).contains(&gx);
                if in_window && !visit(bucket) {
                    return;
                }
            }
        }
    }

    /// Returns the index of the first point within `max_dist` for which `f` returns `true`.
    pub fn find_first_neighbor<F>(&self, pos: Vec2, max_dist: f64, mut f: F) -> Option<u32>
    where
        F: FnMut(u32) -> bool,
    {
        let mut found = None;
        self.for_each_neighbor(pos, max_dist, |idx, _| {
            if f(idx) {
                found = Some(idx);
                false
            } else {
                true
            }
        });
        found
    }

    /// Nearest point strictly closer than `max_dist`; ties go to the lower index.
    pub fn nearest_within(&self, pos: Vec2, max_dist: f64) -> Option<(u32, f64)> {
        let max_dist_sq = max_dist * max_dist;
        let mut best: Option<(u32, f64)> = None;
        self.for_each_neighbor(pos, max_dist, |idx, dist_sq| {
            if dist_sq < max_dist_sq {
                let better = match best {
                    None => true,
                    Some((b_idx, b_dist_sq)) => dist_sq < b_dist_sq || (dist_sq == b_dist_sq && idx < b_idx),
                };
                if better {
                    best = Some((idx, dist_sq));
                }
            }
            true
        });
        best.map(|(idx, dist_sq)| (idx, dist_sq.sqrt()))
    }
}
