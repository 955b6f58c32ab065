use crate::{Float, Point3f};
use cgmath::InnerSpace;

/// Spatial hash over a point set with a fixed query radius.
///
/// Cells are radius-sized, so every point within the radius of a query
/// position lies in the query cell's 3x3x3 neighborhood. Build is a two-pass
/// counting sort into one flat index array; queries visit the 27 cells,
/// deduplicate hash buckets, and distance-filter candidates, so the visited
/// set is exactly the in-radius set with no repeats and no allocation.
pub struct HashGrid {
    positions: Vec<Point3f>,
    cell_indices: Vec<u32>,
    cell_range_ends: Vec<u32>,
    min_corner: Point3f,
    radius_sq: Float,
    inv_cell_size: Float,
}

impl HashGrid {
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            cell_indices: Vec::new(),
            cell_range_ends: Vec::new(),
            min_corner: Point3f::new(0.0, 0.0, 0.0),
            radius_sq: 0.0,
            inv_cell_size: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Rebuilds the grid over `points`, reusing prior allocations. One
    /// bucket per point keeps the load factor at one.
    pub fn build(&mut self, points: &[Point3f], radius: Float) {
        debug_assert!(radius > 0.0);

        self.positions.clear();
        self.cell_indices.clear();
        self.cell_range_ends.clear();
        self.radius_sq = radius * radius;
        self.inv_cell_size = 1.0 / radius;

        if points.is_empty() {
            return;
        }

        let mut min = points[0];
        for p in points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
        }
        self.min_corner = min;

        self.positions.extend_from_slice(points);
        self.cell_range_ends.resize(points.len(), 0);
        self.cell_indices.resize(points.len(), 0);

        for p in points {
            let (x, y, z) = self.cell_coords(*p);
            let bucket = self.bucket(x, y, z) as usize;
            self.cell_range_ends[bucket] += 1;
        }

        let mut sum = 0;
        for end in self.cell_range_ends.iter_mut() {
            let count = *end;
            *end = sum;
            sum += count;
        }

        for (i, p) in points.iter().enumerate() {
            let (x, y, z) = self.cell_coords(*p);
            let bucket = self.bucket(x, y, z) as usize;
            self.cell_indices[self.cell_range_ends[bucket] as usize] = i as u32;
            self.cell_range_ends[bucket] += 1;
        }
    }

    /// Invokes `visit` with the index of every stored point within the
    /// build radius of `p`, each exactly once. `p` may lie anywhere,
    /// including outside the point set's bounds.
    pub fn for_each_in_radius<F: FnMut(u32)>(&self, p: Point3f, mut visit: F) {
        if self.positions.is_empty() {
            return;
        }

        let (cx, cy, cz) = self.cell_coords(p);

        // 27 cells can collide into fewer buckets; visiting a bucket twice
        // would double-count its points
        let mut buckets = [0u32; 27];
        let mut bucket_count = 0;
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let bucket = self.bucket(cx + dx, cy + dy, cz + dz);
                    if !buckets[..bucket_count].contains(&bucket) {
                        buckets[bucket_count] = bucket;
                        bucket_count += 1;
                    }
                }
            }
        }

        for &bucket in &buckets[..bucket_count] {
            let end = self.cell_range_ends[bucket as usize] as usize;
            let start = match bucket {
                0 => 0,
                b => self.cell_range_ends[b as usize - 1] as usize,
            };

            for &index in &self.cell_indices[start..end] {
                let d_sq = (self.positions[index as usize] - p).magnitude2();
                if d_sq <= self.radius_sq {
                    visit(index);
                }
            }
        }
    }

    fn cell_coords(&self, p: Point3f) -> (i32, i32, i32) {
        (
            Float::floor((p.x - self.min_corner.x) * self.inv_cell_size) as i32,
            Float::floor((p.y - self.min_corner.y) * self.inv_cell_size) as i32,
            Float::floor((p.z - self.min_corner.z) * self.inv_cell_size) as i32,
        )
    }

    fn bucket(&self, x: i32, y: i32, z: i32) -> u32 {
        let hash = (x as u32).wrapping_mul(73_856_093)
            ^ (y as u32).wrapping_mul(19_349_663)
            ^ (z as u32).wrapping_mul(83_492_791);
        hash % self.cell_range_ends.len() as u32
    }
}

impl Default for HashGrid {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sampler::Sampler;
    use pretty_assertions::assert_eq;

    fn brute_force(points: &[Point3f], p: Point3f, radius: Float) -> Vec<u32> {
        points
            .iter()
            .enumerate()
            .filter(|(_, q)| (*q - p).magnitude2() <= radius * radius)
            .map(|(i, _)| i as u32)
            .collect()
    }

    fn collect_query(grid: &HashGrid, p: Point3f) -> Vec<u32> {
        let mut found = Vec::new();
        grid.for_each_in_radius(p, |i| found.push(i));
        found.sort_unstable();
        found
    }

    fn random_points(sampler: &mut Sampler, n: usize, scale: Float) -> Vec<Point3f> {
        (0..n)
            .map(|_| {
                point3f!(
                    sampler.get_1d() * scale,
                    sampler.get_1d() * scale,
                    sampler.get_1d() * scale
                )
            })
            .collect()
    }

    #[test]
    fn test_matches_brute_force_on_random_sets() {
        let mut sampler = Sampler::new_with_seed(31);
        let radius = 0.12;

        for _ in 0..5 {
            let points = random_points(&mut sampler, 300, 1.0);
            let mut grid = HashGrid::new();
            grid.build(&points, radius);

            for _ in 0..50 {
                // query positions range beyond the point AABB on purpose
                let q = point3f!(
                    sampler.get_1d() * 1.4 - 0.2,
                    sampler.get_1d() * 1.4 - 0.2,
                    sampler.get_1d() * 1.4 - 0.2
                );
                assert_eq!(collect_query(&grid, q), brute_force(&points, q, radius));
            }
        }
    }

    #[test]
    fn test_boundary_point_included() {
        let radius = 0.25;
        let points = vec![
            point3f!(0, 0, 0),
            point3f!(radius, 0.0, 0.0),
            point3f!(radius + 1e-4, 0.0, 0.0),
        ];
        let mut grid = HashGrid::new();
        grid.build(&points, radius);

        assert_eq!(collect_query(&grid, point3f!(0, 0, 0)), vec![0, 1]);
    }

    #[test]
    fn test_no_duplicate_visits_under_bucket_collisions() {
        // three points force cell_count = 3, so the 27 neighbor cells all
        // collide into at most three buckets
        let points = vec![
            point3f!(0.0, 0.0, 0.0),
            point3f!(0.01, 0.0, 0.0),
            point3f!(0.0, 0.01, 0.0),
        ];
        let mut grid = HashGrid::new();
        grid.build(&points, 0.05);

        let mut visits = Vec::new();
        grid.for_each_in_radius(point3f!(0, 0, 0), |i| visits.push(i));
        visits.sort_unstable();
        assert_eq!(visits, vec![0, 1, 2]);
    }

    #[test]
    fn test_coincident_points_each_reported() {
        let points = vec![point3f!(1, 2, 3); 5];
        let mut grid = HashGrid::new();
        grid.build(&points, 0.1);

        assert_eq!(collect_query(&grid, point3f!(1, 2, 3)), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_empty_grid_is_silent() {
        let mut grid = HashGrid::new();
        grid.build(&[], 0.1);
        grid.for_each_in_radius(point3f!(0, 0, 0), |_| panic!("no points to visit"));
        assert!(grid.is_empty());
    }

    #[test]
    fn test_rebuild_replaces_contents() {
        let mut grid = HashGrid::new();
        grid.build(&[point3f!(0, 0, 0)], 0.5);
        grid.build(&[point3f!(5, 5, 5), point3f!(5.1, 5, 5)], 0.5);

        assert!(collect_query(&grid, point3f!(0, 0, 0)).is_empty());
        assert_eq!(collect_query(&grid, point3f!(5, 5, 5)), vec![0, 1]);
    }
}
