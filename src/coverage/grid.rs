use crate::core::spatial::TileGeometry;
use crate::coverage::culling::PreparedPose;

/// Uniform N x N bucketing of poses over a tile.
///
/// A pixel belongs to the cell holding its centre. Each pose is listed in
/// every cell its footprint bounding box touches.
pub struct PoseGrid {
    resolution: usize,
    col_cells: Vec<u8>,
    row_cells: Vec<u8>,
    cells: Vec<Vec<u32>>,
}

impl PoseGrid {
    /// Bucket entries are positions in `poses`, not global pose indices.
    pub fn build(poses: &[PreparedPose], geometry: &TileGeometry, resolution: usize) -> Self {
        let n = resolution.max(1);
        let cell_w = geometry.width as f64 / n as f64;
        let cell_h = geometry.height as f64 / n as f64;
        let last = (n - 1) as f64;

        let cell_of = |px: f64, cell: f64| (px / cell).floor().clamp(0.0, last) as usize;
        let col_cells = (0..geometry.width)
            .map(|c| cell_of(c as f64 + 0.5, cell_w) as u8)
            .collect();
        let row_cells = (0..geometry.height)
            .map(|r| cell_of(r as f64 + 0.5, cell_h) as u8)
            .collect();

        let bounds = geometry.bounds();
        let ps_x = geometry.pixel_size_x();
        let ps_y = geometry.pixel_size_y();
        let mut cells = vec![Vec::new(); n * n];

        for (slot, pose) in poses.iter().enumerate() {
            if pose.radius.is_nan() {
                continue;
            }
            let (px, py) = (pose.frame.position.x, pose.frame.position.y);

            let col_lo = (px - pose.radius - bounds.min().x) / ps_x;
            let col_hi = (px + pose.radius - bounds.min().x) / ps_x;
            let row_lo = (bounds.max().y - (py + pose.radius)) / ps_y;
            let row_hi = (bounds.max().y - (py - pose.radius)) / ps_y;

            if col_hi < 0.0
                || row_hi < 0.0
                || col_lo > geometry.width as f64
                || row_lo > geometry.height as f64
            {
                continue;
            }

            let (cx0, cx1) = (cell_of(col_lo, cell_w), cell_of(col_hi, cell_w));
            let (cy0, cy1) = (cell_of(row_lo, cell_h), cell_of(row_hi, cell_h));
            for cy in cy0..=cy1 {
                for cx in cx0..=cx1 {
                    cells[cy * n + cx].push(slot as u32);
                }
            }
        }

        Self {
            resolution: n,
            col_cells,
            row_cells,
            cells,
        }
    }

    #[inline]
    pub fn candidates(&self, col: usize, row: usize) -> &[u32] {
        let cx = self.col_cells[col] as usize;
        let cy = self.row_cells[row] as usize;
        &self.cells[cy * self.resolution + cx]
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }
}
