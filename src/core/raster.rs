use geo::Coord;
use rayon::prelude::*;

/// Scanline fill of pixel-space rings into a 0/1 mask.
///
/// A pixel is set when its centre is inside any ring (even-odd per ring, rings
/// combined by OR). Rings with fewer than three vertices are skipped.
pub fn rasterize_rings(rings: &[Vec<Coord<f64>>], width: usize, height: usize) -> Vec<u8> {
    let mut mask = vec![0u8; width * height];
    if width == 0 {
        return mask;
    }

    mask.par_chunks_mut(width).enumerate().for_each(|(row, line)| {
        let scan_y = row as f64 + 0.5;
        let mut crossings = Vec::new();

        for ring in rings.iter().filter(|r| r.len() >= 3) {
            crossings.clear();
            collect_crossings(ring, scan_y, &mut crossings);
            crossings.sort_by(|a, b| a.total_cmp(b));

            for span in crossings.chunks_exact(2) {
                fill_span(line, span[0], span[1]);
            }
        }
    });

    mask
}

fn collect_crossings(ring: &[Coord<f64>], scan_y: f64, out: &mut Vec<f64>) {
    let n = ring.len();
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];

        if (a.y > scan_y) != (b.y > scan_y) {
            out.push(a.x + (scan_y - a.y) * (b.x - a.x) / (b.y - a.y));
        }
    }
}

fn fill_span(line: &mut [u8], x0: f64, x1: f64) {
    let last = line.len() as f64 - 1.0;
    let start = (x0 - 0.5).ceil().max(0.0);
    let end = (x1 - 0.5).floor().min(last);

    if start > end {
        return;
    }

    for px in &mut line[start as usize..=end as usize] {
        *px = 1;
    }
}

/// Drops mask pixels whose centre lies closer than `clip_px` to any ring edge.
pub fn clip_inner_edges(mask: &mut [u8], width: usize, rings: &[Vec<Coord<f64>>], clip_px: f64) {
    if clip_px <= 0.0 || width == 0 {
        return;
    }

    let edges: Vec<(Coord<f64>, Coord<f64>)> = rings
        .iter()
        .filter(|r| r.len() >= 3)
        .flat_map(|r| (0..r.len()).map(move |i| (r[i], r[(i + 1) % r.len()])))
        .collect();
    let clip_sq = clip_px * clip_px;

    mask.par_chunks_mut(width).enumerate().for_each(|(row, line)| {
        for (col, px) in line.iter_mut().enumerate() {
            if *px == 0 {
                continue;
            }
            let p = Coord {
                x: col as f64 + 0.5,
                y: row as f64 + 0.5,
            };
            if edges.iter().any(|&(a, b)| segment_distance_sq(p, a, b) < clip_sq) {
                *px = 0;
            }
        }
    });
}

fn segment_distance_sq(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let ab = b - a;
    let ap = p - a;
    let len_sq = ab.x * ab.x + ab.y * ab.y;

    let t = if len_sq > 0.0 {
        ((ap.x * ab.x + ap.y * ab.y) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let dx = ap.x - ab.x * t;
    let dy = ap.y - ab.y * t;
    dx * dx + dy * dy
}

pub fn union_into(target: &mut [u8], mask: &[u8]) {
    target
        .par_iter_mut()
        .zip(mask.par_iter())
        .for_each(|(t, &m)| *t |= m);
}

pub fn count_active(mask: &[u8]) -> usize {
    mask.par_iter().filter(|&&m| m != 0).count()
}
