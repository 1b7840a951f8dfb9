use crate::config::HistogramConfig;

/// Uniform binning over `[min, max]`.
///
/// The bin count is the smaller of `max_bins` and the number of
/// `min_bin_width` steps that fit in the range, and never less than one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinAxis {
    pub min: f64,
    pub width: f64,
    pub bins: usize,
}

impl BinAxis {
    pub fn new(min: f64, max: f64, config: &HistogramConfig) -> Self {
        let range = (max - min).max(0.0);
        let max_bins = config.max_bins.max(1);

        if range <= 0.0 || !range.is_finite() {
            return Self {
                min,
                width: config.min_bin_width.max(f64::EPSILON),
                bins: 1,
            };
        }

        let by_width = if config.min_bin_width > 0.0 {
            (range / config.min_bin_width).ceil().max(1.0) as usize
        } else {
            max_bins
        };
        let bins = by_width.min(max_bins);

        Self {
            min,
            width: range / bins as f64,
            bins,
        }
    }

    /// Values outside the axis land in the first or last bin.
    #[inline]
    pub fn index(&self, value: f64) -> usize {
        let i = ((value - self.min) / self.width).floor();
        if i.is_nan() || i < 0.0 {
            0
        } else {
            (i as usize).min(self.bins - 1)
        }
    }

    #[inline]
    pub fn center(&self, index: usize) -> f64 {
        self.min + (index as f64 + 0.5) * self.width
    }
}
