//! Sub-range mapping for fan-out work.

/// A slice `[start, end]` of an outer progress range, divided between a
/// fixed number of equally weighted units.
///
/// Every value a phase produces lies inside its slice, and more completed
/// work never maps to a lower value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    start: u8,
    end: u8,
    units: usize,
}

impl Phase {
    /// Bounds are clamped to 100 and swapped if reversed; zero units is
    /// treated as one.
    pub fn new(start: u8, end: u8, units: usize) -> Self {
        let (start, end) = (start.min(100), end.min(100));
        let (start, end) = if start <= end {
            (start, end)
        } else {
            (end, start)
        };
        Self {
            start,
            end,
            units: units.max(1),
        }
    }

    /// The `index`-th of `count` equal slices of `0..=100`.
    pub fn slice(index: usize, count: usize) -> Self {
        let count = count.max(1);
        let index = index.min(count - 1);
        let start = (index * 100 / count) as u8;
        let end = ((index + 1) * 100 / count) as u8;
        Self::new(start, end, 1)
    }

    /// The same range split into `units` units.
    pub fn with_units(self, units: usize) -> Self {
        Self::new(self.start, self.end, units)
    }

    pub fn start(&self) -> u8 {
        self.start
    }

    pub fn end(&self) -> u8 {
        self.end
    }

    pub fn units(&self) -> usize {
        self.units
    }

    /// Map an overall fraction of this phase into the outer range.
    pub fn at(&self, fraction: f64) -> u8 {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let span = f64::from(self.end - self.start);
        let value = f64::from(self.start) + (span * fraction).floor();
        (value as u8).clamp(self.start, self.end)
    }

    /// Value once `done` of the units have finished.
    pub fn completed(&self, done: usize) -> u8 {
        self.at(done.min(self.units) as f64 / self.units as f64)
    }

    /// Value for unit `index` being `fraction` of the way through, assuming
    /// every earlier unit has finished.
    pub fn unit(&self, index: usize, fraction: f64) -> u8 {
        let index = index.min(self.units - 1) as f64;
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self.at((index + fraction) / self.units as f64)
    }

    /// Split into `count` consecutive sub-phases of one unit each.
    pub fn split(&self, count: usize) -> Vec<Phase> {
        let count = count.max(1);
        let span = usize::from(self.end - self.start);
        (0..count)
            .map(|i| {
                let start = usize::from(self.start) + i * span / count;
                let end = usize::from(self.start) + (i + 1) * span / count;
                Phase::new(start as u8, end as u8, 1)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_units_map_into_range() {
        let phase = Phase::new(16, 30, 3);
        let values: Vec<u8> = (0..=3).map(|d| phase.completed(d)).collect();
        assert_eq!(values.first(), Some(&16));
        assert_eq!(values.last(), Some(&30));
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert!(values.iter().all(|v| (16..=30).contains(v)));
    }

    #[test]
    fn out_of_range_inputs_are_bounded() {
        let phase = Phase::new(16, 30, 3);
        assert_eq!(phase.at(-1.0), 16);
        assert_eq!(phase.at(2.0), 30);
        assert_eq!(phase.at(f64::NAN), 16);
        assert_eq!(phase.completed(10), 30);
        assert_eq!(phase.unit(99, 1.0), 30);
    }

    #[test]
    fn unit_fractions_are_monotonic() {
        let phase = Phase::new(16, 30, 3);
        let mut last = 0;
        for index in 0..3 {
            for step in 0..=4 {
                let value = phase.unit(index, step as f64 / 4.0);
                assert!(value >= last);
                assert!((16..=30).contains(&value));
                last = value;
            }
        }
    }

    #[test]
    fn reversed_bounds_and_zero_units_are_normalised() {
        let phase = Phase::new(80, 20, 0);
        assert_eq!(phase.start(), 20);
        assert_eq!(phase.end(), 80);
        assert_eq!(phase.units(), 1);
    }

    #[test]
    fn slices_cover_full_range() {
        let slices: Vec<Phase> = (0..3).map(|i| Phase::slice(i, 3)).collect();
        assert_eq!(slices[0].start(), 0);
        assert_eq!(slices[0].end(), slices[1].start());
        assert_eq!(slices[1].end(), slices[2].start());
        assert_eq!(slices[2].end(), 100);
    }

    #[test]
    fn split_is_contiguous() {
        let parts = Phase::new(10, 50, 1).split(4);
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0].start(), 10);
        assert_eq!(parts[3].end(), 50);
        assert!(parts.windows(2).all(|w| w[0].end() == w[1].start()));
    }
}
