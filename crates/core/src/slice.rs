//! Hyperslab selection over N-dimensional arrays
//!
//! A [`DataSlice`] holds one [`AxisSlice`] per leading axis. Axes past the
//! end of the list are selected in full. Range semantics follow half-open
//! intervals with clamping: a stop past the axis length is clamped, a start
//! past it yields an empty selection. `Index` selects one position and drops
//! the axis from the result.

use crate::error::{Error, Result};

/// Selection along a single axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSlice {
    /// Every position
    Full,
    /// One position; the axis is removed from the result
    Index(usize),
    /// `start..stop` every `step` positions; `stop = None` means the axis end
    Range {
        /// First position
        start: usize,
        /// Exclusive end (clamped to the axis length)
        stop: Option<usize>,
        /// Stride, must be at least 1
        step: usize,
    },
}

impl AxisSlice {
    /// `start..stop` with unit step
    pub fn range(start: usize, stop: usize) -> Self {
        AxisSlice::Range {
            start,
            stop: Some(stop),
            step: 1,
        }
    }

    /// `start..stop` with the given step
    pub fn step_range(start: usize, stop: usize, step: usize) -> Self {
        AxisSlice::Range {
            start,
            stop: Some(stop),
            step,
        }
    }

    /// `start..` to the end of the axis
    pub fn from(start: usize) -> Self {
        AxisSlice::Range {
            start,
            stop: None,
            step: 1,
        }
    }

    /// Resolve to the selected positions on an axis of length `len`
    pub fn resolve(&self, len: usize) -> Result<Vec<usize>> {
        match *self {
            AxisSlice::Full => Ok((0..len).collect()),
            AxisSlice::Index(i) => {
                if i >= len {
                    return Err(Error::ShapeError(format!(
                        "index {} out of bounds for axis of length {}",
                        i, len
                    )));
                }
                Ok(vec![i])
            }
            AxisSlice::Range { start, stop, step } => {
                if step == 0 {
                    return Err(Error::ShapeError("slice step cannot be zero".to_string()));
                }
                let stop = stop.unwrap_or(len).min(len);
                if start >= stop {
                    return Ok(Vec::new());
                }
                Ok((start..stop).step_by(step).collect())
            }
        }
    }

    /// Whether this selection removes its axis from the result
    pub fn drops_axis(&self) -> bool {
        matches!(self, AxisSlice::Index(_))
    }
}

/// Selection over all axes of an array
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataSlice {
    axes: Vec<AxisSlice>,
}

impl DataSlice {
    /// Select the whole array
    pub fn all() -> Self {
        DataSlice { axes: Vec::new() }
    }

    /// Build from per-axis selections
    pub fn new(axes: Vec<AxisSlice>) -> Self {
        DataSlice { axes }
    }

    /// Selection on `axis`, `Full` when not specified
    pub fn axis(&self, axis: usize) -> AxisSlice {
        self.axes.get(axis).copied().unwrap_or(AxisSlice::Full)
    }

    /// Number of explicitly specified axes
    pub fn len(&self) -> usize {
        self.axes.len()
    }

    /// True if no axis is specified
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Replace the selection on one axis, padding with `Full`
    pub fn with_axis(mut self, axis: usize, slice: AxisSlice) -> Self {
        while self.axes.len() <= axis {
            self.axes.push(AxisSlice::Full);
        }
        self.axes[axis] = slice;
        self
    }

    /// Resolve every axis against a concrete shape
    pub fn resolve(&self, shape: &[usize]) -> Result<Vec<Vec<usize>>> {
        if self.axes.len() > shape.len() {
            return Err(Error::ShapeError(format!(
                "slice has {} axes but array has {} dimensions",
                self.axes.len(),
                shape.len()
            )));
        }
        shape
            .iter()
            .enumerate()
            .map(|(axis, &len)| self.axis(axis).resolve(len))
            .collect()
    }

    /// Axes removed from the result by `Index` selections
    pub fn dropped_axes(&self) -> Vec<usize> {
        self.axes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.drops_axis())
            .map(|(i, _)| i)
            .collect()
    }
}

impl From<Vec<AxisSlice>> for DataSlice {
    fn from(axes: Vec<AxisSlice>) -> Self {
        DataSlice::new(axes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_clamps_stop() {
        assert_eq!(AxisSlice::range(1, 10).resolve(4).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_range_start_past_end_is_empty() {
        assert!(AxisSlice::range(5, 8).resolve(4).unwrap().is_empty());
    }

    #[test]
    fn test_step_range() {
        assert_eq!(
            AxisSlice::step_range(0, 7, 3).resolve(10).unwrap(),
            vec![0, 3, 6]
        );
    }

    #[test]
    fn test_zero_step_rejected() {
        assert!(AxisSlice::step_range(0, 4, 0).resolve(4).is_err());
    }

    #[test]
    fn test_index_out_of_bounds() {
        assert!(AxisSlice::Index(4).resolve(4).is_err());
        assert_eq!(AxisSlice::Index(3).resolve(4).unwrap(), vec![3]);
    }

    #[test]
    fn test_unspecified_axes_are_full() {
        let slice = DataSlice::new(vec![AxisSlice::range(0, 1)]);
        let resolved = slice.resolve(&[3, 2]).unwrap();
        assert_eq!(resolved, vec![vec![0], vec![0, 1]]);
    }

    #[test]
    fn test_too_many_axes_rejected() {
        let slice = DataSlice::new(vec![AxisSlice::Full, AxisSlice::Full]);
        assert!(slice.resolve(&[3]).is_err());
    }

    #[test]
    fn test_with_axis_pads() {
        let slice = DataSlice::all().with_axis(2, AxisSlice::Index(0));
        assert_eq!(slice.len(), 3);
        assert_eq!(slice.axis(0), AxisSlice::Full);
        assert_eq!(slice.dropped_axes(), vec![2]);
    }
}
