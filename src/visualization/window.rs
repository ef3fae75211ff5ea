use anyhow::{bail, Result};

use crate::core::{DisplayPoint, Sample};
use std::collections::VecDeque;

/// Upper bound on points appended per display tick
pub const MAX_POINTS_PER_TICK: usize = 50;

/// Stride used to thin a drained batch: `max(1, len / 50)`
pub fn downsample_factor(batch_len: usize) -> usize {
    (batch_len / MAX_POINTS_PER_TICK).max(1)
}

/// Visible range handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub window_size: usize,
    /// Index of the newest point
    pub latest_index: u64,
}

impl Viewport {
    /// First index kept in view
    pub fn first_visible(&self) -> u64 {
        (self.latest_index + 1).saturating_sub(self.window_size as u64)
    }
}

/// Sliding window over the downsampled display series.
///
/// Indices keep counting across the whole run; only the newest
/// `window_size` points are retained.
#[derive(Debug, Clone)]
pub struct DisplayWindow {
    points: VecDeque<DisplayPoint>,
    window_size: usize,
    next_index: u64,
}

impl DisplayWindow {
    pub fn new(window_size: usize) -> Result<Self> {
        if window_size == 0 {
            bail!("Display window size must be >= 1");
        }
        Ok(Self {
            points: VecDeque::with_capacity(window_size),
            window_size,
            next_index: 0,
        })
    }

    /// Downsample a drained batch and append it. Returns the appended points.
    pub fn append_batch(&mut self, batch: &[Sample]) -> Vec<DisplayPoint> {
        if batch.is_empty() {
            return Vec::new();
        }

        let factor = downsample_factor(batch.len());
        let mut appended = Vec::with_capacity(batch.len().div_ceil(factor));

        for (idx, value) in batch.iter().enumerate() {
            if idx % factor == 0 {
                let point = DisplayPoint::new(self.next_index, *value);
                self.next_index += 1;
                self.push(point);
                appended.push(point);
            }
        }

        appended
    }

    fn push(&mut self, point: DisplayPoint) {
        if self.points.len() == self.window_size {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// `None` until the first point has been appended
    pub fn viewport(&self) -> Option<Viewport> {
        self.next_index.checked_sub(1).map(|latest_index| Viewport {
            window_size: self.window_size,
            latest_index,
        })
    }

    pub fn visible(&self) -> impl Iterator<Item = &DisplayPoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total points appended since creation
    pub fn total_appended(&self) -> u64 {
        self.next_index
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor() {
        assert_eq!(downsample_factor(0), 1);
        assert_eq!(downsample_factor(49), 1);
        assert_eq!(downsample_factor(50), 1);
        assert_eq!(downsample_factor(100), 2);
        assert_eq!(downsample_factor(149), 2);
        assert_eq!(downsample_factor(1000), 20);
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(DisplayWindow::new(0).is_err());
        assert_eq!(DisplayWindow::new(1).unwrap().window_size(), 1);
    }

    #[test]
    fn test_viewport_first_visible() {
        let vp = Viewport {
            window_size: 200,
            latest_index: 59,
        };
        assert_eq!(vp.first_visible(), 0);

        let vp = Viewport {
            window_size: 200,
            latest_index: 499,
        };
        assert_eq!(vp.first_visible(), 300);
    }
}
