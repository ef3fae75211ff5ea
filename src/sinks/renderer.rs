use crate::core::DisplayPoint;
use crate::visualization::Viewport;
use log::debug;
use std::sync::{Arc, Mutex};

/// Display collaborator driven by the display consumer.
///
/// Called once per tick that produced new points; must return quickly.
pub trait Renderer: Send {
    fn render(&mut self, appended: &[DisplayPoint], viewport: Viewport);
}

/// Renderer that only logs what it would draw
#[derive(Debug, Default)]
pub struct LogRenderer {
    frames: u64,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for LogRenderer {
    fn render(&mut self, appended: &[DisplayPoint], viewport: Viewport) {
        self.frames += 1;
        debug!(
            "render frame {}: +{} points, showing [{}..={}]",
            self.frames,
            appended.len(),
            viewport.first_visible(),
            viewport.latest_index
        );
    }
}

/// One `render` call as seen by [`RecordingRenderer`]
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    pub points: Vec<DisplayPoint>,
    pub viewport: Viewport,
}

/// Keeps every render call in memory. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    frames: Arc<Mutex<Vec<RenderedFrame>>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<RenderedFrame> {
        self.frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// All points rendered so far, in order
    pub fn points(&self) -> Vec<DisplayPoint> {
        self.frames()
            .into_iter()
            .flat_map(|frame| frame.points)
            .collect()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, appended: &[DisplayPoint], viewport: Viewport) {
        self.frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RenderedFrame {
                points: appended.to_vec(),
                viewport,
            });
    }
}
