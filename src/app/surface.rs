use std::sync::Arc;

use anyhow::Result;
use bubble_space::engine::{DisplayList, Surface};
use eframe::egui::Context;
use parking_lot::Mutex;

/// Render-thread side of the window: each finished frame replaces the shared
/// display list, which the UI thread paints on its next pass.
pub(super) struct EguiSurface {
    ctx: Context,
    shared: Arc<Mutex<DisplayList>>,
}

impl EguiSurface {
    pub(super) fn new(ctx: Context, shared: Arc<Mutex<DisplayList>>) -> Self {
        Self { ctx, shared }
    }
}

impl Surface for EguiSurface {
    type Canvas = DisplayList;

    fn lock_canvas(&mut self) -> Result<DisplayList> {
        Ok(DisplayList::default())
    }

    fn unlock_and_post(&mut self, canvas: DisplayList) {
        *self.shared.lock() = canvas;
        self.ctx.request_repaint();
    }
}
