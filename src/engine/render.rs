use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use eframe::egui::Pos2;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::bubble::{BubbleId, Movement};

use super::graph::{Connection, GraphIndex};

/// Drawing target for one frame.
pub trait Canvas {
    fn clear(&mut self) -> Result<()>;
    fn connection(&mut self, connection: &Connection) -> Result<()>;
    fn bubble(&mut self, sprite: &Sprite) -> Result<()>;
}

/// Something that hands out a canvas per frame and takes it back when the frame is done.
pub trait Surface: Send + 'static {
    type Canvas: Canvas;

    fn lock_canvas(&mut self) -> Result<Self::Canvas>;
    fn unlock_and_post(&mut self, canvas: Self::Canvas);
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sprite {
    pub id: BubbleId,
    pub center: Pos2,
    pub radius: f32,
    pub title: String,
    pub style: String,
    pub movement: Movement,
}

/// Everything needed to draw one frame, copied out of the graph under its read lock.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    pub sprites: Vec<Sprite>,
    pub connections: Vec<Connection>,
}

impl Frame {
    pub fn capture(index: &GraphIndex) -> Self {
        let sprites = index
            .bubbles()
            .iter()
            .map(|bubble| Sprite {
                id: bubble.id(),
                center: bubble.center(),
                radius: bubble.radius(),
                title: bubble.content.title.clone(),
                style: bubble.content.style.clone(),
                movement: bubble.movement,
            })
            .collect();
        Self {
            sprites,
            connections: index.connections(),
        }
    }

    /// Connections first, then bubbles back to front.
    pub fn draw(&self, canvas: &mut impl Canvas) -> Result<()> {
        canvas.clear()?;
        for connection in &self.connections {
            canvas.connection(connection)?;
        }
        for sprite in &self.sprites {
            canvas.bubble(sprite)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Clear,
    Connection(Connection),
    Bubble(Sprite),
}

/// Canvas that records commands for a host to replay later.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayList {
    pub commands: Vec<DrawCommand>,
}

impl Canvas for DisplayList {
    fn clear(&mut self) -> Result<()> {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear);
        Ok(())
    }

    fn connection(&mut self, connection: &Connection) -> Result<()> {
        self.commands.push(DrawCommand::Connection(*connection));
        Ok(())
    }

    fn bubble(&mut self, sprite: &Sprite) -> Result<()> {
        self.commands.push(DrawCommand::Bubble(sprite.clone()));
        Ok(())
    }
}

struct CanvasGuard<'a, S: Surface> {
    surface: &'a mut S,
    canvas: Option<S::Canvas>,
}

impl<'a, S: Surface> CanvasGuard<'a, S> {
    fn lock(surface: &'a mut S) -> Result<Self> {
        let canvas = surface.lock_canvas().context("failed to lock canvas")?;
        Ok(Self {
            surface,
            canvas: Some(canvas),
        })
    }
}

impl<S: Surface> Drop for CanvasGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(canvas) = self.canvas.take() {
            self.surface.unlock_and_post(canvas);
        }
    }
}

/// Locks a canvas, draws `frame`, and posts the canvas back whether or not drawing succeeded.
pub fn draw_frame<S: Surface>(surface: &mut S, frame: &Frame) -> Result<()> {
    let mut guard = CanvasGuard::lock(surface)?;
    if let Some(canvas) = guard.canvas.as_mut() {
        frame.draw(canvas).context("failed to draw frame")?;
    }
    Ok(())
}

/// Background thread drawing snapshots of the visible graph at most once per
/// `frame_interval`.
pub struct RenderWorker {
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl RenderWorker {
    pub fn start<S: Surface>(
        mut surface: S,
        graph: Arc<RwLock<GraphIndex>>,
        frame_interval: Duration,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let frames = Arc::new(AtomicU64::new(0));

        let thread_running = Arc::clone(&running);
        let thread_frames = Arc::clone(&frames);
        let handle = thread::Builder::new()
            .name("bubble-render".to_owned())
            .spawn(move || {
                let mut last_frame: Option<Instant> = None;
                while thread_running.load(Ordering::Acquire) {
                    if let Some(last) = last_frame {
                        let elapsed = last.elapsed();
                        if elapsed < frame_interval {
                            thread::sleep(frame_interval - elapsed);
                            continue;
                        }
                    }
                    last_frame = Some(Instant::now());

                    let frame = Frame::capture(&graph.read());
                    match draw_frame(&mut surface, &frame) {
                        Ok(()) => {
                            let drawn = thread_frames.fetch_add(1, Ordering::Relaxed) + 1;
                            trace!(frame = drawn, sprites = frame.sprites.len(), "frame drawn");
                        }
                        Err(error) => warn!(error = %format!("{error:#}"), "skipping frame"),
                    }
                }
                debug!("render worker stopped");
            })
            .context("failed to spawn render thread")?;

        Ok(Self {
            running,
            frames,
            handle: Some(handle),
        })
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Returns once the render thread has exited; no draw happens afterwards.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("render thread panicked");
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
