use std::sync::Arc;

use anyhow::Result;
use eframe::egui::Pos2;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bubble::BubbleId;
use crate::config::EngineConfig;
use crate::store::{BubbleStore, ContentProvider};

use super::gesture::{GestureConfig, GestureEvent, GestureMachine, PointerEvent};
use super::render::{RenderWorker, Surface};
use super::simulation::{Simulation, Toggle};
use super::watchdog::MaintenanceWorker;

/// Notifications for the host. Every method defaults to doing nothing.
pub trait SpaceListener: Send + Sync {
    fn on_empty_click(&self, _at: Pos2) {}
    fn on_single_tap(&self, _id: BubbleId) {}
    fn on_double_tap(&self, _id: BubbleId) {}
    fn on_long_press(&self, _id: BubbleId) {}
    fn on_node_expanded(&self, _parent: BubbleId, _added: &[BubbleId]) {}
    fn on_node_collapsed(&self, _parent: BubbleId, _removed: &[BubbleId]) {}
}

/// Fire-and-forget haptic/visual feedback.
pub trait Feedback: Send + Sync {
    fn long_press_detected(&self, _id: BubbleId) {}
    fn node_removed(&self, _id: BubbleId) {}
}

pub struct Silent;

impl SpaceListener for Silent {}
impl Feedback for Silent {}

/// One interactive session: simulation, gestures, and the render and
/// maintenance workers tied to the current surface.
pub struct BubbleSpace {
    simulation: Simulation,
    gestures: Arc<Mutex<GestureMachine>>,
    listener: Arc<dyn SpaceListener>,
    feedback: Arc<dyn Feedback>,
    render: Mutex<Option<RenderWorker>>,
    maintenance: Mutex<Option<MaintenanceWorker>>,
}

impl BubbleSpace {
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn ContentProvider>,
        store: Arc<dyn BubbleStore>,
        seed: Option<u64>,
    ) -> Result<Self> {
        let gestures = GestureMachine::new(GestureConfig::from(&config));
        Ok(Self {
            simulation: Simulation::new(config, provider, store, seed)?,
            gestures: Arc::new(Mutex::new(gestures)),
            listener: Arc::new(Silent),
            feedback: Arc::new(Silent),
            render: Mutex::new(None),
            maintenance: Mutex::new(None),
        })
    }

    pub fn with_listener(mut self, listener: Arc<dyn SpaceListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_feedback(mut self, feedback: Arc<dyn Feedback>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn active_pointers(&self) -> usize {
        self.gestures.lock().active_pointers()
    }

    /// Feeds one pointer event through the gesture machine and acts on what it recognizes.
    pub fn handle_pointer(&self, event: PointerEvent) -> Vec<GestureEvent> {
        let events = {
            let mut gestures = self.gestures.lock();
            let graph = self.simulation.graph();
            let mut graph = graph.write();
            gestures.handle(event, &mut *graph)
        };

        if let Some(maintenance) = self.maintenance.lock().as_ref()
            && let Err(error) = maintenance.touch()
        {
            warn!(error = %format!("{error:#}"), "maintenance worker did not restart");
        }

        for gesture in &events {
            self.dispatch(*gesture);
        }
        events
    }

    fn dispatch(&self, gesture: GestureEvent) {
        match gesture {
            GestureEvent::EmptyClick(at) => self.listener.on_empty_click(at),
            GestureEvent::Dragged(id) | GestureEvent::Zoomed { bubble: id, .. } => {
                self.simulation.post_cascade(id);
            }
            GestureEvent::SingleTap(id) => {
                self.listener.on_single_tap(id);
                self.toggle(id);
            }
            GestureEvent::DoubleTap(id) => self.listener.on_double_tap(id),
            GestureEvent::LongPress(id) => {
                self.feedback.long_press_detected(id);
                self.listener.on_long_press(id);
            }
            GestureEvent::AllReleased => {
                self.simulation.post_settle_all();
            }
            GestureEvent::Grabbed(_) | GestureEvent::Released(_) => {}
        }
    }

    fn toggle(&self, id: BubbleId) {
        match self.simulation.toggle(id) {
            Ok(Toggle::Expanded(added)) => {
                if !added.is_empty() {
                    self.listener.on_node_expanded(id, &added);
                }
            }
            Ok(Toggle::Collapsed(removed)) => {
                for &child in &removed {
                    self.feedback.node_removed(child);
                }
                if !removed.is_empty() {
                    self.listener.on_node_collapsed(id, &removed);
                }
            }
            Err(error) => warn!(id, error = %format!("{error:#}"), "toggle failed"),
        }
    }

    /// Fixes the bounds on first attach and starts both workers for `surface`.
    pub fn attach_surface<S: Surface>(&self, surface: S, width: f32, height: f32) -> Result<()> {
        if let Err(error) = self.simulation.set_bounds(width, height) {
            warn!(width, height, %error, "keeping existing bounds");
        }
        self.release_surface();

        let interval = self.simulation.config().frame_interval();
        let worker = RenderWorker::start(surface, self.simulation.graph(), interval)?;
        *self.render.lock() = Some(worker);

        let config = self.simulation.config();
        let gestures = Arc::clone(&self.gestures);
        let listener = Arc::clone(&self.listener);
        let feedback = Arc::clone(&self.feedback);
        let maintenance = MaintenanceWorker::new(
            config.maintenance_pulse(),
            config.idle_timeout(),
            move |now| {
                let (fired, active) = {
                    let mut gestures = gestures.lock();
                    (gestures.poll(now), gestures.active_pointers())
                };
                if let Some(GestureEvent::LongPress(id)) = fired {
                    feedback.long_press_detected(id);
                    listener.on_long_press(id);
                }
                active > 0
            },
        );
        maintenance.touch()?;
        *self.maintenance.lock() = Some(maintenance);
        debug!(width, height, "surface attached");
        Ok(())
    }

    /// Stops both workers and waits for them; nothing is drawn afterwards.
    pub fn release_surface(&self) {
        if let Some(mut render) = self.render.lock().take() {
            render.stop();
        }
        if let Some(maintenance) = self.maintenance.lock().take() {
            maintenance.stop();
        }
    }

    pub fn is_rendering(&self) -> bool {
        self.render
            .lock()
            .as_ref()
            .is_some_and(RenderWorker::is_running)
    }

    pub fn frames_drawn(&self) -> u64 {
        self.render
            .lock()
            .as_ref()
            .map_or(0, RenderWorker::frames_drawn)
    }

    /// Stops the workers, drains queued work, and upserts every visible bubble.
    pub fn shutdown(&self) -> Result<usize> {
        self.release_surface();
        self.simulation.flush();
        let persisted = self.simulation.persist_all();
        self.simulation.shutdown();
        persisted
    }
}

impl Drop for BubbleSpace {
    fn drop(&mut self) {
        self.release_surface();
    }
}
