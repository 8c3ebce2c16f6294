use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Instant;

use anyhow::{Context as _, Result};
use bubble_space::bubble::{BubbleId, BubbleRecord};
use bubble_space::config::EngineConfig;
use bubble_space::engine::{BubbleSpace, DisplayList};
use bubble_space::store::JsonStore;
use crossbeam_channel::Receiver as EventReceiver;
use eframe::egui::{self, Context, Pos2};
use parking_lot::Mutex;
use tracing::{info, warn};

mod input;
mod listener;
mod render_utils;
mod surface;
mod ui;

use listener::{HostEvent, HostListener};

#[derive(Clone, Debug)]
pub struct Launch {
    pub store_path: PathBuf,
    pub import_path: Option<PathBuf>,
    pub min_priority: i32,
    pub seed: Option<u64>,
    pub config: EngineConfig,
}

pub struct BubbleSpaceApp {
    launch: Launch,
    state: AppState,
}

enum AppState {
    Loading {
        rx: Receiver<Result<Arc<JsonStore>, String>>,
    },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    space: BubbleSpace,
    store: Arc<JsonStore>,
    display: Arc<Mutex<DisplayList>>,
    events: EventReceiver<HostEvent>,
    surface_origin: Pos2,
    attached: bool,
    touch_seen: bool,
    mouse_down: bool,
    search: String,
    search_hits: Vec<BubbleRecord>,
    status: String,
    details: Option<BubbleId>,
    highlighted: Option<(BubbleId, Instant)>,
    fps_current: f32,
    fps_samples: VecDeque<f32>,
}

impl BubbleSpaceApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, launch: Launch) -> Self {
        let state = Self::start_load(&launch);
        Self { launch, state }
    }

    fn start_load(launch: &Launch) -> AppState {
        let (tx, rx) = mpsc::channel();
        let store_path = launch.store_path.clone();
        let import_path = launch.import_path.clone();

        thread::spawn(move || {
            let result = open_store(store_path, import_path)
                .map(Arc::new)
                .map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        AppState::Loading { rx }
    }
}

fn open_store(store_path: PathBuf, import_path: Option<PathBuf>) -> Result<JsonStore> {
    let store = JsonStore::open(store_path)?;
    if let Some(path) = import_path {
        store.import_cms_file(&path)?;
    }
    info!(rows = store.len(), "bubble store ready");
    Ok(store)
}

impl eframe::App for BubbleSpaceApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                if let Ok(result) = rx.try_recv() {
                    transition = Some(match result.and_then(|store| {
                        ViewModel::new(ctx, store, &self.launch).map_err(|error| format!("{error:#}"))
                    }) {
                        Ok(model) => AppState::Ready(Box::new(model)),
                        Err(error) => AppState::Error(error),
                    });
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Opening bubble store...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to open bubble store");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(&self.launch));
                    }
                });
            }
            AppState::Ready(model) => model.show(ctx),
        }

        if let Some(next_state) = transition {
            self.state = next_state;
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let AppState::Ready(model) = &self.state {
            match model.space.shutdown() {
                Ok(saved) => info!(saved, "saved visible bubbles"),
                Err(error) => warn!(error = %format!("{error:#}"), "failed to save visible bubbles"),
            }
        }
    }
}

impl ViewModel {
    fn new(ctx: &Context, store: Arc<JsonStore>, launch: &Launch) -> Result<Self> {
        let (listener, events) = HostListener::new(ctx.clone());
        let listener = Arc::new(listener);

        let space = BubbleSpace::new(launch.config.clone(), store.clone(), store.clone(), launch.seed)?
            .with_listener(listener.clone())
            .with_feedback(listener);
        let shown = space
            .simulation()
            .load_top_level(launch.min_priority)
            .context("failed to load top-level bubbles")?;

        Ok(Self {
            space,
            store,
            display: Arc::new(Mutex::new(DisplayList::default())),
            events,
            surface_origin: Pos2::ZERO,
            attached: false,
            touch_seen: false,
            mouse_down: false,
            search: String::new(),
            search_hits: Vec::new(),
            status: format!("{} bubbles loaded", shown.len()),
            details: None,
            highlighted: None,
            fps_current: 0.0,
            fps_samples: VecDeque::new(),
        })
    }
}
