use std::sync::Arc;
use std::time::{Duration, Instant};

use bubble_space::bubble::{BubbleId, BubbleRecord};
use bubble_space::store::ContentProvider;
use eframe::egui::{self, Align, Context, Layout, Sense, Ui};

use super::super::listener::HostEvent;
use super::super::render_utils::{draw_background, paint_display_list};
use super::super::surface::EguiSurface;
use super::super::ViewModel;

impl ViewModel {
    const SEARCH_LIMIT: usize = 50;
    const HIGHLIGHT_TIME: Duration = Duration::from_millis(1200);

    pub(in crate::app) fn show(&mut self, ctx: &Context) {
        self.update_fps_counter(ctx);
        self.drain_host_events();
        let fps_text = self.fps_display_text();

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("bubble-space");
                    ui.separator();
                    let (visible, connections) = {
                        let graph = self.space.simulation().graph();
                        let graph = graph.read();
                        (graph.len(), graph.connections().len())
                    };
                    ui.label(format!("visible: {visible}"));
                    ui.label(format!("connections: {connections}"));
                    if let Some(path) = self.store.path() {
                        ui.label(format!("store: {}", path.display()));
                    }
                    if ui.button("Save").clicked() {
                        self.status = match self.space.simulation().persist_all() {
                            Ok(saved) => format!("saved {saved} bubbles"),
                            Err(error) => format!("save failed: {error:#}"),
                        };
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(fps_text);
                    });
                });
            });

        egui::TopBottomPanel::bottom("status")
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(self.status.as_str());
            });

        egui::SidePanel::left("search")
            .resizable(true)
            .default_width(280.0)
            .show(ctx, |ui| self.draw_search(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_canvas(ui));

        self.draw_details_window(ctx);
    }

    fn drain_host_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                HostEvent::EmptyClick(_) => self.details = None,
                HostEvent::DoubleTap(id) => {
                    self.details = Some(id);
                    self.status = format!("opened {}", self.title_of(id));
                }
                HostEvent::LongPress(id) => {
                    self.details = Some(id);
                    self.status = format!("long press on {}", self.title_of(id));
                }
                HostEvent::Haptic(id) => self.highlighted = Some((id, Instant::now())),
                HostEvent::Expanded { parent, added } => {
                    self.status = format!("expanded {} (+{added})", self.title_of(parent));
                }
                HostEvent::Collapsed { parent, removed } => {
                    self.status = format!("collapsed {} (-{removed})", self.title_of(parent));
                }
                HostEvent::Removed(id) => {
                    if self.details == Some(id) {
                        self.details = None;
                    }
                }
            }
        }
    }

    pub(in crate::app) fn title_of(&self, id: BubbleId) -> String {
        let graph = self.space.simulation().graph();
        let graph = graph.read();
        graph
            .get(id)
            .map(|bubble| bubble.content.title.clone())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| format!("#{id}"))
    }

    fn draw_search(&mut self, ui: &mut Ui) {
        ui.heading("Search");
        ui.add_space(4.0);
        if ui.text_edit_singleline(&mut self.search).changed() {
            self.refresh_search();
        }
        ui.small("Matches title, contents and context. Click a hit to show it.");
        ui.separator();

        let mut picked: Option<BubbleRecord> = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            let graph = self.space.simulation().graph();
            let graph = graph.read();
            for record in &self.search_hits {
                let visible = graph.contains(record.id);
                let label = if record.title.is_empty() {
                    format!("#{}", record.id)
                } else {
                    record.title.clone()
                };
                if ui.selectable_label(visible, label).clicked() && !visible {
                    picked = Some(record.clone());
                }
            }
        });

        if let Some(record) = picked {
            self.status = if self.space.simulation().show(&record) {
                format!("showing {}", record.title)
            } else {
                format!("could not show {}", record.title)
            };
        }
    }

    fn refresh_search(&mut self) {
        let query = self.search.trim();
        if query.is_empty() {
            self.search_hits.clear();
            return;
        }
        match self.store.search(query) {
            Ok(hits) => {
                self.search_hits = hits.into_iter().take(Self::SEARCH_LIMIT).collect();
            }
            Err(error) => self.status = format!("search failed: {error:#}"),
        }
    }

    fn draw_canvas(&mut self, ui: &mut Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let rect = response.rect;

        if !self.attached {
            let surface = EguiSurface::new(ui.ctx().clone(), Arc::clone(&self.display));
            if let Err(error) = self.space.attach_surface(surface, rect.width(), rect.height()) {
                self.status = format!("render worker failed: {error:#}");
            }
            self.attached = true;
        }
        self.surface_origin = rect.min;

        self.forward_pointer_events(ui, rect);

        if let Some((_, since)) = self.highlighted
            && since.elapsed() > Self::HIGHLIGHT_TIME
        {
            self.highlighted = None;
        }

        draw_background(&painter, rect);
        let highlighted = self.highlighted.map(|(id, _)| id);
        paint_display_list(&painter, self.surface_origin, &self.display.lock(), highlighted);
    }
}
