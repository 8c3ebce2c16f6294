use bubble_space::engine::Toggle;
use eframe::egui::{self, Context, RichText};

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn draw_details_window(&mut self, ctx: &Context) {
        let Some(selected_id) = self.details else {
            return;
        };

        let snapshot = {
            let graph = self.space.simulation().graph();
            let graph = graph.read();
            graph.get(selected_id).map(|bubble| {
                (
                    bubble.content.clone(),
                    bubble.center(),
                    bubble.radius(),
                    bubble.links().to_vec(),
                    graph.has_children_visible(selected_id),
                )
            })
        };
        let Some((content, center, radius, links, expanded)) = snapshot else {
            self.details = None;
            return;
        };

        let mut open = true;
        let mut toggle = false;
        egui::Window::new(RichText::new(self.title_of(selected_id)).strong())
            .id(egui::Id::new("bubble_details"))
            .open(&mut open)
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| {
                if !content.contents.is_empty() {
                    ui.label(content.contents.as_str());
                    ui.separator();
                }
                ui.label(format!("id: {selected_id}"));
                if !content.kind.is_empty() {
                    ui.label(format!("type: {}", content.kind));
                }
                if !content.style.is_empty() {
                    ui.label(format!("style: {}", content.style));
                }
                ui.label(format!("priority: {}", content.priority));
                ui.label(format!(
                    "position: ({:.0}, {:.0}), radius {:.0}",
                    center.x, center.y, radius
                ));
                if !content.contexts.is_empty() {
                    let contexts = content.contexts.iter().cloned().collect::<Vec<_>>();
                    ui.label(format!("context: {}", contexts.join(", ")));
                }
                if !content.debug_id.is_empty() {
                    ui.small(format!("debug id: {}", content.debug_id));
                }

                ui.separator();
                ui.label(format!("links: {}", links.len()));
                let label = if expanded { "Collapse" } else { "Expand" };
                if ui
                    .add_enabled(!links.is_empty(), egui::Button::new(label))
                    .clicked()
                {
                    toggle = true;
                }
            });

        if toggle {
            self.status = match self.space.simulation().toggle(selected_id) {
                Ok(Toggle::Expanded(added)) => format!("expanded (+{})", added.len()),
                Ok(Toggle::Collapsed(removed)) => format!("collapsed (-{})", removed.len()),
                Err(error) => format!("toggle failed: {error:#}"),
            };
        }
        if !open {
            self.details = None;
        }
    }
}
