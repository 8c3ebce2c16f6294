use std::time::Instant;

use bubble_space::engine::{PointerEvent, PointerId, PointerPhase};
use eframe::egui::{self, Pos2, Rect, TouchPhase, Ui};

use super::ViewModel;

const MOUSE_POINTER: PointerId = 0;

impl ViewModel {
    /// Translates this frame's raw mouse and touch events into engine pointer
    /// events in surface coordinates. Once a touch has been seen, mouse events
    /// are ignored since the platform also synthesizes them from touches.
    pub(in crate::app) fn forward_pointer_events(&mut self, ui: &Ui, rect: Rect) {
        let events = ui.input(|input| input.events.clone());
        let now = Instant::now();

        for event in events {
            let translated = match event {
                egui::Event::Touch { id, phase, pos, .. } => {
                    self.touch_seen = true;
                    let phase = match phase {
                        TouchPhase::Start => PointerPhase::Down,
                        TouchPhase::Move => PointerPhase::Move,
                        TouchPhase::End => PointerPhase::Up,
                        TouchPhase::Cancel => PointerPhase::Cancel,
                    };
                    self.pointer_event(id.0.wrapping_add(1), phase, pos, rect, now)
                }
                egui::Event::PointerButton {
                    pos,
                    button: egui::PointerButton::Primary,
                    pressed,
                    ..
                } if !self.touch_seen => {
                    if pressed && !rect.contains(pos) {
                        continue;
                    }
                    if !pressed && !self.mouse_down {
                        continue;
                    }
                    self.mouse_down = pressed;
                    let phase = if pressed {
                        PointerPhase::Down
                    } else {
                        PointerPhase::Up
                    };
                    self.pointer_event(MOUSE_POINTER, phase, pos, rect, now)
                }
                egui::Event::PointerMoved(pos) if !self.touch_seen && self.mouse_down => {
                    self.pointer_event(MOUSE_POINTER, PointerPhase::Move, pos, rect, now)
                }
                egui::Event::PointerGone if !self.touch_seen && self.mouse_down => {
                    self.mouse_down = false;
                    self.pointer_event(MOUSE_POINTER, PointerPhase::Cancel, rect.min, rect, now)
                }
                _ => None,
            };

            if let Some(pointer_event) = translated {
                self.space.handle_pointer(pointer_event);
            }
        }
    }

    fn pointer_event(
        &self,
        pointer: PointerId,
        phase: PointerPhase,
        pos: Pos2,
        rect: Rect,
        at: Instant,
    ) -> Option<PointerEvent> {
        if phase == PointerPhase::Down && !rect.contains(pos) {
            return None;
        }
        let local = (pos - rect.min).to_pos2();
        Some(PointerEvent::new(pointer, phase, local, at))
    }
}
