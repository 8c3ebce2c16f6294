use bubble_space::bubble::BubbleId;
use bubble_space::engine::{Feedback, SpaceListener};
use crossbeam_channel::{Receiver, Sender, unbounded};
use eframe::egui::{Context, Pos2};

/// Engine notifications forwarded to the UI thread.
#[derive(Clone, Debug, PartialEq)]
pub(super) enum HostEvent {
    EmptyClick(Pos2),
    DoubleTap(BubbleId),
    LongPress(BubbleId),
    Expanded { parent: BubbleId, added: usize },
    Collapsed { parent: BubbleId, removed: usize },
    Haptic(BubbleId),
    Removed(BubbleId),
}

pub(super) struct HostListener {
    ctx: Context,
    tx: Sender<HostEvent>,
}

impl HostListener {
    pub(super) fn new(ctx: Context) -> (Self, Receiver<HostEvent>) {
        let (tx, rx) = unbounded();
        (Self { ctx, tx }, rx)
    }

    fn send(&self, event: HostEvent) {
        if self.tx.send(event).is_ok() {
            self.ctx.request_repaint();
        }
    }
}

impl SpaceListener for HostListener {
    fn on_empty_click(&self, at: Pos2) {
        self.send(HostEvent::EmptyClick(at));
    }

    fn on_double_tap(&self, id: BubbleId) {
        self.send(HostEvent::DoubleTap(id));
    }

    fn on_long_press(&self, id: BubbleId) {
        self.send(HostEvent::LongPress(id));
    }

    fn on_node_expanded(&self, parent: BubbleId, added: &[BubbleId]) {
        self.send(HostEvent::Expanded {
            parent,
            added: added.len(),
        });
    }

    fn on_node_collapsed(&self, parent: BubbleId, removed: &[BubbleId]) {
        self.send(HostEvent::Collapsed {
            parent,
            removed: removed.len(),
        });
    }
}

impl Feedback for HostListener {
    fn long_press_detected(&self, id: BubbleId) {
        self.send(HostEvent::Haptic(id));
    }

    fn node_removed(&self, id: BubbleId) {
        self.send(HostEvent::Removed(id));
    }
}
