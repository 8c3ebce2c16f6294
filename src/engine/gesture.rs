use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use eframe::egui::{Pos2, Vec2};

use crate::bubble::{BubbleId, Movement};
use crate::config::EngineConfig;

use super::graph::GraphIndex;

pub type PointerId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub pointer: PointerId,
    pub phase: PointerPhase,
    pub position: Pos2,
    pub at: Instant,
}

impl PointerEvent {
    pub fn new(pointer: PointerId, phase: PointerPhase, position: Pos2, at: Instant) -> Self {
        Self {
            pointer,
            phase,
            position,
            at,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureEvent {
    EmptyClick(Pos2),
    Grabbed(BubbleId),
    Dragged(BubbleId),
    Zoomed { bubble: BubbleId, ratio: f32 },
    SingleTap(BubbleId),
    DoubleTap(BubbleId),
    LongPress(BubbleId),
    Released(BubbleId),
    AllReleased,
}

/// What the gesture machine needs from the thing being touched.
/// Every lookup answers `None` for ids that are no longer present.
pub trait TouchTarget {
    fn hit_test(&self, point: Pos2) -> Option<BubbleId>;
    /// Marks the bubble as held, resets its travel, and returns its center.
    fn grab(&mut self, id: BubbleId) -> Option<Pos2>;
    /// Moves a held bubble and returns its travel since it was grabbed.
    fn drag(&mut self, id: BubbleId, center: Pos2) -> Option<f32>;
    /// Lets go of a bubble and returns its travel since it was grabbed.
    fn release(&mut self, id: BubbleId) -> Option<f32>;
    fn zoom(&mut self, id: BubbleId, ratio: f32);
    fn end_zoom(&mut self, id: BubbleId, min_radius: f32, max_radius: f32);
}

impl TouchTarget for GraphIndex {
    fn hit_test(&self, point: Pos2) -> Option<BubbleId> {
        GraphIndex::hit_test(self, point)
    }

    fn grab(&mut self, id: BubbleId) -> Option<Pos2> {
        let bubble = self.get_mut(id)?;
        bubble.movement = Movement::Moving;
        bubble.moved = 0.0;
        Some(bubble.center())
    }

    fn drag(&mut self, id: BubbleId, center: Pos2) -> Option<f32> {
        let bubble = self.get_mut(id)?;
        bubble.drag_to(center);
        Some(bubble.moved)
    }

    fn release(&mut self, id: BubbleId) -> Option<f32> {
        let bubble = self.get_mut(id)?;
        bubble.movement = Movement::Inert;
        Some(bubble.moved)
    }

    fn zoom(&mut self, id: BubbleId, ratio: f32) {
        if let Some(bubble) = self.get_mut(id) {
            bubble.zoom(ratio);
        }
    }

    fn end_zoom(&mut self, id: BubbleId, min_radius: f32, max_radius: f32) {
        if let Some(bubble) = self.get_mut(id) {
            bubble.end_zoom(min_radius, max_radius);
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GestureConfig {
    pub double_tap: bool,
    pub double_tap_interval: Duration,
    pub long_press_delay: Duration,
    pub movement_threshold: f32,
    pub min_radius: f32,
    pub max_radius: f32,
}

impl From<&EngineConfig> for GestureConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            double_tap: config.double_tap,
            double_tap_interval: config.double_tap_interval(),
            long_press_delay: config.long_press_delay(),
            movement_threshold: config.movement_threshold,
            min_radius: config.min_radius,
            max_radius: config.max_radius,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Capture {
    bubble: BubbleId,
    offset: Vec2,
}

#[derive(Clone, Copy, Debug)]
struct PointerSession {
    position: Pos2,
    capture: Option<Capture>,
}

#[derive(Clone, Copy, Debug)]
struct TapCandidate {
    bubble: BubbleId,
    at: Instant,
}

#[derive(Clone, Copy, Debug)]
struct PendingLongPress {
    pointer: PointerId,
    bubble: BubbleId,
    started: Instant,
}

/// Per-pointer touch tracking. Pointers move through
/// `Down -> Move* -> Up`, independently of each other.
#[derive(Debug)]
pub struct GestureMachine {
    config: GestureConfig,
    pointers: BTreeMap<PointerId, PointerSession>,
    first_touched: Option<BubbleId>,
    pinch_baseline_sq: Option<f32>,
    pinched: bool,
    tap_candidate: Option<TapCandidate>,
    long_press: Option<PendingLongPress>,
}

impl GestureMachine {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            pointers: BTreeMap::new(),
            first_touched: None,
            pinch_baseline_sq: None,
            pinched: false,
            tap_candidate: None,
            long_press: None,
        }
    }

    pub fn active_pointers(&self) -> usize {
        self.pointers.len()
    }

    pub fn first_touched(&self) -> Option<BubbleId> {
        self.first_touched
    }

    pub fn captured(&self, pointer: PointerId) -> Option<BubbleId> {
        self.pointers
            .get(&pointer)
            .and_then(|session| session.capture)
            .map(|capture| capture.bubble)
    }

    pub fn handle(
        &mut self,
        event: PointerEvent,
        target: &mut impl TouchTarget,
    ) -> Vec<GestureEvent> {
        let mut events = Vec::new();
        match event.phase {
            PointerPhase::Down => self.pointer_down(event, target, &mut events),
            PointerPhase::Move => self.pointer_move(event, target, &mut events),
            PointerPhase::Up => self.pointer_up(event.pointer, true, target, &mut events),
            PointerPhase::Cancel => self.pointer_up(event.pointer, false, target, &mut events),
        }
        events
    }

    /// Fires a pending long-press once its delay has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<GestureEvent> {
        let pending = self.long_press?;
        if now.duration_since(pending.started) < self.config.long_press_delay {
            return None;
        }
        self.long_press = None;
        Some(GestureEvent::LongPress(pending.bubble))
    }

    fn pointer_down(
        &mut self,
        event: PointerEvent,
        target: &mut impl TouchTarget,
        events: &mut Vec<GestureEvent>,
    ) {
        self.long_press = None;

        if let Some(stale) = self.pointers.remove(&event.pointer)
            && let Some(capture) = stale.capture
        {
            target.release(capture.bubble);
        }

        let already_active = self.pointers.len();
        self.pointers.insert(
            event.pointer,
            PointerSession {
                position: event.position,
                capture: None,
            },
        );

        if self.pointers.len() == 2 {
            self.pinch_baseline_sq = self.pointer_distance_sq();
        }

        let Some(hit) = target.hit_test(event.position) else {
            if already_active == 0 {
                self.first_touched = None;
            }
            events.push(GestureEvent::EmptyClick(event.position));
            return;
        };

        if already_active == 0 {
            self.first_touched = Some(hit);
            self.pinched = false;
        } else if self.first_touched != Some(hit) {
            self.first_touched = None;
        }

        if self.config.double_tap {
            match self.tap_candidate {
                Some(candidate)
                    if candidate.bubble == hit
                        && event.at.duration_since(candidate.at)
                            <= self.config.double_tap_interval =>
                {
                    self.tap_candidate = None;
                    events.push(GestureEvent::DoubleTap(hit));
                }
                _ => {
                    self.tap_candidate = Some(TapCandidate {
                        bubble: hit,
                        at: event.at,
                    });
                }
            }
        }

        let held_elsewhere = self
            .pointers
            .iter()
            .any(|(&pointer, session)| {
                pointer != event.pointer && session.capture.is_some_and(|c| c.bubble == hit)
            });
        if held_elsewhere {
            return;
        }

        let Some(center) = target.grab(hit) else {
            return;
        };
        if let Some(session) = self.pointers.get_mut(&event.pointer) {
            session.capture = Some(Capture {
                bubble: hit,
                offset: center - event.position,
            });
        }
        self.long_press = Some(PendingLongPress {
            pointer: event.pointer,
            bubble: hit,
            started: event.at,
        });
        events.push(GestureEvent::Grabbed(hit));
    }

    fn pointer_move(
        &mut self,
        event: PointerEvent,
        target: &mut impl TouchTarget,
        events: &mut Vec<GestureEvent>,
    ) {
        let Some(session) = self.pointers.get_mut(&event.pointer) else {
            return;
        };
        session.position = event.position;

        if let Some(capture) = session.capture {
            match target.drag(capture.bubble, event.position + capture.offset) {
                Some(moved) => {
                    if moved > self.config.movement_threshold
                        && self
                            .long_press
                            .is_some_and(|pending| pending.pointer == event.pointer)
                    {
                        self.long_press = None;
                    }
                    events.push(GestureEvent::Dragged(capture.bubble));
                }
                None => session.capture = None,
            }
        }

        if self.pointers.len() == 2
            && let Some(bubble) = self.first_touched
            && let Some(baseline) = self.pinch_baseline_sq
            && baseline > 0.0
            && let Some(live) = self.pointer_distance_sq()
        {
            let ratio = (live / baseline).sqrt();
            target.zoom(bubble, ratio);
            self.pinched = true;
            events.push(GestureEvent::Zoomed { bubble, ratio });
        }
    }

    fn pointer_up(
        &mut self,
        pointer: PointerId,
        allow_tap: bool,
        target: &mut impl TouchTarget,
        events: &mut Vec<GestureEvent>,
    ) {
        let Some(session) = self.pointers.remove(&pointer) else {
            return;
        };

        if self
            .long_press
            .is_some_and(|pending| pending.pointer == pointer)
        {
            self.long_press = None;
        }

        // Leaving a pinch commits the zoom. Dropping back to two pointers starts a
        // fresh pinch from the committed size and the remaining pair's distance.
        if matches!(self.pointers.len(), 1 | 2) {
            if self.pinched
                && let Some(bubble) = self.first_touched
            {
                target.end_zoom(bubble, self.config.min_radius, self.config.max_radius);
            }
            self.pinch_baseline_sq = if self.pointers.len() == 2 {
                self.pointer_distance_sq()
            } else {
                None
            };
        }

        if let Some(capture) = session.capture
            && let Some(moved) = target.release(capture.bubble)
        {
            if allow_tap && !self.pinched && moved <= self.config.movement_threshold {
                events.push(GestureEvent::SingleTap(capture.bubble));
            }
            events.push(GestureEvent::Released(capture.bubble));
        }

        if self.pointers.is_empty() {
            self.first_touched = None;
            self.pinch_baseline_sq = None;
            self.pinched = false;
            self.long_press = None;
            events.push(GestureEvent::AllReleased);
        }
    }

    fn pointer_distance_sq(&self) -> Option<f32> {
        let mut positions = self.pointers.values().map(|session| session.position);
        let first = positions.next()?;
        let second = positions.next()?;
        Some((first - second).length_sq())
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;

    use super::*;
    use crate::bubble::Bubble;

    fn config() -> GestureConfig {
        GestureConfig::from(&EngineConfig::default())
    }

    fn index() -> GraphIndex {
        let mut index = GraphIndex::new();
        index.insert(Bubble::new(1, 50.0).unwrap().with_center(pos2(100.0, 100.0)));
        index.insert(Bubble::new(2, 50.0).unwrap().with_center(pos2(400.0, 100.0)));
        index
    }

    fn event(pointer: PointerId, phase: PointerPhase, x: f32, y: f32, at: Instant) -> PointerEvent {
        PointerEvent::new(pointer, phase, pos2(x, y), at)
    }

    #[test]
    fn tap_on_bubble_fires_single_tap() {
        let mut index = index();
        let mut machine = GestureMachine::new(config());
        let t0 = Instant::now();

        let down = machine.handle(event(0, PointerPhase::Down, 110.0, 90.0, t0), &mut index);
        assert_eq!(down, vec![GestureEvent::Grabbed(1)]);
        assert_eq!(index.get(1).unwrap().movement, Movement::Moving);

        let up = machine.handle(event(0, PointerPhase::Up, 110.0, 90.0, t0), &mut index);
        assert_eq!(
            up,
            vec![
                GestureEvent::SingleTap(1),
                GestureEvent::Released(1),
                GestureEvent::AllReleased
            ]
        );
        assert_eq!(index.get(1).unwrap().movement, Movement::Inert);
        assert_eq!(machine.active_pointers(), 0);
    }

    #[test]
    fn drag_keeps_grab_offset_and_suppresses_tap() {
        let mut index = index();
        let mut machine = GestureMachine::new(config());
        let t0 = Instant::now();

        machine.handle(event(0, PointerPhase::Down, 120.0, 100.0, t0), &mut index);
        let moved = machine.handle(event(0, PointerPhase::Move, 220.0, 150.0, t0), &mut index);
        assert_eq!(moved, vec![GestureEvent::Dragged(1)]);
        assert_eq!(index.get(1).unwrap().center(), pos2(200.0, 150.0));

        let up = machine.handle(event(0, PointerPhase::Up, 220.0, 150.0, t0), &mut index);
        assert!(!up.contains(&GestureEvent::SingleTap(1)));
        assert!(up.contains(&GestureEvent::Released(1)));
    }

    #[test]
    fn touch_outside_bubbles_is_an_empty_click() {
        let mut index = index();
        let mut machine = GestureMachine::new(config());
        let events = machine.handle(
            event(0, PointerPhase::Down, 250.0, 400.0, Instant::now()),
            &mut index,
        );
        assert_eq!(events, vec![GestureEvent::EmptyClick(pos2(250.0, 400.0))]);
    }

    #[test]
    fn double_tap_within_interval_on_same_bubble() {
        let mut index = index();
        let mut machine = GestureMachine::new(config());
        let t0 = Instant::now();

        machine.handle(event(0, PointerPhase::Down, 100.0, 100.0, t0), &mut index);
        machine.handle(event(0, PointerPhase::Up, 100.0, 100.0, t0), &mut index);
        let t1 = t0 + Duration::from_millis(300);
        let second = machine.handle(event(0, PointerPhase::Down, 100.0, 100.0, t1), &mut index);
        assert!(second.contains(&GestureEvent::DoubleTap(1)));

        // The candidate resets after firing, so a third tap starts over.
        machine.handle(event(0, PointerPhase::Up, 100.0, 100.0, t1), &mut index);
        let t2 = t1 + Duration::from_millis(100);
        let third = machine.handle(event(0, PointerPhase::Down, 100.0, 100.0, t2), &mut index);
        assert!(!third.contains(&GestureEvent::DoubleTap(1)));
    }

    #[test]
    fn double_tap_candidate_resets_on_other_bubble_or_timeout() {
        let mut index = index();
        let mut machine = GestureMachine::new(config());
        let t0 = Instant::now();
        let tap = |machine: &mut GestureMachine, index: &mut GraphIndex, x: f32, at: Instant| {
            let events = machine.handle(event(0, PointerPhase::Down, x, 100.0, at), index);
            machine.handle(event(0, PointerPhase::Up, x, 100.0, at), index);
            events
        };

        tap(&mut machine, &mut index, 100.0, t0);
        tap(&mut machine, &mut index, 400.0, t0 + Duration::from_millis(100));
        let events = tap(&mut machine, &mut index, 100.0, t0 + Duration::from_millis(200));
        assert!(!events.contains(&GestureEvent::DoubleTap(1)));

        let events = tap(&mut machine, &mut index, 100.0, t0 + Duration::from_millis(900));
        assert!(!events.contains(&GestureEvent::DoubleTap(1)));
    }

    #[test]
    fn long_press_fires_after_delay_unless_moved() {
        let mut index = index();
        let mut machine = GestureMachine::new(config());
        let t0 = Instant::now();

        machine.handle(event(0, PointerPhase::Down, 100.0, 100.0, t0), &mut index);
        assert_eq!(machine.poll(t0 + Duration::from_millis(100)), None);
        assert_eq!(
            machine.poll(t0 + Duration::from_millis(700)),
            Some(GestureEvent::LongPress(1))
        );
        assert_eq!(machine.poll(t0 + Duration::from_millis(800)), None);
        machine.handle(event(0, PointerPhase::Up, 100.0, 100.0, t0), &mut index);

        machine.handle(event(0, PointerPhase::Down, 100.0, 100.0, t0), &mut index);
        machine.handle(event(0, PointerPhase::Move, 160.0, 100.0, t0), &mut index);
        assert_eq!(machine.poll(t0 + Duration::from_secs(2)), None);
    }

    #[test]
    fn release_before_delay_cancels_long_press() {
        let mut index = index();
        let mut machine = GestureMachine::new(config());
        let t0 = Instant::now();
        machine.handle(event(0, PointerPhase::Down, 100.0, 100.0, t0), &mut index);
        machine.handle(event(0, PointerPhase::Up, 100.0, 100.0, t0), &mut index);
        assert_eq!(machine.poll(t0 + Duration::from_secs(2)), None);
    }

    #[test]
    fn pinch_zooms_first_touched_and_commits_on_lift() {
        let mut index = index();
        let mut machine = GestureMachine::new(config());
        let t0 = Instant::now();

        machine.handle(event(0, PointerPhase::Down, 80.0, 100.0, t0), &mut index);
        machine.handle(event(1, PointerPhase::Down, 120.0, 100.0, t0), &mut index);
        assert_eq!(machine.first_touched(), Some(1));
        // The second finger joins the pinch instead of grabbing the held bubble.
        assert_eq!(machine.captured(1), None);

        let events = machine.handle(event(1, PointerPhase::Move, 140.0, 100.0, t0), &mut index);
        assert!(events.contains(&GestureEvent::Zoomed {
            bubble: 1,
            ratio: 1.5
        }));
        assert_eq!(index.get(1).unwrap().radius(), 75.0);

        machine.handle(event(1, PointerPhase::Up, 140.0, 100.0, t0), &mut index);
        assert_eq!(index.get(1).unwrap().radius(), 75.0);
        assert!(!index.get(1).unwrap().is_zooming());

        let up = machine.handle(event(0, PointerPhase::Up, 80.0, 100.0, t0), &mut index);
        assert!(!up.contains(&GestureEvent::SingleTap(1)));
    }

    #[test]
    fn pinch_rebaselines_when_a_third_finger_lifts() {
        let mut index = index();
        let mut machine = GestureMachine::new(config());
        let t0 = Instant::now();

        machine.handle(event(0, PointerPhase::Down, 80.0, 100.0, t0), &mut index);
        machine.handle(event(1, PointerPhase::Down, 120.0, 100.0, t0), &mut index);
        machine.handle(event(1, PointerPhase::Move, 140.0, 100.0, t0), &mut index);
        assert_eq!(index.get(1).unwrap().radius(), 75.0);

        machine.handle(event(2, PointerPhase::Down, 100.0, 160.0, t0), &mut index);
        assert_eq!(machine.first_touched(), Some(1));
        machine.handle(event(0, PointerPhase::Up, 80.0, 100.0, t0), &mut index);
        assert_eq!(machine.active_pointers(), 2);

        // The remaining pair is much further apart than the first one was.
        let events = machine.handle(event(2, PointerPhase::Move, 100.0, 160.0, t0), &mut index);
        assert!(events.contains(&GestureEvent::Zoomed {
            bubble: 1,
            ratio: 1.0
        }));
        assert_eq!(index.get(1).unwrap().radius(), 75.0);
    }

    #[test]
    fn second_finger_on_other_bubble_disables_pinch() {
        let mut index = index();
        let mut machine = GestureMachine::new(config());
        let t0 = Instant::now();

        machine.handle(event(0, PointerPhase::Down, 100.0, 100.0, t0), &mut index);
        machine.handle(event(1, PointerPhase::Down, 400.0, 100.0, t0), &mut index);
        assert_eq!(machine.first_touched(), None);
        assert_eq!(machine.captured(1), Some(2));

        let events = machine.handle(event(1, PointerPhase::Move, 450.0, 100.0, t0), &mut index);
        assert_eq!(events, vec![GestureEvent::Dragged(2)]);
        assert_eq!(index.get(1).unwrap().radius(), 50.0);
    }

    #[test]
    fn bubble_removed_mid_gesture_is_ignored() {
        let mut index = index();
        let mut machine = GestureMachine::new(config());
        let t0 = Instant::now();

        machine.handle(event(0, PointerPhase::Down, 100.0, 100.0, t0), &mut index);
        index.remove(1);
        let moved = machine.handle(event(0, PointerPhase::Move, 150.0, 100.0, t0), &mut index);
        assert!(moved.is_empty());
        let up = machine.handle(event(0, PointerPhase::Up, 150.0, 100.0, t0), &mut index);
        assert_eq!(up, vec![GestureEvent::AllReleased]);
    }

    #[test]
    fn cancel_never_taps() {
        let mut index = index();
        let mut machine = GestureMachine::new(config());
        let t0 = Instant::now();
        machine.handle(event(0, PointerPhase::Down, 100.0, 100.0, t0), &mut index);
        let events = machine.handle(event(0, PointerPhase::Cancel, 100.0, 100.0, t0), &mut index);
        assert_eq!(
            events,
            vec![GestureEvent::Released(1), GestureEvent::AllReleased]
        );
    }
}
