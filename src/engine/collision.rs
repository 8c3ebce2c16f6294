use std::collections::{HashSet, VecDeque};

use eframe::egui::{Pos2, pos2};
use parking_lot::RwLock;

use crate::bubble::{Bubble, BubbleError, BubbleId, Movement};

use super::graph::GraphIndex;

const SETTLE_EPSILON: f32 = 0.01;

/// Clamp box for bubble centers: `center ± radius` must stay in `[0, max_x] × [0, max_y]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn new(width: f32, height: f32) -> Result<Self, BubbleError> {
        if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
            Ok(Self {
                max_x: width,
                max_y: height,
            })
        } else {
            Err(BubbleError::InvalidBounds { width, height })
        }
    }

    /// Returns the clamped center and whether clamping changed it.
    pub fn clamp(&self, center: Pos2, radius: f32) -> (Pos2, bool) {
        let x = clamp_axis(center.x, radius, self.max_x);
        let y = clamp_axis(center.y, radius, self.max_y);
        let clamped = pos2(x, y);
        (clamped, clamped != center)
    }
}

fn clamp_axis(value: f32, radius: f32, max: f32) -> f32 {
    if value + radius > max {
        max - radius
    } else if value - radius < 0.0 {
        radius
    } else {
        value
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolution {
    pub center: Pos2,
    pub clamped: bool,
}

/// Strict: touching circles do not collide.
pub fn collides(a: &Bubble, b: &Bubble) -> bool {
    let reach = a.radius() + b.radius();
    let delta = a.center() - b.center();
    reach * reach > delta.length_sq()
}

/// Share of the push applied to the x axis; the y axis gets the rest.
///
/// Within each sign quadrant the axis with the larger absolute delta takes the
/// larger share. Axis-aligned deltas put the whole push on that axis.
pub fn push_factor(dx: f32, dy: f32) -> f32 {
    let (ax, ay) = (dx.abs(), dy.abs());
    if ax < ay {
        (ax / ay).min(1.0)
    } else if ax > 0.0 {
        1.0 - (ay / ax)
    } else {
        0.0
    }
}

fn push_step(moving: Pos2, pushed: Pos2, target: f32) -> Pos2 {
    let dx = moving.x - pushed.x;
    let dy = moving.y - pushed.y;
    let distance = (dx * dx + dy * dy).sqrt();
    let amount = (distance - target).abs();
    let factor = push_factor(dx, dy);

    let x = pushed.x - dx.signum() * amount * factor * f32::from(dx != 0.0);
    let y = pushed.y - dy.signum() * amount * (1.0 - factor) * f32::from(dy != 0.0);
    pos2(x, y)
}

#[derive(Clone, Copy, Debug)]
pub struct Resolver {
    pub bounds: Bounds,
    pub settle_iterations: usize,
}

impl Resolver {
    pub fn new(bounds: Bounds, settle_iterations: usize) -> Self {
        Self {
            bounds,
            settle_iterations,
        }
    }

    /// New center for `pushed`, or `None` when no push applies.
    ///
    /// The target separation is the larger of the two radii, not their sum.
    /// The first step is the directional split from [`push_factor`]; further
    /// steps repeat it while the pair is still closer than the target.
    pub fn resolve(&self, moving: &Bubble, pushed: &Bubble) -> Option<Resolution> {
        if moving.movement == Movement::Inert
            || (moving.movement == Movement::Moving && pushed.movement == Movement::Moving)
        {
            return None;
        }

        let origin = moving.center();
        let distance = origin.distance(pushed.center());
        if distance == 0.0 {
            return None;
        }

        let target = moving.radius().max(pushed.radius());
        let (mut center, mut clamped) =
            self.bounds
                .clamp(push_step(origin, pushed.center(), target), pushed.radius());

        let mut iterations = 0;
        while !clamped
            && iterations < self.settle_iterations
            && origin.distance(center) < target - SETTLE_EPSILON
            && origin.distance(center) > 0.0
        {
            (center, clamped) = self
                .bounds
                .clamp(push_step(origin, center, target), pushed.radius());
            iterations += 1;
        }

        Some(Resolution { center, clamped })
    }

    /// Pushes everything `source` overlaps, then everything those overlap, and
    /// so on. Each unordered pair is resolved at most once per call, which caps
    /// the work at O(n²). The write lock is held for one pair at a time, so
    /// readers can take snapshots while a long cascade runs. Returns the ids
    /// displaced, in push order.
    pub fn cascade(&self, graph: &RwLock<GraphIndex>, source: BubbleId) -> Vec<BubbleId> {
        self.cascade_with(graph, source, || {})
    }

    /// Like [`Resolver::cascade`], calling `between` after each pair with no
    /// lock held.
    fn cascade_with(
        &self,
        graph: &RwLock<GraphIndex>,
        source: BubbleId,
        mut between: impl FnMut(),
    ) -> Vec<BubbleId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([source]);
        let mut displaced = Vec::new();

        while let Some(mover_id) = queue.pop_front() {
            let others = graph.read().ids();
            for other_id in others {
                if other_id == mover_id {
                    continue;
                }
                let pushed = self.push_pair(&mut graph.write(), mover_id, other_id, &mut visited);
                if pushed {
                    displaced.push(other_id);
                    queue.push_back(other_id);
                }
                between();
            }
        }

        displaced
    }

    /// Resolves one pair in place. Ids that have left the graph are skipped.
    fn push_pair(
        &self,
        index: &mut GraphIndex,
        mover_id: BubbleId,
        other_id: BubbleId,
        visited: &mut HashSet<(BubbleId, BubbleId)>,
    ) -> bool {
        let (Some(mover), Some(other)) = (index.get(mover_id), index.get(other_id)) else {
            return false;
        };
        if other.movement == Movement::Moving || !collides(mover, other) {
            return false;
        }
        if !visited.insert(pair_key(mover_id, other_id)) {
            return false;
        }
        let Some(resolution) = self.resolve(mover, other) else {
            return false;
        };

        let Some(pushed) = index.get_mut(other_id) else {
            return false;
        };
        pushed.place(resolution.center);
        pushed.movement = Movement::Automatic;
        true
    }
}

fn pair_key(a: BubbleId, b: BubbleId) -> (BubbleId, BubbleId) {
    if a <= b { (a, b) } else { (b, a) }
}
