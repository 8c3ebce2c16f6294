pub mod collision;
pub mod gesture;
pub mod graph;
pub mod render;
pub mod simulation;
pub mod space;
pub mod watchdog;
pub mod work;

pub use collision::{Bounds, Resolution, Resolver};
pub use gesture::{GestureEvent, GestureMachine, PointerEvent, PointerId, PointerPhase};
pub use graph::{Connection, GraphIndex};
pub use render::{Canvas, DisplayList, DrawCommand, Frame, RenderWorker, Sprite, Surface};
pub use simulation::{Simulation, Toggle};
pub use space::{BubbleSpace, Feedback, Silent, SpaceListener};
