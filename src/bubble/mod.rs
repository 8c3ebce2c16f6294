mod error;
mod model;
mod record;

pub use error::BubbleError;
pub use model::{Bubble, BubbleContent, Movement};
pub use record::BubbleRecord;

pub type BubbleId = i64;
