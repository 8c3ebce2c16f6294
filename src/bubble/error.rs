use thiserror::Error;

use super::BubbleId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BubbleError {
    #[error("bubble {id} has non-positive radius {radius}")]
    NonPositiveRadius { id: BubbleId, radius: f32 },
    #[error("bubble {id} cannot link to itself")]
    SelfLink { id: BubbleId },
    #[error("surface bounds are already fixed for this session")]
    BoundsAlreadySet,
    #[error("surface bounds {width}x{height} are not usable")]
    InvalidBounds { width: f32, height: f32 },
}
