//! Skeletal animation blending runtime.
//!
//! Keyframe clips are decoded zero-copy from a packed binary format, stitched
//! into per-skeleton timelines, blended parametrically by blend trees and
//! sequenced by layered motion state machines with interruptible cross-fades.
//! The output is a [`SkeletonPose`] (local joint transforms) plus a root-motion
//! delta per frame; skinning and rendering are left to the caller.

#![forbid(unsafe_code)]

mod binary;
mod clip;
mod error;
mod model;
mod pose;
mod runtime;
mod transform;

#[cfg(feature = "json")]
mod json;

pub use binary::{
    CHANNEL_SIGNATURE, CLIP_SIGNATURE, CLIP_VERSION, ClipWriter, TRACK_SIGNATURE, encode_channel,
};
pub use clip::*;
pub use error::*;
pub use model::*;
pub use pose::*;
pub use runtime::*;
pub use transform::*;

#[cfg(feature = "json")]
pub use json::{ClipSource, DirClipSource, MemoryClipSource};

#[cfg(test)]
mod test_fixtures;
