//! Keyframe animation of scene node transforms.

mod action;
mod clip;
mod mixer;
mod track;

pub use action::{ActionState, AnimationAction, LoopMode};
pub use clip::AnimationClip;
pub use mixer::AnimationMixer;
pub use track::{
    Animatable, Interpolation, Keyframes, Track, TrackProperty, TrackSample, TrackValues,
};
