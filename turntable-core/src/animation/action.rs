//! Animation action - playback state of a single clip.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::AnimationClip;

/// What happens when playback reaches the end of the clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopMode {
    /// Play once and hold the last frame.
    Once,
    /// Wrap back to the start.
    #[default]
    Repeat,
    /// Alternate forward and backward.
    PingPong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Controls playback of one [`AnimationClip`].
#[derive(Debug, Clone)]
pub struct AnimationAction {
    clip: Arc<AnimationClip>,
    /// Local playback time in seconds, always within `0..=duration`.
    time: f32,
    pub time_scale: f32,
    /// Blend weight (0.0 - 1.0).
    pub weight: f32,
    pub loop_mode: LoopMode,
    state: ActionState,
    reversed: bool,
}

impl AnimationAction {
    pub fn new(clip: Arc<AnimationClip>) -> Self {
        Self {
            clip,
            time: 0.0,
            time_scale: 1.0,
            weight: 1.0,
            loop_mode: LoopMode::Repeat,
            state: ActionState::Stopped,
            reversed: false,
        }
    }

    #[inline]
    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    #[inline]
    pub fn state(&self) -> ActionState {
        self.state
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state == ActionState::Playing
    }

    pub fn play(&mut self) {
        self.state = ActionState::Playing;
    }

    /// Stop and rewind to the start.
    pub fn stop(&mut self) {
        self.state = ActionState::Stopped;
        self.time = 0.0;
        self.reversed = false;
    }

    pub fn pause(&mut self) {
        if self.state == ActionState::Playing {
            self.state = ActionState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == ActionState::Paused {
            self.state = ActionState::Playing;
        }
    }

    /// Advance local time by `delta_time` seconds, honouring the loop mode.
    pub fn update(&mut self, delta_time: f32) {
        if self.state != ActionState::Playing {
            return;
        }

        let duration = self.clip.duration();
        if duration <= 0.0 {
            self.time = 0.0;
            return;
        }

        let step = delta_time * self.time_scale;
        match self.loop_mode {
            LoopMode::Once => {
                self.time = (self.time + step).clamp(0.0, duration);
            }
            LoopMode::Repeat => {
                self.time = (self.time + step).rem_euclid(duration);
            }
            LoopMode::PingPong => {
                // Unfold the back-and-forth onto a 2 * duration cycle.
                let cycle = 2.0 * duration;
                let unfolded = if self.reversed {
                    cycle - self.time
                } else {
                    self.time
                };
                let position = (unfolded + step).rem_euclid(cycle);
                self.reversed = position > duration;
                self.time = if self.reversed {
                    cycle - position
                } else {
                    position
                };
            }
        }
    }
}
