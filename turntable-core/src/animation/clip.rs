//! Animation clip containing keyframe tracks.

use super::Track;

/// A named set of tracks played together.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Longest track end time, in seconds.
    duration: f32,
    tracks: Vec<Track>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration: 0.0,
            tracks: Vec::new(),
        }
    }

    #[inline]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    #[inline]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn add_track(&mut self, track: Track) {
        self.duration = self.duration.max(track.duration());
        self.tracks.push(track);
    }

    pub fn with_track(mut self, track: Track) -> Self {
        self.add_track(track);
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
