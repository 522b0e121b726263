//! Animation mixer for playing clips on a model.

use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::{UnitQuaternion, Vector3};

use super::{AnimationAction, AnimationClip, TrackProperty, TrackSample};
use crate::scene::Model;
use crate::transform::NodeTransform;

/// Plays a set of actions and writes their blended result onto node transforms.
#[derive(Debug, Clone)]
pub struct AnimationMixer {
    actions: Vec<AnimationAction>,
    /// Total scaled time advanced since creation, in seconds.
    time: f64,
    pub time_scale: f32,
}

impl AnimationMixer {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
            time: 0.0,
            time_scale: 1.0,
        }
    }

    /// Create an action for a clip and return it for configuration.
    pub fn clip_action(&mut self, clip: Arc<AnimationClip>) -> &mut AnimationAction {
        let index = self.actions.len();
        self.actions.push(AnimationAction::new(clip));
        &mut self.actions[index]
    }

    #[inline]
    pub fn actions(&self) -> &[AnimationAction] {
        &self.actions
    }

    pub fn action_mut(&mut self, index: usize) -> Option<&mut AnimationAction> {
        self.actions.get_mut(index)
    }

    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn is_playing(&self) -> bool {
        self.actions.iter().any(AnimationAction::is_playing)
    }

    pub fn stop_all(&mut self) {
        for action in &mut self.actions {
            action.stop();
        }
    }

    /// Advance the mixer clock and every playing action by `delta_time`.
    pub fn update(&mut self, delta_time: f32) {
        let scaled = delta_time * self.time_scale;
        self.time += f64::from(scaled);
        for action in &mut self.actions {
            action.update(scaled);
        }
    }

    /// Sample playing actions and blend them over the model's rest pose.
    ///
    /// Every node property any action animates is written. When the playing
    /// weights sum to less than one, the rest value makes up the remainder;
    /// with nothing playing the property returns to rest.
    pub fn apply(&self, model: &mut Model) {
        let mut blended: HashMap<(usize, TrackProperty), Option<Blend>> = HashMap::new();

        for action in &self.actions {
            let active = action.is_playing() && action.weight > 0.0;
            for track in action.clip().tracks() {
                if track.node >= model.node_count() {
                    continue;
                }
                let slot = blended.entry((track.node, track.property())).or_default();
                if !active {
                    continue;
                }
                let Some(sample) = track.sample(action.time()) else {
                    continue;
                };
                match slot {
                    Some(blend) => blend.mix(&sample, action.weight),
                    None => *slot = Some(Blend::new(&sample, action.weight)),
                }
            }
        }

        for ((node, property), blend) in blended {
            let Some(rest) = model.rest_transform(node).map(|r| rest_sample(r, property)) else {
                continue;
            };
            let value = match blend {
                Some(mut blend) => {
                    if blend.weight < 1.0 {
                        blend.mix(&rest, 1.0 - blend.weight);
                    }
                    blend.value
                }
                None => rest,
            };

            let Some(transform) = model.local_transform_mut(node) else {
                continue;
            };
            match value {
                TrackSample::Translation(v) => transform.translation = v,
                TrackSample::Rotation(q) => transform.rotation = q,
                TrackSample::Scale(v) => transform.scale = v,
            }
        }
    }
}

fn rest_sample(rest: &NodeTransform, property: TrackProperty) -> TrackSample {
    match property {
        TrackProperty::Translation => TrackSample::Translation(rest.translation),
        TrackProperty::Rotation => TrackSample::Rotation(rest.rotation),
        TrackProperty::Scale => TrackSample::Scale(rest.scale),
    }
}

impl Default for AnimationMixer {
    fn default() -> Self {
        Self::new()
    }
}

/// Running weighted average of samples for one node property.
struct Blend {
    weight: f32,
    value: TrackSample,
}

impl Blend {
    fn new(sample: &TrackSample, weight: f32) -> Self {
        Self {
            weight,
            value: *sample,
        }
    }

    fn mix(&mut self, sample: &TrackSample, weight: f32) {
        let total = self.weight + weight;
        let t = weight / total;
        self.value = match (self.value, sample) {
            (TrackSample::Translation(a), TrackSample::Translation(b)) => {
                TrackSample::Translation(lerp(&a, b, t))
            }
            (TrackSample::Scale(a), TrackSample::Scale(b)) => TrackSample::Scale(lerp(&a, b, t)),
            (TrackSample::Rotation(a), TrackSample::Rotation(b)) => {
                TrackSample::Rotation(nlerp(&a, b, t))
            }
            (current, _) => current,
        };
        self.weight = total;
    }
}

fn lerp(a: &Vector3<f32>, b: &Vector3<f32>, t: f32) -> Vector3<f32> {
    a.lerp(b, t)
}

fn nlerp(a: &UnitQuaternion<f32>, b: &UnitQuaternion<f32>, t: f32) -> UnitQuaternion<f32> {
    let b = if a.coords.dot(&b.coords) < 0.0 {
        UnitQuaternion::new_unchecked(-b.into_inner())
    } else {
        *b
    };
    a.nlerp(&b, t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{Interpolation, Keyframes, Track, TrackValues};
    use crate::geometry::{Mesh, Primitive};
    use crate::scene::{Model, Node};

    fn slide_clip(name: &str, target: Vector3<f32>) -> Arc<AnimationClip> {
        Arc::new(AnimationClip::new(name).with_track(Track::new(
            0,
            TrackValues::Translation(Keyframes::new(
                vec![0.0, 1.0],
                vec![Vector3::zeros(), target],
                Interpolation::Linear,
            )),
        )))
    }

    fn single_node_model() -> Model {
        let mut model = Model::new();
        let mesh = model.add_mesh(Mesh::new("cube").with_primitive(Primitive::cube(1.0)));
        let node = model.add_node(Node::new("root").with_mesh(mesh), None);
        model.add_root(node);
        model
    }

    #[test]
    fn test_time_accumulates_deltas() {
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(slide_clip("a", Vector3::x())).play();
        let deltas = [0.016, 0.017, 0.5, 1.25, 0.033];
        for delta in deltas {
            mixer.update(delta);
        }
        let expected: f64 = deltas.iter().map(|d| f64::from(*d)).sum();
        assert!((mixer.time() - expected).abs() < 1e-6);
        // The action itself wraps inside the one-second clip.
        let local = mixer.actions()[0].time();
        assert!((0.0..=1.0).contains(&local));
    }

    #[test]
    fn test_apply_writes_sampled_translation() {
        let mut model = single_node_model();
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(slide_clip("a", Vector3::new(4.0, 0.0, 0.0))).play();
        mixer.update(0.25);
        mixer.apply(&mut model);

        let translation = model.nodes()[0].transform.translation;
        assert!((translation - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_apply_blends_by_weight() {
        let mut model = single_node_model();
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(slide_clip("a", Vector3::new(4.0, 0.0, 0.0))).play();
        mixer.clip_action(slide_clip("b", Vector3::new(0.0, 4.0, 0.0))).play();
        mixer.update(0.5);
        mixer.apply(&mut model);

        let translation = model.nodes()[0].transform.translation;
        assert!((translation - Vector3::new(1.0, 1.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_stopped_actions_leave_model_alone() {
        let mut model = single_node_model();
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(slide_clip("a", Vector3::x()));
        mixer.update(0.5);
        mixer.apply(&mut model);
        assert_eq!(model.nodes()[0].transform.translation, Vector3::zeros());
        assert!(!mixer.is_playing());
    }

    #[test]
    fn test_action_time_scale_and_stop_all() {
        let mut model = single_node_model();
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(slide_clip("a", Vector3::new(4.0, 0.0, 0.0))).play();
        if let Some(action) = mixer.action_mut(0) {
            action.time_scale = 2.0;
        }
        assert!(mixer.action_mut(1).is_none());

        mixer.update(0.25);
        mixer.apply(&mut model);
        let translation = model.nodes()[0].transform.translation;
        assert!((translation - Vector3::new(2.0, 0.0, 0.0)).norm() < 1e-6);

        mixer.stop_all();
        assert!(!mixer.is_playing());
        assert_eq!(mixer.actions()[0].time(), 0.0);
    }

    fn hold_clip(value: Vector3<f32>) -> Arc<AnimationClip> {
        Arc::new(AnimationClip::new("hold").with_track(Track::new(
            0,
            TrackValues::Translation(Keyframes::new(
                vec![0.0, 1.0],
                vec![value, value],
                Interpolation::Linear,
            )),
        )))
    }

    #[test]
    fn test_partial_weight_blends_with_rest_pose() {
        let mut model = single_node_model();
        let mut mixer = AnimationMixer::new();
        let action = mixer.clip_action(hold_clip(Vector3::new(4.0, 0.0, 0.0)));
        action.weight = 0.5;
        action.play();
        mixer.update(0.1);
        mixer.apply(&mut model);

        let translation = model.nodes()[0].transform.translation;
        assert!((translation - Vector3::new(2.0, 0.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_stop_restores_rest_pose() {
        let mut model = single_node_model();
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(hold_clip(Vector3::new(4.0, 0.0, 0.0))).play();
        mixer.update(0.1);
        mixer.apply(&mut model);
        let translation = model.nodes()[0].transform.translation;
        assert!((translation - Vector3::new(4.0, 0.0, 0.0)).norm() < 1e-6);

        mixer.stop_all();
        mixer.apply(&mut model);
        assert_eq!(model.nodes()[0].transform.translation, Vector3::zeros());
        assert_eq!(model.nodes()[0].transform.rotation, UnitQuaternion::identity());
    }
}
