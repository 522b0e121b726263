//! The interaction and animation loop.
//!
//! [`InteractionController`] owns the drag state, the (possibly not yet
//! loaded) model and its animation mixer. Front-ends forward pointer events
//! and call [`InteractionController::on_frame`] once per displayed frame.
//! Every operation tolerates a missing model, so a slow or failed load only
//! means nothing rotates yet.

use std::sync::Arc;

use crate::animation::AnimationMixer;
use crate::config::{InteractionConfig, PlaybackPolicy, ViewerConfig};
use crate::lighting::Lighting;
use crate::projection::Camera;
use crate::render::SceneRenderer;
use crate::scene::{LoadedAsset, Model};

/// Whether a drag is in progress and where the pointer last was.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DragState {
    pub active: bool,
    pub last_pointer: (f32, f32),
}

/// Pointer input in surface coordinates (pixels).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
}

pub struct InteractionController {
    config: ViewerConfig,
    drag: DragState,
    model: Option<Model>,
    mixer: Option<AnimationMixer>,
    camera: Camera,
    lighting: Lighting,
}

impl InteractionController {
    pub fn new(config: ViewerConfig, width: u32, height: u32) -> Self {
        let camera = Camera::from_config(&config.camera, width, height);
        let lighting = Lighting::from_config(&config.lighting, config.render.exposure);
        Self {
            config,
            drag: DragState::default(),
            model: None,
            mixer: None,
            camera,
            lighting,
        }
    }

    #[inline]
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    #[inline]
    pub fn interaction(&self) -> &InteractionConfig {
        &self.config.interaction
    }

    #[inline]
    pub fn drag(&self) -> DragState {
        self.drag
    }

    #[inline]
    pub fn is_dragging(&self) -> bool {
        self.drag.active
    }

    #[inline]
    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    #[inline]
    pub fn mixer(&self) -> Option<&AnimationMixer> {
        self.mixer.as_ref()
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[inline]
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    #[inline]
    pub fn lighting(&self) -> &Lighting {
        &self.lighting
    }

    /// Install a freshly loaded asset. This is the only place the model
    /// handle is assigned; a mixer is created only when the asset has clips.
    /// Returns the model that was attached before, if any.
    pub fn attach_model(&mut self, asset: LoadedAsset) -> Option<Model> {
        let LoadedAsset { model, clips } = asset;
        let animation = self.config.animation;

        self.mixer = if clips.is_empty() {
            None
        } else {
            let mut mixer = AnimationMixer::new();
            mixer.time_scale = animation.time_scale;
            let selected = match animation.playback {
                PlaybackPolicy::FirstClip => 1,
                PlaybackPolicy::AllClips => clips.len(),
            };
            for clip in clips.into_iter().take(selected) {
                log::debug!("playing clip {:?} ({:.2}s)", clip.name, clip.duration());
                let action = mixer.clip_action(Arc::new(clip));
                action.loop_mode = animation.loop_mode;
                action.play();
            }
            Some(mixer)
        };

        log::info!(
            "model attached: {} nodes, {} triangles, {} clip(s) playing",
            model.node_count(),
            model.triangle_count(),
            self.mixer.as_ref().map_or(0, |m| m.actions().len())
        );
        self.model.replace(model)
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Down { x, y } => self.pointer_down(x, y),
            PointerEvent::Move { x, y } => self.pointer_move(x, y),
            PointerEvent::Up => self.pointer_up(),
        }
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.drag = DragState {
            active: true,
            last_pointer: (x, y),
        };
    }

    /// Rotate the model by the pointer movement since the last event:
    /// horizontal motion turns yaw, vertical motion turns pitch.
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if !self.drag.active {
            return;
        }
        let Some(model) = self.model.as_mut() else {
            return;
        };

        let k = self.config.interaction.drag_sensitivity;
        let (last_x, last_y) = self.drag.last_pointer;
        model.orientation.rotate((y - last_y) * k, (x - last_x) * k, 0.0);
        self.drag.last_pointer = (x, y);
    }

    pub fn pointer_up(&mut self) {
        self.drag.active = false;
    }

    /// Touch start; only the first touch point is tracked.
    pub fn touch_start(&mut self, touches: &[(f32, f32)]) {
        if let Some(&(x, y)) = touches.first() {
            self.pointer_down(x, y);
        }
    }

    pub fn touch_move(&mut self, touches: &[(f32, f32)]) {
        if let Some(&(x, y)) = touches.first() {
            self.pointer_move(x, y);
        }
    }

    pub fn touch_end(&mut self) {
        self.pointer_up();
    }

    /// Per-frame state update: advance animation, then auto-rotate when the
    /// user is not dragging.
    pub fn advance(&mut self, delta_time: f32) {
        if let Some(mixer) = self.mixer.as_mut() {
            mixer.update(delta_time);
            if let Some(model) = self.model.as_mut() {
                mixer.apply(model);
            }
        }

        if !self.drag.active {
            if let Some(model) = self.model.as_mut() {
                model
                    .orientation
                    .rotate(0.0, self.config.interaction.auto_rotate_speed, 0.0);
            }
        }
    }

    /// [`InteractionController::advance`], then draw.
    pub fn on_frame<R: SceneRenderer>(
        &mut self,
        delta_time: f32,
        renderer: &mut R,
    ) -> Result<(), R::Error> {
        self.advance(delta_time);
        renderer.render(self.model.as_ref(), &self.camera, &self.lighting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{AnimationClip, Interpolation, Keyframes, Track, TrackValues};
    use crate::geometry::{Mesh, Primitive};
    use nalgebra::Vector3;
    use std::convert::Infallible;

    const K: f32 = 0.001;
    const AUTO: f32 = 0.005;

    #[derive(Default)]
    struct RecordingRenderer {
        frames: usize,
        frames_with_model: usize,
    }

    impl SceneRenderer for RecordingRenderer {
        type Error = Infallible;

        fn render(
            &mut self,
            model: Option<&Model>,
            _camera: &Camera,
            _lighting: &Lighting,
        ) -> Result<(), Infallible> {
            self.frames += 1;
            if model.is_some() {
                self.frames_with_model += 1;
            }
            Ok(())
        }
    }

    fn controller() -> InteractionController {
        InteractionController::new(ViewerConfig::default(), 800, 600)
    }

    fn cube_asset() -> LoadedAsset {
        LoadedAsset::new(Model::from_mesh(
            Mesh::new("cube").with_primitive(Primitive::cube(1.0)),
        ))
    }

    fn clip(name: &str) -> AnimationClip {
        AnimationClip::new(name).with_track(Track::new(
            0,
            TrackValues::Translation(Keyframes::new(
                vec![0.0, 1.0],
                vec![Vector3::zeros(), Vector3::y()],
                Interpolation::Linear,
            )),
        ))
    }

    fn orientation(controller: &InteractionController) -> (f32, f32) {
        let model = controller.model().unwrap();
        (model.orientation.pitch(), model.orientation.yaw())
    }

    #[test]
    fn test_drag_rotates_by_delta_times_sensitivity() {
        let mut c = controller();
        c.attach_model(cube_asset());

        c.pointer_down(100.0, 100.0);
        c.pointer_move(130.0, 90.0);
        c.pointer_move(150.0, 120.0);
        c.pointer_up();

        let (pitch, yaw) = orientation(&c);
        assert!((yaw - 50.0 * K).abs() < 1e-6);
        assert!((pitch - 20.0 * K).abs() < 1e-6);
    }

    #[test]
    fn test_drag_without_model_is_a_no_op() {
        let mut c = controller();
        c.pointer_down(0.0, 0.0);
        c.pointer_move(500.0, 500.0);
        c.pointer_up();
        assert!(c.model().is_none());
        assert!(!c.is_dragging());
    }

    #[test]
    fn test_move_without_press_does_nothing() {
        let mut c = controller();
        c.attach_model(cube_asset());
        c.pointer_move(300.0, 300.0);
        assert_eq!(orientation(&c), (0.0, 0.0));
        assert_eq!(c.drag().last_pointer, (0.0, 0.0));
    }

    #[test]
    fn test_no_auto_rotate_while_dragging() {
        let mut c = controller();
        c.attach_model(cube_asset());
        c.pointer_down(10.0, 10.0);
        let mut renderer = RecordingRenderer::default();
        for _ in 0..120 {
            c.on_frame(0.016, &mut renderer).unwrap();
        }
        assert_eq!(orientation(&c), (0.0, 0.0));
        assert_eq!(renderer.frames, 120);
    }

    #[test]
    fn test_auto_rotate_adds_increment_per_frame() {
        let mut c = controller();
        c.attach_model(cube_asset());
        let mut renderer = RecordingRenderer::default();
        for frame in 1..=10 {
            let before = orientation(&c).1;
            c.on_frame(0.5, &mut renderer).unwrap();
            let after = orientation(&c).1;
            assert!((after - before - AUTO).abs() < 1e-7, "frame {frame}");
        }
        assert_eq!(orientation(&c).0, 0.0);
    }

    #[test]
    fn test_auto_rotate_resumes_after_release() {
        let mut c = controller();
        c.attach_model(cube_asset());
        c.handle_pointer(PointerEvent::Down { x: 0.0, y: 0.0 });
        c.advance(0.016);
        c.handle_pointer(PointerEvent::Up);
        c.advance(0.016);
        assert!((orientation(&c).1 - AUTO).abs() < 1e-7);
    }

    #[test]
    fn test_pointer_up_is_idempotent() {
        let mut c = controller();
        let before = c.drag();
        c.pointer_up();
        c.pointer_up();
        assert_eq!(c.drag(), before);
    }

    #[test]
    fn test_frame_without_model_or_mixer() {
        let mut c = controller();
        let mut renderer = RecordingRenderer::default();
        c.on_frame(0.016, &mut renderer).unwrap();
        c.pointer_down(1.0, 1.0);
        c.on_frame(0.016, &mut renderer).unwrap();
        assert_eq!(renderer.frames, 2);
        assert_eq!(renderer.frames_with_model, 0);
        assert!(c.mixer().is_none());
    }

    #[test]
    fn test_static_asset_gets_no_mixer() {
        let mut c = controller();
        c.attach_model(cube_asset());
        assert!(c.mixer().is_none());
    }

    #[test]
    fn test_mixer_time_is_sum_of_frame_deltas() {
        let mut c = controller();
        c.attach_model(cube_asset().with_clips(vec![clip("bounce")]));
        let deltas = [0.016_f32, 0.020, 0.5, 0.75, 0.001];
        let mut renderer = RecordingRenderer::default();
        for delta in deltas {
            c.on_frame(delta, &mut renderer).unwrap();
        }
        let expected: f64 = deltas.iter().map(|d| f64::from(*d)).sum();
        assert!((c.mixer().unwrap().time() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_first_clip_policy_plays_one_action() {
        let mut c = controller();
        c.attach_model(cube_asset().with_clips(vec![clip("a"), clip("b"), clip("c")]));
        let mixer = c.mixer().unwrap();
        assert_eq!(mixer.actions().len(), 1);
        assert_eq!(mixer.actions()[0].clip().name, "a");
        assert!(mixer.is_playing());
    }

    #[test]
    fn test_all_clips_policy_plays_every_action() {
        let mut config = ViewerConfig::default();
        config.animation.playback = PlaybackPolicy::AllClips;
        let mut c = InteractionController::new(config, 800, 600);
        c.attach_model(cube_asset().with_clips(vec![clip("a"), clip("b"), clip("c")]));
        let mixer = c.mixer().unwrap();
        assert_eq!(mixer.actions().len(), 3);
        assert!(mixer.actions().iter().all(|a| a.is_playing()));
    }

    #[test]
    fn test_configured_sensitivity_is_used() {
        let mut config = ViewerConfig::default();
        config.interaction.drag_sensitivity = 0.005;
        let mut c = InteractionController::new(config, 800, 600);
        c.attach_model(cube_asset());
        c.touch_start(&[(0.0, 0.0), (50.0, 50.0)]);
        c.touch_move(&[(10.0, -4.0)]);
        c.touch_end();
        let (pitch, yaw) = orientation(&c);
        assert!((yaw - 0.05).abs() < 1e-6);
        assert!((pitch + 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_empty_touch_list_is_ignored() {
        let mut c = controller();
        c.touch_start(&[]);
        assert!(!c.is_dragging());
    }

    #[test]
    fn test_attach_returns_previous_model() {
        let mut c = controller();
        assert!(c.attach_model(cube_asset()).is_none());
        let first_id = c.model().unwrap().id();
        let previous = c.attach_model(cube_asset()).unwrap();
        assert_eq!(previous.id(), first_id);
        assert_ne!(c.model().unwrap().id(), first_id);
    }
}
