/// Renderer seam between the interaction loop and a display surface
use crate::lighting::Lighting;
use crate::projection::Camera;
use crate::scene::Model;

/// Draws the current scene. `model` is `None` until loading has finished.
pub trait SceneRenderer {
    type Error;

    fn render(
        &mut self,
        model: Option<&Model>,
        camera: &Camera,
        lighting: &Lighting,
    ) -> Result<(), Self::Error>;
}
