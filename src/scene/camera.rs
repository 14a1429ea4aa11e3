//! Camera input
//!
//! The view the frame is rendered from. Matrices follow `glam`'s right-handed
//! convention; `projection` must not contain any TAA jitter, the pipeline
//! applies its own.

use glam::Mat4;

/// Depth-of-field lens settings of a camera object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DofSettings {
    /// Focus distance in world units.
    pub focus_distance: f32,
    /// F-stop; non-finite or non-positive values disable the effect.
    pub fstop: f32,
    /// Number of aperture blades; below 3 means a round aperture.
    pub aperture_blades: u32,
    /// Blade rotation in radians.
    pub aperture_rotation: f32,
    /// Anamorphic distortion, 1 for a circular bokeh.
    pub aperture_ratio: f32,
}

impl Default for DofSettings {
    fn default() -> Self {
        Self {
            focus_distance: 10.0,
            fstop: 2.8,
            aperture_blades: 0,
            aperture_rotation: 0.0,
            aperture_ratio: 1.0,
        }
    }
}

impl DofSettings {
    /// Finite, positive aperture.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.fstop.is_finite() && self.fstop > 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    /// World to view.
    pub view: Mat4,
    /// View to clip, without jitter.
    pub projection: Mat4,
    /// True when looking through a camera object (as opposed to a free viewport).
    pub is_camera_view: bool,
    /// Focal length in millimeters.
    pub lens: f32,
    /// Sensor size in millimeters, already fitted to the output aspect.
    pub sensor_size: f32,
    pub clip_start: f32,
    pub clip_end: f32,
    /// Only honored when [`is_camera_view`](Self::is_camera_view) is set.
    pub dof: Option<DofSettings>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::perspective_rh(50f32.to_radians(), 1.0, 0.1, 100.0),
            is_camera_view: false,
            lens: 50.0,
            sensor_size: 36.0,
            clip_start: 0.1,
            clip_end: 100.0,
            dof: None,
        }
    }
}

impl CameraSettings {
    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    #[inline]
    #[must_use]
    pub fn is_perspective(&self) -> bool {
        self.projection.w_axis.w == 0.0
    }

    /// Active depth-of-field settings, if any.
    #[must_use]
    pub fn active_dof(&self) -> Option<&DofSettings> {
        self.dof
            .as_ref()
            .filter(|dof| self.is_camera_view && dof.is_active())
    }
}
