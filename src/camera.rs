//! Module containing the camera functionality

use cgmath::prelude::*;
use cgmath::{Matrix3, Matrix4, Point2, Point3, Quaternion, Rad, Vector3};

use crate::consts;
use crate::float::*;
use crate::scene::Ray;

/// Conversion factor from image plane area to surface area
/// together with the geometry it was evaluated from.
#[derive(Clone, Copy, Debug)]
pub struct CameraFactor {
    /// Image plane area pdf to surface area pdf conversion.
    /// Zero when the point is outside the frustum or the factor is not finite.
    pub factor: Float,
    /// Direction from the surface point towards the camera
    pub cam_dir: Vector3<Float>,
    /// Distance between the surface point and the camera
    pub z_depth: Float,
}

/// Representation of a pinhole camera
#[derive(Clone, Debug)]
pub struct Camera {
    /// Position of the camera in world coordinates
    pub pos: Point3<Float>,
    /// Rotation of the camera
    rot: Quaternion<Float>,
    /// Vertical field-of-view of the camera
    fov: Rad<Float>,
    /// Width of the image in pixels
    pub width: u32,
    /// Height of the image in pixels
    pub height: u32,
    /// Near plane of the camera
    near: Float,
    /// Far plane of the camera
    far: Float,
    /// Distance from the camera to the image plane
    image_plane_dist: Float,
}

impl Camera {
    pub fn new(
        pos: Point3<Float>,
        rot: Quaternion<Float>,
        fov: Rad<Float>,
        width: u32,
        height: u32,
    ) -> Camera {
        Camera {
            pos,
            rot,
            fov,
            width,
            height,
            near: 0.001,
            far: 1000.0,
            image_plane_dist: 1.0,
        }
    }

    /// Camera at pos looking towards target
    pub fn look_at(
        pos: Point3<Float>,
        target: Point3<Float>,
        up: Vector3<Float>,
        fov: Rad<Float>,
        width: u32,
        height: u32,
    ) -> Camera {
        let forward = (target - pos).normalize();
        let z = -forward;
        let x = up.cross(z).normalize();
        let y = z.cross(x);
        let rot = Quaternion::from(Matrix3::from_cols(x, y, z));
        Self::new(pos, rot, fov, width, height)
    }

    /// Get the forward axis of the camera in the world frame
    pub fn forward(&self) -> Vector3<Float> {
        self.rot.rotate_vector(-Vector3::unit_z())
    }

    pub fn fov(&self) -> Rad<Float> {
        self.fov
    }

    /// Aspect ratio of the image
    fn ratio(&self) -> Float {
        self.width.to_float() / self.height.to_float()
    }

    /// Horizontal field-of-view matching the vertical one and the aspect ratio
    fn fov_x(&self) -> Rad<Float> {
        Rad(2.0 * (self.ratio() * (self.fov.0 / 2.0).tan()).atan())
    }

    /// Linear size of one pixel on the image plane.
    /// Pixels are square so this covers both axes.
    fn pixel_size(&self) -> Float {
        2.0 * self.image_plane_dist * (self.fov.0 / 2.0).tan() / self.height.to_float()
    }

    /// Get the world to camera transformation matrix
    fn world_to_camera(&self) -> Matrix4<Float> {
        Matrix4::from(self.rot.invert()) * Matrix4::from_translation(-self.pos.to_vec())
    }

    /// Get the camera to clip space transformation matrix
    fn camera_to_clip(&self) -> Matrix4<Float> {
        cgmath::perspective(self.fov, self.ratio(), self.near, self.far)
    }

    /// Get the combined world to clip transformation
    pub fn world_to_clip(&self) -> Matrix4<Float> {
        self.camera_to_clip() * self.world_to_camera()
    }

    /// Primary ray through pixel (x, y) with a sub-pixel jitter in [0, 1)
    pub fn pixel_ray(&self, x: u32, y: u32, jitter: (Float, Float)) -> Ray {
        let ndc_x = 2.0 * (x.to_float() + jitter.0) / self.width.to_float() - 1.0;
        let ndc_y = 2.0 * (y.to_float() + jitter.1) / self.height.to_float() - 1.0;
        let tan_half = (self.fov.0 / 2.0).tan();
        let dir_cam = Vector3::new(ndc_x * self.ratio() * tan_half, ndc_y * tan_half, -1.0);
        let dir = self.rot.rotate_vector(dir_cam).normalize();
        Ray::from_dir(self.pos, dir)
    }

    /// Project a world position to pixel coordinates.
    /// Out of frustum positions clamp to the image bounds.
    pub fn world_to_screen(&self, pos: Point3<Float>) -> Point2<Float> {
        let clip = self.world_to_clip() * pos.to_homogeneous();
        let ndc = clip / clip.w.max(consts::PDF_EPSILON);
        let fw = self.width.to_float();
        let fh = self.height.to_float();
        let px = (ndc.x * 0.5 + 0.5) * fw - 0.5;
        let py = (ndc.y * 0.5 + 0.5) * fh - 0.5;
        Point2::new(px.max(0.0).min(fw - 1.0), py.max(0.0).min(fh - 1.0))
    }

    /// Compute the pdf conversion factor from image plane area to surface
    /// area for a surface point we want to connect to the camera.
    /// The factor is per pixel area rather than per plane area.
    pub fn image_to_surface_factor(
        &self,
        hit_pos: Point3<Float>,
        hit_norm: Vector3<Float>,
    ) -> CameraFactor {
        let to_cam = self.pos - hit_pos;
        let z_depth = to_cam.magnitude();
        let cam_dir = to_cam / z_depth;

        let mut res = CameraFactor {
            factor: 0.0,
            cam_dir,
            z_depth,
        };

        let cos_to_camera = hit_norm.dot(cam_dir).abs();
        let cos_at_camera = self.forward().dot(-cam_dir);

        let fov_max = self.fov.0.max(self.fov_x().0);
        if cos_at_camera <= fov_max.cos() {
            return res;
        }

        let image_point_to_camera_dist = self.image_plane_dist / cos_at_camera;
        let image_to_solid_angle = image_point_to_camera_dist.powi(2) / cos_at_camera;
        let image_to_surface = image_to_solid_angle * cos_to_camera / z_depth.powi(2);
        let factor = image_to_surface / self.pixel_size().powi(2);

        if factor.is_finite() {
            res.factor = factor;
        }
        res
    }
}
