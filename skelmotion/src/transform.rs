use glam::{Mat4, Quat, Vec3};

const HAS_POSITION: u8 = 1 << 0;
const HAS_ORIENTATION: u8 = 1 << 1;
const HAS_SCALE: u8 = 1 << 2;

/// Local transform of one joint.
///
/// Every component is optional. A missing component reads as identity but is
/// not blended as identity: composition, interpolation and override pass the
/// other operand's value through unchanged.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JointTransform {
    position: Vec3,
    orientation: Quat,
    scale: f32,
    flags: u8,
}

impl Default for JointTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            scale: 1.0,
            flags: 0,
        }
    }
}

impl JointTransform {
    /// Transform with all three components present and set to identity.
    pub fn identity() -> Self {
        Self {
            flags: HAS_POSITION | HAS_ORIENTATION | HAS_SCALE,
            ..Self::default()
        }
    }

    pub fn from_parts(position: Vec3, orientation: Quat, scale: f32) -> Self {
        Self {
            position,
            orientation,
            scale,
            flags: HAS_POSITION | HAS_ORIENTATION | HAS_SCALE,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.flags == 0
    }

    pub fn has_position(&self) -> bool {
        self.flags & HAS_POSITION != 0
    }

    pub fn has_orientation(&self) -> bool {
        self.flags & HAS_ORIENTATION != 0
    }

    pub fn has_scale(&self) -> bool {
        self.flags & HAS_SCALE != 0
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.flags |= HAS_POSITION;
    }

    pub fn set_orientation(&mut self, orientation: Quat) {
        self.orientation = orientation;
        self.flags |= HAS_ORIENTATION;
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
        self.flags |= HAS_SCALE;
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.set_position(position);
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.set_orientation(orientation);
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.set_scale(scale);
        self
    }

    /// `orientation * v * scale`, ignoring position.
    pub fn apply_to_vector(&self, v: Vec3) -> Vec3 {
        (self.orientation * v) * self.scale
    }

    pub fn apply_to_point(&self, p: Vec3) -> Vec3 {
        self.position + self.apply_to_vector(p)
    }

    /// Composes `self` followed by `transform`, i.e. `self` expressed in the
    /// frame `transform` describes.
    pub fn append_transform(&self, transform: &JointTransform) -> JointTransform {
        let mut result = JointTransform {
            flags: self.flags | transform.flags,
            ..JointTransform::default()
        };

        result.orientation = match (self.has_orientation(), transform.has_orientation()) {
            (true, true) => (transform.orientation * self.orientation).normalize(),
            (true, false) => self.orientation,
            (false, true) => transform.orientation,
            (false, false) => Quat::IDENTITY,
        };

        result.scale = match (self.has_scale(), transform.has_scale()) {
            (true, true) => self.scale * transform.scale,
            (true, false) => self.scale,
            (false, true) => transform.scale,
            (false, false) => 1.0,
        };

        result.position = if self.has_position() {
            let mut p = self.position;
            if transform.has_orientation() {
                p = transform.orientation * p;
            }
            if transform.has_scale() {
                p *= transform.scale;
            }
            if transform.has_position() {
                p += transform.position;
            }
            p
        } else if transform.has_position() {
            transform.position
        } else {
            Vec3::ZERO
        };

        result
    }

    /// Inverse over the present components: `t.append_transform(&t.inverse())`
    /// is identity.
    pub fn inverse(&self) -> JointTransform {
        let mut result = JointTransform {
            flags: self.flags,
            ..JointTransform::default()
        };

        if self.has_orientation() {
            result.orientation = self.orientation.inverse();
        }
        if self.has_scale() {
            result.scale = if self.scale != 0.0 {
                1.0 / self.scale
            } else {
                0.0
            };
        }
        if self.has_position() {
            result.position = -(result.orientation * self.position) * result.scale;
        }

        result
    }

    /// Per-component interpolation. A component present on one side only is
    /// taken from that side unweighted.
    pub fn lerp(&self, other: &JointTransform, t: f32) -> JointTransform {
        let mut result = JointTransform {
            flags: self.flags | other.flags,
            ..JointTransform::default()
        };

        result.position = match (self.has_position(), other.has_position()) {
            (true, true) => self.position.lerp(other.position, t),
            (true, false) => self.position,
            (false, true) => other.position,
            (false, false) => Vec3::ZERO,
        };

        result.orientation = match (self.has_orientation(), other.has_orientation()) {
            (true, true) => self.orientation.slerp(other.orientation, t).normalize(),
            (true, false) => self.orientation,
            (false, true) => other.orientation,
            (false, false) => Quat::IDENTITY,
        };

        result.scale = match (self.has_scale(), other.has_scale()) {
            (true, true) => self.scale + (other.scale - self.scale) * t,
            (true, false) => self.scale,
            (false, true) => other.scale,
            (false, false) => 1.0,
        };

        result
    }

    /// Components present in `other` replace the ones in `self`.
    pub fn override_with(&self, other: &JointTransform) -> JointTransform {
        let mut result = *self;
        if other.has_position() {
            result.set_position(other.position);
        }
        if other.has_orientation() {
            result.set_orientation(other.orientation);
        }
        if other.has_scale() {
            result.set_scale(other.scale);
        }
        result
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.orientation,
            self.position,
        )
    }

    /// Decomposes an affine matrix. Non-uniform scale is averaged.
    pub fn from_matrix(matrix: &Mat4) -> JointTransform {
        let (scale, orientation, position) = matrix.to_scale_rotation_translation();
        JointTransform::from_parts(
            position,
            orientation.normalize(),
            (scale.x + scale.y + scale.z) / 3.0,
        )
    }

    /// Compares effective values; absent components compare as identity.
    pub fn approx_eq(&self, other: &JointTransform, epsilon: f32) -> bool {
        self.position.abs_diff_eq(other.position, epsilon)
            && (self.scale - other.scale).abs() <= epsilon
            && self.orientation.dot(other.orientation).abs() >= 1.0 - epsilon
    }
}
