use crate::JointTransform;
use glam::{Quat, Vec3};

/// Per-joint local transforms, indexed by skeleton joint index.
///
/// Composition operators grow the pose to the larger operand; joints missing
/// on one side behave as empty transforms.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkeletonPose {
    joints: Vec<JointTransform>,
}

impl SkeletonPose {
    pub fn with_joint_count(count: usize) -> Self {
        Self {
            joints: vec![JointTransform::default(); count],
        }
    }

    pub fn set_joint_count(&mut self, count: usize) {
        self.joints.resize(count, JointTransform::default());
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Clears every joint transform, keeping the joint count.
    pub fn reset(&mut self) {
        for joint in &mut self.joints {
            joint.reset();
        }
    }

    pub fn joints(&self) -> &[JointTransform] {
        &self.joints
    }

    /// Empty transform when `index` is past the end.
    pub fn joint_transform(&self, index: usize) -> JointTransform {
        self.joints.get(index).copied().unwrap_or_default()
    }

    fn joint_mut(&mut self, index: usize) -> &mut JointTransform {
        if index >= self.joints.len() {
            self.joints.resize(index + 1, JointTransform::default());
        }
        &mut self.joints[index]
    }

    pub fn set_transform(&mut self, index: usize, transform: JointTransform) {
        *self.joint_mut(index) = transform;
    }

    pub fn set_position(&mut self, index: usize, position: Vec3) {
        self.joint_mut(index).set_position(position);
    }

    pub fn set_orientation(&mut self, index: usize, orientation: Quat) {
        self.joint_mut(index).set_orientation(orientation);
    }

    pub fn set_scale(&mut self, index: usize, scale: f32) {
        self.joint_mut(index).set_scale(scale);
    }

    fn combine(
        &mut self,
        other: &SkeletonPose,
        op: impl Fn(&JointTransform, &JointTransform) -> JointTransform,
    ) {
        if other.joints.len() > self.joints.len() {
            self.joints
                .resize(other.joints.len(), JointTransform::default());
        }
        for (i, joint) in self.joints.iter_mut().enumerate() {
            let rhs = other.joints.get(i).copied().unwrap_or_default();
            *joint = op(joint, &rhs);
        }
    }

    /// Layers `other` on top: every joint becomes `self ∘ other`.
    pub fn add(&mut self, other: &SkeletonPose) {
        self.combine(other, |a, b| a.append_transform(b));
    }

    /// Removes `other`: every joint becomes `self ∘ other⁻¹`.
    pub fn diff(&mut self, other: &SkeletonPose) {
        self.combine(other, |a, b| a.append_transform(&b.inverse()));
    }

    pub fn override_pose(&mut self, other: &SkeletonPose) {
        self.combine(other, |a, b| a.override_with(b));
    }

    pub fn lerp(&mut self, other: &SkeletonPose, t: f32) {
        self.combine(other, |a, b| a.lerp(b, t));
    }
}
