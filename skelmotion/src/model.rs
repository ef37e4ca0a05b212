use crate::{JointTransform, SkeletonPose};
use glam::Mat4;
use std::collections::HashMap;

/// Joint property animated by one channel of an [`crate::AnimationTrack`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ChannelTarget {
    Position,
    Orientation,
    Scale,
}

impl ChannelTarget {
    pub(crate) fn from_binary_kind(kind: u8) -> Option<Self> {
        match kind {
            0 => Some(Self::Position),
            1 => Some(Self::Orientation),
            2 => Some(Self::Scale),
            _ => None,
        }
    }

    pub(crate) fn binary_kind(self) -> u8 {
        match self {
            Self::Position => 0,
            Self::Orientation => 1,
            Self::Scale => 2,
        }
    }

    /// Number of floats a key of this target carries.
    pub fn dimension(self) -> u8 {
        match self {
            Self::Position => 3,
            Self::Orientation => 4,
            Self::Scale => 1,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    SphericalLinear,
    Bezier,
}

impl Interpolation {
    pub(crate) fn from_binary_kind(kind: u8) -> Option<Self> {
        match kind {
            0 => Some(Self::Linear),
            1 => Some(Self::SphericalLinear),
            2 => Some(Self::Bezier),
            _ => None,
        }
    }

    pub(crate) fn binary_kind(self) -> u8 {
        match self {
            Self::Linear => 0,
            Self::SphericalLinear => 1,
            Self::Bezier => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::SphericalLinear => "spherical-linear",
            Self::Bezier => "bezier",
        }
    }
}

#[derive(Clone, Debug)]
pub struct JointData {
    pub name: String,
    /// Identifier matched against track UIDs of animation clips.
    pub uid: String,
    pub parent: Option<usize>,
}

/// Joint hierarchy an animation is bound against.
///
/// Parents must precede their children.
#[derive(Clone, Debug, Default)]
pub struct SkeletonData {
    joints: Vec<JointData>,
    joint_index: HashMap<String, usize>,
}

impl SkeletonData {
    pub fn new(joints: Vec<JointData>) -> Self {
        let joint_index = joints
            .iter()
            .enumerate()
            .map(|(i, j)| (j.uid.clone(), i))
            .collect();
        Self {
            joints,
            joint_index,
        }
    }

    pub fn joints(&self) -> &[JointData] {
        &self.joints
    }

    pub fn joint(&self, index: usize) -> Option<&JointData> {
        self.joints.get(index)
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn joint_uid(&self, index: usize) -> Option<&str> {
        self.joints.get(index).map(|j| j.uid.as_str())
    }

    pub fn joint_index(&self, uid: &str) -> Option<usize> {
        self.joint_index.get(uid).copied()
    }

    /// Model-space matrix for every joint of `pose`, composed parent-first.
    pub fn model_matrices(&self, pose: &SkeletonPose) -> Vec<Mat4> {
        let mut out: Vec<Mat4> = Vec::with_capacity(self.joints.len());
        for (i, joint) in self.joints.iter().enumerate() {
            let local = pose.joint_transform(i).to_matrix();
            let model = match joint.parent {
                Some(p) if p < out.len() => out[p] * local,
                _ => local,
            };
            out.push(model);
        }
        out
    }

    /// Pose with an explicit identity transform for every joint.
    pub fn identity_pose(&self) -> SkeletonPose {
        let mut pose = SkeletonPose::default();
        pose.set_joint_count(self.joints.len());
        for i in 0..self.joints.len() {
            pose.set_transform(i, JointTransform::identity());
        }
        pose
    }
}
