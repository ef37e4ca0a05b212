use crate::{ParameterHandle, SkeletonAnimation, SkeletonData, SkeletonPose};
use glam::{Vec2, Vec3};
use std::ops::Range;

#[derive(Clone, Debug, PartialEq)]
pub enum BlendNodeKind {
    /// Leaf playing `BlendTree::animations()[animation]`.
    Animation { animation: usize },
    /// Blends the two children around the parameter value, by `coord.x`.
    /// Children are sorted ascending by `coord.x`.
    Lerp1D {
        children: Range<usize>,
        parameter: Option<usize>,
    },
    /// `children.start` with `children.start + 1` layered on top.
    Add { children: Range<usize> },
    /// `children.start` with `children.start + 1` removed.
    Diff { children: Range<usize> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlendNode {
    pub kind: BlendNodeKind,
    /// Position of this node in its parent's parameter space.
    pub coord: Vec2,
}

/// Animation played by a leaf, with its phase layout.
#[derive(Clone, Debug)]
pub struct BlendAnimation {
    pub skeleton_animation: SkeletonAnimation,
    /// Normalized end of every phase; strictly increasing, last is 1.
    pub phase_ends: Vec<f32>,
    /// Always sampled at time 0 and contributes no duration.
    pub treat_as_pose: bool,
}

impl BlendAnimation {
    fn phase_bounds(&self, phase_index: u32) -> (f32, f32) {
        if self.phase_ends.is_empty() {
            return (0.0, 1.0);
        }
        let index = (phase_index as usize).min(self.phase_ends.len() - 1);
        let start = if index > 0 {
            self.phase_ends[index - 1]
        } else {
            0.0
        };
        (start, self.phase_ends[index])
    }

    fn local_time(&self, phase_index: u32, phase: f32) -> f32 {
        if self.treat_as_pose {
            return 0.0;
        }
        let (start, end) = self.phase_bounds(phase_index);
        (start + phase * (end - start)) * self.skeleton_animation.duration()
    }

    fn phase_duration(&self, phase_index: u32) -> f32 {
        if self.treat_as_pose {
            return 0.0;
        }
        let (start, end) = self.phase_bounds(phase_index);
        (end - start) * self.skeleton_animation.duration()
    }
}

/// Named point of a blend tree, expressed as `phase_index + phase`.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerInfo {
    pub phase_id: f32,
    pub marker_id: String,
}

enum LerpPick {
    Single(usize),
    Blend(usize, usize, f32),
}

/// Current blend parameter values, indexed like [`BlendTree::parameter_ids`].
/// Missing or unbound entries read as 0.
pub(crate) trait ParameterValues {
    fn value(&self, index: usize) -> f32;
}

impl ParameterValues for [f32] {
    fn value(&self, index: usize) -> f32 {
        self.get(index).copied().unwrap_or(0.0)
    }
}

impl ParameterValues for [Option<ParameterHandle>] {
    fn value(&self, index: usize) -> f32 {
        self.get(index)
            .and_then(Option::as_ref)
            .map_or(0.0, |handle| handle.get())
    }
}

/// Parametric blend of animations sharing one phase layout.
///
/// Node 0 is the root. Operations evaluate the tree for a
/// `(phase_index, phase)` position; `params` is indexed like
/// [`BlendTree::parameter_ids`], and missing entries read as 0.
#[derive(Clone, Debug, Default)]
pub struct BlendTree {
    pub(crate) nodes: Vec<BlendNode>,
    pub(crate) animations: Vec<BlendAnimation>,
    pub(crate) parameter_ids: Vec<String>,
    pub(crate) markers: Vec<MarkerInfo>,
    pub(crate) phases_count: u32,
}

impl BlendTree {
    pub fn phases_count(&self) -> u32 {
        self.phases_count
    }

    pub fn nodes(&self) -> &[BlendNode] {
        &self.nodes
    }

    pub fn animations(&self) -> &[BlendAnimation] {
        &self.animations
    }

    pub fn parameter_ids(&self) -> &[String] {
        &self.parameter_ids
    }

    pub fn parameter_index(&self, id: &str) -> Option<usize> {
        self.parameter_ids.iter().position(|p| p == id)
    }

    /// Markers sorted by phase id.
    pub fn markers(&self) -> &[MarkerInfo] {
        &self.markers
    }

    pub fn bind_skeleton(&mut self, skeleton: &SkeletonData) {
        for animation in &mut self.animations {
            animation.skeleton_animation.bind_skeleton(skeleton);
        }
    }

    pub fn bind_root_node(&mut self, uid: &str) {
        for animation in &mut self.animations {
            animation.skeleton_animation.bind_root_node(uid);
        }
    }

    pub fn evaluate_pose(&self, phase_index: u32, phase: f32, params: &[f32], pose: &mut SkeletonPose) {
        self.evaluate_pose_with(phase_index, phase, params, pose);
    }

    /// Length in seconds of phase `phase_index` for the current parameters.
    pub fn evaluate_phase_duration(&self, phase_index: u32, params: &[f32]) -> f32 {
        self.evaluate_phase_duration_with(phase_index, params)
    }

    /// Root displacement travelling forward from `(phase_index0, phase0)` to
    /// `(phase_index1, phase1)`, looping when the second position precedes
    /// the first.
    pub fn evaluate_root_offset(
        &self,
        phase_index0: u32,
        phase0: f32,
        phase_index1: u32,
        phase1: f32,
        params: &[f32],
    ) -> Vec3 {
        self.evaluate_root_offset_with((phase_index0, phase0), (phase_index1, phase1), params)
    }

    pub(crate) fn evaluate_pose_with<P: ParameterValues + ?Sized>(
        &self,
        phase_index: u32,
        phase: f32,
        params: &P,
        pose: &mut SkeletonPose,
    ) {
        if !self.nodes.is_empty() {
            self.pose_recursive(0, phase_index, phase, params, pose);
        }
    }

    pub(crate) fn evaluate_phase_duration_with<P: ParameterValues + ?Sized>(
        &self,
        phase_index: u32,
        params: &P,
    ) -> f32 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        self.duration_recursive(0, phase_index, params)
    }

    pub(crate) fn evaluate_root_offset_with<P: ParameterValues + ?Sized>(
        &self,
        from: (u32, f32),
        to: (u32, f32),
        params: &P,
    ) -> Vec3 {
        if self.nodes.is_empty() {
            return Vec3::ZERO;
        }
        self.offset_recursive(0, from, to, params)
    }

    fn pick_lerp_children<P: ParameterValues + ?Sized>(
        &self,
        children: &Range<usize>,
        parameter: Option<usize>,
        params: &P,
    ) -> Option<LerpPick> {
        if children.is_empty() {
            return None;
        }
        if children.len() == 1 {
            return Some(LerpPick::Single(children.start));
        }

        let value = parameter.map_or(0.0, |i| params.value(i));
        let Some(upper) = children
            .clone()
            .find(|&c| self.nodes[c].coord.x >= value)
        else {
            return Some(LerpPick::Single(children.end - 1));
        };
        if upper == children.start {
            return Some(LerpPick::Single(upper));
        }

        // coord(lower) < value <= coord(upper), so the span is never zero.
        let lower = upper - 1;
        let x0 = self.nodes[lower].coord.x;
        let x1 = self.nodes[upper].coord.x;
        let factor = (value - x0) / (x1 - x0);
        if factor >= 1.0 {
            return Some(LerpPick::Single(upper));
        }
        Some(LerpPick::Blend(lower, upper, factor))
    }

    fn pose_recursive<P: ParameterValues + ?Sized>(
        &self,
        node: usize,
        phase_index: u32,
        phase: f32,
        params: &P,
        pose: &mut SkeletonPose,
    ) {
        match &self.nodes[node].kind {
            BlendNodeKind::Animation { animation } => {
                if let Some(animation) = self.animations.get(*animation) {
                    let time = animation.local_time(phase_index, phase);
                    animation.skeleton_animation.evaluate_pose(time, pose);
                }
            }
            BlendNodeKind::Lerp1D {
                children,
                parameter,
            } => match self.pick_lerp_children(children, *parameter, params) {
                Some(LerpPick::Single(c)) => self.pose_recursive(c, phase_index, phase, params, pose),
                Some(LerpPick::Blend(c0, c1, factor)) => {
                    self.pose_recursive(c0, phase_index, phase, params, pose);
                    let mut other = SkeletonPose::default();
                    self.pose_recursive(c1, phase_index, phase, params, &mut other);
                    pose.lerp(&other, factor);
                }
                None => {}
            },
            BlendNodeKind::Add { children } | BlendNodeKind::Diff { children } => {
                if children.len() < 2 {
                    return;
                }
                self.pose_recursive(children.start, phase_index, phase, params, pose);
                let mut other = SkeletonPose::default();
                self.pose_recursive(children.start + 1, phase_index, phase, params, &mut other);
                if matches!(self.nodes[node].kind, BlendNodeKind::Add { .. }) {
                    pose.add(&other);
                } else {
                    pose.diff(&other);
                }
            }
        }
    }

    fn duration_recursive<P: ParameterValues + ?Sized>(
        &self,
        node: usize,
        phase_index: u32,
        params: &P,
    ) -> f32 {
        match &self.nodes[node].kind {
            BlendNodeKind::Animation { animation } => self
                .animations
                .get(*animation)
                .map_or(0.0, |a| a.phase_duration(phase_index)),
            BlendNodeKind::Lerp1D {
                children,
                parameter,
            } => match self.pick_lerp_children(children, *parameter, params) {
                Some(LerpPick::Single(c)) => self.duration_recursive(c, phase_index, params),
                Some(LerpPick::Blend(c0, c1, factor)) => {
                    let d0 = self.duration_recursive(c0, phase_index, params);
                    let d1 = self.duration_recursive(c1, phase_index, params);
                    d0 + (d1 - d0) * factor
                }
                None => 0.0,
            },
            BlendNodeKind::Add { children } | BlendNodeKind::Diff { children } => children
                .clone()
                .map(|c| self.duration_recursive(c, phase_index, params))
                .fold(0.0, f32::max),
        }
    }

    fn offset_recursive<P: ParameterValues + ?Sized>(
        &self,
        node: usize,
        from: (u32, f32),
        to: (u32, f32),
        params: &P,
    ) -> Vec3 {
        match &self.nodes[node].kind {
            BlendNodeKind::Animation { animation } => {
                let Some(animation) = self.animations.get(*animation) else {
                    return Vec3::ZERO;
                };
                let time0 = animation.local_time(from.0, from.1);
                let time1 = animation.local_time(to.0, to.1);
                animation
                    .skeleton_animation
                    .evaluate_root_offset(time0, time1)
            }
            BlendNodeKind::Lerp1D {
                children,
                parameter,
            } => match self.pick_lerp_children(children, *parameter, params) {
                Some(LerpPick::Single(c)) => self.offset_recursive(c, from, to, params),
                Some(LerpPick::Blend(c0, c1, factor)) => {
                    let o0 = self.offset_recursive(c0, from, to, params);
                    let o1 = self.offset_recursive(c1, from, to, params);
                    o0.lerp(o1, factor)
                }
                None => Vec3::ZERO,
            },
            BlendNodeKind::Add { children } => {
                if children.len() < 2 {
                    return Vec3::ZERO;
                }
                self.offset_recursive(children.start, from, to, params)
                    + self.offset_recursive(children.start + 1, from, to, params)
            }
            BlendNodeKind::Diff { children } => {
                if children.len() < 2 {
                    return Vec3::ZERO;
                }
                self.offset_recursive(children.start, from, to, params)
                    - self.offset_recursive(children.start + 1, from, to, params)
            }
        }
    }
}
