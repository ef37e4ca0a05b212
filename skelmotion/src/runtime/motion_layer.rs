use crate::{
    Motion, MotionArena, MotionId, MotionTransition, MotionTransitionInfo, ParameterHandle,
    SkeletonData, SkeletonPose, TransitionId, TransitionTarget,
};
use glam::Vec3;

/// How a layer's pose is combined with the layers below it.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MotionBlend {
    #[default]
    Override,
    Add,
    Diff,
}

/// Per-axis flags for root-motion handling.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct AxisMask {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl AxisMask {
    pub const NONE: AxisMask = AxisMask {
        x: false,
        y: false,
        z: false,
    };
    pub const ALL: AxisMask = AxisMask {
        x: true,
        y: true,
        z: true,
    };

    fn select(self, on: f32, off: f32) -> Vec3 {
        Vec3::new(
            if self.x { on } else { off },
            if self.y { on } else { off },
            if self.z { on } else { off },
        )
    }
}

/// State machine over a set of motions.
///
/// Triggers are buffered by [`MotionLayer::trigger_event`] and resolved on
/// the next [`MotionLayer::update`], which advances the live motions and
/// produces the layer's pose and root-motion delta.
#[derive(Clone, Debug, Default)]
pub struct MotionLayer {
    layer_id: String,
    blend_mode: MotionBlend,
    arena: MotionArena,
    parameter_ids: Vec<String>,
    current: Option<MotionId>,
    next: Option<MotionId>,
    pending_motion: Option<MotionId>,
    pending_transition: Option<TransitionId>,
    transition: MotionTransition,
    root_node_id: Option<String>,
    root_joint_index: Option<usize>,
    root_extraction_mask: Vec3,
    root_reset_mask: Vec3,
    current_pose: SkeletonPose,
    current_root_offset_delta: Vec3,
    reached_markers: Vec<(String, String)>,
    ended_motions: Vec<String>,
}

impl MotionLayer {
    pub fn new(layer_id: impl Into<String>, blend_mode: MotionBlend) -> Self {
        Self {
            layer_id: layer_id.into(),
            blend_mode,
            root_extraction_mask: Vec3::ZERO,
            root_reset_mask: Vec3::ONE,
            ..Self::default()
        }
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    pub fn blend_mode(&self) -> MotionBlend {
        self.blend_mode
    }

    pub fn arena(&self) -> &MotionArena {
        &self.arena
    }

    /// Adds a motion. The first motion added becomes the current one.
    pub fn add_motion(&mut self, mut motion: Motion) -> MotionId {
        if let Some(root) = &self.root_node_id {
            motion.bind_root_node(root);
        }
        for id in motion.parameter_ids() {
            if !self.parameter_ids.contains(id) {
                self.parameter_ids.push(id.clone());
            }
        }
        self.parameter_ids.sort();

        let id = self.arena.add_motion(motion);
        if self.current.is_none() {
            self.current = Some(id);
        }
        id
    }

    pub fn set_default_motion(&mut self, id: MotionId) {
        self.current = Some(id);
    }

    pub fn find_motion(&self, id: &str) -> Option<MotionId> {
        self.arena.find_motion(id)
    }

    /// Makes `trigger` lead from `src` to `dst` using `info`.
    pub fn add_transition(
        &mut self,
        src: MotionId,
        dst: MotionId,
        trigger: &str,
        src_phase: Option<u32>,
        info: MotionTransitionInfo,
    ) -> TransitionId {
        let id = self.arena.add_transition(info);
        self.arena.motion_mut(src).add_transition(
            trigger,
            TransitionTarget {
                info: id,
                motion: dst,
            },
            src_phase,
        );
        id
    }

    /// Selects the joint whose root motion is extracted. Axes in `extract`
    /// are reported by [`Self::current_root_offset_delta`]; axes in `reset`
    /// are zeroed in the root joint's pose position.
    pub fn set_root_node(&mut self, uid: &str, extract: AxisMask, reset: AxisMask) {
        for motion in self.arena.motions_mut() {
            motion.bind_root_node(uid);
        }
        self.root_node_id = Some(uid.to_string());
        self.root_extraction_mask = extract.select(1.0, 0.0);
        self.root_reset_mask = reset.select(0.0, 1.0);
    }

    pub fn motion_ids(&self) -> impl Iterator<Item = &str> {
        self.arena.motions().iter().map(|m| m.id())
    }

    /// Sorted union of the parameters used by every motion.
    pub fn parameter_ids(&self) -> &[String] {
        &self.parameter_ids
    }

    pub fn current_motion(&self) -> Option<&Motion> {
        self.current.map(|id| self.arena.motion(id))
    }

    pub fn next_motion(&self) -> Option<&Motion> {
        self.next.map(|id| self.arena.motion(id))
    }

    pub fn transition(&self) -> &MotionTransition {
        &self.transition
    }

    pub fn current_pose(&self) -> &SkeletonPose {
        &self.current_pose
    }

    pub fn current_root_offset_delta(&self) -> Vec3 {
        self.current_root_offset_delta
    }

    /// `(motion id, marker id)` pairs crossed during the last update.
    pub fn reached_markers(&self) -> &[(String, String)] {
        &self.reached_markers
    }

    pub fn ended_motions(&self) -> &[String] {
        &self.ended_motions
    }

    /// Queues the transition `trigger` leads to from the most recent motion.
    /// Unknown triggers are ignored.
    pub fn trigger_event(&mut self, trigger: &str) {
        let source = if self.next.is_some() && self.transition.is_started() {
            self.next
        } else {
            self.current
        };
        let Some(source) = source else {
            return;
        };
        if let Some(target) = self.arena.motion(source).transition(trigger) {
            self.pending_motion = Some(target.motion);
            self.pending_transition = Some(target.info);
        }
    }

    /// Queues a switch to `motion` without blending.
    pub fn activate_motion(&mut self, motion: MotionId) {
        self.pending_motion = Some(motion);
        self.pending_transition = None;
    }

    fn resolve_pending(&mut self) {
        let Some(pending) = self.pending_motion else {
            return;
        };
        let Some(current) = self.current else {
            self.current = Some(pending);
            self.arena.motion_mut(pending).reset();
            self.clear_pending();
            return;
        };

        match (self.next, self.pending_transition) {
            (Some(next), Some(info)) if self.transition.is_started() => {
                if self
                    .transition
                    .can_be_interrupted(&self.arena, info, next, pending)
                {
                    self.transition
                        .interrupt(&mut self.arena, info, next, pending);
                    self.current = Some(next);
                    self.next = Some(pending);
                    self.clear_pending();
                }
            }
            (Some(_), None) if self.transition.is_started() => {}
            (_, Some(info)) => {
                self.transition.reset(&self.arena, info, current, pending);
                self.next = Some(pending);
                self.arena.motion_mut(pending).reset();
                self.clear_pending();
            }
            (_, None) => {
                self.current = Some(pending);
                self.next = None;
                self.arena.motion_mut(pending).reset();
                self.clear_pending();
            }
        }
    }

    fn clear_pending(&mut self) {
        self.pending_motion = None;
        self.pending_transition = None;
    }

    pub fn update(&mut self, dt: f32) {
        self.resolve_pending();

        let Some(current) = self.current else {
            return;
        };

        if self.next.is_some() {
            self.transition.update(&mut self.arena, dt);
        } else {
            self.arena.motion_mut(current).update(dt);
        }

        self.reached_markers.clear();
        let motion = self.arena.motion(current);
        for marker in motion.reached_markers() {
            self.reached_markers
                .push((motion.id().to_string(), marker.clone()));
        }
        if let Some(next) = self.next {
            if self.transition.is_started() && next != current {
                let motion = self.arena.motion(next);
                for marker in motion.reached_markers() {
                    self.reached_markers
                        .push((motion.id().to_string(), marker.clone()));
                }
            }
        }

        self.ended_motions.clear();
        let motion = self.arena.motion(current);
        if motion.is_animation_end_reached() {
            self.ended_motions.push(motion.id().to_string());
        }

        self.current_pose.reset();
        self.current_root_offset_delta = if self.next.is_some() {
            self.transition.evaluate(&self.arena, &mut self.current_pose)
        } else {
            let motion = self.arena.motion(current);
            motion.evaluate_pose(&mut self.current_pose);
            motion.root_offset_delta()
        };

        if let Some(next) = self.next {
            if self.transition.is_complete() {
                log::debug!(
                    "layer '{}': motion '{}' -> '{}'",
                    self.layer_id,
                    self.arena.motion(current).id(),
                    self.arena.motion(next).id()
                );
                self.current = Some(next);
                self.next = None;
            }
        }

        self.current_root_offset_delta *= self.root_extraction_mask;
        if let Some(root) = self.root_joint_index {
            let position = self.current_pose.joint_transform(root).position() * self.root_reset_mask;
            self.current_pose.set_position(root, position);
        }
    }

    pub fn bind_skeleton(&mut self, skeleton: &SkeletonData) {
        for motion in self.arena.motions_mut() {
            motion.bind_skeleton(skeleton);
        }

        if let Some(current) = self.current {
            self.current_pose.reset();
            let motion = self.arena.motion_mut(current);
            motion.reset();
            motion.evaluate_pose(&mut self.current_pose);
            self.current_root_offset_delta = motion.root_offset_delta();
        }

        self.root_joint_index = self
            .root_node_id
            .as_deref()
            .and_then(|uid| skeleton.joint_index(uid));
    }

    /// Binds `id` in every motion using it. Returns whether any does.
    pub fn bind_parameter(&mut self, id: &str, handle: ParameterHandle) -> bool {
        let mut bound = false;
        for motion in self.arena.motions_mut() {
            bound |= motion.bind_parameter(id, Some(handle.clone()));
        }
        bound
    }

    pub fn unbind_parameter(&mut self, id: &str) -> bool {
        let mut bound = false;
        for motion in self.arena.motions_mut() {
            bound |= motion.bind_parameter(id, None);
        }
        bound
    }

    pub fn unbind_parameters(&mut self) {
        for motion in self.arena.motions_mut() {
            motion.unbind_parameters();
        }
    }
}
