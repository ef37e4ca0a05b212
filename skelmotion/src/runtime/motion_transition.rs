use crate::{MotionArena, MotionId, SkeletonPose, TransitionId};
use glam::Vec3;
use std::collections::HashMap;

const EPSILON: f32 = 1e-6;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TransitionType {
    /// Switches to the destination the frame the transition starts.
    Replace,
    /// Blends from the live source to the destination.
    #[default]
    CrossFade,
    /// Blends from a snapshot of the source taken when the transition starts.
    FrozenFade,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TransitionSync {
    #[default]
    Immediate,
    /// Waits for the source to loop.
    WaitEnd,
    /// Waits for the source to leave `phase_wait`.
    WaitPhaseEnd,
    /// Waits for the source to cross `marker_wait`.
    WaitMarker,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TransitionFunc {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl TransitionFunc {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => t * (2.0 - t),
            Self::EaseInOut => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// Authoring description of how one motion hands over to another.
#[derive(Clone, Debug, PartialEq)]
pub struct MotionTransitionInfo {
    pub transition_type: TransitionType,
    pub sync: TransitionSync,
    pub func: TransitionFunc,
    /// Seconds.
    pub duration: f32,
    /// Source phase index to destination phase index.
    pub phase_map: HashMap<u32, u32>,
    pub phase_wait: u32,
    pub marker_wait: Option<String>,
    pub sync_phase: bool,
    pub inverse_phase: bool,
}

impl Default for MotionTransitionInfo {
    fn default() -> Self {
        Self {
            transition_type: TransitionType::CrossFade,
            sync: TransitionSync::Immediate,
            func: TransitionFunc::Linear,
            duration: 0.0,
            phase_map: HashMap::new(),
            phase_wait: 0,
            marker_wait: None,
            sync_phase: true,
            inverse_phase: false,
        }
    }
}

/// Runtime state of the transition between two motions of a
/// [`MotionArena`].
///
/// Waits for the start condition of its [`MotionTransitionInfo`], then blends
/// the source into the destination over `duration` seconds.
#[derive(Clone, Debug, Default)]
pub struct MotionTransition {
    info: Option<TransitionId>,
    src: Option<MotionId>,
    dst: Option<MotionId>,
    transition_type: TransitionType,
    duration: f32,
    frozen_pose: SkeletonPose,
    frozen_offset: Vec3,
    transition_phase: f32,
    started: bool,
    src_frozen: bool,
    inversed: bool,
}

impl MotionTransition {
    pub fn reset(&mut self, arena: &MotionArena, info: TransitionId, src: MotionId, dst: MotionId) {
        let description = arena.transition(info);
        *self = Self {
            info: Some(info),
            src: Some(src),
            dst: Some(dst),
            transition_type: description.transition_type,
            duration: description.duration,
            frozen_pose: std::mem::take(&mut self.frozen_pose),
            ..Self::default()
        };
        self.frozen_pose.reset();
    }

    pub fn src_motion(&self) -> Option<MotionId> {
        self.src
    }

    pub fn dst_motion(&self) -> Option<MotionId> {
        self.dst
    }

    pub fn info(&self) -> Option<TransitionId> {
        self.info
    }

    pub fn transition_phase(&self) -> f32 {
        self.transition_phase
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_complete(&self) -> bool {
        self.started
            && (self.transition_type == TransitionType::Replace
                || self.duration < EPSILON
                || self.transition_phase >= 1.0)
    }

    pub fn update(&mut self, arena: &mut MotionArena, dt: f32) {
        let (Some(info_id), Some(src), Some(dst)) = (self.info, self.src, self.dst) else {
            return;
        };
        let MotionArena {
            motions,
            transitions,
        } = arena;
        let info = &transitions[info_id.0];

        if !self.started {
            if info.sync != TransitionSync::Immediate {
                let source = &mut motions[src.0];
                source.update(dt);
                let ready = match info.sync {
                    TransitionSync::Immediate => true,
                    TransitionSync::WaitEnd => source.is_animation_end_reached(),
                    TransitionSync::WaitPhaseEnd => source.is_phase_end_reached(info.phase_wait),
                    TransitionSync::WaitMarker => info
                        .marker_wait
                        .as_deref()
                        .is_some_and(|m| source.is_marker_reached(m)),
                };
                if ready {
                    self.start(arena, info_id, src, dst);
                }
                return;
            }
            self.start(arena, info_id, src, dst);
        }

        let motions = &mut arena.motions;
        if self.transition_type != TransitionType::Replace && !self.src_frozen && src != dst {
            motions[src.0].update(dt);
        }
        motions[dst.0].update(dt);

        if self.transition_type == TransitionType::Replace || self.duration < EPSILON {
            self.transition_phase = 1.0;
        } else {
            self.transition_phase = (self.transition_phase + dt / self.duration).min(1.0);
        }
    }

    fn start(&mut self, arena: &mut MotionArena, info_id: TransitionId, src: MotionId, dst: MotionId) {
        self.started = true;
        let MotionArena {
            motions,
            transitions,
        } = arena;
        let info = &transitions[info_id.0];

        if src != dst {
            let clock = motions[src.0].clock();
            motions[dst.0].sync_phase(&clock, info);
        }
        if info.transition_type == TransitionType::FrozenFade && !self.src_frozen {
            let source = &motions[src.0];
            self.frozen_pose.reset();
            source.evaluate_pose(&mut self.frozen_pose);
            self.frozen_offset = source.root_offset_delta();
            self.src_frozen = true;
        }
        log::trace!(
            "transition '{}' -> '{}' started",
            motions[src.0].id(),
            motions[dst.0].id()
        );
    }

    fn blend_weight(&self, func: TransitionFunc) -> f32 {
        if self.inversed {
            1.0 - func.apply(1.0 - self.transition_phase)
        } else {
            func.apply(self.transition_phase)
        }
    }

    /// Writes the blended pose into `pose` and returns the blended root
    /// offset delta.
    pub fn evaluate(&self, arena: &MotionArena, pose: &mut SkeletonPose) -> Vec3 {
        let (Some(info_id), Some(src), Some(dst)) = (self.info, self.src, self.dst) else {
            return Vec3::ZERO;
        };
        let source = arena.motion(src);
        let destination = arena.motion(dst);

        if !self.started {
            source.evaluate_pose(pose);
            return source.root_offset_delta();
        }
        if self.transition_type == TransitionType::Replace {
            destination.evaluate_pose(pose);
            return destination.root_offset_delta();
        }

        let weight = self.blend_weight(arena.transition(info_id).func);
        let source_offset = if self.src_frozen {
            pose.clone_from(&self.frozen_pose);
            self.frozen_offset
        } else {
            source.evaluate_pose(pose);
            source.root_offset_delta()
        };
        let mut target = SkeletonPose::default();
        destination.evaluate_pose(&mut target);
        pose.lerp(&target, weight);
        source_offset.lerp(destination.root_offset_delta(), weight)
    }

    /// A running transition may be replaced by a frozen fade, or reversed by
    /// a transition going back from its destination to its source.
    pub fn can_be_interrupted(
        &self,
        arena: &MotionArena,
        info: TransitionId,
        src: MotionId,
        dst: MotionId,
    ) -> bool {
        arena.transition(info).transition_type == TransitionType::FrozenFade || self.is_reversal(src, dst)
    }

    fn is_reversal(&self, src: MotionId, dst: MotionId) -> bool {
        self.src == Some(dst) && self.dst == Some(src)
    }

    /// Redirects the running transition. Callers must check
    /// [`MotionTransition::can_be_interrupted`] first.
    pub fn interrupt(&mut self, arena: &mut MotionArena, info: TransitionId, src: MotionId, dst: MotionId) {
        debug_assert!(self.can_be_interrupted(arena, info, src, dst));

        let transition_type = arena.transition(info).transition_type;
        if transition_type != TransitionType::FrozenFade && self.is_reversal(src, dst) {
            std::mem::swap(&mut self.src, &mut self.dst);
            self.transition_phase = 1.0 - self.transition_phase;
            self.inversed = !self.inversed;
            // A frozen source is the new destination; it resumes from where
            // it stopped, which is the snapshot.
            self.src_frozen = false;
            return;
        }

        let mut pose = SkeletonPose::default();
        let offset = self.evaluate(arena, &mut pose);
        let live = [self.src, self.dst];

        self.frozen_pose = pose;
        self.frozen_offset = offset;
        self.src_frozen = true;
        self.info = Some(info);
        self.src = Some(src);
        self.dst = Some(dst);
        self.transition_type = transition_type;
        self.duration = arena.transition(info).duration;
        self.transition_phase = 0.0;
        self.inversed = false;
        self.started = true;

        if !live.contains(&Some(dst)) {
            arena.motion_mut(dst).reset();
        }
        if src != dst {
            let clock = arena.motion(src).clock();
            let MotionArena {
                motions,
                transitions,
            } = arena;
            motions[dst.0].sync_phase(&clock, &transitions[info.0]);
        }
    }
}
