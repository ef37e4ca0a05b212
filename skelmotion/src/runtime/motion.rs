use crate::{BlendTree, MotionTransitionInfo, SkeletonData, SkeletonPose};
use glam::Vec3;
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

const EPSILON: f32 = 1e-6;

/// Externally owned blend parameter. The motion reads the current value on
/// every update and evaluation.
pub type ParameterHandle = Rc<Cell<f32>>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct MotionId(pub usize);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TransitionId(pub usize);

/// Playback position of a motion inside its blend tree's phase layout.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PhaseClock {
    pub phase_index: u32,
    pub prev_phase_index: u32,
    /// Fraction of the current phase, in `[0, 1]`.
    pub phase: f32,
}

impl PhaseClock {
    /// Position as a single number, `phase_index + phase`.
    pub fn phase_id(&self) -> f32 {
        self.phase_index as f32 + self.phase
    }
}

/// Where a trigger leads from a motion.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TransitionTarget {
    pub info: TransitionId,
    pub motion: MotionId,
}

/// A blend tree played along its phases, with transition table.
#[derive(Clone, Debug, Default)]
pub struct Motion {
    id: String,
    blend_tree: BlendTree,
    bound_params: Vec<Option<ParameterHandle>>,
    clock: PhaseClock,
    root_offset: Vec3,
    end_reached: bool,
    ended_phase: Option<u32>,
    reached_markers: Vec<String>,
    reached_marker_set: HashSet<String>,
    /// Trigger, then source phase (`None` for any phase).
    transitions: HashMap<String, HashMap<Option<u32>, TransitionTarget>>,
}

impl Motion {
    pub fn new(id: impl Into<String>, blend_tree: BlendTree) -> Self {
        let bound_params = vec![None; blend_tree.parameter_ids().len()];
        Self {
            id: id.into(),
            blend_tree,
            bound_params,
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn blend_tree(&self) -> &BlendTree {
        &self.blend_tree
    }

    pub fn clock(&self) -> PhaseClock {
        self.clock
    }

    pub fn phase_index(&self) -> u32 {
        self.clock.phase_index
    }

    pub fn phase(&self) -> f32 {
        self.clock.phase
    }

    pub fn parameter_ids(&self) -> &[String] {
        self.blend_tree.parameter_ids()
    }

    /// Binds (or with `None` unbinds) a blend parameter. Returns whether the
    /// blend tree uses `id`.
    pub fn bind_parameter(&mut self, id: &str, handle: Option<ParameterHandle>) -> bool {
        match self.blend_tree.parameter_index(id) {
            Some(index) => {
                self.bound_params[index] = handle;
                true
            }
            None => false,
        }
    }

    pub fn unbind_parameters(&mut self) {
        for param in &mut self.bound_params {
            *param = None;
        }
    }

    pub fn bind_skeleton(&mut self, skeleton: &SkeletonData) {
        self.blend_tree.bind_skeleton(skeleton);
    }

    pub fn bind_root_node(&mut self, uid: &str) {
        self.blend_tree.bind_root_node(uid);
    }

    /// Registers `trigger` as leading to `target`. With `src_phase` set the
    /// entry only applies while the motion is in that phase and takes
    /// precedence over a phase-independent one.
    pub fn add_transition(&mut self, trigger: &str, target: TransitionTarget, src_phase: Option<u32>) {
        self.transitions
            .entry(trigger.to_string())
            .or_default()
            .insert(src_phase, target);
    }

    pub fn transition(&self, trigger: &str) -> Option<TransitionTarget> {
        let by_phase = self.transitions.get(trigger)?;
        by_phase
            .get(&Some(self.clock.phase_index))
            .or_else(|| by_phase.get(&None))
            .copied()
    }

    pub fn reset(&mut self) {
        self.clock = PhaseClock::default();
        self.root_offset = Vec3::ZERO;
        self.end_reached = false;
        self.ended_phase = None;
        self.reached_markers.clear();
        self.reached_marker_set.clear();
    }

    pub fn update(&mut self, dt: f32) {
        self.end_reached = false;
        self.ended_phase = None;
        self.reached_markers.clear();
        self.reached_marker_set.clear();

        let params = self.bound_params.as_slice();
        let phases = self.blend_tree.phases_count().max(1);
        let before = self.clock;
        self.clock.prev_phase_index = self.clock.phase_index;

        let duration = self
            .blend_tree
            .evaluate_phase_duration_with(self.clock.phase_index, params);
        if duration > EPSILON {
            self.clock.phase += dt / duration;
        }

        if self.clock.phase >= 1.0 {
            self.clock.phase -= 1.0;
            self.ended_phase = Some(self.clock.phase_index);
            self.clock.phase_index += 1;
            if self.clock.phase_index >= phases {
                self.clock.phase_index = 0;
                self.end_reached = true;
            }

            let next_duration = self
                .blend_tree
                .evaluate_phase_duration_with(self.clock.phase_index, params);
            self.clock.phase = if next_duration > EPSILON {
                self.clock.phase * duration / next_duration
            } else {
                0.0
            };
            self.clock.phase = self.clock.phase.clamp(0.0, 1.0);
        }

        self.root_offset = self.blend_tree.evaluate_root_offset_with(
            (before.phase_index, before.phase),
            (self.clock.phase_index, self.clock.phase),
            params,
        );

        self.collect_markers(before.phase_id(), self.clock.phase_id(), phases as f32);
    }

    /// Records markers in `[from, to)`; when the clock looped the window is
    /// `[from, phases)` followed by `[0, to)`.
    fn collect_markers(&mut self, from: f32, to: f32, phases: f32) {
        let windows = if to >= from {
            [(from, to), (0.0, 0.0)]
        } else {
            [(from, phases), (0.0, to)]
        };
        for (lo, hi) in windows {
            for marker in self.blend_tree.markers() {
                if marker.phase_id >= lo && marker.phase_id < hi
                    && self.reached_marker_set.insert(marker.marker_id.clone())
                {
                    self.reached_markers.push(marker.marker_id.clone());
                }
            }
        }
        if !self.reached_markers.is_empty() {
            log::trace!("motion '{}' reached markers {:?}", self.id, self.reached_markers);
        }
    }

    pub fn evaluate_pose(&self, pose: &mut SkeletonPose) {
        self.blend_tree.evaluate_pose_with(
            self.clock.phase_index,
            self.clock.phase,
            self.bound_params.as_slice(),
            pose,
        );
    }

    /// Root displacement produced by the last [`Motion::update`].
    pub fn root_offset_delta(&self) -> Vec3 {
        self.root_offset
    }

    /// Moves this motion to the position of `other` in step with it: phase
    /// indices are remapped through `info.phase_map`, and the phase fraction
    /// is copied (or mirrored) when `info.sync_phase` is set.
    pub fn sync_phase(&mut self, other: &PhaseClock, info: &MotionTransitionInfo) {
        let last_phase = self.blend_tree.phases_count().max(1) - 1;
        let map = |index: u32| {
            info.phase_map
                .get(&index)
                .copied()
                .unwrap_or(index)
                .min(last_phase)
        };
        self.clock.phase_index = map(other.phase_index);
        self.clock.prev_phase_index = map(other.prev_phase_index);
        if info.sync_phase {
            let phase = if info.inverse_phase {
                1.0 - other.phase
            } else {
                other.phase
            };
            self.clock.phase = phase.clamp(0.0, 1.0);
        }
    }

    /// The last update wrapped from the final phase back to the first.
    pub fn is_animation_end_reached(&self) -> bool {
        self.end_reached
    }

    /// The last update left phase `phase_index`.
    pub fn is_phase_end_reached(&self, phase_index: u32) -> bool {
        self.ended_phase == Some(phase_index)
    }

    pub fn is_marker_reached(&self, marker: &str) -> bool {
        self.reached_marker_set.contains(marker)
    }

    pub fn reached_markers(&self) -> &[String] {
        &self.reached_markers
    }
}

/// Stable storage for the motions and transition descriptions of a layer.
#[derive(Clone, Debug, Default)]
pub struct MotionArena {
    pub(crate) motions: Vec<Motion>,
    pub(crate) transitions: Vec<MotionTransitionInfo>,
}

impl MotionArena {
    pub fn add_motion(&mut self, motion: Motion) -> MotionId {
        self.motions.push(motion);
        MotionId(self.motions.len() - 1)
    }

    pub fn add_transition(&mut self, info: MotionTransitionInfo) -> TransitionId {
        self.transitions.push(info);
        TransitionId(self.transitions.len() - 1)
    }

    /// Panics when `id` was not issued by this arena.
    pub fn motion(&self, id: MotionId) -> &Motion {
        &self.motions[id.0]
    }

    pub fn motion_mut(&mut self, id: MotionId) -> &mut Motion {
        &mut self.motions[id.0]
    }

    pub fn transition(&self, id: TransitionId) -> &MotionTransitionInfo {
        &self.transitions[id.0]
    }

    pub fn motions(&self) -> &[Motion] {
        &self.motions
    }

    pub fn motions_mut(&mut self) -> &mut [Motion] {
        &mut self.motions
    }

    pub fn find_motion(&self, id: &str) -> Option<MotionId> {
        self.motions.iter().position(|m| m.id() == id).map(MotionId)
    }
}
