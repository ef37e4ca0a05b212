use crate::{MotionBlend, MotionLayer, ParameterHandle, SkeletonData, SkeletonPose};
use glam::Vec3;

/// Ordered motion layers composed bottom to top into one pose.
#[derive(Clone, Debug, Default)]
pub struct MotionStack {
    layers: Vec<MotionLayer>,
    pose: SkeletonPose,
    root_offset_delta: Vec3,
    reached_markers: Vec<(String, String, String)>,
}

impl MotionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_layer(&mut self, layer: MotionLayer) -> usize {
        self.layers.push(layer);
        self.layers.len() - 1
    }

    pub fn layers(&self) -> &[MotionLayer] {
        &self.layers
    }

    pub fn layer(&self, id: &str) -> Option<&MotionLayer> {
        self.layers.iter().find(|l| l.layer_id() == id)
    }

    pub fn layer_mut(&mut self, id: &str) -> Option<&mut MotionLayer> {
        self.layers.iter_mut().find(|l| l.layer_id() == id)
    }

    pub fn bind_skeleton(&mut self, skeleton: &SkeletonData) {
        for layer in &mut self.layers {
            layer.bind_skeleton(skeleton);
        }
        self.pose = SkeletonPose::with_joint_count(skeleton.joint_count());
    }

    pub fn bind_parameter(&mut self, id: &str, handle: ParameterHandle) -> bool {
        let mut bound = false;
        for layer in &mut self.layers {
            bound |= layer.bind_parameter(id, handle.clone());
        }
        bound
    }

    pub fn unbind_parameters(&mut self) {
        for layer in &mut self.layers {
            layer.unbind_parameters();
        }
    }

    /// Forwards `trigger` to every layer.
    pub fn trigger_event(&mut self, trigger: &str) {
        for layer in &mut self.layers {
            layer.trigger_event(trigger);
        }
    }

    pub fn update(&mut self, dt: f32) {
        self.pose.reset();
        self.root_offset_delta = Vec3::ZERO;
        self.reached_markers.clear();

        for layer in &mut self.layers {
            layer.update(dt);
            match layer.blend_mode() {
                MotionBlend::Override => self.pose.override_pose(layer.current_pose()),
                MotionBlend::Add => self.pose.add(layer.current_pose()),
                MotionBlend::Diff => self.pose.diff(layer.current_pose()),
            }
            match layer.blend_mode() {
                MotionBlend::Diff => self.root_offset_delta -= layer.current_root_offset_delta(),
                _ => self.root_offset_delta += layer.current_root_offset_delta(),
            }
            for (motion, marker) in layer.reached_markers() {
                self.reached_markers.push((
                    layer.layer_id().to_string(),
                    motion.clone(),
                    marker.clone(),
                ));
            }
        }
    }

    pub fn pose(&self) -> &SkeletonPose {
        &self.pose
    }

    pub fn root_offset_delta(&self) -> Vec3 {
        self.root_offset_delta
    }

    /// `(layer id, motion id, marker id)` triples from the last update.
    pub fn reached_markers(&self) -> &[(String, String, String)] {
        &self.reached_markers
    }

    pub fn ended_motions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.layers.iter().flat_map(|l| {
            l.ended_motions()
                .iter()
                .map(move |m| (l.layer_id(), m.as_str()))
        })
    }
}
