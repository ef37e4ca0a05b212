use crate::{AnimationClip, ChannelTarget, SkeletonData, SkeletonPose};
use glam::{Quat, Vec3};
use std::collections::HashSet;
use std::rc::Rc;

#[derive(Clone, Debug)]
struct TimelineClip {
    clip: Rc<AnimationClip>,
    ignore_mask: HashSet<u32>,
    /// Clip-local time the window starts at.
    clip_start: f32,
    /// Timeline time the window starts at.
    animation_start: f32,
    duration: f32,
    bound_tracks: Vec<(usize, usize)>,
    root_track: Option<usize>,
}

impl TimelineClip {
    fn local_time(&self, time: f32) -> f32 {
        self.clip_start + (time - self.animation_start).clamp(0.0, self.duration)
    }

    fn root_position_local(&self, local_time: f32) -> Vec3 {
        let Some(channel) = self
            .root_track
            .and_then(|t| self.clip.track(t))
            .and_then(|t| t.channel_for(ChannelTarget::Position))
        else {
            return Vec3::ZERO;
        };
        let mut out = [0.0f32; 3];
        match channel.evaluate(local_time, &mut out) {
            Ok(()) => Vec3::from_array(out),
            Err(_) => Vec3::ZERO,
        }
    }

    fn root_position(&self, time: f32) -> Vec3 {
        self.root_position_local(self.local_time(time))
    }

    fn root_start(&self) -> Vec3 {
        self.root_position_local(self.clip_start)
    }

    fn root_end(&self) -> Vec3 {
        self.root_position_local(self.clip_start + self.duration)
    }
}

/// Sequence of clip windows laid end to end on one timeline and bound to the
/// joints of a skeleton.
///
/// The timeline order is the order of [`SkeletonAnimation::add_animation_clip`]
/// calls.
#[derive(Clone, Debug, Default)]
pub struct SkeletonAnimation {
    clips: Vec<TimelineClip>,
    max_joint_index: Option<usize>,
}

impl SkeletonAnimation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the window `[start, end]` of `clip` to the timeline. Joints in
    /// `ignore_mask` are never animated by this entry.
    pub fn add_animation_clip(
        &mut self,
        clip: Rc<AnimationClip>,
        ignore_mask: HashSet<u32>,
        start: f32,
        end: f32,
    ) {
        let clip_start = start.max(0.0);
        let clip_end = end.min(clip.duration());
        let duration = (clip_end - clip_start).max(0.0);
        let animation_start = self
            .clips
            .last()
            .map(|c| c.animation_start + c.duration)
            .unwrap_or(0.0);

        self.clips.push(TimelineClip {
            clip,
            ignore_mask,
            clip_start,
            animation_start,
            duration,
            bound_tracks: Vec::new(),
            root_track: None,
        });
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    pub fn clip(&self, index: usize) -> Option<&Rc<AnimationClip>> {
        self.clips.get(index).map(|c| &c.clip)
    }

    /// Timeline position `(start, duration)` of a clip entry.
    pub fn clip_window(&self, index: usize) -> Option<(f32, f32)> {
        self.clips
            .get(index)
            .map(|c| (c.animation_start, c.duration))
    }

    pub fn duration(&self) -> f32 {
        self.clips
            .last()
            .map(|c| c.animation_start + c.duration)
            .unwrap_or(0.0)
    }

    /// Highest joint index animated by any clip, after [`Self::bind_skeleton`].
    pub fn max_joint_index(&self) -> Option<usize> {
        self.max_joint_index
    }

    pub fn bind_skeleton(&mut self, skeleton: &SkeletonData) {
        self.max_joint_index = None;
        for entry in &mut self.clips {
            entry.bound_tracks.clear();
            for joint in 0..skeleton.joint_count() {
                if entry.ignore_mask.contains(&(joint as u32)) {
                    continue;
                }
                let Some(uid) = skeleton.joint_uid(joint) else {
                    continue;
                };
                if let Some(track) = entry.clip.find_track(uid) {
                    entry.bound_tracks.push((joint, track));
                    self.max_joint_index = Some(self.max_joint_index.map_or(joint, |m| m.max(joint)));
                }
            }
            if entry.bound_tracks.is_empty() && entry.clip.track_count() > 0 {
                log::warn!(
                    "no clip track matches a joint of the bound skeleton ({} tracks)",
                    entry.clip.track_count()
                );
            }
        }
    }

    /// Selects the track whose UID is `uid` as the root-motion source.
    pub fn bind_root_node(&mut self, uid: &str) {
        for entry in &mut self.clips {
            entry.root_track = entry.clip.find_track(uid);
        }
    }

    /// Entry whose window contains `time`: the last one starting at or before
    /// it, or the first one when `time` precedes all of them.
    fn find_clip(&self, time: f32) -> Option<usize> {
        if self.clips.is_empty() {
            return None;
        }
        Some(
            self.clips
                .iter()
                .rposition(|c| c.animation_start <= time)
                .unwrap_or(0),
        )
    }

    /// Writes the transforms of every bound joint at timeline time `time`.
    /// Joints not animated by the active clip keep their value in `pose`.
    pub fn evaluate_pose(&self, time: f32, pose: &mut SkeletonPose) {
        let Some(index) = self.find_clip(time) else {
            return;
        };
        if let Some(max) = self.max_joint_index {
            if pose.joint_count() <= max {
                pose.set_joint_count(max + 1);
            }
        }

        let entry = &self.clips[index];
        let local_time = entry.local_time(time);
        let mut out = [0.0f32; 4];
        for &(joint, track_index) in &entry.bound_tracks {
            let Some(track) = entry.clip.track(track_index) else {
                continue;
            };
            for (target, channel) in track.channels() {
                // Bezier channels are rejected when the clip is decoded.
                if channel.evaluate(local_time, &mut out).is_err() {
                    continue;
                }
                match target {
                    ChannelTarget::Position => {
                        pose.set_position(joint, Vec3::new(out[0], out[1], out[2]))
                    }
                    ChannelTarget::Orientation => pose.set_orientation(
                        joint,
                        Quat::from_xyzw(out[0], out[1], out[2], out[3]),
                    ),
                    ChannelTarget::Scale => pose.set_scale(joint, out[0]),
                }
            }
        }
    }

    /// Root-node position at timeline time `time`.
    pub fn evaluate_root_position(&self, time: f32) -> Vec3 {
        match self.find_clip(time) {
            Some(index) => self.clips[index].root_position(time),
            None => Vec3::ZERO,
        }
    }

    /// Root displacement travelling forward from `time0` to `time1`.
    ///
    /// When `time1 < time0` the timeline is assumed to loop: the result is the
    /// way from `time0` to the end of the timeline plus the way from its start
    /// to `time1`. Crossing a clip boundary never subtracts positions of two
    /// different clips; each clip contributes the distance travelled inside
    /// its own window.
    pub fn evaluate_root_offset(&self, time0: f32, time1: f32) -> Vec3 {
        let (Some(c0), Some(c1)) = (self.find_clip(time0), self.find_clip(time1)) else {
            return Vec3::ZERO;
        };

        let clip0 = &self.clips[c0];
        if c0 == c1 && time0 <= time1 {
            return clip0.root_position(time1) - clip0.root_position(time0);
        }

        let mut offset = clip0.root_end() - clip0.root_position(time0);
        let count = self.clips.len();
        let mut i = (c0 + 1) % count;
        while i != c1 {
            let entry = &self.clips[i];
            offset += entry.root_end() - entry.root_start();
            i = (i + 1) % count;
        }
        let clip1 = &self.clips[c1];
        offset + (clip1.root_position(time1) - clip1.root_start())
    }
}
