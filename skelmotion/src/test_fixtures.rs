#![allow(dead_code)]

use crate::{AnimationClip, ClipWriter, JointData, SkeletonData};
use glam::{Quat, Vec3};

pub(crate) fn skeleton(uids: &[&str]) -> SkeletonData {
    SkeletonData::new(
        uids.iter()
            .enumerate()
            .map(|(i, uid)| JointData {
                name: uid.to_string(),
                uid: uid.to_string(),
                parent: if i == 0 { None } else { Some(0) },
            })
            .collect(),
    )
}

/// Clip moving joint `uid` from the origin along `velocity` for `duration`
/// seconds.
pub(crate) fn moving_clip(uid: &str, duration: f32, velocity: Vec3) -> AnimationClip {
    let mut writer = ClipWriter::new();
    let track = writer.add_track(uid, uid);
    writer.add_position_keys(
        track,
        &[(0.0, Vec3::ZERO), (duration, velocity * duration)],
    );
    clip_from(&writer)
}

/// Clip holding joint `uid` at `position` for `duration` seconds.
pub(crate) fn static_clip(uid: &str, duration: f32, position: Vec3) -> AnimationClip {
    let mut writer = ClipWriter::new();
    let track = writer.add_track(uid, uid);
    writer.add_position_keys(track, &[(0.0, position), (duration, position)]);
    clip_from(&writer)
}

/// Clip rotating joint `uid` about Z from 0 to `angle` radians.
pub(crate) fn turning_clip(uid: &str, duration: f32, angle: f32) -> AnimationClip {
    let mut writer = ClipWriter::new();
    let track = writer.add_track(uid, uid);
    writer.add_orientation_keys(
        track,
        &[
            (0.0, Quat::IDENTITY),
            (duration, Quat::from_rotation_z(angle)),
        ],
    );
    clip_from(&writer)
}

pub(crate) fn clip_from(writer: &ClipWriter) -> AnimationClip {
    AnimationClip::from_bytes(&writer.to_bytes()).expect("fixture clip decodes")
}

#[track_caller]
pub(crate) fn assert_approx(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() <= 1e-4,
        "expected {expected}, got {actual}"
    );
}

#[track_caller]
pub(crate) fn assert_vec3_approx(actual: Vec3, expected: Vec3) {
    assert!(
        actual.abs_diff_eq(expected, 1e-4),
        "expected {expected:?}, got {actual:?}"
    );
}
