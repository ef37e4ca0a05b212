use crate::test_fixtures::{
    assert_approx, assert_vec3_approx, moving_clip, skeleton, static_clip,
};
use crate::{
    BlendTree, Error, MemoryClipSource, Motion, MotionId, MotionTransitionInfo, PhaseClock,
    SkeletonPose, TransitionId, TransitionTarget,
};
use glam::Vec3;
use std::cell::Cell;
use std::rc::Rc;

fn clip_source() -> MemoryClipSource {
    let mut clips = MemoryClipSource::new();
    clips.insert("walk.dvaf", moving_clip("root", 4.0, Vec3::X));
    clips.insert("low.dvaf", static_clip("root", 2.0, Vec3::X));
    clips.insert("high.dvaf", static_clip("root", 4.0, Vec3::Y));
    clips
}

fn motion(json: &str) -> Motion {
    let tree = BlendTree::from_json_str(json, &mut clip_source()).expect("load tree");
    let mut motion = Motion::new("walk", tree);
    motion.bind_skeleton(&skeleton(&["root"]));
    motion.bind_root_node("root");
    motion
}

const TWO_PHASE_WALK: &str = r#"
{
  "phases-count": 2,
  "clip": "walk.dvaf",
  "sync-points": ["2"],
  "markers": { "left-foot": "1", "right-foot": ["0", "3"] }
}
"#;

const SPEED_BLEND: &str = r#"
{
  "operation": { "type": "LERP1D", "parameter": "speed" },
  "nodes": [
    { "param-value": 0, "clip": "low.dvaf" },
    { "param-value": 1, "clip": "high.dvaf" }
  ]
}
"#;

#[test]
fn update_advances_phase_by_phase_duration() {
    let mut motion = motion(TWO_PHASE_WALK);
    motion.update(1.0);
    assert_eq!(motion.phase_index(), 0);
    assert_approx(motion.phase(), 0.5);

    motion.update(2.0);
    assert_eq!(motion.phase_index(), 1);
    assert_approx(motion.phase(), 0.5);
    assert_eq!(motion.clock().prev_phase_index, 0);
}

#[test]
fn split_updates_match_a_single_update() {
    let mut whole = motion(TWO_PHASE_WALK);
    let mut split = motion(TWO_PHASE_WALK);
    whole.update(3.0);
    split.update(1.5);
    split.update(1.5);
    assert_eq!(whole.clock().phase_index, split.clock().phase_index);
    assert_approx(whole.phase(), split.phase());
}

#[test]
fn reaching_a_sync_point_ends_the_phase() {
    let mut motion = motion(TWO_PHASE_WALK);
    motion.update(2.0);
    assert_eq!(motion.phase_index(), 1);
    assert_approx(motion.phase(), 0.0);
    assert!(motion.is_phase_end_reached(0));
    assert!(!motion.is_phase_end_reached(1));
    assert!(!motion.is_animation_end_reached());

    motion.update(0.5);
    assert!(!motion.is_phase_end_reached(0));
}

#[test]
fn wrapping_reports_animation_end() {
    let mut motion = motion(TWO_PHASE_WALK);
    motion.update(2.0);
    motion.update(2.0);
    assert_eq!(motion.phase_index(), 0);
    assert!(motion.is_animation_end_reached());
    assert!(motion.is_phase_end_reached(1));

    motion.update(0.1);
    assert!(!motion.is_animation_end_reached());
}

#[test]
fn single_phase_motion_reports_its_phase_end() {
    let mut motion = motion(r#"{ "clip": "walk.dvaf" }"#);
    motion.update(4.0);
    assert!(motion.is_animation_end_reached());
    assert!(motion.is_phase_end_reached(0));
}

#[test]
fn markers_are_reported_once_per_crossing() {
    let mut motion = motion(TWO_PHASE_WALK);
    motion.update(1.0);
    assert_eq!(motion.reached_markers(), ["right-foot".to_string()]);

    motion.update(1.0);
    assert!(motion.is_marker_reached("left-foot"));
    assert!(!motion.is_marker_reached("right-foot"));

    motion.update(0.5);
    assert!(motion.reached_markers().is_empty());
}

#[test]
fn markers_are_detected_across_the_loop() {
    let mut motion = motion(TWO_PHASE_WALK);
    motion.update(1.0);
    motion.update(1.0);
    motion.update(1.0);
    // 3.0s into the clip; the next step wraps to 0.5s.
    motion.update(1.5);
    assert!(motion.is_animation_end_reached());
    assert_eq!(motion.reached_markers(), ["right-foot".to_string()]);
}

#[test]
fn root_offset_follows_the_clock() {
    let mut motion = motion(TWO_PHASE_WALK);
    motion.update(1.0);
    assert_vec3_approx(motion.root_offset_delta(), Vec3::X);
    motion.update(2.0);
    assert_vec3_approx(motion.root_offset_delta(), Vec3::X * 2.0);

    motion.update(0.5);
    motion.update(1.0);
    // 3.5s -> 0.5s around the loop.
    assert_vec3_approx(motion.root_offset_delta(), Vec3::X);

    motion.reset();
    assert_vec3_approx(motion.root_offset_delta(), Vec3::ZERO);
    assert_eq!(motion.clock(), PhaseClock::default());
}

#[test]
fn bound_parameters_drive_the_blend() {
    let mut motion = motion(SPEED_BLEND);
    let speed = Rc::new(Cell::new(0.0));
    assert!(motion.bind_parameter("speed", Some(speed.clone())));
    assert!(!motion.bind_parameter("slope", Some(speed.clone())));

    motion.update(1.0);
    assert_approx(motion.phase(), 0.5);

    speed.set(1.0);
    motion.update(1.0);
    assert_approx(motion.phase(), 0.75);
    let mut pose = SkeletonPose::default();
    motion.evaluate_pose(&mut pose);
    assert_vec3_approx(pose.joint_transform(0).position(), Vec3::Y);

    motion.unbind_parameters();
    motion.evaluate_pose(&mut pose);
    assert_vec3_approx(pose.joint_transform(0).position(), Vec3::X);
}

#[test]
fn evaluation_reads_the_current_parameter_value() {
    let mut motion = motion(SPEED_BLEND);
    let speed = Rc::new(Cell::new(0.0));
    motion.bind_parameter("speed", Some(speed.clone()));
    motion.update(1.0);

    speed.set(0.5);
    let mut pose = SkeletonPose::default();
    motion.evaluate_pose(&mut pose);
    assert_vec3_approx(pose.joint_transform(0).position(), Vec3::new(0.5, 0.5, 0.0));

    speed.set(1.0);
    motion.evaluate_pose(&mut pose);
    assert_vec3_approx(pose.joint_transform(0).position(), Vec3::Y);
}

#[test]
fn sync_phase_copies_remaps_and_mirrors() {
    let source = PhaseClock {
        phase_index: 1,
        prev_phase_index: 0,
        phase: 0.3,
    };

    let mut motion = motion(TWO_PHASE_WALK);
    motion.sync_phase(&source, &MotionTransitionInfo::default());
    assert_eq!(motion.phase_index(), 1);
    assert_approx(motion.phase(), 0.3);

    let mut info = MotionTransitionInfo {
        inverse_phase: true,
        ..MotionTransitionInfo::default()
    };
    info.phase_map.insert(1, 0);
    motion.sync_phase(&source, &info);
    assert_eq!(motion.phase_index(), 0);
    assert_approx(motion.phase(), 0.7);

    let info = MotionTransitionInfo {
        sync_phase: false,
        ..MotionTransitionInfo::default()
    };
    let far = PhaseClock {
        phase_index: 7,
        ..source
    };
    motion.sync_phase(&far, &info);
    assert_eq!(motion.phase_index(), 1);
    assert_approx(motion.phase(), 0.7);
}

#[test]
fn phase_specific_transitions_take_precedence() {
    let mut motion = motion(TWO_PHASE_WALK);
    let any_phase = TransitionTarget {
        info: TransitionId(0),
        motion: MotionId(1),
    };
    let second_phase = TransitionTarget {
        info: TransitionId(1),
        motion: MotionId(2),
    };
    motion.add_transition("run", any_phase, None);
    motion.add_transition("run", second_phase, Some(1));
    motion.add_transition("land", second_phase, Some(1));

    assert_eq!(motion.transition("run"), Some(any_phase));
    assert_eq!(motion.transition("land"), None);
    motion.update(2.5);
    assert_eq!(motion.transition("run"), Some(second_phase));
    assert_eq!(motion.transition("land"), Some(second_phase));
    assert_eq!(motion.transition("jump"), None);
}

#[test]
fn motion_config_requires_id_and_tree() {
    let config = serde_json::json!({
        "motion-id": "idle",
        "blend-tree": { "clip": "low.dvaf" }
    });
    let motion = Motion::from_config(&config, &mut clip_source()).expect("load motion");
    assert_eq!(motion.id(), "idle");
    assert_eq!(motion.blend_tree().phases_count(), 1);

    let config = serde_json::json!({ "motion-id": "idle" });
    assert!(matches!(
        Motion::from_config(&config, &mut clip_source()),
        Err(Error::ConfigMissingKey { key, .. }) if key == "blend-tree"
    ));
}
