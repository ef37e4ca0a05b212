use crate::test_fixtures::{assert_vec3_approx, moving_clip, skeleton, static_clip};
use crate::{
    Error, MemoryClipSource, MotionBlend, MotionLayer, MotionStack, MotionTransitionInfo,
    TransitionFunc, TransitionSync, TransitionType,
};
use glam::Vec3;
use std::cell::Cell;
use std::rc::Rc;

fn clip_source() -> MemoryClipSource {
    let mut clips = MemoryClipSource::new();
    clips.insert("walk.dvaf", moving_clip("root", 2.0, Vec3::ONE));
    clips.insert("run.dvaf", moving_clip("root", 2.0, Vec3::X * 3.0));
    clips.insert("idle.dvaf", static_clip("root", 2.0, Vec3::new(2.0, 1.0, 3.0)));
    clips.insert("stride.dvaf", moving_clip("root", 2.0, Vec3::X));
    clips.insert("lean.dvaf", static_clip("root", 2.0, Vec3::Y * 0.5));
    clips.insert("sway.dvaf", moving_clip("root", 2.0, Vec3::Z));
    clips
}

const LOCOMOTION: &str = r#"
{
  "layer-id": "base",
  "blend-mode": "Override",
  "default-motion": "idle",
  "motions": [
    { "motion-id": "walk", "blend-tree": { "clip": "walk.dvaf" } },
    {
      "motion-id": "run",
      "blend-tree": {
        "operation": { "type": "LERP1D", "parameter": "speed" },
        "nodes": [
          { "param-value": 0, "clip": "walk.dvaf" },
          { "param-value": 1, "clip": "run.dvaf" }
        ]
      }
    },
    {
      "motion-id": "idle",
      "blend-tree": {
        "operation": { "type": "LERP1D", "parameter": "breath" },
        "nodes": [ { "clip": "idle.dvaf", "markers": { "blink": "0.5" } } ]
      }
    }
  ],
  "transitions": [
    { "src-motion": "idle", "dst-motion": "walk", "trigger": "go", "type": "CrossFade", "duration": "1" },
    { "src-motion": "walk", "dst-motion": "idle", "trigger": "stop", "duration": 1 },
    { "src-motion": "walk", "dst-motion": "run", "trigger": "hurry", "type": "Replace" },
    { "src-motion": "idle", "dst-motion": "nowhere", "trigger": "lost" },
    { "src-motion": "idle", "trigger": "dangling" }
  ],
  "root-transform": {
    "root-node": "root",
    "extract-position-x": "true",
    "extract-position-z": true,
    "reset-position-x": "1"
  }
}
"#;

fn layer() -> MotionLayer {
    let mut layer = MotionLayer::from_json_str(LOCOMOTION, &mut clip_source()).expect("load layer");
    layer.bind_skeleton(&skeleton(&["root"]));
    layer
}

fn current_id(layer: &MotionLayer) -> &str {
    layer.current_motion().map_or("", |m| m.id())
}

fn next_id(layer: &MotionLayer) -> Option<&str> {
    layer.next_motion().map(|m| m.id())
}

#[test]
fn layer_config_is_loaded() {
    let layer = layer();
    assert_eq!(layer.layer_id(), "base");
    assert_eq!(layer.blend_mode(), MotionBlend::Override);
    assert_eq!(layer.motion_ids().collect::<Vec<_>>(), ["walk", "run", "idle"]);
    assert_eq!(current_id(&layer), "idle");
    assert_eq!(
        layer.parameter_ids(),
        ["breath".to_string(), "speed".to_string()]
    );

    let idle = layer.current_motion().expect("idle");
    assert!(idle.transition("go").is_some());
    assert!(idle.transition("lost").is_none());
    assert!(idle.transition("dangling").is_none());
}

#[test]
fn triggers_are_applied_on_the_next_update() {
    let mut layer = layer();
    layer.trigger_event("go");
    assert_eq!(current_id(&layer), "idle");
    assert_eq!(next_id(&layer), None);

    layer.update(0.5);
    assert_eq!(current_id(&layer), "idle");
    assert_eq!(next_id(&layer), Some("walk"));
    assert!(layer.transition().is_started());

    layer.update(0.5);
    assert_eq!(current_id(&layer), "walk");
    assert_eq!(next_id(&layer), None);
}

#[test]
fn unknown_triggers_are_ignored() {
    let mut layer = layer();
    layer.trigger_event("dance");
    layer.update(0.1);
    assert_eq!(current_id(&layer), "idle");
    assert_eq!(next_id(&layer), None);
}

#[test]
fn root_position_is_reset_on_masked_axes() {
    let mut layer = layer();
    layer.update(0.5);
    assert_vec3_approx(
        layer.current_pose().joint_transform(0).position(),
        Vec3::new(0.0, 1.0, 3.0),
    );
    assert_vec3_approx(layer.current_root_offset_delta(), Vec3::ZERO);
}

#[test]
fn root_offset_is_extracted_on_masked_axes() {
    let mut layer = layer();
    layer.trigger_event("go");
    layer.update(0.5);
    layer.update(0.5);
    assert_eq!(current_id(&layer), "walk");

    layer.update(1.0);
    assert_vec3_approx(layer.current_root_offset_delta(), Vec3::new(1.0, 0.0, 1.0));
    assert_eq!(layer.ended_motions(), ["walk".to_string()]);

    layer.update(0.5);
    assert!(layer.ended_motions().is_empty());
}

#[test]
fn markers_carry_the_motion_id() {
    let mut layer = layer();
    layer.update(0.6);
    assert_eq!(
        layer.reached_markers(),
        [("idle".to_string(), "blink".to_string())]
    );
    layer.update(0.6);
    assert!(layer.reached_markers().is_empty());
}

#[test]
fn blocked_trigger_waits_for_the_running_transition() {
    let mut layer = layer();
    layer.trigger_event("go");
    layer.update(0.5);

    // A replace cannot interrupt the cross-fade; it is kept until it ends.
    layer.trigger_event("hurry");
    layer.update(0.25);
    assert_eq!(current_id(&layer), "idle");
    assert_eq!(next_id(&layer), Some("walk"));

    layer.update(0.25);
    assert_eq!(current_id(&layer), "walk");

    layer.update(0.1);
    assert_eq!(current_id(&layer), "run");
    assert_eq!(next_id(&layer), None);
}

#[test]
fn reverse_trigger_turns_the_transition_around() {
    let mut layer = layer();
    layer.trigger_event("go");
    layer.update(0.25);

    layer.trigger_event("stop");
    layer.update(0.125);
    assert_eq!(current_id(&layer), "walk");
    assert_eq!(next_id(&layer), Some("idle"));

    layer.update(0.5);
    assert_eq!(current_id(&layer), "idle");
    assert_eq!(next_id(&layer), None);
}

#[test]
fn activate_motion_switches_without_blending() {
    let mut layer = layer();
    let run = layer.find_motion("run").expect("run");
    layer.activate_motion(run);
    layer.update(0.5);
    assert_eq!(current_id(&layer), "run");
    assert_eq!(next_id(&layer), None);
    // Speed is unbound: the walk child plays.
    assert_vec3_approx(layer.current_root_offset_delta(), Vec3::new(0.5, 0.0, 0.5));
}

#[test]
fn parameters_are_bound_across_motions() {
    let mut layer = layer();
    let speed = Rc::new(Cell::new(1.0));
    assert!(layer.bind_parameter("speed", speed.clone()));
    assert!(!layer.bind_parameter("slope", speed));

    let run = layer.find_motion("run").expect("run");
    layer.activate_motion(run);
    layer.update(0.5);
    assert_vec3_approx(layer.current_root_offset_delta(), Vec3::new(1.5, 0.0, 0.0));

    assert!(layer.unbind_parameter("speed"));
    layer.update(0.5);
    assert_vec3_approx(layer.current_root_offset_delta(), Vec3::new(0.5, 0.0, 0.5));
}

#[test]
fn layer_config_rejects_unknown_blend_mode() {
    let json = r#"{ "layer-id": "base", "blend-mode": "Multiply", "motions": [] }"#;
    assert!(matches!(
        MotionLayer::from_json_str(json, &mut clip_source()),
        Err(Error::UnknownEnumValue { value, .. }) if value == "Multiply"
    ));
}

#[test]
fn transition_config_is_parsed() {
    let config = serde_json::json!({
        "type": "FrozenFade",
        "func": "EaseInOut",
        "sync": "WaitPhaseEnd",
        "duration": "0.25",
        "wait-phase": "2",
        "sync-phase": "no",
        "inverse-phase": 1,
        "phase-map": ["0 -> 1", "1->0"]
    });
    let info = MotionTransitionInfo::from_config(&config).expect("parse transition");
    assert_eq!(info.transition_type, TransitionType::FrozenFade);
    assert_eq!(info.func, TransitionFunc::EaseInOut);
    assert_eq!(info.sync, TransitionSync::WaitPhaseEnd);
    assert_eq!(info.duration, 0.25);
    assert_eq!(info.phase_wait, 2);
    assert!(!info.sync_phase);
    assert!(info.inverse_phase);
    assert_eq!(info.phase_map.get(&0), Some(&1));
    assert_eq!(info.phase_map.get(&1), Some(&0));

    let defaults = MotionTransitionInfo::from_config(&serde_json::json!({})).expect("parse");
    assert_eq!(defaults, MotionTransitionInfo::default());
    assert!(defaults.sync_phase);
}

#[test]
fn transition_config_errors() {
    let missing_marker = serde_json::json!({ "sync": "WaitMarker" });
    assert!(matches!(
        MotionTransitionInfo::from_config(&missing_marker),
        Err(Error::ConfigMissingKey { key, .. }) if key == "wait-marker"
    ));

    let bad_map = serde_json::json!({ "phase-map": ["0 => 1"] });
    assert!(matches!(
        MotionTransitionInfo::from_config(&bad_map),
        Err(Error::InvalidPhaseMap { .. })
    ));

    let bad_type = serde_json::json!({ "type": "Teleport" });
    assert!(matches!(
        MotionTransitionInfo::from_config(&bad_type),
        Err(Error::UnknownEnumValue { .. })
    ));
}

const STACK: &str = r#"
{
  "layers": [
    {
      "layer-id": "base",
      "motions": [ { "motion-id": "stride", "blend-tree": { "clip": "stride.dvaf" } } ],
      "root-transform": {
        "root-node": "root",
        "extract-position-x": true,
        "extract-position-y": true,
        "extract-position-z": true
      }
    },
    {
      "layer-id": "lean",
      "blend-mode": "Add",
      "motions": [ { "motion-id": "lean", "blend-tree": { "clip": "lean.dvaf" } } ]
    },
    {
      "layer-id": "sway",
      "blend-mode": "Diff",
      "motions": [
        { "motion-id": "sway", "blend-tree": { "clip": "sway.dvaf", "markers": { "tick": "0" } } }
      ],
      "root-transform": { "root-node": "root", "extract-position-z": "on" }
    }
  ]
}
"#;

fn stack() -> MotionStack {
    let mut stack = MotionStack::from_json_str(STACK, &mut clip_source()).expect("load stack");
    stack.bind_skeleton(&skeleton(&["root"]));
    stack
}

#[test]
fn stack_composes_layers_bottom_up() {
    let mut stack = stack();
    assert_eq!(stack.layers().len(), 3);
    assert_eq!(stack.layer("lean").map(|l| l.blend_mode()), Some(MotionBlend::Add));

    stack.update(1.0);
    assert_vec3_approx(
        stack.pose().joint_transform(0).position(),
        Vec3::new(1.0, 0.5, -1.0),
    );
    assert_vec3_approx(stack.root_offset_delta(), Vec3::new(1.0, 0.0, -1.0));
}

#[test]
fn stack_reports_markers_and_ended_motions() {
    let mut stack = stack();
    stack.update(1.0);
    assert_eq!(
        stack.reached_markers(),
        [("sway".to_string(), "sway".to_string(), "tick".to_string())]
    );
    assert_eq!(stack.ended_motions().count(), 0);

    stack.update(1.0);
    assert_eq!(
        stack.ended_motions().collect::<Vec<_>>(),
        [("base", "stride"), ("lean", "lean"), ("sway", "sway")]
    );
}

#[test]
fn stack_forwards_parameters_and_triggers() {
    let mut stack = stack();
    assert!(!stack.bind_parameter("speed", Rc::new(Cell::new(1.0))));
    stack.trigger_event("go");
    stack.update(0.5);
    let base = stack.layer_mut("base").expect("base layer");
    assert_eq!(base.current_motion().map(|m| m.id()), Some("stride"));
}
