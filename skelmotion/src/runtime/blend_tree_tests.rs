use crate::test_fixtures::{
    assert_approx, assert_vec3_approx, moving_clip, skeleton, static_clip,
};
use crate::{BlendNodeKind, BlendTree, Error, MemoryClipSource, SkeletonPose};
use glam::Vec3;

fn clip_source() -> MemoryClipSource {
    let mut clips = MemoryClipSource::new();
    clips.insert("walk.dvaf", moving_clip("root", 4.0, Vec3::X));
    clips.insert("run.dvaf", moving_clip("root", 2.0, Vec3::X * 4.0));
    clips.insert("low.dvaf", static_clip("root", 2.0, Vec3::X));
    clips.insert("high.dvaf", static_clip("root", 4.0, Vec3::Y));
    clips.insert("step.dvaf", static_clip("root", 1.0, Vec3::Z));
    clips.insert("base.dvaf", static_clip("root", 1.0, Vec3::new(1.0, 2.0, 3.0)));
    clips.insert("delta.dvaf", static_clip("root", 1.0, Vec3::new(0.5, 0.5, 0.5)));
    clips
}

fn load(json: &str) -> Result<BlendTree, Error> {
    BlendTree::from_json_str(json, &mut clip_source())
}

fn root_position(tree: &BlendTree, phase_index: u32, phase: f32, params: &[f32]) -> Vec3 {
    let mut pose = SkeletonPose::default();
    tree.evaluate_pose(phase_index, phase, params, &mut pose);
    pose.joint_transform(0).position()
}

const TWO_PHASE_WALK: &str = r#"
{
  "phases-count": 2,
  "clip": "walk.dvaf",
  "sync-points": ["2", "4"],
  "markers": { "left-foot": "1", "right-foot": ["3", "0"] }
}
"#;

#[test]
fn sync_points_define_phase_durations() {
    let mut tree = load(TWO_PHASE_WALK).expect("load tree");
    tree.bind_skeleton(&skeleton(&["root"]));

    assert_eq!(tree.phases_count(), 2);
    assert_eq!(tree.animations()[0].phase_ends, vec![0.5, 1.0]);
    assert_approx(tree.evaluate_phase_duration(0, &[]), 2.0);
    assert_approx(tree.evaluate_phase_duration(1, &[]), 2.0);

    assert_vec3_approx(root_position(&tree, 0, 0.5, &[]), Vec3::X);
    assert_vec3_approx(root_position(&tree, 1, 0.5, &[]), Vec3::X * 3.0);
}

#[test]
fn markers_are_converted_to_phase_ids_and_sorted() {
    let tree = load(TWO_PHASE_WALK).expect("load tree");
    let markers: Vec<(f32, &str)> = tree
        .markers()
        .iter()
        .map(|m| (m.phase_id, m.marker_id.as_str()))
        .collect();
    assert_eq!(
        markers,
        vec![(0.0, "right-foot"), (0.5, "left-foot"), (1.5, "right-foot")]
    );
}

#[test]
fn root_offset_follows_phase_positions() {
    let mut tree = load(TWO_PHASE_WALK).expect("load tree");
    tree.bind_root_node("root");
    assert_vec3_approx(tree.evaluate_root_offset(0, 0.5, 1, 0.5, &[]), Vec3::X * 2.0);
    // Looping from the end of phase 1 into phase 0.
    assert_vec3_approx(tree.evaluate_root_offset(1, 0.75, 0, 0.25, &[]), Vec3::X);
}

const SPEED_BLEND: &str = r#"
{
  "operation": { "type": "LERP1D", "parameter": "speed" },
  "nodes": [
    { "param-value": 3, "clip": "high.dvaf" },
    { "param-value": "1", "clip": "low.dvaf" }
  ]
}
"#;

#[test]
fn lerp_children_are_sorted_by_coordinate() {
    let tree = load(SPEED_BLEND).expect("load tree");
    assert_eq!(tree.parameter_ids(), ["speed".to_string()]);
    let BlendNodeKind::Lerp1D {
        children,
        parameter,
    } = &tree.nodes()[0].kind
    else {
        panic!("root is not a LERP1D node");
    };
    assert_eq!(*parameter, Some(0));
    assert_eq!(tree.nodes()[children.start].coord.x, 1.0);
    assert_eq!(tree.nodes()[children.start + 1].coord.x, 3.0);
}

#[test]
fn lerp_clamps_to_outer_children() {
    let mut tree = load(SPEED_BLEND).expect("load tree");
    tree.bind_skeleton(&skeleton(&["root"]));

    assert_vec3_approx(root_position(&tree, 0, 0.3, &[-5.0]), Vec3::X);
    assert_approx(tree.evaluate_phase_duration(0, &[-5.0]), 2.0);
    assert_vec3_approx(root_position(&tree, 0, 0.3, &[10.0]), Vec3::Y);
    assert_approx(tree.evaluate_phase_duration(0, &[10.0]), 4.0);
    // Unbound parameter reads as 0, below the first child.
    assert_vec3_approx(root_position(&tree, 0, 0.3, &[]), Vec3::X);
}

#[test]
fn lerp_at_a_coordinate_selects_that_child() {
    let mut tree = load(SPEED_BLEND).expect("load tree");
    tree.bind_skeleton(&skeleton(&["root"]));

    assert_vec3_approx(root_position(&tree, 0, 0.0, &[1.0]), Vec3::X);
    assert_vec3_approx(root_position(&tree, 0, 0.0, &[3.0]), Vec3::Y);
}

#[test]
fn lerp_blends_between_neighbours() {
    let mut tree = load(SPEED_BLEND).expect("load tree");
    tree.bind_skeleton(&skeleton(&["root"]));

    assert_vec3_approx(root_position(&tree, 0, 0.0, &[1.5]), Vec3::new(0.75, 0.25, 0.0));
    assert_approx(tree.evaluate_phase_duration(0, &[1.5]), 2.5);
}

#[test]
fn coincident_coordinates_do_not_divide_by_zero() {
    let json = r#"
    {
      "operation": { "type": "LERP1D", "parameter": "speed" },
      "nodes": [
        { "param-value": 1, "clip": "low.dvaf" },
        { "param-value": 1, "clip": "high.dvaf" }
      ]
    }"#;
    let mut tree = load(json).expect("load tree");
    tree.bind_skeleton(&skeleton(&["root"]));
    for value in [0.0, 1.0, 2.0] {
        let position = root_position(&tree, 0, 0.5, &[value]);
        assert!(position.is_finite(), "speed {value}: {position:?}");
        assert!(tree.evaluate_phase_duration(0, &[value]).is_finite());
    }
}

#[test]
fn add_and_diff_combine_two_children() {
    let add = r#"
    {
      "operation": { "type": "Add" },
      "nodes": [ { "clip": "base.dvaf" }, { "clip": "delta.dvaf" } ]
    }"#;
    let mut tree = load(add).expect("load tree");
    tree.bind_skeleton(&skeleton(&["root"]));
    assert_vec3_approx(root_position(&tree, 0, 0.0, &[]), Vec3::new(1.5, 2.5, 3.5));
    assert_approx(tree.evaluate_phase_duration(0, &[]), 1.0);

    let diff = add.replace("\"Add\"", "\"Diff\"");
    let mut tree = load(&diff).expect("load tree");
    tree.bind_skeleton(&skeleton(&["root"]));
    assert_vec3_approx(root_position(&tree, 0, 0.0, &[]), Vec3::new(0.5, 1.5, 2.5));
}

#[test]
fn phase_duration_of_add_is_the_longest_child() {
    let json = r#"
    {
      "operation": { "type": "Add" },
      "nodes": [ { "clip": "step.dvaf" }, { "clip": "high.dvaf" } ]
    }"#;
    let tree = load(json).expect("load tree");
    assert_approx(tree.evaluate_phase_duration(0, &[]), 4.0);
}

#[test]
fn parameters_are_deduplicated_in_first_seen_order() {
    let json = r#"
    {
      "operation": { "type": "LERP1D", "parameter": "speed" },
      "nodes": [
        {
          "param-value": 0,
          "operation": { "type": "LERP1D", "parameter": "slope" },
          "nodes": [ { "clip": "low.dvaf" } ]
        },
        {
          "param-value": 1,
          "operation": { "type": "LERP1D", "parameter": "speed" },
          "nodes": [ { "clip": "high.dvaf" } ]
        }
      ]
    }"#;
    let tree = load(json).expect("load tree");
    assert_eq!(tree.parameter_ids(), ["speed".to_string(), "slope".to_string()]);
    assert_eq!(tree.parameter_index("slope"), Some(1));
    assert_eq!(tree.parameter_index("missing"), None);
}

#[test]
fn animation_list_concatenates_clips_and_offsets_sync_points() {
    let json = r#"
    {
      "phases-count": 4,
      "animation": [
        { "clip": "step.dvaf", "sync-points": ["0.5"] },
        { "clip": "step.dvaf", "sync-points": ["15/30", "1"] }
      ]
    }"#;
    let tree = load(json).expect("load tree");
    let animation = &tree.animations()[0];
    assert_approx(animation.skeleton_animation.duration(), 2.0);
    assert_eq!(animation.phase_ends, vec![0.25, 0.5, 0.75, 1.0]);
    assert_approx(tree.evaluate_phase_duration(2, &[]), 0.5);
}

#[test]
fn range_trims_the_clip() {
    let json = r#"{ "clip": "walk.dvaf", "range": ["1", "60/20"] }"#;
    let mut tree = load(json).expect("load tree");
    tree.bind_skeleton(&skeleton(&["root"]));
    assert_approx(tree.evaluate_phase_duration(0, &[]), 2.0);
    assert_vec3_approx(root_position(&tree, 0, 0.0, &[]), Vec3::X);
    assert_vec3_approx(root_position(&tree, 0, 1.0, &[]), Vec3::X * 3.0);
}

#[test]
fn ignore_mask_is_inherited_by_children() {
    let mut clips = clip_source();
    let mut writer = crate::ClipWriter::new();
    for uid in ["root", "chest", "head"] {
        let track = writer.add_track(uid, uid);
        writer.add_scale_keys(track, &[(0.0, 2.0), (1.0, 2.0)]);
    }
    clips.insert("body.dvaf", crate::test_fixtures::clip_from(&writer));

    let json = r#"
    {
      "ignore-mask": ["1"],
      "operation": { "type": "LERP1D" },
      "nodes": [ { "clip": "body.dvaf", "ignore-mask": [2] } ]
    }"#;
    let mut tree = BlendTree::from_json_str(json, &mut clips).expect("load tree");
    tree.bind_skeleton(&skeleton(&["root", "chest", "head"]));

    let mut pose = SkeletonPose::default();
    tree.evaluate_pose(0, 0.0, &[], &mut pose);
    assert!(pose.joint_transform(0).has_scale());
    assert!(!pose.joint_transform(1).has_scale());
    assert!(!pose.joint_transform(2).has_scale());
}

#[test]
fn pose_animation_ignores_phases() {
    let json = r#"
    {
      "phases-count": 3,
      "clip": "walk.dvaf",
      "treat-as-pose": "true"
    }"#;
    let mut tree = load(json).expect("load tree");
    tree.bind_skeleton(&skeleton(&["root"]));
    assert!(tree.animations()[0].treat_as_pose);
    assert_approx(tree.evaluate_phase_duration(1, &[]), 0.0);
    assert_vec3_approx(root_position(&tree, 2, 0.9, &[]), Vec3::ZERO);
}

#[test]
fn rejects_lerp_2d() {
    let json = r#"
    {
      "operation": { "type": "LERP2D", "parameter": "direction" },
      "nodes": [ { "param-value": [0, 1], "clip": "walk.dvaf" } ]
    }"#;
    assert!(matches!(load(json), Err(Error::UnsupportedNodeType { name }) if name == "LERP2D"));
}

#[test]
fn rejects_unknown_node_type() {
    let json = r#"{ "operation": { "type": "Blend3" }, "nodes": [] }"#;
    assert!(matches!(load(json), Err(Error::UnknownEnumValue { .. })));
}

#[test]
fn rejects_phase_count_mismatch() {
    let json = r#"{ "phases-count": 3, "clip": "walk.dvaf", "sync-points": ["2"] }"#;
    assert!(matches!(
        load(json),
        Err(Error::PhaseCountMismatch {
            expected: 3,
            found: 2,
            ..
        })
    ));
}

#[test]
fn rejects_wrong_child_counts() {
    let json = r#"{ "operation": { "type": "Diff" }, "nodes": [ { "clip": "walk.dvaf" } ] }"#;
    assert!(matches!(
        load(json),
        Err(Error::InvalidChildCount {
            expected: 2,
            found: 1,
            ..
        })
    ));
}

#[test]
fn rejects_bad_sync_points_and_ranges() {
    let json = r#"{ "phases-count": 3, "clip": "walk.dvaf", "sync-points": ["3", "2"] }"#;
    assert!(matches!(load(json), Err(Error::InvalidPhaseEnds { .. })));

    let json = r#"{ "clip": "walk.dvaf", "range": ["2", "1"] }"#;
    assert!(matches!(load(json), Err(Error::InvalidRange { .. })));

    let json = r#"{ "clip": "walk.dvaf", "range": ["a/b", "1"] }"#;
    assert!(matches!(load(json), Err(Error::InvalidTimestamp { .. })));
}

#[test]
fn rejects_clip_and_animation_together() {
    let json = r#"{ "clip": "walk.dvaf", "animation": [ { "clip": "run.dvaf" } ] }"#;
    assert!(matches!(load(json), Err(Error::ConfigParse { .. })));
}

#[test]
fn reports_missing_clips() {
    let json = r#"{ "clip": "missing.dvaf" }"#;
    assert!(matches!(load(json), Err(Error::ClipLoad { path, .. }) if path == "missing.dvaf"));
}
