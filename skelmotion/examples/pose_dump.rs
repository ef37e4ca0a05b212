use serde_json::json;
use skelmotion::{DirClipSource, JointData, MotionStack, SkeletonData};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

fn usage() -> ! {
    eprintln!(
        "usage: pose_dump <stack.json> --joints root,hip:root,... [--clips DIR] [--frames N] \
         [--dt SECONDS] [--param NAME=VALUE]... [--trigger FRAME:EVENT]..."
    );
    std::process::exit(2);
}

/// `uid[:parent_uid]` entries; parents must be listed first.
fn parse_joints(list: &str) -> SkeletonData {
    let mut joints: Vec<JointData> = Vec::new();
    for entry in list.split(',').filter(|s| !s.is_empty()) {
        let (uid, parent) = match entry.split_once(':') {
            Some((uid, parent)) => (uid, Some(parent)),
            None => (entry, None),
        };
        let parent = parent.map(|p| {
            joints
                .iter()
                .position(|j| j.uid == p)
                .unwrap_or_else(|| panic!("joint '{uid}' names unknown parent '{p}'"))
        });
        joints.push(JointData {
            name: uid.to_string(),
            uid: uid.to_string(),
            parent,
        });
    }
    SkeletonData::new(joints)
}

fn main() {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut positional = Vec::<String>::new();
    let mut joints: Option<String> = None;
    let mut clips_dir: Option<PathBuf> = None;
    let mut frames = 30usize;
    let mut dt = 1.0f32 / 30.0;
    let mut params: Vec<(String, f32)> = Vec::new();
    let mut triggers: Vec<(usize, String)> = Vec::new();

    let mut i = 0usize;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match args[i].as_str() {
            "--joints" => joints = value,
            "--clips" => clips_dir = value.map(PathBuf::from),
            "--frames" => frames = value.and_then(|v| v.parse().ok()).unwrap_or(frames),
            "--dt" => dt = value.and_then(|v| v.parse().ok()).unwrap_or(dt),
            "--param" => {
                let value = value.unwrap_or_else(|| usage());
                let (name, v) = value.split_once('=').unwrap_or_else(|| usage());
                params.push((name.to_string(), v.parse().expect("parameter value")));
            }
            "--trigger" => {
                let value = value.unwrap_or_else(|| usage());
                let (frame, event) = value.split_once(':').unwrap_or_else(|| usage());
                triggers.push((frame.parse().expect("trigger frame"), event.to_string()));
            }
            other => {
                positional.push(other.to_string());
                i += 1;
                continue;
            }
        }
        i += 2;
    }

    let Some(config_path) = positional.first().map(PathBuf::from) else {
        usage();
    };
    let skeleton = parse_joints(&joints.unwrap_or_else(|| usage()));
    let clips_dir = clips_dir.unwrap_or_else(|| {
        config_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let config = std::fs::read_to_string(&config_path).expect("read stack config");
    let mut clips = DirClipSource::new(clips_dir);
    let mut stack = MotionStack::from_json_str(&config, &mut clips).expect("parse stack config");
    stack.bind_skeleton(&skeleton);

    let handles: Vec<_> = params
        .iter()
        .map(|(name, value)| {
            let handle = Rc::new(Cell::new(*value));
            if !stack.bind_parameter(name, handle.clone()) {
                eprintln!("warning: no motion uses parameter '{name}'");
            }
            handle
        })
        .collect();

    let mut out = Vec::with_capacity(frames);
    for frame in 0..frames {
        for (_, event) in triggers.iter().filter(|(f, _)| *f == frame) {
            stack.trigger_event(event);
        }
        stack.update(dt);

        let joints: Vec<_> = stack
            .pose()
            .joints()
            .iter()
            .enumerate()
            .map(|(i, joint)| {
                json!({
                    "i": i,
                    "uid": skeleton.joint_uid(i).unwrap_or("<unknown>"),
                    "position": joint.has_position().then(|| joint.position().to_array()),
                    "orientation": joint.has_orientation().then(|| joint.orientation().to_array()),
                    "scale": joint.has_scale().then(|| joint.scale()),
                })
            })
            .collect();

        let layers: Vec<_> = stack
            .layers()
            .iter()
            .map(|layer| {
                json!({
                    "id": layer.layer_id(),
                    "current": layer.current_motion().map(|m| m.id()),
                    "next": layer.next_motion().map(|m| m.id()),
                    "transitionPhase": layer.transition().transition_phase(),
                })
            })
            .collect();

        let markers: Vec<_> = stack
            .reached_markers()
            .iter()
            .map(|(layer, motion, marker)| json!({"layer": layer, "motion": motion, "marker": marker}))
            .collect();
        let ended: Vec<_> = stack
            .ended_motions()
            .map(|(layer, motion)| json!({"layer": layer, "motion": motion}))
            .collect();

        out.push(json!({
            "frame": frame,
            "time": (frame + 1) as f32 * dt,
            "rootOffset": stack.root_offset_delta().to_array(),
            "layers": layers,
            "markers": markers,
            "ended": ended,
            "joints": joints,
        }));
    }
    drop(handles);

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({"frames": out})).expect("serialize")
    );
}
