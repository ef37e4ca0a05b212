use crate::{
    AnimationClip, AxisMask, BlendAnimation, BlendNode, BlendNodeKind, BlendTree, Error,
    MarkerInfo, Motion, MotionBlend, MotionLayer, MotionStack, MotionTransitionInfo,
    SkeletonAnimation, TransitionFunc, TransitionSync, TransitionType,
};
use glam::Vec2;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;

const EPSILON: f32 = 1e-5;

/// Resolves the clip paths named by a configuration.
pub trait ClipSource {
    fn load_clip(&mut self, path: &str) -> Result<Rc<AnimationClip>, Error>;
}

/// Loads clip files relative to a base directory, once per path.
#[derive(Debug, Default)]
pub struct DirClipSource {
    base: PathBuf,
    cache: HashMap<String, Rc<AnimationClip>>,
}

impl DirClipSource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            cache: HashMap::new(),
        }
    }
}

impl ClipSource for DirClipSource {
    fn load_clip(&mut self, path: &str) -> Result<Rc<AnimationClip>, Error> {
        if let Some(clip) = self.cache.get(path) {
            return Ok(clip.clone());
        }
        let clip = AnimationClip::load(self.base.join(path)).map_err(|e| Error::ClipLoad {
            path: path.to_string(),
            source: Box::new(e),
        })?;
        let clip = Rc::new(clip);
        self.cache.insert(path.to_string(), clip.clone());
        Ok(clip)
    }
}

/// Clips registered in memory under the paths a configuration uses.
#[derive(Debug, Default)]
pub struct MemoryClipSource {
    clips: HashMap<String, Rc<AnimationClip>>,
}

impl MemoryClipSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, clip: AnimationClip) {
        self.clips.insert(path.into(), Rc::new(clip));
    }

    pub fn insert_bytes(&mut self, path: impl Into<String>, bytes: &[u8]) -> Result<(), Error> {
        let path = path.into();
        let clip = AnimationClip::from_bytes(bytes).map_err(|e| Error::ClipLoad {
            path: path.clone(),
            source: Box::new(e),
        })?;
        self.insert(path, clip);
        Ok(())
    }
}

impl ClipSource for MemoryClipSource {
    fn load_clip(&mut self, path: &str) -> Result<Rc<AnimationClip>, Error> {
        self.clips.get(path).cloned().ok_or_else(|| Error::ClipLoad {
            path: path.to_string(),
            source: Box::new(Error::InvalidValue {
                message: "no clip registered under this path".to_string(),
            }),
        })
    }
}

/// A configuration leaf. Tree loaders often hand numbers and booleans over
/// as strings, so every form is accepted wherever a scalar is expected.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum ScalarDef {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl ScalarDef {
    fn invalid(&self, key: &str, expected: &str) -> Error {
        let found = match self {
            ScalarDef::Number(n) => n.to_string(),
            ScalarDef::Bool(b) => b.to_string(),
            ScalarDef::Text(s) => format!("\"{s}\""),
        };
        Error::InvalidValue {
            message: format!("'{key}' expects {expected}, got {found}"),
        }
    }

    fn as_f32(&self, key: &str) -> Result<f32, Error> {
        match self {
            ScalarDef::Number(n) => Ok(*n as f32),
            ScalarDef::Text(s) => s.trim().parse().map_err(|_| self.invalid(key, "a number")),
            ScalarDef::Bool(_) => Err(self.invalid(key, "a number")),
        }
    }

    fn as_u32(&self, key: &str) -> Result<u32, Error> {
        match self {
            ScalarDef::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64 => {
                Ok(*n as u32)
            }
            ScalarDef::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| self.invalid(key, "an unsigned integer")),
            _ => Err(self.invalid(key, "an unsigned integer")),
        }
    }

    fn as_bool(&self, key: &str) -> Result<bool, Error> {
        match self {
            ScalarDef::Bool(b) => Ok(*b),
            ScalarDef::Number(n) => Ok(*n != 0.0),
            ScalarDef::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(self.invalid(key, "a boolean")),
            },
        }
    }
}

/// Clip time in seconds, written as `"1.25"` or as a frame fraction
/// `"30/24"`.
fn parse_timestamp(def: &ScalarDef) -> Result<f32, Error> {
    match def {
        ScalarDef::Number(n) => Ok(*n as f32),
        ScalarDef::Bool(b) => Err(Error::InvalidTimestamp {
            value: b.to_string(),
        }),
        ScalarDef::Text(s) => {
            let invalid = || Error::InvalidTimestamp { value: s.clone() };
            match s.split_once('/') {
                Some((numerator, denominator)) => {
                    let numerator: f32 = numerator.trim().parse().map_err(|_| invalid())?;
                    let denominator: f32 = denominator.trim().parse().map_err(|_| invalid())?;
                    if denominator == 0.0 {
                        return Err(invalid());
                    }
                    Ok(numerator / denominator)
                }
                None => s.trim().parse().map_err(|_| invalid()),
            }
        }
    }
}

/// `"N -> M"`.
fn parse_phase_map_entry(entry: &str) -> Result<(u32, u32), Error> {
    let invalid = || Error::InvalidPhaseMap {
        value: entry.to_string(),
    };
    let (from, to) = entry.split_once("->").ok_or_else(invalid)?;
    let from = from.trim().parse().map_err(|_| invalid())?;
    let to = to.trim().parse().map_err(|_| invalid())?;
    Ok((from, to))
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum NodeType {
    Animation,
    Lerp1D,
    Lerp2D,
    Add,
    Diff,
}

const NODE_TYPES: [(&str, NodeType); 5] = [
    ("Animation", NodeType::Animation),
    ("LERP1D", NodeType::Lerp1D),
    ("LERP2D", NodeType::Lerp2D),
    ("Add", NodeType::Add),
    ("Diff", NodeType::Diff),
];

const BLEND_MODES: [(&str, MotionBlend); 3] = [
    ("Override", MotionBlend::Override),
    ("Add", MotionBlend::Add),
    ("Diff", MotionBlend::Diff),
];

const TRANSITION_TYPES: [(&str, TransitionType); 3] = [
    ("Replace", TransitionType::Replace),
    ("CrossFade", TransitionType::CrossFade),
    ("FrozenFade", TransitionType::FrozenFade),
];

const TRANSITION_SYNCS: [(&str, TransitionSync); 4] = [
    ("Immediate", TransitionSync::Immediate),
    ("WaitEnd", TransitionSync::WaitEnd),
    ("WaitPhaseEnd", TransitionSync::WaitPhaseEnd),
    ("WaitMarker", TransitionSync::WaitMarker),
];

const TRANSITION_FUNCS: [(&str, TransitionFunc); 4] = [
    ("Linear", TransitionFunc::Linear),
    ("EaseIn", TransitionFunc::EaseIn),
    ("EaseOut", TransitionFunc::EaseOut),
    ("EaseInOut", TransitionFunc::EaseInOut),
];

fn lookup<T: Copy>(table: &[(&str, T)], kind: &str, name: &str) -> Result<T, Error> {
    table
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
        .ok_or_else(|| Error::UnknownEnumValue {
            kind: kind.to_string(),
            value: name.to_string(),
        })
}

fn parse_config<'a, T: Deserialize<'a>>(value: &'a Value) -> Result<T, Error> {
    T::deserialize(value).map_err(|e| Error::ConfigParse {
        message: e.to_string(),
    })
}

fn parse_json(input: &str) -> Result<Value, Error> {
    serde_json::from_str(input).map_err(|e| Error::ConfigParse {
        message: e.to_string(),
    })
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum ParamValueDef {
    Pair(Vec<ScalarDef>),
    Scalar(ScalarDef),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum MarkerTimesDef {
    Many(Vec<ScalarDef>),
    One(ScalarDef),
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AnimationDef {
    clip: String,
    #[serde(default)]
    ignore_mask: Vec<ScalarDef>,
    range: Option<Vec<ScalarDef>>,
    treat_as_pose: Option<ScalarDef>,
    #[serde(default)]
    sync_points: Vec<ScalarDef>,
    #[serde(default)]
    markers: BTreeMap<String, MarkerTimesDef>,
}

#[derive(Clone, Debug, Deserialize)]
struct OperationDef {
    #[serde(rename = "type")]
    node_type: String,
    parameter: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct BlendNodeDef {
    phases_count: Option<ScalarDef>,
    param_value: Option<ParamValueDef>,
    #[serde(default)]
    ignore_mask: Vec<ScalarDef>,
    clip: Option<String>,
    range: Option<Vec<ScalarDef>>,
    treat_as_pose: Option<ScalarDef>,
    #[serde(default)]
    sync_points: Vec<ScalarDef>,
    #[serde(default)]
    markers: BTreeMap<String, MarkerTimesDef>,
    animation: Option<Vec<AnimationDef>>,
    operation: Option<OperationDef>,
    #[serde(default)]
    nodes: Vec<BlendNodeDef>,
}

impl BlendNodeDef {
    fn animation_defs(&self) -> Result<Vec<AnimationDef>, Error> {
        match (&self.clip, &self.animation) {
            (Some(_), Some(_)) => Err(Error::ConfigParse {
                message: "blend node has both 'clip' and 'animation'".to_string(),
            }),
            (Some(clip), None) => Ok(vec![AnimationDef {
                clip: clip.clone(),
                ignore_mask: Vec::new(),
                range: self.range.clone(),
                treat_as_pose: self.treat_as_pose.clone(),
                sync_points: self.sync_points.clone(),
                markers: self.markers.clone(),
            }]),
            (None, Some(list)) => Ok(list.clone()),
            (None, None) => Ok(Vec::new()),
        }
    }
}

fn extend_ignore_mask(mask: &mut HashSet<u32>, defs: &[ScalarDef]) -> Result<(), Error> {
    for def in defs {
        mask.insert(def.as_u32("ignore-mask")?);
    }
    Ok(())
}

fn placeholder_node() -> BlendNode {
    BlendNode {
        kind: BlendNodeKind::Animation {
            animation: usize::MAX,
        },
        coord: Vec2::ZERO,
    }
}

struct BlendTreeLoader<'a> {
    clips: &'a mut dyn ClipSource,
    tree: BlendTree,
}

impl BlendTreeLoader<'_> {
    fn load_node(
        &mut self,
        def: &BlendNodeDef,
        index: usize,
        inherited_mask: &HashSet<u32>,
    ) -> Result<(), Error> {
        let coord = match &def.param_value {
            Some(ParamValueDef::Scalar(x)) => Vec2::new(x.as_f32("param-value")?, 0.0),
            Some(ParamValueDef::Pair(values)) => match values.as_slice() {
                [x, y] => Vec2::new(x.as_f32("param-value")?, y.as_f32("param-value")?),
                _ => {
                    return Err(Error::InvalidValue {
                        message: format!("'param-value' expects 2 components, got {}", values.len()),
                    });
                }
            },
            None => Vec2::ZERO,
        };
        self.tree.nodes[index].coord = coord;

        let mut ignore_mask = inherited_mask.clone();
        extend_ignore_mask(&mut ignore_mask, &def.ignore_mask)?;

        let animation_defs = def.animation_defs()?;
        if !animation_defs.is_empty() {
            let animation = self.load_animation(&animation_defs, &ignore_mask)?;
            self.tree.nodes[index].kind = BlendNodeKind::Animation { animation };
            return Ok(());
        }

        let Some(operation) = &def.operation else {
            return Err(Error::ConfigMissingKey {
                context: "blend node".to_string(),
                key: "clip".to_string(),
            });
        };
        let node_type = lookup(&NODE_TYPES, "blend node type", &operation.node_type)?;
        let parameter = operation.parameter.as_deref().map(|id| {
            match self.tree.parameter_ids.iter().position(|p| p == id) {
                Some(i) => i,
                None => {
                    self.tree.parameter_ids.push(id.to_string());
                    self.tree.parameter_ids.len() - 1
                }
            }
        });

        let count = def.nodes.len();
        let begin = self.tree.nodes.len();
        let children = begin..begin + count;
        let kind = match node_type {
            NodeType::Lerp2D => {
                return Err(Error::UnsupportedNodeType {
                    name: operation.node_type.clone(),
                });
            }
            NodeType::Animation => {
                return Err(Error::ConfigMissingKey {
                    context: "Animation blend node".to_string(),
                    key: "clip".to_string(),
                });
            }
            NodeType::Lerp1D => {
                if count == 0 {
                    return Err(Error::InvalidChildCount {
                        node: operation.node_type.clone(),
                        expected: 1,
                        found: 0,
                    });
                }
                BlendNodeKind::Lerp1D {
                    children: children.clone(),
                    parameter,
                }
            }
            NodeType::Add | NodeType::Diff => {
                if count != 2 {
                    return Err(Error::InvalidChildCount {
                        node: operation.node_type.clone(),
                        expected: 2,
                        found: count,
                    });
                }
                if node_type == NodeType::Add {
                    BlendNodeKind::Add {
                        children: children.clone(),
                    }
                } else {
                    BlendNodeKind::Diff {
                        children: children.clone(),
                    }
                }
            }
        };
        self.tree.nodes[index].kind = kind;

        self.tree
            .nodes
            .resize(children.end, placeholder_node());
        for (child, child_def) in children.clone().zip(&def.nodes) {
            self.load_node(child_def, child, &ignore_mask)?;
        }
        if node_type == NodeType::Lerp1D {
            self.tree.nodes[children].sort_by(|a, b| a.coord.x.total_cmp(&b.coord.x));
        }
        Ok(())
    }

    fn load_animation(
        &mut self,
        defs: &[AnimationDef],
        ignore_mask: &HashSet<u32>,
    ) -> Result<usize, Error> {
        let name = defs.first().map(|d| d.clip.clone()).unwrap_or_default();
        let mut skeleton_animation = SkeletonAnimation::new();
        let mut phase_ends: Vec<f32> = Vec::new();
        let mut treat_as_pose = false;
        let mut markers: Vec<(String, f32)> = Vec::new();
        let mut base = 0.0f32;

        for def in defs {
            let clip = self.clips.load_clip(&def.clip)?;

            let mut clip_mask = ignore_mask.clone();
            extend_ignore_mask(&mut clip_mask, &def.ignore_mask)?;

            let (start, end) = match &def.range {
                Some(range) => {
                    let [start, end] = range.as_slice() else {
                        return Err(Error::InvalidValue {
                            message: format!("'range' expects 2 timestamps, got {}", range.len()),
                        });
                    };
                    let start = parse_timestamp(start)?;
                    let end = parse_timestamp(end)?;
                    if end <= start {
                        return Err(Error::InvalidRange {
                            clip: def.clip.clone(),
                            start,
                            end,
                        });
                    }
                    (start, end)
                }
                None => (0.0, clip.duration()),
            };
            skeleton_animation.add_animation_clip(clip, clip_mask, start, end);

            if let Some(flag) = &def.treat_as_pose {
                treat_as_pose = flag.as_bool("treat-as-pose")?;
            }

            for point in &def.sync_points {
                let timestamp = parse_timestamp(point)?;
                if timestamp <= EPSILON {
                    continue;
                }
                let timestamp = timestamp + base;
                if phase_ends.last().is_some_and(|&last| last >= timestamp) {
                    return Err(Error::InvalidPhaseEnds {
                        clip: def.clip.clone(),
                        message: "sync points must be strictly increasing".to_string(),
                    });
                }
                phase_ends.push(timestamp);
            }

            for (marker, times) in &def.markers {
                let times = match times {
                    MarkerTimesDef::One(t) => std::slice::from_ref(t),
                    MarkerTimesDef::Many(list) => list.as_slice(),
                };
                for time in times {
                    markers.push((marker.clone(), base + parse_timestamp(time)?));
                }
            }

            base = skeleton_animation.duration();
            match phase_ends.last() {
                Some(&last) if last > base + EPSILON => {
                    return Err(Error::InvalidPhaseEnds {
                        clip: def.clip.clone(),
                        message: format!("sync point {last} lies past the clip end {base}"),
                    });
                }
                Some(&last) if (last - base).abs() <= EPSILON => {}
                _ => phase_ends.push(base),
            }
        }

        if treat_as_pose {
            if !markers.is_empty() {
                log::warn!("markers of pose animation '{name}' are ignored");
            }
            let phase_ends = if base > EPSILON {
                phase_ends.iter().map(|e| e / base).collect()
            } else {
                vec![1.0]
            };
            return Ok(self.push_animation(skeleton_animation, phase_ends, true));
        }

        if base <= EPSILON {
            return Err(Error::InvalidPhaseEnds {
                clip: name,
                message: "animation has zero duration".to_string(),
            });
        }
        for end in &mut phase_ends {
            *end /= base;
        }
        if phase_ends.first().is_some_and(|&first| first <= EPSILON) {
            return Err(Error::InvalidPhaseEnds {
                clip: name,
                message: "first phase has zero length".to_string(),
            });
        }
        if let Some(last) = phase_ends.last_mut() {
            *last = 1.0;
        }
        if phase_ends.len() != self.tree.phases_count as usize {
            return Err(Error::PhaseCountMismatch {
                clip: name,
                expected: self.tree.phases_count,
                found: phase_ends.len(),
            });
        }

        for (marker, timestamp) in markers {
            let position = timestamp / base;
            let Some(phase_index) = phase_ends.iter().position(|&end| end > position) else {
                return Err(Error::InvalidValue {
                    message: format!("marker '{marker}' at {timestamp} lies outside animation '{name}'"),
                });
            };
            if position < 0.0 {
                return Err(Error::InvalidValue {
                    message: format!("marker '{marker}' at {timestamp} lies outside animation '{name}'"),
                });
            }
            let start = if phase_index > 0 {
                phase_ends[phase_index - 1]
            } else {
                0.0
            };
            let phase = (position - start) / (phase_ends[phase_index] - start);
            self.tree.markers.push(MarkerInfo {
                phase_id: phase_index as f32 + phase,
                marker_id: marker,
            });
        }

        Ok(self.push_animation(skeleton_animation, phase_ends, false))
    }

    fn push_animation(
        &mut self,
        skeleton_animation: SkeletonAnimation,
        phase_ends: Vec<f32>,
        treat_as_pose: bool,
    ) -> usize {
        self.tree.animations.push(BlendAnimation {
            skeleton_animation,
            phase_ends,
            treat_as_pose,
        });
        self.tree.animations.len() - 1
    }
}

impl BlendTree {
    /// Builds a blend tree from its configuration node, loading the clips it
    /// references through `clips`.
    pub fn from_config(config: &Value, clips: &mut dyn ClipSource) -> Result<Self, Error> {
        let def: BlendNodeDef = parse_config(config)?;
        let phases_count = match &def.phases_count {
            Some(count) => count.as_u32("phases-count")?,
            None => 1,
        };
        if phases_count == 0 {
            return Err(Error::InvalidValue {
                message: "'phases-count' must be at least 1".to_string(),
            });
        }

        let mut loader = BlendTreeLoader {
            clips,
            tree: BlendTree {
                nodes: vec![placeholder_node()],
                phases_count,
                ..BlendTree::default()
            },
        };
        loader.load_node(&def, 0, &HashSet::new())?;

        let mut tree = loader.tree;
        tree.markers
            .sort_by(|a, b| a.phase_id.total_cmp(&b.phase_id));
        log::debug!(
            "loaded blend tree: {} nodes, {} animations, {} phases, parameters {:?}",
            tree.nodes.len(),
            tree.animations.len(),
            tree.phases_count,
            tree.parameter_ids
        );
        Ok(tree)
    }

    pub fn from_json_str(input: &str, clips: &mut dyn ClipSource) -> Result<Self, Error> {
        Self::from_config(&parse_json(input)?, clips)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TransitionInfoDef {
    duration: Option<ScalarDef>,
    #[serde(rename = "type")]
    transition_type: Option<String>,
    func: Option<String>,
    sync: Option<String>,
    wait_marker: Option<String>,
    wait_phase: Option<ScalarDef>,
    sync_phase: Option<ScalarDef>,
    inverse_phase: Option<ScalarDef>,
    #[serde(default)]
    phase_map: Vec<String>,
}

impl MotionTransitionInfo {
    pub fn from_config(config: &Value) -> Result<Self, Error> {
        let def: TransitionInfoDef = parse_config(config)?;
        let mut info = MotionTransitionInfo::default();

        if let Some(duration) = &def.duration {
            info.duration = duration.as_f32("duration")?.max(0.0);
        }
        if let Some(name) = &def.transition_type {
            info.transition_type = lookup(&TRANSITION_TYPES, "transition type", name)?;
        }
        if let Some(name) = &def.func {
            info.func = lookup(&TRANSITION_FUNCS, "transition function", name)?;
        }
        if let Some(name) = &def.sync {
            info.sync = lookup(&TRANSITION_SYNCS, "transition sync", name)?;
        }
        info.marker_wait = def.wait_marker;
        if let Some(phase) = &def.wait_phase {
            info.phase_wait = phase.as_u32("wait-phase")?;
        }
        if let Some(flag) = &def.sync_phase {
            info.sync_phase = flag.as_bool("sync-phase")?;
        }
        if let Some(flag) = &def.inverse_phase {
            info.inverse_phase = flag.as_bool("inverse-phase")?;
        }
        for entry in &def.phase_map {
            let (from, to) = parse_phase_map_entry(entry)?;
            info.phase_map.insert(from, to);
        }

        if info.sync == TransitionSync::WaitMarker && info.marker_wait.is_none() {
            return Err(Error::ConfigMissingKey {
                context: "WaitMarker transition".to_string(),
                key: "wait-marker".to_string(),
            });
        }
        Ok(info)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct MotionDef {
    motion_id: Option<String>,
    blend_tree: Option<Value>,
}

impl Motion {
    pub fn from_config(config: &Value, clips: &mut dyn ClipSource) -> Result<Self, Error> {
        let def: MotionDef = parse_config(config)?;
        let id = def.motion_id.ok_or_else(|| Error::ConfigMissingKey {
            context: "motion".to_string(),
            key: "motion-id".to_string(),
        })?;
        let tree = def.blend_tree.ok_or_else(|| Error::ConfigMissingKey {
            context: format!("motion '{id}'"),
            key: "blend-tree".to_string(),
        })?;
        let blend_tree = BlendTree::from_config(&tree, clips)?;
        Ok(Motion::new(id, blend_tree))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct LayerTransitionDef {
    src_motion: Option<String>,
    dst_motion: Option<String>,
    trigger: Option<String>,
    src_phase: Option<ScalarDef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RootTransformDef {
    root_node: Option<String>,
    extract_position_x: Option<ScalarDef>,
    extract_position_y: Option<ScalarDef>,
    extract_position_z: Option<ScalarDef>,
    reset_position_x: Option<ScalarDef>,
    reset_position_y: Option<ScalarDef>,
    reset_position_z: Option<ScalarDef>,
}

fn flag(def: &Option<ScalarDef>, key: &str) -> Result<bool, Error> {
    def.as_ref().map_or(Ok(false), |d| d.as_bool(key))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct LayerDef {
    layer_id: Option<String>,
    blend_mode: Option<String>,
    default_motion: Option<String>,
    #[serde(default)]
    motions: Vec<Value>,
    #[serde(default)]
    transitions: Vec<Value>,
    root_transform: Option<RootTransformDef>,
}

impl MotionLayer {
    pub fn from_config(config: &Value, clips: &mut dyn ClipSource) -> Result<Self, Error> {
        let def: LayerDef = parse_config(config)?;
        let blend_mode = match &def.blend_mode {
            Some(name) => lookup(&BLEND_MODES, "layer blend mode", name)?,
            None => MotionBlend::Override,
        };
        let mut layer = MotionLayer::new(def.layer_id.unwrap_or_default(), blend_mode);

        for motion in &def.motions {
            let motion = Motion::from_config(motion, clips)?;
            let is_default = def.default_motion.as_deref() == Some(motion.id());
            let id = layer.add_motion(motion);
            if is_default {
                layer.set_default_motion(id);
            }
        }

        for entry in &def.transitions {
            let transition: LayerTransitionDef = parse_config(entry)?;
            let (Some(src), Some(dst), Some(trigger)) =
                (&transition.src_motion, &transition.dst_motion, &transition.trigger)
            else {
                log::warn!(
                    "layer '{}': transition without src-motion, dst-motion or trigger skipped",
                    layer.layer_id()
                );
                continue;
            };
            let (Some(src_id), Some(dst_id)) = (layer.find_motion(src), layer.find_motion(dst)) else {
                log::warn!(
                    "layer '{}': transition '{src}' -> '{dst}' references an unknown motion",
                    layer.layer_id()
                );
                continue;
            };
            let src_phase = match &transition.src_phase {
                Some(phase) => Some(phase.as_u32("src-phase")?),
                None => None,
            };
            let info = MotionTransitionInfo::from_config(entry)?;
            layer.add_transition(src_id, dst_id, trigger, src_phase, info);
        }

        if let Some(root) = &def.root_transform {
            if let Some(uid) = &root.root_node {
                let extract = AxisMask {
                    x: flag(&root.extract_position_x, "extract-position-x")?,
                    y: flag(&root.extract_position_y, "extract-position-y")?,
                    z: flag(&root.extract_position_z, "extract-position-z")?,
                };
                let reset = AxisMask {
                    x: flag(&root.reset_position_x, "reset-position-x")?,
                    y: flag(&root.reset_position_y, "reset-position-y")?,
                    z: flag(&root.reset_position_z, "reset-position-z")?,
                };
                layer.set_root_node(uid, extract, reset);
            }
        }

        log::debug!(
            "loaded motion layer '{}': {} motions, parameters {:?}",
            layer.layer_id(),
            layer.arena().motions().len(),
            layer.parameter_ids()
        );
        Ok(layer)
    }

    pub fn from_json_str(input: &str, clips: &mut dyn ClipSource) -> Result<Self, Error> {
        Self::from_config(&parse_json(input)?, clips)
    }
}

#[derive(Debug, Deserialize)]
struct StackDef {
    #[serde(default)]
    layers: Vec<Value>,
}

impl MotionStack {
    pub fn from_config(config: &Value, clips: &mut dyn ClipSource) -> Result<Self, Error> {
        let def: StackDef = parse_config(config)?;
        let mut stack = MotionStack::new();
        for layer in &def.layers {
            stack.add_layer(MotionLayer::from_config(layer, clips)?);
        }
        Ok(stack)
    }

    pub fn from_json_str(input: &str, clips: &mut dyn ClipSource) -> Result<Self, Error> {
        Self::from_config(&parse_json(input)?, clips)
    }
}
