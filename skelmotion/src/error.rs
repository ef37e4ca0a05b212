use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to parse animation clip: {message}")]
    BinaryParse { message: String },

    #[error("invalid animation clip signature {found:?} (expected {expected:?})")]
    ClipSignature { expected: [u8; 4], found: [u8; 4] },

    #[error("unsupported {interpolation} interpolation in {context}")]
    UnsupportedInterpolation {
        context: String,
        interpolation: String,
    },

    #[error("output buffer too small: need {required} floats, got {actual}")]
    BufferTooSmall { required: usize, actual: usize },

    #[error("failed to read '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[cfg(feature = "json")]
    #[error("failed to parse motion config: {message}")]
    ConfigParse { message: String },

    #[cfg(feature = "json")]
    #[error("missing '{key}' in {context}")]
    ConfigMissingKey { context: String, key: String },

    #[cfg(feature = "json")]
    #[error("unknown {kind} '{value}'")]
    UnknownEnumValue { kind: String, value: String },

    #[cfg(feature = "json")]
    #[error("unsupported blend node type '{name}'")]
    UnsupportedNodeType { name: String },

    #[cfg(feature = "json")]
    #[error("invalid timestamp '{value}'")]
    InvalidTimestamp { value: String },

    #[cfg(feature = "json")]
    #[error("invalid phase-map entry '{value}' (expected \"N -> M\")")]
    InvalidPhaseMap { value: String },

    #[cfg(feature = "json")]
    #[error("invalid clip range [{start}, {end}] for clip '{clip}'")]
    InvalidRange { clip: String, start: f32, end: f32 },

    #[cfg(feature = "json")]
    #[error("animation with clip '{clip}' has {found} phases, blend tree expects {expected}")]
    PhaseCountMismatch {
        clip: String,
        expected: u32,
        found: usize,
    },

    #[cfg(feature = "json")]
    #[error("invalid sync points for clip '{clip}': {message}")]
    InvalidPhaseEnds { clip: String, message: String },

    #[cfg(feature = "json")]
    #[error("blend node '{node}' expects {expected} children, got {found}")]
    InvalidChildCount {
        node: String,
        expected: usize,
        found: usize,
    },

    #[cfg(feature = "json")]
    #[error("failed to load clip '{path}': {source}")]
    ClipLoad {
        path: String,
        #[source]
        source: Box<Error>,
    },
}
