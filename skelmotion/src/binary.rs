//! Animation clip binary format.
//!
//! All fields are little-endian and packed. The decoders are IO-free: they
//! operate on an in-memory byte buffer, and decoded channels keep referencing
//! that buffer instead of copying keys out of it.
//!
//! ```text
//! clip    : 'DVAF' u32 version, u32 crc32, u32 dataSize, payload[dataSize]
//! payload : u32 trackCount, { cstr uid, cstr name, track }*,
//!           u32 markerCount, { f32 time, cstr name }*
//! track   : 'DVAT' u32 channelCount, { u8 target, u8[3] pad, channel }*
//! channel : 'DVAC' u8 dimension, u8 interpolation, u16 compression,
//!           u32 keyCount, key[keyCount]
//! key     : f32 time, f32[dimension] value (+ 16 tangent bytes for bezier)
//! cstr    : NUL-terminated UTF-8, zero padded to a 4-byte boundary
//! ```

use crate::clip::{AnimationChannel, AnimationClip, AnimationTrack, ClipMarker, ClipTrack};
use crate::{ChannelTarget, Error, Interpolation};
use byteorder::{ByteOrder, LittleEndian};
use glam::{Quat, Vec3};
use std::ops::Range;
use std::sync::Arc;

pub const CLIP_SIGNATURE: [u8; 4] = *b"DVAF";
pub const TRACK_SIGNATURE: [u8; 4] = *b"DVAT";
pub const CHANNEL_SIGNATURE: [u8; 4] = *b"DVAC";

/// Version written by [`ClipWriter`].
pub const CLIP_VERSION: u32 = 1;

const CLIP_HEADER_SIZE: usize = 16;

#[derive(Clone, Debug)]
struct BinaryInput<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> BinaryInput<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    fn at(bytes: &'a [u8], cursor: usize) -> Self {
        Self { bytes, cursor }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.cursor)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if self.remaining() < len {
            return Err(Error::BinaryParse {
                message: format!(
                    "unexpected EOF reading {len} bytes at offset {}",
                    self.cursor
                ),
            });
        }
        let out = &self.bytes[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    fn read_signature(&mut self) -> Result<[u8; 4], Error> {
        let bytes = self.take(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Reads a padded NUL-terminated string and returns its byte range
    /// (terminator excluded).
    fn read_cstr_range(&mut self) -> Result<Range<usize>, Error> {
        let start = self.cursor;
        let Some(len) = self.bytes[start.min(self.bytes.len())..]
            .iter()
            .position(|b| *b == 0)
        else {
            return Err(Error::BinaryParse {
                message: format!("unterminated string at offset {start}"),
            });
        };
        if let Err(err) = std::str::from_utf8(&self.bytes[start..start + len]) {
            return Err(Error::BinaryParse {
                message: format!("invalid UTF-8 string at offset {start}: {err}"),
            });
        }
        let padded = align4(len + 1);
        if self.remaining() < padded {
            return Err(Error::BinaryParse {
                message: format!("unexpected EOF in string padding at offset {start}"),
            });
        }
        self.cursor += padded;
        Ok(start..start + len)
    }
}

fn align4(len: usize) -> usize {
    (len + 3) & !3
}

fn decode_channel(data: &Arc<[u8]>, offset: usize) -> Result<(AnimationChannel, usize), Error> {
    let mut input = BinaryInput::at(data, offset);
    let signature = input.read_signature()?;
    if signature != CHANNEL_SIGNATURE {
        return Err(Error::BinaryParse {
            message: format!("bad channel signature {signature:?} at offset {offset}"),
        });
    }

    let dimension = input.read_u8()?;
    let interpolation_kind = input.read_u8()?;
    let compression = input.read_u16()?;
    let key_count = input.read_u32()?;

    let Some(interpolation) = Interpolation::from_binary_kind(interpolation_kind) else {
        return Err(Error::BinaryParse {
            message: format!("unknown interpolation {interpolation_kind} at offset {offset}"),
        });
    };
    if !matches!(dimension, 1 | 3 | 4) {
        return Err(Error::BinaryParse {
            message: format!("invalid channel dimension {dimension} at offset {offset}"),
        });
    }
    if interpolation == Interpolation::SphericalLinear && dimension != 4 {
        return Err(Error::BinaryParse {
            message: format!("spherical interpolation needs 4 components, got {dimension}"),
        });
    }

    let keys_offset = input.cursor;
    let stride = crate::clip::key_stride(dimension, interpolation);
    input.take(stride * key_count as usize)?;

    let channel = AnimationChannel::new(
        dimension,
        interpolation,
        compression,
        key_count,
        data.clone(),
        keys_offset,
    );
    Ok((channel, input.cursor - offset))
}

fn decode_track(data: &Arc<[u8]>, offset: usize) -> Result<(AnimationTrack, usize), Error> {
    let mut input = BinaryInput::at(data, offset);
    let signature = input.read_signature()?;
    if signature != TRACK_SIGNATURE {
        return Err(Error::BinaryParse {
            message: format!("bad track signature {signature:?} at offset {offset}"),
        });
    }

    let channel_count = input.read_u32()?;
    let mut track = AnimationTrack::default();
    for _ in 0..channel_count {
        let kind = input.read_u8()?;
        input.take(3)?;
        let Some(target) = ChannelTarget::from_binary_kind(kind) else {
            return Err(Error::BinaryParse {
                message: format!("unknown channel target {kind}"),
            });
        };

        let mut channel = AnimationChannel::default();
        let consumed = channel.bind(data, input.cursor);
        if consumed == 0 {
            return Err(Error::BinaryParse {
                message: format!("channel failed to bind at offset {}", input.cursor),
            });
        }
        input.cursor += consumed;
        track.channels.push((target, channel));
    }

    Ok((track, input.cursor - offset))
}

impl AnimationChannel {
    /// Decodes a channel blob starting at `offset` of `data`.
    ///
    /// Returns the number of bytes consumed, or 0 when the blob is malformed;
    /// the channel is then left empty and evaluates as a no-op.
    pub fn bind(&mut self, data: &Arc<[u8]>, offset: usize) -> usize {
        match decode_channel(data, offset) {
            Ok((channel, consumed)) => {
                *self = channel;
                consumed
            }
            Err(err) => {
                log::trace!("{err}");
                *self = AnimationChannel::default();
                0
            }
        }
    }
}

impl AnimationTrack {
    /// Decodes a track blob starting at `offset` of `data`.
    ///
    /// All or nothing: if any channel fails to bind the track keeps no
    /// channels and 0 is returned.
    pub fn bind(&mut self, data: &Arc<[u8]>, offset: usize) -> usize {
        match decode_track(data, offset) {
            Ok((track, consumed)) => {
                *self = track;
                consumed
            }
            Err(err) => {
                log::trace!("{err}");
                self.channels.clear();
                0
            }
        }
    }
}

impl AnimationClip {
    /// Decodes a complete clip file held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut header = BinaryInput::new(bytes);
        let signature = header.read_signature()?;
        if signature != CLIP_SIGNATURE {
            return Err(Error::ClipSignature {
                expected: CLIP_SIGNATURE,
                found: signature,
            });
        }
        let version = header.read_u32()?;
        let crc32 = header.read_u32()?;
        let data_size = header.read_u32()? as usize;
        let payload = header.take(data_size)?;
        debug_assert_eq!(header.cursor, CLIP_HEADER_SIZE + data_size);

        let data: Arc<[u8]> = Arc::from(payload);
        let mut input = BinaryInput::new(&data);

        let track_count = input.read_u32()?;
        let mut tracks = Vec::with_capacity(track_count as usize);
        for i in 0..track_count {
            let uid = input.read_cstr_range()?;
            let name = input.read_cstr_range()?;

            let mut track = AnimationTrack::default();
            let consumed = track.bind(&data, input.cursor);
            if consumed == 0 {
                return Err(Error::BinaryParse {
                    message: format!(
                        "track {i} ('{}') failed to bind at offset {}",
                        String::from_utf8_lossy(&data[uid.clone()]),
                        input.cursor
                    ),
                });
            }
            input.cursor += consumed;

            if track
                .channels()
                .any(|(_, c)| c.interpolation() == Interpolation::Bezier)
            {
                return Err(Error::UnsupportedInterpolation {
                    context: format!("track '{}'", String::from_utf8_lossy(&data[uid.clone()])),
                    interpolation: Interpolation::Bezier.name().to_string(),
                });
            }

            tracks.push(ClipTrack { uid, name, track });
        }

        let marker_count = input.read_u32()?;
        let mut markers = Vec::with_capacity(marker_count as usize);
        for _ in 0..marker_count {
            let time = input.read_f32()?;
            let name = input.read_cstr_range()?;
            markers.push(ClipMarker { time, name });
        }

        let duration = tracks
            .iter()
            .map(|t| t.track.duration())
            .fold(0.0, f32::max);

        Ok(AnimationClip {
            data,
            version,
            crc32,
            duration,
            tracks,
            markers,
        })
    }
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    let mut buf = [0u8; 2];
    LittleEndian::write_u16(&mut buf, v);
    out.extend_from_slice(&buf);
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, v);
    out.extend_from_slice(&buf);
}

fn push_f32(out: &mut Vec<u8>, v: f32) {
    let mut buf = [0u8; 4];
    LittleEndian::write_f32(&mut buf, v);
    out.extend_from_slice(&buf);
}

fn push_cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    let padded = align4(s.len() + 1);
    out.resize(out.len() + padded - s.len(), 0);
}

/// Encodes a channel blob. `values` holds `dimension` floats per key.
pub fn encode_channel(
    interpolation: Interpolation,
    dimension: u8,
    times: &[f32],
    values: &[f32],
) -> Vec<u8> {
    let dim = dimension as usize;
    debug_assert_eq!(values.len(), times.len() * dim);

    let mut out = Vec::with_capacity(12 + times.len() * 4 * (dim + 1));
    out.extend_from_slice(&CHANNEL_SIGNATURE);
    out.push(dimension);
    out.push(interpolation.binary_kind());
    push_u16(&mut out, 0);
    push_u32(&mut out, times.len() as u32);
    for (k, time) in times.iter().enumerate() {
        push_f32(&mut out, *time);
        for v in values.iter().skip(k * dim).take(dim) {
            push_f32(&mut out, *v);
        }
        if interpolation == Interpolation::Bezier {
            out.resize(out.len() + 16, 0);
        }
    }
    out
}

#[derive(Clone, Debug)]
struct ChannelDef {
    target: ChannelTarget,
    interpolation: Interpolation,
    dimension: u8,
    times: Vec<f32>,
    values: Vec<f32>,
}

#[derive(Clone, Debug)]
struct TrackDef {
    uid: String,
    name: String,
    channels: Vec<ChannelDef>,
}

/// Encodes a track blob from its channels.
fn encode_track(channels: &[ChannelDef]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&TRACK_SIGNATURE);
    push_u32(&mut out, channels.len() as u32);
    for c in channels {
        out.push(c.target.binary_kind());
        out.extend_from_slice(&[0, 0, 0]);
        out.extend(encode_channel(
            c.interpolation,
            c.dimension,
            &c.times,
            &c.values,
        ));
    }
    out
}

/// Builds animation clip files.
///
/// ```
/// use skelmotion::{AnimationClip, ClipWriter};
/// use glam::Vec3;
///
/// let mut writer = ClipWriter::new();
/// let root = writer.add_track("root", "Root");
/// writer.add_position_keys(root, &[(0.0, Vec3::ZERO), (1.0, Vec3::X)]);
/// let clip = AnimationClip::from_bytes(&writer.to_bytes()).unwrap();
/// assert_eq!(clip.duration(), 1.0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ClipWriter {
    tracks: Vec<TrackDef>,
    markers: Vec<(f32, String)>,
}

impl ClipWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty track and returns its index.
    pub fn add_track(&mut self, uid: &str, name: &str) -> usize {
        self.tracks.push(TrackDef {
            uid: uid.to_string(),
            name: name.to_string(),
            channels: Vec::new(),
        });
        self.tracks.len() - 1
    }

    /// Adds a raw channel to `track`; `values` holds `dimension` floats per key.
    pub fn add_channel(
        &mut self,
        track: usize,
        target: ChannelTarget,
        interpolation: Interpolation,
        dimension: u8,
        times: &[f32],
        values: &[f32],
    ) {
        if let Some(t) = self.tracks.get_mut(track) {
            t.channels.push(ChannelDef {
                target,
                interpolation,
                dimension,
                times: times.to_vec(),
                values: values.to_vec(),
            });
        }
    }

    pub fn add_position_keys(&mut self, track: usize, keys: &[(f32, Vec3)]) {
        let times: Vec<f32> = keys.iter().map(|(t, _)| *t).collect();
        let values: Vec<f32> = keys.iter().flat_map(|(_, v)| v.to_array()).collect();
        self.add_channel(
            track,
            ChannelTarget::Position,
            Interpolation::Linear,
            3,
            &times,
            &values,
        );
    }

    pub fn add_orientation_keys(&mut self, track: usize, keys: &[(f32, Quat)]) {
        let times: Vec<f32> = keys.iter().map(|(t, _)| *t).collect();
        let values: Vec<f32> = keys.iter().flat_map(|(_, q)| q.to_array()).collect();
        self.add_channel(
            track,
            ChannelTarget::Orientation,
            Interpolation::SphericalLinear,
            4,
            &times,
            &values,
        );
    }

    pub fn add_scale_keys(&mut self, track: usize, keys: &[(f32, f32)]) {
        let times: Vec<f32> = keys.iter().map(|(t, _)| *t).collect();
        let values: Vec<f32> = keys.iter().map(|(_, s)| *s).collect();
        self.add_channel(
            track,
            ChannelTarget::Scale,
            Interpolation::Linear,
            1,
            &times,
            &values,
        );
    }

    pub fn add_marker(&mut self, time: f32, name: &str) {
        self.markers.push((time, name.to_string()));
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        push_u32(&mut payload, self.tracks.len() as u32);
        for track in &self.tracks {
            push_cstr(&mut payload, &track.uid);
            push_cstr(&mut payload, &track.name);
            payload.extend(encode_track(&track.channels));
        }
        push_u32(&mut payload, self.markers.len() as u32);
        for (time, name) in &self.markers {
            push_f32(&mut payload, *time);
            push_cstr(&mut payload, name);
        }

        let mut out = Vec::with_capacity(CLIP_HEADER_SIZE + payload.len());
        out.extend_from_slice(&CLIP_SIGNATURE);
        push_u32(&mut out, CLIP_VERSION);
        push_u32(&mut out, 0);
        push_u32(&mut out, payload.len() as u32);
        out.extend(payload);
        out
    }

    pub fn write(&self, path: impl AsRef<std::path::Path>) -> Result<(), Error> {
        let path = path.as_ref();
        std::fs::write(path, self.to_bytes()).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })
    }
}
