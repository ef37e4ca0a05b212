use crate::{ChannelTarget, Error, Interpolation};
use byteorder::{ByteOrder, LittleEndian};
use std::cell::Cell;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

pub(crate) fn empty_buffer() -> Arc<[u8]> {
    Arc::from(Vec::new())
}

/// One animated curve: a view into the keys stored in an [`AnimationClip`]
/// payload.
///
/// Evaluation keeps a scan cursor in a [`Cell`], which makes channels `!Sync`:
/// one instance must not be evaluated from several threads at once. Results do
/// not depend on the cursor; it only speeds up non-decreasing time sequences.
#[derive(Clone, Debug)]
pub struct AnimationChannel {
    pub(crate) dimension: u8,
    pub(crate) interpolation: Interpolation,
    pub(crate) compression: u16,
    pub(crate) key_count: u32,
    pub(crate) key_stride: usize,
    pub(crate) data: Arc<[u8]>,
    pub(crate) keys_offset: usize,
    start_key: Cell<u32>,
}

impl Default for AnimationChannel {
    fn default() -> Self {
        Self {
            dimension: 0,
            interpolation: Interpolation::Linear,
            compression: 0,
            key_count: 0,
            key_stride: 0,
            data: empty_buffer(),
            keys_offset: 0,
            start_key: Cell::new(0),
        }
    }
}

impl AnimationChannel {
    pub(crate) fn new(
        dimension: u8,
        interpolation: Interpolation,
        compression: u16,
        key_count: u32,
        data: Arc<[u8]>,
        keys_offset: usize,
    ) -> Self {
        Self {
            dimension,
            interpolation,
            compression,
            key_count,
            key_stride: key_stride(dimension, interpolation),
            data,
            keys_offset,
            start_key: Cell::new(0),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension as usize
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn compression(&self) -> u16 {
        self.compression
    }

    pub fn key_count(&self) -> usize {
        self.key_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.key_count == 0
    }

    /// Time of key `index`, or `None` past the last key.
    pub fn key_time(&self, index: usize) -> Option<f32> {
        if index >= self.key_count() {
            return None;
        }
        let offset = self.key_offset(index);
        self.data
            .get(offset..offset + 4)
            .map(LittleEndian::read_f32)
    }

    /// Time of the first key; `0.0` for an empty channel.
    pub fn start_time(&self) -> f32 {
        self.key_time(0).unwrap_or(0.0)
    }

    /// Time of the last key; `0.0` for an empty channel.
    pub fn end_time(&self) -> f32 {
        self.key_count()
            .checked_sub(1)
            .and_then(|last| self.key_time(last))
            .unwrap_or(0.0)
    }

    // Callers keep `index < key_count`; the decoder validated the payload size.
    fn time_at(&self, index: usize) -> f32 {
        LittleEndian::read_f32(&self.data[self.key_offset(index)..])
    }

    fn key_offset(&self, index: usize) -> usize {
        self.keys_offset + index * self.key_stride
    }

    fn key_value(&self, index: usize, component: usize) -> f32 {
        LittleEndian::read_f32(&self.data[self.key_offset(index) + 4 + component * 4..])
    }

    fn copy_key(&self, index: usize, out: &mut [f32]) {
        for (c, v) in out.iter_mut().take(self.dimension()).enumerate() {
            *v = self.key_value(index, c);
        }
    }

    /// Samples the curve at `time` into the first `dimension()` floats of `out`.
    ///
    /// Times outside the key range clamp to the first/last key. An empty
    /// channel leaves `out` untouched.
    pub fn evaluate(&self, time: f32, out: &mut [f32]) -> Result<(), Error> {
        let dimension = self.dimension();
        if out.len() < dimension {
            return Err(Error::BufferTooSmall {
                required: dimension,
                actual: out.len(),
            });
        }
        if self.interpolation == Interpolation::Bezier {
            return Err(Error::UnsupportedInterpolation {
                context: "animation channel".to_string(),
                interpolation: Interpolation::Bezier.name().to_string(),
            });
        }

        let count = self.key_count();
        if count == 0 {
            return Ok(());
        }
        if count == 1 || time <= self.time_at(0) {
            self.start_key.set(0);
            self.copy_key(0, out);
            return Ok(());
        }
        if time >= self.time_at(count - 1) {
            self.copy_key(count - 1, out);
            return Ok(());
        }

        let mut k = self.start_key.get() as usize;
        if k + 1 >= count || self.time_at(k) > time {
            k = 0;
        }
        while k + 2 < count && self.time_at(k + 1) <= time {
            k += 1;
        }
        self.start_key.set(k as u32);

        let time0 = self.time_at(k);
        let time1 = self.time_at(k + 1);
        let t = (time - time0) / (time1 - time0);

        match self.interpolation {
            Interpolation::SphericalLinear => {
                let q0 = glam::Quat::from_xyzw(
                    self.key_value(k, 0),
                    self.key_value(k, 1),
                    self.key_value(k, 2),
                    self.key_value(k, 3),
                );
                let q1 = glam::Quat::from_xyzw(
                    self.key_value(k + 1, 0),
                    self.key_value(k + 1, 1),
                    self.key_value(k + 1, 2),
                    self.key_value(k + 1, 3),
                );
                let q = q0.slerp(q1, t).normalize();
                out[..4].copy_from_slice(&q.to_array());
            }
            _ => {
                for (c, v) in out.iter_mut().take(dimension).enumerate() {
                    let a = self.key_value(k, c);
                    let b = self.key_value(k + 1, c);
                    *v = a + (b - a) * t;
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn key_stride(dimension: u8, interpolation: Interpolation) -> usize {
    let base = 4 * (dimension as usize + 1);
    if interpolation == Interpolation::Bezier {
        base + 16
    } else {
        base
    }
}

/// Channels animating one joint.
#[derive(Clone, Debug, Default)]
pub struct AnimationTrack {
    pub(crate) channels: Vec<(ChannelTarget, AnimationChannel)>,
}

impl AnimationTrack {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel_target(&self, index: usize) -> Option<ChannelTarget> {
        self.channels.get(index).map(|(t, _)| *t)
    }

    pub fn channel(&self, index: usize) -> Option<&AnimationChannel> {
        self.channels.get(index).map(|(_, c)| c)
    }

    /// First channel animating `target`.
    pub fn channel_for(&self, target: ChannelTarget) -> Option<&AnimationChannel> {
        self.channels
            .iter()
            .find(|(t, _)| *t == target)
            .map(|(_, c)| c)
    }

    pub fn channels(&self) -> impl Iterator<Item = (ChannelTarget, &AnimationChannel)> {
        self.channels.iter().map(|(t, c)| (*t, c))
    }

    pub fn evaluate(&self, time: f32, channel_index: usize, out: &mut [f32]) -> Result<(), Error> {
        let Some((_, channel)) = self.channels.get(channel_index) else {
            return Err(Error::InvalidValue {
                message: format!(
                    "channel index {channel_index} out of range ({} channels)",
                    self.channels.len()
                ),
            });
        };
        channel.evaluate(time, out)
    }

    /// Time of the latest key across all channels.
    pub fn duration(&self) -> f32 {
        self.channels
            .iter()
            .map(|(_, c)| c.end_time())
            .fold(0.0, f32::max)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ClipTrack {
    pub(crate) uid: Range<usize>,
    pub(crate) name: Range<usize>,
    pub(crate) track: AnimationTrack,
}

#[derive(Clone, Debug)]
pub(crate) struct ClipMarker {
    pub(crate) time: f32,
    pub(crate) name: Range<usize>,
}

/// A decoded animation clip file.
///
/// The clip owns the payload bytes; tracks, channels and every name string
/// are views into it.
#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub(crate) data: Arc<[u8]>,
    pub(crate) version: u32,
    pub(crate) crc32: u32,
    pub(crate) duration: f32,
    pub(crate) tracks: Vec<ClipTrack>,
    pub(crate) markers: Vec<ClipMarker>,
}

impl AnimationClip {
    /// Reads and decodes a clip file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        let clip = Self::from_bytes(&bytes)?;
        log::debug!(
            "loaded animation clip '{}': {} tracks, {} markers, {:.3}s",
            path.display(),
            clip.track_count(),
            clip.marker_count(),
            clip.duration
        );
        Ok(clip)
    }

    fn str_at(&self, range: &Range<usize>) -> &str {
        std::str::from_utf8(&self.data[range.clone()]).unwrap_or_default()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, index: usize) -> Option<&AnimationTrack> {
        self.tracks.get(index).map(|t| &t.track)
    }

    pub fn track_uid(&self, index: usize) -> Option<&str> {
        self.tracks.get(index).map(|t| self.str_at(&t.uid))
    }

    pub fn track_name(&self, index: usize) -> Option<&str> {
        self.tracks.get(index).map(|t| self.str_at(&t.name))
    }

    /// Index of the track animating the joint `uid`. `None` means the joint is
    /// not animated by this clip.
    pub fn find_track(&self, uid: &str) -> Option<usize> {
        self.tracks
            .iter()
            .position(|t| &self.data[t.uid.clone()] == uid.as_bytes())
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn marker_time(&self, index: usize) -> Option<f32> {
        self.markers.get(index).map(|m| m.time)
    }

    pub fn marker_name(&self, index: usize) -> Option<&str> {
        self.markers.get(index).map(|m| self.str_at(&m.name))
    }

    pub fn markers(&self) -> impl Iterator<Item = (f32, &str)> {
        self.markers.iter().map(|m| (m.time, self.str_at(&m.name)))
    }
}
