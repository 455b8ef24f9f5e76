//! Stimulus types.
//!
//! A [`Stimulus`] is a closed set of typed containers for multimedia data.
//! Every variant carries a [`StimulusMeta`] holding its provenance name,
//! optional onset/duration (seconds) and the chain of transformations that
//! produced it. Stimuli are read-only once built; converters create new
//! stimuli rather than mutating their input.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::{StimexError, StimexResult};
use crate::transformer::TransformerDescriptor;

/// Semantic type tag of a stimulus.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StimulusKind {
    /// A single word or token.
    TextUnit,
    /// A raw blob of text.
    TextDocument,
    /// Ordered text units, e.g. words over time.
    TextSequence,
    /// Audio samples.
    Audio,
    /// A video clip (metadata only; decoding is external).
    Video,
    /// A single image.
    Image,
    /// Ordered image frames sampled from a video.
    VideoFrames,
}

/// Accepted-input descriptor: an exact kind or a family of kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulusType {
    /// Exactly one kind.
    Exact(StimulusKind),
    /// Any single text stimulus (unit or document).
    AnyText,
    /// Any sequence container (text sequence or frame sequence).
    AnySequence,
    /// Every kind.
    Any,
}

impl StimulusType {
    /// Whether a stimulus of `kind` satisfies this type.
    pub fn matches(&self, kind: StimulusKind) -> bool {
        match self {
            Self::Exact(k) => *k == kind,
            Self::AnyText => matches!(kind, StimulusKind::TextUnit | StimulusKind::TextDocument),
            Self::AnySequence => {
                matches!(kind, StimulusKind::TextSequence | StimulusKind::VideoFrames)
            }
            Self::Any => true,
        }
    }

    /// Whether every kind in `other` is also in `self`.
    pub fn covers(&self, other: &StimulusType) -> bool {
        use strum::IntoEnumIterator;
        StimulusKind::iter()
            .filter(|k| other.matches(*k))
            .all(|k| self.matches(k))
    }

    /// The concrete kinds this type admits.
    pub fn kinds(&self) -> Vec<StimulusKind> {
        use strum::IntoEnumIterator;
        StimulusKind::iter().filter(|k| self.matches(*k)).collect()
    }
}

impl From<StimulusKind> for StimulusType {
    fn from(kind: StimulusKind) -> Self {
        Self::Exact(kind)
    }
}

impl std::fmt::Display for StimulusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(k) => write!(f, "{}", k),
            Self::AnyText => write!(f, "any_text"),
            Self::AnySequence => write!(f, "any_sequence"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// One transformation that contributed to a derived stimulus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationStep {
    /// Name of the stimulus the transformer consumed.
    pub source_name: String,
    /// Kind of the stimulus the transformer consumed.
    pub source_kind: StimulusKind,
    /// The transformer that produced the stimulus.
    pub transformer: TransformerDescriptor,
}

/// Provenance and timing shared by every stimulus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StimulusMeta {
    /// Identifier used for provenance and result row keys.
    pub name: String,
    /// Start time in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onset: Option<f64>,
    /// Duration in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Transformations applied to reach this stimulus, oldest first.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub history: Vec<TransformationStep>,
}

impl StimulusMeta {
    /// Create metadata with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the onset, rejecting negative or non-finite values.
    pub fn with_onset(mut self, onset: f64) -> StimexResult<Self> {
        self.onset = Some(check_time("onset", onset)?);
        Ok(self)
    }

    /// Set the duration, rejecting negative or non-finite values.
    pub fn with_duration(mut self, duration: f64) -> StimexResult<Self> {
        self.duration = Some(check_time("duration", duration)?);
        Ok(self)
    }

    /// Set optional timing in one go.
    pub fn with_timing(mut self, onset: Option<f64>, duration: Option<f64>) -> StimexResult<Self> {
        self.onset = onset.map(|o| check_time("onset", o)).transpose()?;
        self.duration = duration.map(|d| check_time("duration", d)).transpose()?;
        Ok(self)
    }
}

fn check_time(field: &str, value: f64) -> StimexResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(StimexError::validation(format!(
            "{} must be finite and non-negative, got {}",
            field, value
        )))
    }
}

/// A single word or token.
#[derive(Debug, Clone, PartialEq)]
pub struct TextUnit {
    pub text: String,
    pub meta: StimulusMeta,
}

impl TextUnit {
    /// Create a text unit named after its text.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            meta: StimulusMeta::new(text.clone()),
            text,
        }
    }

    /// Create a text unit with timing.
    pub fn timed(
        text: impl Into<String>,
        onset: Option<f64>,
        duration: Option<f64>,
    ) -> StimexResult<Self> {
        let mut unit = Self::new(text);
        unit.meta = unit.meta.with_timing(onset, duration)?;
        Ok(unit)
    }
}

/// A raw text blob.
#[derive(Debug, Clone, PartialEq)]
pub struct TextDocument {
    pub text: String,
    pub meta: StimulusMeta,
}

impl TextDocument {
    /// Create a document with an explicit name.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            meta: StimulusMeta::new(name),
        }
    }
}

/// An ordered sequence of text units.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSequence {
    pub elements: Vec<TextUnit>,
    pub meta: StimulusMeta,
}

impl TextSequence {
    /// Create a sequence from existing units.
    pub fn new(name: impl Into<String>, elements: Vec<TextUnit>) -> Self {
        Self {
            elements,
            meta: StimulusMeta::new(name),
        }
    }

    /// Split `text` on whitespace; word `i` gets onset `i * default_duration`.
    pub fn from_text(
        name: impl Into<String>,
        text: &str,
        default_duration: Option<f64>,
    ) -> StimexResult<Self> {
        let elements = text
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| {
                let onset = default_duration.map(|d| i as f64 * d);
                TextUnit::timed(word, onset, default_duration)
            })
            .collect::<StimexResult<Vec<_>>>()?;
        Ok(Self::new(name, elements))
    }

    /// Element texts joined by single spaces.
    pub fn text(&self) -> String {
        self.elements
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Decoded audio samples (mono).
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Arc<[f32]>,
    pub sampling_rate: u32,
    pub meta: StimulusMeta,
}

impl AudioClip {
    /// Create an audio clip; duration is derived from the sample count.
    pub fn new(
        name: impl Into<String>,
        samples: impl Into<Arc<[f32]>>,
        sampling_rate: u32,
    ) -> StimexResult<Self> {
        if sampling_rate == 0 {
            return Err(StimexError::validation("sampling_rate must be positive"));
        }
        let samples = samples.into();
        let duration = samples.len() as f64 / sampling_rate as f64;
        Ok(Self {
            meta: StimulusMeta::new(name).with_duration(duration)?,
            samples,
            sampling_rate,
        })
    }
}

/// Video clip metadata. Frames and audio are obtained through a
/// [`MediaDecoder`](crate::providers::MediaDecoder).
#[derive(Debug, Clone, PartialEq)]
pub struct VideoClip {
    pub source: Option<PathBuf>,
    pub fps: f64,
    pub n_frames: usize,
    pub width: u32,
    pub height: u32,
    pub meta: StimulusMeta,
}

impl VideoClip {
    /// Create a video clip; duration is `n_frames / fps`.
    pub fn new(
        name: impl Into<String>,
        fps: f64,
        n_frames: usize,
        width: u32,
        height: u32,
    ) -> StimexResult<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(StimexError::validation(format!("fps must be positive, got {}", fps)));
        }
        Ok(Self {
            source: None,
            fps,
            n_frames,
            width,
            height,
            meta: StimulusMeta::new(name).with_duration(n_frames as f64 / fps)?,
        })
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A single decoded image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFrame {
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub meta: StimulusMeta,
}

impl ImageFrame {
    /// Create an image, checking the buffer matches its dimensions.
    pub fn new(
        name: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
        width: u32,
        height: u32,
        channels: u8,
    ) -> StimexResult<Self> {
        let data = data.into();
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(StimexError::validation(format!(
                "image buffer has {} bytes, expected {}x{}x{} = {}",
                data.len(),
                width,
                height,
                channels,
                expected
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
            meta: StimulusMeta::new(name),
        })
    }
}

/// Ordered frames sampled from a video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrameSequence {
    pub frames: Vec<ImageFrame>,
    pub meta: StimulusMeta,
}

impl VideoFrameSequence {
    pub fn new(name: impl Into<String>, frames: Vec<ImageFrame>) -> Self {
        Self {
            frames,
            meta: StimulusMeta::new(name),
        }
    }
}

/// Any stimulus flowing through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Stimulus {
    TextUnit(TextUnit),
    TextDocument(TextDocument),
    TextSequence(TextSequence),
    Audio(AudioClip),
    Video(VideoClip),
    Image(ImageFrame),
    VideoFrames(VideoFrameSequence),
}

impl Stimulus {
    /// The semantic type tag.
    pub fn kind(&self) -> StimulusKind {
        match self {
            Self::TextUnit(_) => StimulusKind::TextUnit,
            Self::TextDocument(_) => StimulusKind::TextDocument,
            Self::TextSequence(_) => StimulusKind::TextSequence,
            Self::Audio(_) => StimulusKind::Audio,
            Self::Video(_) => StimulusKind::Video,
            Self::Image(_) => StimulusKind::Image,
            Self::VideoFrames(_) => StimulusKind::VideoFrames,
        }
    }

    pub fn meta(&self) -> &StimulusMeta {
        match self {
            Self::TextUnit(s) => &s.meta,
            Self::TextDocument(s) => &s.meta,
            Self::TextSequence(s) => &s.meta,
            Self::Audio(s) => &s.meta,
            Self::Video(s) => &s.meta,
            Self::Image(s) => &s.meta,
            Self::VideoFrames(s) => &s.meta,
        }
    }

    /// Mutable metadata. Only meant for the producer of a freshly derived
    /// stimulus; inputs handed to transformers are never modified.
    pub fn meta_mut(&mut self) -> &mut StimulusMeta {
        match self {
            Self::TextUnit(s) => &mut s.meta,
            Self::TextDocument(s) => &mut s.meta,
            Self::TextSequence(s) => &mut s.meta,
            Self::Audio(s) => &mut s.meta,
            Self::Video(s) => &mut s.meta,
            Self::Image(s) => &mut s.meta,
            Self::VideoFrames(s) => &mut s.meta,
        }
    }

    pub fn name(&self) -> &str {
        &self.meta().name
    }

    pub fn onset(&self) -> Option<f64> {
        self.meta().onset
    }

    pub fn duration(&self) -> Option<f64> {
        self.meta().duration
    }

    /// Textual payload for text kinds; sequences are joined with spaces.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::TextUnit(s) => Some(Cow::Borrowed(&s.text)),
            Self::TextDocument(s) => Some(Cow::Borrowed(&s.text)),
            Self::TextSequence(s) => Some(Cow::Owned(s.text())),
            _ => None,
        }
    }

    /// Lightweight provenance reference for results.
    pub fn to_ref(&self) -> StimulusRef {
        let meta = self.meta();
        StimulusRef {
            name: meta.name.clone(),
            kind: self.kind(),
            onset: meta.onset,
            duration: meta.duration,
            history: meta.history.clone(),
        }
    }

    /// Record that `transformer` derived this stimulus from `source`.
    pub fn derived_from(mut self, source: &Stimulus, transformer: &TransformerDescriptor) -> Self {
        let mut history = source.meta().history.clone();
        history.push(TransformationStep {
            source_name: source.name().to_string(),
            source_kind: source.kind(),
            transformer: transformer.clone(),
        });
        self.meta_mut().history = history;
        self
    }
}

macro_rules! impl_from_stimulus {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Stimulus {
                fn from(value: $ty) -> Self {
                    Stimulus::$variant(value)
                }
            }
        )*
    };
}

impl_from_stimulus! {
    TextUnit => TextUnit,
    TextDocument => TextDocument,
    TextSequence => TextSequence,
    Audio => AudioClip,
    Video => VideoClip,
    Image => ImageFrame,
    VideoFrames => VideoFrameSequence,
}

/// Provenance record of a stimulus, held by results instead of the
/// stimulus itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusRef {
    pub name: String,
    pub kind: StimulusKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onset: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub history: Vec<TransformationStep>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_matching() {
        assert!(StimulusType::AnyText.matches(StimulusKind::TextUnit));
        assert!(StimulusType::AnyText.matches(StimulusKind::TextDocument));
        assert!(!StimulusType::AnyText.matches(StimulusKind::TextSequence));
        assert!(StimulusType::AnySequence.matches(StimulusKind::VideoFrames));
        assert!(StimulusType::Any.matches(StimulusKind::Audio));
        assert!(StimulusType::Exact(StimulusKind::Video).matches(StimulusKind::Video));
        assert!(!StimulusType::Exact(StimulusKind::Video).matches(StimulusKind::Audio));
    }

    #[test]
    fn test_type_covers() {
        let unit = StimulusType::Exact(StimulusKind::TextUnit);
        assert!(StimulusType::AnyText.covers(&unit));
        assert!(!unit.covers(&StimulusType::AnyText));
        assert!(StimulusType::Any.covers(&StimulusType::AnySequence));
    }

    #[test]
    fn test_negative_onset_rejected() {
        assert!(TextUnit::timed("hi", Some(-1.0), None).is_err());
        assert!(TextUnit::timed("hi", None, Some(f64::NAN)).is_err());
        let unit = TextUnit::timed("hi", Some(0.5), Some(0.25)).unwrap();
        assert_eq!(unit.meta.onset, Some(0.5));
    }

    #[test]
    fn test_sequence_from_text() {
        let seq = TextSequence::from_text("doc", "the quick  fox", Some(0.5)).unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.elements[2].text, "fox");
        assert_eq!(seq.elements[2].meta.onset, Some(1.0));
        assert_eq!(seq.text(), "the quick fox");
    }

    #[test]
    fn test_audio_duration_derived() {
        let clip = AudioClip::new("a.wav", vec![0.0_f32; 8000], 16000).unwrap();
        assert_eq!(clip.meta.duration, Some(0.5));
        assert!(AudioClip::new("bad", vec![0.0_f32; 1], 0).is_err());
    }

    #[test]
    fn test_image_buffer_checked() {
        assert!(ImageFrame::new("img", vec![0u8; 12], 2, 2, 3).is_ok());
        assert!(ImageFrame::new("img", vec![0u8; 11], 2, 2, 3).is_err());
    }

    #[test]
    fn test_derived_history_does_not_touch_source() {
        let source = Stimulus::from(TextDocument::new("doc.txt", "hello"));
        let descriptor = TransformerDescriptor::new("TestConverter", "1.0");
        let derived = Stimulus::from(TextUnit::new("hello")).derived_from(&source, &descriptor);

        assert!(source.meta().history.is_empty());
        assert_eq!(derived.meta().history.len(), 1);
        assert_eq!(derived.meta().history[0].source_name, "doc.txt");
        assert_eq!(derived.meta().history[0].source_kind, StimulusKind::TextDocument);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(StimulusKind::TextSequence.to_string(), "text_sequence");
        assert_eq!("video_frames".parse::<StimulusKind>().unwrap(), StimulusKind::VideoFrames);
    }
}
