//! Converters that read from video clips through a [`MediaDecoder`].

use std::sync::Arc;

use stimex_core::{
    ConverterEntry, Converter, Dependency, MediaDecoder, Providers, StimexError, StimexResult,
    Stimulus, StimulusKind, StimulusType, Transformer, TransformerDescriptor, VideoClip,
    VideoFrameSequence,
};
use tracing::debug;

fn require_decoder(providers: &Providers, converter: &str) -> StimexResult<Arc<dyn MediaDecoder>> {
    providers
        .media_decoder()
        .ok_or_else(|| StimexError::MissingDependency {
            converter: converter.to_string(),
            step: 1,
            dependency: Dependency::MediaDecoder,
        })
}

fn as_video<'a>(stim: &'a Stimulus, converter: &str) -> StimexResult<&'a VideoClip> {
    match stim {
        Stimulus::Video(video) => Ok(video),
        other => Err(StimexError::incompatible(converter, other.name(), other.kind())),
    }
}

/// Extracts the audio track of a video.
pub struct VideoToAudioConverter {
    descriptor: TransformerDescriptor,
    decoder: Arc<dyn MediaDecoder>,
}

impl VideoToAudioConverter {
    pub const NAME: &'static str = "VideoToAudioConverter";

    pub fn new(decoder: Arc<dyn MediaDecoder>) -> Self {
        Self {
            descriptor: TransformerDescriptor::new(Self::NAME, "1.0"),
            decoder,
        }
    }

    pub fn from_providers(providers: &Providers) -> StimexResult<Self> {
        Ok(Self::new(require_decoder(providers, Self::NAME)?))
    }

    pub fn entry() -> ConverterEntry {
        ConverterEntry::new(
            Self::NAME,
            StimulusKind::Video.into(),
            StimulusKind::Audio.into(),
            |providers| Ok(Arc::new(Self::from_providers(providers)?) as Arc<dyn Converter>),
        )
        .with_requires(vec![Dependency::MediaDecoder])
    }
}

impl Transformer for VideoToAudioConverter {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusKind::Video.into()
    }
}

impl Converter for VideoToAudioConverter {
    fn output_type(&self) -> StimulusType {
        StimulusKind::Audio.into()
    }

    fn convert_one(&self, stim: &Stimulus) -> StimexResult<Vec<Stimulus>> {
        let video = as_video(stim, self.name())?;
        let mut audio = self.decoder.decode_audio(video)?;
        audio.meta.name = video.meta.name.clone();
        audio.meta.onset = video.meta.onset;
        if audio.meta.duration.is_none() {
            audio.meta.duration = video.meta.duration;
        }
        Ok(vec![audio.into()])
    }
}

/// Samples every `every`-th frame of a video into a frame sequence.
pub struct VideoFrameIterator {
    descriptor: TransformerDescriptor,
    decoder: Arc<dyn MediaDecoder>,
    every: usize,
}

impl VideoFrameIterator {
    pub const NAME: &'static str = "VideoFrameIterator";

    /// `every` of zero is treated as one (every frame).
    pub fn new(decoder: Arc<dyn MediaDecoder>, every: usize) -> Self {
        let every = every.max(1);
        Self {
            descriptor: TransformerDescriptor::new(Self::NAME, "1.0").with_param("every", every),
            decoder,
            every,
        }
    }

    pub fn from_providers(providers: &Providers, every: usize) -> StimexResult<Self> {
        Ok(Self::new(require_decoder(providers, Self::NAME)?, every))
    }

    pub fn entry() -> ConverterEntry {
        ConverterEntry::new(
            Self::NAME,
            StimulusKind::Video.into(),
            StimulusKind::VideoFrames.into(),
            |providers| Ok(Arc::new(Self::from_providers(providers, 1)?) as Arc<dyn Converter>),
        )
        .with_requires(vec![Dependency::MediaDecoder])
    }
}

impl Transformer for VideoFrameIterator {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusKind::Video.into()
    }
}

impl Converter for VideoFrameIterator {
    fn output_type(&self) -> StimulusType {
        StimulusKind::VideoFrames.into()
    }

    fn convert_one(&self, stim: &Stimulus) -> StimexResult<Vec<Stimulus>> {
        let video = as_video(stim, self.name())?;
        let start = video.meta.onset.unwrap_or(0.0);
        let total = video.n_frames as f64 / video.fps;

        let mut frames = Vec::with_capacity(video.n_frames / self.every + 1);
        for index in (0..video.n_frames).step_by(self.every) {
            let mut frame = self.decoder.decode_frame(video, index)?;
            let offset = index as f64 / video.fps;
            let span = (self.every as f64 / video.fps).min(total - offset);
            frame.meta.name = format!("{}[frame {}]", video.meta.name, index);
            frame.meta = frame.meta.with_timing(Some(start + offset), Some(span))?;
            frames.push(frame);
        }
        debug!(video = %video.meta.name, frames = frames.len(), "Sampled video frames");

        let mut sequence = VideoFrameSequence::new(video.meta.name.clone(), frames);
        sequence.meta.onset = video.meta.onset;
        sequence.meta.duration = video.meta.duration;
        Ok(vec![sequence.into()])
    }
}
