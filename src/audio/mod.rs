//! Compressed source to Opus frames.
//!
//! [`AudioPipeline::decode`] yields fixed-size PCM frames at the player's
//! sample rate and channel layout, each compressed independently by a
//! [`FrameEncoder`]. Both stages are lazy and finite, dropping them in the
//! middle of a track releases the decoder.
use tracing::{debug, warn};

use crate::options::PlayerConfig;

mod decoder;
mod encoder;
mod error;
mod frames;
mod resampler;

pub use self::decoder::{PcmBlock, SourceDecoder};
pub use self::encoder::FrameEncoder;
pub use self::error::{AudioError, AudioErrorType};
pub use self::frames::FrameBuffer;
pub use self::resampler::Resampler;

/// Builds the decode and encode stages for each track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioPipeline {
    config: PlayerConfig,
}

impl AudioPipeline {
    #[must_use]
    pub const fn new(config: PlayerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Probes `source` and returns its PCM frames.
    ///
    /// Every frame holds `frame_size` samples per channel, except possibly
    /// the last one which is shorter.
    pub fn decode(&self, source: Vec<u8>) -> Result<PcmFrames, AudioError> {
        Ok(PcmFrames {
            buffer: FrameBuffer::new(self.config.frame_len()),
            config: self.config,
            decoder: SourceDecoder::new(source)?,
            resampler: None,
            source_rate: None,
            state: DecodeState::Decoding,
        })
    }

    /// Creates a fresh encoder for a track.
    pub fn encoder(&self) -> Result<FrameEncoder, AudioError> {
        FrameEncoder::new(&self.config)
    }

    /// Decodes `source` and encodes each of its frames.
    pub fn frames(&self, source: Vec<u8>) -> Result<EncodedFrames, AudioError> {
        Ok(EncodedFrames {
            encoder: self.encoder()?,
            frames: self.decode(source)?,
            channels: self.config.channels,
            failed: false,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Decoding,
    Draining,
    Failed,
}

/// Lazy sequence of interleaved PCM frames of one track.
///
/// Ends after the first error.
#[derive(Debug)]
pub struct PcmFrames {
    buffer: FrameBuffer,
    config: PlayerConfig,
    decoder: SourceDecoder,
    resampler: Option<Resampler>,
    source_rate: Option<u32>,
    state: DecodeState,
}

impl PcmFrames {
    fn push_block(&mut self, block: PcmBlock) -> Result<(), AudioError> {
        let source_rate = *self.source_rate.get_or_insert(block.sample_rate);
        if source_rate != block.sample_rate {
            warn!(
                expected = source_rate,
                received = block.sample_rate,
                "sample rate changed mid-track, ignoring"
            );
        }

        if source_rate != self.config.sample_rate && self.resampler.is_none() {
            debug!(from = source_rate, to = self.config.sample_rate, "resampling track");
            self.resampler = Some(Resampler::new(
                source_rate,
                self.config.sample_rate,
                self.config.channels,
            )?);
        }

        let planar = frames::remix(&block.samples, block.channels, self.config.channels);
        let planar = match self.resampler.as_mut() {
            Some(resampler) => resampler.push(&planar)?,
            None => planar,
        };
        self.buffer.push(&frames::interleave(&planar));
        Ok(())
    }

    fn finish(&mut self) -> Result<(), AudioError> {
        if let Some(resampler) = self.resampler.as_mut() {
            let rest = resampler.finish()?;
            self.buffer.push(&frames::interleave(&rest));
        }
        Ok(())
    }

    fn fail(&mut self, error: AudioError) -> Option<Result<Vec<f32>, AudioError>> {
        self.state = DecodeState::Failed;
        Some(Err(error))
    }
}

impl Iterator for PcmFrames {
    type Item = Result<Vec<f32>, AudioError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                DecodeState::Failed => return None,
                DecodeState::Draining => {
                    return self.buffer.next_frame().or_else(|| self.buffer.take_rest()).map(Ok);
                }
                DecodeState::Decoding => {}
            }

            if let Some(frame) = self.buffer.next_frame() {
                return Some(Ok(frame));
            }

            match self.decoder.next_block() {
                Ok(Some(block)) => {
                    if let Err(error) = self.push_block(block) {
                        return self.fail(error);
                    }
                }
                Ok(None) => {
                    if let Err(error) = self.finish() {
                        return self.fail(error);
                    }
                    self.state = DecodeState::Draining;
                }
                Err(error) => return self.fail(error),
            }
        }
    }
}

/// One Opus frame ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub data: Vec<u8>,
    /// Samples per channel of source audio the frame carries.
    pub samples: usize,
}

/// Lazy sequence of Opus frames of one track.
#[derive(Debug)]
pub struct EncodedFrames {
    encoder: FrameEncoder,
    frames: PcmFrames,
    channels: usize,
    failed: bool,
}

impl Iterator for EncodedFrames {
    type Item = Result<EncodedFrame, AudioError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let result = self.frames.next()?.and_then(|pcm| {
            let data = self.encoder.encode(&pcm)?;
            Ok(EncodedFrame {
                data,
                samples: pcm.len() / self.channels,
            })
        });

        self.failed = result.is_err();
        Some(result)
    }
}
