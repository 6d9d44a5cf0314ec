use audiopus::coder::Encoder;
use audiopus::{Application, Channels, SampleRate};
use std::borrow::Cow;

use super::error::{AudioError, AudioErrorType};
use crate::options::PlayerConfig;

/// Largest packet libopus is advised to produce.
const MAX_PACKET_LEN: usize = 4000;

/// Opus encoder of a single track.
///
/// Encoder state carries over between frames, so each track gets its own.
pub struct FrameEncoder {
    encoder: Encoder,
    frame_len: usize,
    output: Vec<u8>,
}

impl std::fmt::Debug for FrameEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameEncoder")
            .field("frame_len", &self.frame_len)
            .finish_non_exhaustive()
    }
}

impl FrameEncoder {
    pub fn new(config: &PlayerConfig) -> Result<Self, AudioError> {
        let sample_rate = match config.sample_rate {
            8_000 => SampleRate::Hz8000,
            12_000 => SampleRate::Hz12000,
            16_000 => SampleRate::Hz16000,
            24_000 => SampleRate::Hz24000,
            48_000 => SampleRate::Hz48000,
            _ => {
                return Err(AudioError::new(AudioErrorType::UnsupportedFormat {
                    reason: "opus does not support this sample rate",
                }));
            }
        };
        let channels = match config.channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            _ => {
                return Err(AudioError::new(AudioErrorType::UnsupportedFormat {
                    reason: "opus encodes one or two channels",
                }));
            }
        };

        let encoder = Encoder::new(sample_rate, channels, Application::Audio)
            .map_err(|source| AudioError::with_source(AudioErrorType::Encoding, source))?;

        Ok(Self {
            encoder,
            frame_len: config.frame_len(),
            output: vec![0; MAX_PACKET_LEN],
        })
    }

    /// Compresses one interleaved PCM frame.
    ///
    /// Opus only takes whole frames, a shorter final frame is filled up
    /// with silence.
    pub fn encode(&mut self, pcm: &[f32]) -> Result<Vec<u8>, AudioError> {
        if pcm.len() > self.frame_len {
            return Err(AudioError::new(AudioErrorType::UnsupportedFormat {
                reason: "frame is longer than the configured frame size",
            }));
        }

        let input = if pcm.len() == self.frame_len {
            Cow::Borrowed(pcm)
        } else {
            let mut padded = pcm.to_vec();
            padded.resize(self.frame_len, 0.0);
            Cow::Owned(padded)
        };

        let len = self
            .encoder
            .encode_float(&input, &mut self.output)
            .map_err(|source| AudioError::with_source(AudioErrorType::Encoding, source))?;

        Ok(self.output[..len].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_frame_is_encoded() {
        let config = PlayerConfig::default();
        let mut encoder = FrameEncoder::new(&config).unwrap();

        let full = encoder.encode(&vec![0.1; config.frame_len()]).unwrap();
        assert!(!full.is_empty());

        let partial = encoder.encode(&vec![0.1; 100]).unwrap();
        assert!(!partial.is_empty());

        let error = encoder.encode(&vec![0.1; config.frame_len() + 2]).unwrap_err();
        assert!(matches!(
            error.kind(),
            AudioErrorType::UnsupportedFormat { .. }
        ));
    }

    #[test]
    fn rejects_unsupported_layout() {
        let config = PlayerConfig {
            sample_rate: 44_100,
            ..PlayerConfig::default()
        };
        assert!(FrameEncoder::new(&config).is_err());
    }
}
