use std::io::{Cursor, ErrorKind};
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{CODEC_TYPE_NULL, CODEC_TYPE_OPUS, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace, warn};

use super::error::{AudioError, AudioErrorType};

/// Longest Opus packet (120 ms) at 48 kHz, stereo.
const OPUS_MAX_SAMPLES: usize = 5760 * 2;

/// Interleaved samples decoded from one packet.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBlock {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

enum Codec {
    Native {
        decoder: Box<dyn Decoder>,
        buffer: Option<(u64, SignalSpec, SampleBuffer<f32>)>,
    },
    /// symphonia has no Opus codec, libopus does the work.
    Opus {
        decoder: audiopus::coder::Decoder,
        buffer: Vec<f32>,
        /// Samples per channel still to drop from the start.
        skip: usize,
    },
}

/// Demuxes and decodes the default audio track of a complete source buffer.
pub struct SourceDecoder {
    codec: Codec,
    format: Box<dyn FormatReader>,
    track_id: u32,
}

impl std::fmt::Debug for SourceDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDecoder")
            .field("track_id", &self.track_id)
            .field(
                "codec",
                &match self.codec {
                    Codec::Native { .. } => "native",
                    Codec::Opus { .. } => "opus",
                },
            )
            .finish_non_exhaustive()
    }
}

impl SourceDecoder {
    pub fn new(data: Vec<u8>) -> Result<Self, AudioError> {
        let source = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());
        let format_options = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };

        let probed = symphonia::default::get_probe()
            .format(
                &Hint::new(),
                source,
                &format_options,
                &MetadataOptions::default(),
            )
            .map_err(|source| AudioError::with_source(AudioErrorType::Probing, source))?;
        let format = probed.format;

        let track = format
            .default_track()
            .filter(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            .or_else(|| {
                format
                    .tracks()
                    .iter()
                    .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            })
            .ok_or_else(|| AudioError::new(AudioErrorType::NoTrack))?;

        let track_id = track.id;
        let codec = if track.codec_params.codec == CODEC_TYPE_OPUS {
            let decoder = audiopus::coder::Decoder::new(
                audiopus::SampleRate::Hz48000,
                audiopus::Channels::Stereo,
            )
            .map_err(|source| AudioError::with_source(AudioErrorType::Decoding, source))?;

            Codec::Opus {
                decoder,
                buffer: vec![0.0; OPUS_MAX_SAMPLES],
                skip: track.codec_params.delay.unwrap_or_default() as usize,
            }
        } else {
            let decoder = symphonia::default::get_codecs()
                .make(&track.codec_params, &DecoderOptions::default())
                .map_err(|source| {
                    AudioError::with_source(
                        AudioErrorType::UnsupportedFormat {
                            reason: "no decoder for codec",
                        },
                        source,
                    )
                })?;

            Codec::Native {
                decoder,
                buffer: None,
            }
        };

        debug!(track_id, codec = ?track.codec_params.codec, "decoding source");
        Ok(Self {
            codec,
            format,
            track_id,
        })
    }

    /// Decodes up to the next packet carrying samples.
    ///
    /// Returns `None` at the end of the track. Corrupt packets are skipped.
    pub fn next_block(&mut self) -> Result<Option<PcmBlock>, AudioError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(error)) if error.kind() == ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    debug!("source requires a decoder reset, ending track");
                    return Ok(None);
                }
                Err(source) => {
                    return Err(AudioError::with_source(AudioErrorType::Decoding, source));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let block = match &mut self.codec {
                Codec::Native { decoder, buffer } => match decoder.decode(&packet) {
                    Ok(decoded) => {
                        let spec = *decoded.spec();
                        let capacity = decoded.capacity() as u64;
                        if buffer
                            .as_ref()
                            .is_none_or(|(size, current, _)| *size < capacity || *current != spec)
                        {
                            *buffer = Some((capacity, spec, SampleBuffer::new(capacity, spec)));
                        }

                        let (_, _, samples) =
                            buffer.as_mut().expect("sample buffer was just allocated");
                        samples.copy_interleaved_ref(decoded);

                        PcmBlock {
                            samples: samples.samples().to_vec(),
                            channels: spec.channels.count(),
                            sample_rate: spec.rate,
                        }
                    }
                    Err(SymphoniaError::DecodeError(error)) => {
                        warn!(error, "skipping corrupt packet");
                        continue;
                    }
                    Err(source) => {
                        return Err(AudioError::with_source(AudioErrorType::Decoding, source));
                    }
                },
                Codec::Opus {
                    decoder,
                    buffer,
                    skip,
                } => {
                    let input = (!packet.buf().is_empty()).then(|| packet.buf());
                    let decoded = match decoder.decode_float(input, &mut buffer[..], false) {
                        Ok(decoded) => decoded,
                        Err(error) => {
                            warn!(?error, "skipping corrupt opus packet");
                            continue;
                        }
                    };

                    let skipped = decoded.min(*skip);
                    *skip -= skipped;

                    PcmBlock {
                        samples: buffer[skipped * 2..decoded * 2].to_vec(),
                        channels: 2,
                        sample_rate: 48_000,
                    }
                }
            };

            if block.samples.is_empty() {
                continue;
            }

            trace!(samples = block.samples.len(), "decoded packet");
            return Ok(Some(block));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tests::wav;

    #[test]
    fn decodes_wav_samples() {
        let mut decoder = SourceDecoder::new(wav(48_000, 2, 1000)).unwrap();

        let mut total = 0;
        while let Some(block) = decoder.next_block().unwrap() {
            assert_eq!(block.channels, 2);
            assert_eq!(block.sample_rate, 48_000);
            total += block.samples.len();
        }
        assert_eq!(total, 2000);
    }

    #[test]
    fn garbage_is_not_probed() {
        let error = SourceDecoder::new(vec![0x42; 64]).unwrap_err();
        assert!(matches!(error.kind(), AudioErrorType::Probing));
    }
}
