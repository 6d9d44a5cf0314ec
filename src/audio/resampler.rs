use rubato::{FftFixedIn, Resampler as _};
use tracing::trace;

use super::error::{AudioError, AudioErrorType};

const CHUNK_SIZE: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Converts planar audio to the target sample rate.
///
/// The resampler's own delay is trimmed from the start and the tail is
/// flushed on [`finish`](Self::finish), so the output is as long as the
/// input in playback time.
pub struct Resampler {
    inner: FftFixedIn<f32>,
    pending: Vec<Vec<f32>>,
    consumed: u64,
    produced: u64,
    delay: usize,
    from: u32,
    to: u32,
}

impl std::fmt::Debug for Resampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resampler")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("pending", &self.pending.first().map_or(0, Vec::len))
            .finish_non_exhaustive()
    }
}

impl Resampler {
    pub fn new(from: u32, to: u32, channels: usize) -> Result<Self, AudioError> {
        let inner =
            FftFixedIn::<f32>::new(from as usize, to as usize, CHUNK_SIZE, SUB_CHUNKS, channels)
                .map_err(|source| AudioError::with_source(AudioErrorType::Resampling, source))?;

        Ok(Self {
            delay: inner.output_delay(),
            inner,
            pending: vec![Vec::with_capacity(CHUNK_SIZE); channels],
            consumed: 0,
            produced: 0,
            from,
            to,
        })
    }

    /// Resamples as many whole chunks of `input` as possible.
    pub fn push(&mut self, input: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, AudioError> {
        for (pending, channel) in self.pending.iter_mut().zip(input) {
            pending.extend_from_slice(channel);
        }
        self.consumed += input.first().map_or(0, Vec::len) as u64;

        let mut output = vec![Vec::new(); self.pending.len()];
        while self.pending[0].len() >= self.inner.input_frames_next() {
            let needed = self.inner.input_frames_next();
            let chunk = self
                .pending
                .iter_mut()
                .map(|channel| channel.drain(..needed).collect::<Vec<_>>())
                .collect::<Vec<_>>();

            let resampled = self
                .inner
                .process(chunk.as_slice(), None)
                .map_err(|source| AudioError::with_source(AudioErrorType::Resampling, source))?;
            self.emit(resampled, u64::MAX, &mut output);
        }
        Ok(output)
    }

    /// Resamples what is left and flushes the delay line.
    pub fn finish(&mut self) -> Result<Vec<Vec<f32>>, AudioError> {
        let expected = (self.consumed * u64::from(self.to)).div_ceil(u64::from(self.from));
        let mut output = vec![Vec::new(); self.pending.len()];

        let mut pending = Some(std::mem::take(&mut self.pending));
        while self.produced < expected {
            let resampled = match pending.take() {
                Some(rest) if !rest[0].is_empty() => {
                    self.inner.process_partial(Some(rest.as_slice()), None)
                }
                _ => self.inner.process_partial(None::<&[Vec<f32>]>, None),
            }
            .map_err(|source| AudioError::with_source(AudioErrorType::Resampling, source))?;

            if resampled[0].is_empty() {
                break;
            }
            self.emit(resampled, expected, &mut output);
        }

        trace!(consumed = self.consumed, produced = self.produced, "resampler flushed");
        Ok(output)
    }

    fn emit(&mut self, resampled: Vec<Vec<f32>>, limit: u64, output: &mut [Vec<f32>]) {
        let skip = self.delay.min(resampled[0].len());
        self.delay -= skip;

        let available = (resampled[0].len() - skip) as u64;
        let take = available.min(limit.saturating_sub(self.produced)) as usize;
        for (out, channel) in output.iter_mut().zip(&resampled) {
            out.extend_from_slice(&channel[skip..skip + take]);
        }
        self.produced += take as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_length_follows_ratio() {
        let mut resampler = Resampler::new(24_000, 48_000, 2).unwrap();
        let input = vec![0.25; 2400];

        let mut total = 0;
        for chunk in input.chunks(700) {
            let planar = vec![chunk.to_vec(), chunk.to_vec()];
            let output = resampler.push(&planar).unwrap();
            assert_eq!(output[0].len(), output[1].len());
            total += output[0].len();
        }
        total += resampler.finish().unwrap()[0].len();

        assert_eq!(total, 4800);
    }
}
