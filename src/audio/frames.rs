use std::fmt::Debug;

/// Collects interleaved samples and cuts them into frames of a fixed
/// length.
pub struct FrameBuffer {
    buffer: Vec<f32>,
    frame_len: usize,
}

impl FrameBuffer {
    /// `frame_len` counts interleaved samples, all channels included.
    #[must_use]
    pub fn new(frame_len: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(frame_len * 2),
            frame_len,
        }
    }

    pub fn push(&mut self, samples: &[f32]) {
        self.buffer.extend_from_slice(samples);
    }

    #[must_use]
    pub fn has_remaining_samples(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Takes the next whole frame, if there is one.
    #[must_use]
    pub fn next_frame(&mut self) -> Option<Vec<f32>> {
        if self.buffer.len() < self.frame_len {
            return None;
        }
        Some(self.buffer.drain(..self.frame_len).collect())
    }

    /// Takes whatever is left, shorter than a frame and without padding.
    #[must_use]
    pub fn take_rest(&mut self) -> Option<Vec<f32>> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.buffer))
    }
}

impl Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("buffer", &self.buffer.len())
            .field("frame_len", &self.frame_len)
            .finish()
    }
}

/// Deinterleaves `samples` into `target` channels.
///
/// Mono is copied into every channel, extra channels are dropped.
#[must_use]
pub fn remix(samples: &[f32], channels: usize, target: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels.max(1);
    let mut planar = vec![Vec::<f32>::with_capacity(frames); target];

    for frame in samples.chunks_exact(channels.max(1)) {
        for (index, output) in planar.iter_mut().enumerate() {
            let source = if channels == 1 { 0 } else { index.min(channels - 1) };
            output.push(frame[source]);
        }
    }
    planar
}

#[must_use]
pub fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let frames = planar.first().map_or(0, Vec::len);
    let mut samples = Vec::with_capacity(frames * planar.len());
    for index in 0..frames {
        samples.extend(planar.iter().map(|channel| channel[index]));
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn frames_and_unpadded_rest() {
        let mut buffer = FrameBuffer::new(4);
        buffer.push(&[1.0, 2.0, 3.0]);
        assert_eq!(buffer.next_frame(), None);

        buffer.push(&[4.0, 5.0, 6.0]);
        assert_eq!(buffer.next_frame(), Some(vec![1.0, 2.0, 3.0, 4.0]));
        assert_eq!(buffer.next_frame(), None);
        assert!(buffer.has_remaining_samples());

        assert_eq!(buffer.take_rest(), Some(vec![5.0, 6.0]));
        assert_eq!(buffer.take_rest(), None);
    }

    #[test]
    fn mono_is_duplicated() {
        let planar = remix(&[0.1, 0.2], 1, 2);
        assert_eq!(planar, vec![vec![0.1, 0.2], vec![0.1, 0.2]]);
        assert_eq!(interleave(&planar), vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn surround_keeps_front_pair() {
        let planar = remix(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], 4, 2);
        assert_eq!(planar, vec![vec![1.0, 5.0], vec![2.0, 6.0]]);
    }
}
