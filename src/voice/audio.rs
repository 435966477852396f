use base64::Engine;

/// Sample rate the voice agent expects for user audio.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

pub fn to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|s| f32_to_i16(*s)).collect()
}

/// Average interleaved frames down to one channel.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Streaming linear-interpolation resampler. Good enough for speech going
/// to an ASR.
///
/// Microphone buffers arrive in small chunks, so the read position and the
/// last input sample carry over from one chunk to the next. Feeding a
/// signal in pieces gives the same output as feeding it whole.
#[derive(Debug, Clone)]
pub struct Resampler {
    step: f64,
    pos: f64,
    last: Option<f32>,
}

impl Resampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        let step = if from_rate == 0 || to_rate == 0 {
            1.0
        } else {
            from_rate as f64 / to_rate as f64
        };
        Self {
            step,
            pos: 0.0,
            last: None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.step == 1.0
    }

    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        if self.is_passthrough() || samples.is_empty() {
            return samples.to_vec();
        }

        // Index 0 is the tail of the previous chunk when there is one.
        let mut buf = Vec::with_capacity(samples.len() + 1);
        buf.extend(self.last);
        buf.extend_from_slice(samples);
        let end = (buf.len() - 1) as f64;

        let mut out = Vec::with_capacity((samples.len() as f64 / self.step) as usize + 1);
        while self.pos < end {
            let idx = self.pos as usize;
            let frac = (self.pos - idx as f64) as f32;
            let a = buf[idx];
            let b = buf[idx + 1];
            out.push(a + (b - a) * frac);
            self.pos += self.step;
        }

        self.pos -= end;
        self.last = buf.last().copied();
        out
    }
}

/// Base64 of little-endian PCM16, the framing the voice socket expects.
pub fn encode_chunk(pcm: &[i16]) -> String {
    let bytes: Vec<u8> = pcm.iter().flat_map(|s| s.to_le_bytes()).collect();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_to_i16_clamps() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), 32767);
        assert_eq!(f32_to_i16(-1.0), -32767);
        assert_eq!(f32_to_i16(2.5), 32767);
        assert_eq!(f32_to_i16(-3.0), -32768);
    }

    #[test]
    fn test_downmix_stereo() {
        let mono = downmix(&[0.2, 0.4, -1.0, 1.0], 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert_eq!(mono[1], 0.0);
    }

    #[test]
    fn test_resample_halves_length() {
        let input: Vec<f32> = (0..480).map(|i| i as f32 / 480.0).collect();
        let out = Resampler::new(48_000, TARGET_SAMPLE_RATE).process(&input);
        assert_eq!(out.len(), 160);
        assert!((out[1] - input[3]).abs() < 1e-6);
        assert_eq!(Resampler::new(16_000, 16_000).process(&input), input);
    }

    #[test]
    fn test_resample_chunks_match_whole_signal() {
        let input: Vec<f32> = (0..44_032)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / 44_100.0).sin())
            .collect();

        let whole = Resampler::new(44_100, TARGET_SAMPLE_RATE).process(&input);

        let mut chunked_resampler = Resampler::new(44_100, TARGET_SAMPLE_RATE);
        let chunked: Vec<f32> = input
            .chunks(512)
            .flat_map(|chunk| chunked_resampler.process(chunk))
            .collect();

        // 44_032 input samples span just under 15_976 output periods.
        assert_eq!(whole.len(), 15_976);
        assert_eq!(chunked.len(), whole.len());
        for (a, b) in chunked.iter().zip(&whole) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_encode_chunk_little_endian() {
        assert_eq!(encode_chunk(&[1, -1]), "AQD//w==");
    }
}
