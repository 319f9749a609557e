//! Audio frames and their wire encoding
//!
//! Frames are fixed-size blocks of mono f32 samples in [-1, 1]. On the wire
//! each sample becomes a little-endian i16 and the whole frame is base64.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

/// One block of captured mono samples
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Capture order, starting at 0 for each capture run
    pub sequence: u64,
    pub samples: Vec<f32>,
}

impl AudioFrame {
    pub fn new(sequence: u64, samples: Vec<f32>) -> Self {
        Self { sequence, samples }
    }

    /// Quantize to signed 16-bit PCM
    pub fn to_pcm16(&self) -> Vec<i16> {
        self.samples.iter().map(|&s| quantize(s)).collect()
    }

    /// Little-endian PCM16 bytes
    pub fn to_pcm16_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 2);
        for sample in &self.samples {
            bytes.extend_from_slice(&quantize(*sample).to_le_bytes());
        }
        bytes
    }

    /// Base64 payload for an audio chunk message
    pub fn encode_base64(&self) -> String {
        BASE64_STANDARD.encode(self.to_pcm16_bytes())
    }
}

/// `sample * 32768` truncated toward zero; +1.0 saturates to `i16::MAX`
pub fn quantize(sample: f32) -> i16 {
    (sample * 32768.0) as i16
}

/// Decode a base64 payload back into PCM16 samples
pub fn decode_pcm16_base64(payload: &str) -> Result<Vec<i16>, base64::DecodeError> {
    let bytes = BASE64_STANDARD.decode(payload)?;
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Cuts an arbitrary stream of samples into fixed-size frames
#[derive(Debug)]
pub struct FrameAssembler {
    frame_size: usize,
    pending: Vec<f32>,
    next_sequence: u64,
}

impl FrameAssembler {
    pub fn new(frame_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            pending: Vec::with_capacity(frame_size),
            next_sequence: 0,
        }
    }

    /// Feed samples, returning every frame completed by them in order
    pub fn push(&mut self, samples: &[f32]) -> Vec<AudioFrame> {
        let mut frames = Vec::new();
        let mut rest = samples;
        while !rest.is_empty() {
            let take = (self.frame_size - self.pending.len()).min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.pending.len() == self.frame_size {
                let samples =
                    std::mem::replace(&mut self.pending, Vec::with_capacity(self.frame_size));
                frames.push(AudioFrame::new(self.next_sequence, samples));
                self.next_sequence += 1;
            }
        }
        frames
    }

    /// Samples waiting for a full frame
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Downmix interleaved audio to mono and linearly resample to `to_rate`
pub fn to_mono(samples: &[f32], channels: usize, from_rate: u32, to_rate: u32) -> Vec<f32> {
    if channels == 0 || samples.is_empty() {
        return Vec::new();
    }
    let mono: Vec<f32> = if channels == 1 {
        samples.to_vec()
    } else {
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };
    if from_rate == to_rate || from_rate == 0 {
        return mono;
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let out_len = (mono.len() as f64 / ratio).floor() as usize;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = mono[idx.min(mono.len() - 1)];
            let b = mono[(idx + 1).min(mono.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_truncates() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(-1.0), -32768);
        assert_eq!(quantize(1.0), i16::MAX);
        assert_eq!(quantize(0.5), 16384);
        // 0.00003 * 32768 = 0.98..., truncated toward zero
        assert_eq!(quantize(0.00003), 0);
        assert_eq!(quantize(-0.00003), 0);
    }

    #[test]
    fn test_pcm_bytes_little_endian() {
        let frame = AudioFrame::new(0, vec![0.5, -1.0]);
        assert_eq!(frame.to_pcm16_bytes(), vec![0x00, 0x40, 0x00, 0x80]);
    }

    #[test]
    fn test_base64_payload() {
        let frame = AudioFrame::new(0, vec![0.5, -0.5, 0.25]);
        let payload = frame.encode_base64();
        assert_eq!(decode_pcm16_base64(&payload).unwrap(), frame.to_pcm16());
        assert_eq!(frame.to_pcm16(), vec![16384, -16384, 8192]);
    }

    #[test]
    fn test_assembler_emits_fixed_frames_in_order() {
        let mut assembler = FrameAssembler::new(4);
        assert!(assembler.push(&[0.1, 0.2, 0.3]).is_empty());
        let frames = assembler.push(&[0.4, 0.5, 0.6, 0.7, 0.8, 0.9]);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].sequence, 0);
        assert_eq!(frames[0].samples, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(frames[1].sequence, 1);
        assert_eq!(frames[1].samples, vec![0.5, 0.6, 0.7, 0.8]);
        assert_eq!(assembler.pending_len(), 1);
    }

    #[test]
    fn test_to_mono_downmix_and_resample() {
        let stereo = [0.2, 0.4, 0.6, 0.8];
        let mono = to_mono(&stereo, 2, 16_000, 16_000);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!((mono[1] - 0.7).abs() < 1e-6);

        let input = vec![0.0; 48_000];
        assert_eq!(to_mono(&input, 1, 48_000, 16_000).len(), 16_000);
    }
}
