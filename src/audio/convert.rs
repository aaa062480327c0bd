// Sample conversion into the session format (mono, target rate)

use rubato::{FftFixedIn, Resampler as _};

use crate::error::AudioError;

const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// Convert interleaved samples to mono at `target_rate`
pub fn to_session_format(
    samples: &[i16],
    sample_rate: u32,
    channels: u16,
    target_rate: u32,
) -> Result<Vec<i16>, AudioError> {
    let mono = downmix(samples, channels)?;
    resample(&mono, sample_rate, target_rate)
}

/// Resample a whole mono clip. The output length is exactly
/// `len * target_rate / sample_rate`, rounded.
pub fn resample(samples: &[i16], sample_rate: u32, target_rate: u32) -> Result<Vec<i16>, AudioError> {
    if sample_rate == target_rate {
        return Ok(samples.to_vec());
    }

    let expected = (samples.len() as f64 * target_rate as f64 / sample_rate as f64).round() as usize;
    let input: Vec<f32> = samples.iter().copied().map(i16_to_f32).collect();

    let mut resampler = StreamResampler::new(sample_rate, target_rate)?;
    let mut output = Vec::with_capacity(expected + RESAMPLER_CHUNK_SIZE);
    resampler.push(&input, &mut output)?;
    resampler.finish(&mut output)?;

    output.resize(expected, 0);
    Ok(output)
}

/// Incremental mono resampler for live capture.
///
/// Input is buffered into fixed chunks; output is appended as i16 whenever a
/// chunk completes.
pub struct StreamResampler {
    inner: Option<FftFixedIn<f32>>,
    pending: Vec<f32>,
}

impl StreamResampler {
    pub fn new(sample_rate: u32, target_rate: u32) -> Result<Self, AudioError> {
        if sample_rate == 0 || target_rate == 0 {
            return Err(AudioError::DeviceUnavailable(format!(
                "cannot resample {}Hz to {}Hz",
                sample_rate, target_rate
            )));
        }

        let inner = if sample_rate == target_rate {
            None
        } else {
            let resampler = FftFixedIn::<f32>::new(
                sample_rate as usize,
                target_rate as usize,
                RESAMPLER_CHUNK_SIZE,
                1,
                1,
            )
            .map_err(|e| {
                AudioError::DeviceUnavailable(format!(
                    "cannot resample {}Hz to {}Hz: {}",
                    sample_rate, target_rate, e
                ))
            })?;
            Some(resampler)
        };

        Ok(Self {
            inner,
            pending: Vec::with_capacity(RESAMPLER_CHUNK_SIZE),
        })
    }

    pub fn push(&mut self, mut samples: &[f32], out: &mut Vec<i16>) -> Result<(), AudioError> {
        let Some(resampler) = self.inner.as_mut() else {
            out.extend(samples.iter().copied().map(f32_to_i16));
            return Ok(());
        };

        while !samples.is_empty() {
            let take = (RESAMPLER_CHUNK_SIZE - self.pending.len()).min(samples.len());
            self.pending.extend_from_slice(&samples[..take]);
            samples = &samples[take..];

            if self.pending.len() == RESAMPLER_CHUNK_SIZE {
                let chunk = resampler
                    .process(&[&self.pending[..]], None)
                    .map_err(|e| AudioError::Read(format!("resampling failed: {}", e)))?;
                out.extend(chunk[0].iter().copied().map(f32_to_i16));
                self.pending.clear();
            }
        }
        Ok(())
    }

    /// Flush buffered input, zero padded to a full chunk
    pub fn finish(&mut self, out: &mut Vec<i16>) -> Result<(), AudioError> {
        if self.inner.is_none() || self.pending.is_empty() {
            return Ok(());
        }
        let missing = RESAMPLER_CHUNK_SIZE - self.pending.len();
        self.push(&vec![0.0; missing], out)
    }
}

/// Average interleaved channels into one
pub fn downmix(samples: &[i16], channels: u16) -> Result<Vec<i16>, AudioError> {
    match channels {
        0 => Err(AudioError::DeviceUnavailable("audio has no channels".into())),
        1 => Ok(samples.to_vec()),
        2 => Ok(stereo_to_mono(samples)),
        n => Ok(samples
            .chunks_exact(n as usize)
            .map(|frame| (frame.iter().map(|&s| s as i32).sum::<i32>() / n as i32) as i16)
            .collect()),
    }
}

/// Average interleaved L/R pairs
pub fn stereo_to_mono(samples: &[i16]) -> Vec<i16> {
    samples
        .chunks_exact(2)
        .map(|pair| ((pair[0] as i32 + pair[1] as i32) / 2) as i16)
        .collect()
}

pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
