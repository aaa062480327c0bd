// Integration tests for audio frame sources
//
// WAV clips are written into temp dirs; hardware is replaced by a scripted device.

mod common;

use common::{write_wav, ScriptedDevice};
use loqa_speech::audio::convert::{downmix, resample, stereo_to_mono, to_session_format, StreamResampler};
use loqa_speech::audio::{AudioDevice, AudioFile, AudioFormat, AudioFrameSource, FrameRead, SourceProfile, WavFileDevice};
use loqa_speech::error::AudioError;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

const READ: Duration = Duration::from_millis(50);

fn wav_device(dir: &tempfile::TempDir, sample_rate: u32, channels: u16, samples: &[i16]) -> Arc<dyn AudioDevice> {
    let path = dir.path().join("clip.wav");
    write_wav(&path, sample_rate, channels, samples);
    Arc::new(WavFileDevice::new(path))
}

fn frame(read: FrameRead) -> loqa_speech::AudioFrame {
    match read {
        FrameRead::Frame(frame) => frame,
        other => panic!("expected a frame, got {:?}", other),
    }
}

#[test]
fn test_wav_source_slices_fixed_frames() {
    let dir = tempfile::tempdir().unwrap();
    let samples: Vec<i16> = (0..5000).map(|i| (i % 100) as i16 + 1).collect();
    let device = wav_device(&dir, 16000, 1, &samples);

    let mut source = AudioFrameSource::open(&device, AudioFormat::default()).unwrap();
    assert_eq!(source.profile(), SourceProfile::VoiceRecognition);

    let first = frame(source.read_frame(READ).unwrap());
    let second = frame(source.read_frame(READ).unwrap());
    let third = frame(source.read_frame(READ).unwrap());

    assert_eq!(first.sequence, 0);
    assert_eq!(second.sequence, 1);
    assert_eq!(third.sequence, 2);
    assert_eq!(first.samples.len(), 2048);
    assert_eq!(first.sample_rate, 16000);
    assert_eq!(first.channels, 1);
    assert_eq!(first.samples[..10], samples[..10]);

    // 5000 - 2 * 2048 = 904 real samples, the rest is padding
    assert_eq!(third.samples.len(), 2048);
    assert_eq!(third.samples[903], samples[4999]);
    assert!(third.samples[904..].iter().all(|&s| s == 0));

    assert_eq!(source.read_frame(READ).unwrap(), FrameRead::EndOfStream);
    assert_eq!(source.frames_read(), 3);
}

#[test]
fn test_wav_source_converts_stereo_and_rate() {
    let dir = tempfile::tempdir().unwrap();
    // 4096 stereo pairs at 32kHz → 4096 mono → 2048 at 16kHz
    let samples: Vec<i16> = (0..8192).map(|i| if i % 2 == 0 { 200 } else { 400 }).collect();
    let device = wav_device(&dir, 32000, 2, &samples);

    let mut source = AudioFrameSource::open(&device, AudioFormat::default()).unwrap();
    let only = frame(source.read_frame(READ).unwrap());

    assert_eq!(only.samples.len(), 2048);
    // Filter start-up aside, the level survives resampling
    assert!(only.samples[600..1400].iter().all(|&s| (s - 300).abs() <= 15));
    assert_eq!(source.read_frame(READ).unwrap(), FrameRead::EndOfStream);
}

#[test]
fn test_wav_source_upsamples_low_rate_clip() {
    let dir = tempfile::tempdir().unwrap();
    let device = wav_device(&dir, 8000, 1, &[1000; 1000]);

    let mut source = AudioFrameSource::open(&device, AudioFormat::default()).unwrap();
    let only = frame(source.read_frame(READ).unwrap());

    // 2000 real samples in one padded frame
    assert!(only.samples[2000..].iter().all(|&s| s == 0));
    assert_eq!(source.read_frame(READ).unwrap(), FrameRead::EndOfStream);
}

#[test]
fn test_resample_non_integer_ratio() {
    // One second at 44.1kHz must become one second at 16kHz
    let clip = vec![1000i16; 44100];
    let out = resample(&clip, 44100, 16000).unwrap();

    assert_eq!(out.len(), 16000);
    assert!(out[4000..12000].iter().all(|&s| (s - 1000).abs() <= 30));

    let device_out = to_session_format(&[1000; 88200], 44100, 2, 16000).unwrap();
    assert_eq!(device_out.len(), 16000);
}

#[test]
fn test_stream_resampler_chunks_input() {
    let mut resampler = StreamResampler::new(48000, 16000).unwrap();
    let mut out = Vec::new();

    // Less than one chunk: nothing yet
    resampler.push(&[0.25; 500], &mut out).unwrap();
    assert!(out.is_empty());

    for _ in 0..96 {
        resampler.push(&[0.25; 500], &mut out).unwrap();
    }
    resampler.finish(&mut out).unwrap();

    // 48500 input samples, about a third of that out
    assert!(out.len() >= 16000 && out.len() <= 16500, "got {}", out.len());
    assert!(out[4000..12000].iter().all(|&s| (s - 8192).abs() <= 200));

    let mut passthrough = StreamResampler::new(16000, 16000).unwrap();
    let mut same = Vec::new();
    passthrough.push(&[0.5, -0.5], &mut same).unwrap();
    assert_eq!(same, vec![16384, -16384]);

    assert!(StreamResampler::new(0, 16000).is_err());
}

#[test]
fn test_missing_clip_is_device_unavailable() {
    let device: Arc<dyn AudioDevice> = Arc::new(WavFileDevice::new("/nonexistent/clip.wav"));
    let result = AudioFrameSource::open(&device, AudioFormat::default());

    match result {
        Err(AudioError::DeviceUnavailable(message)) => {
            assert!(message.contains("VoiceRecognition"));
            assert!(message.contains("Generic"));
        }
        other => panic!("expected DeviceUnavailable, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_profile_fallback_to_generic() {
    let device: Arc<dyn AudioDevice> = Arc::new(ScriptedDevice::new(1).failing(SourceProfile::VoiceRecognition));

    let source = AudioFrameSource::open(&device, AudioFormat::default()).unwrap();
    assert_eq!(source.profile(), SourceProfile::Generic);
}

#[test]
fn test_all_profiles_failing() {
    let device: Arc<dyn AudioDevice> = Arc::new(
        ScriptedDevice::new(1)
            .failing(SourceProfile::VoiceRecognition)
            .failing(SourceProfile::Generic),
    );

    let result = AudioFrameSource::open(&device, AudioFormat::default());
    assert!(matches!(result, Err(AudioError::DeviceUnavailable(_))));
}

#[test]
fn test_unsupported_formats_rejected() {
    let device: Arc<dyn AudioDevice> = Arc::new(ScriptedDevice::new(1));

    let stereo = AudioFormat {
        channels: 2,
        ..AudioFormat::default()
    };
    let zero_rate = AudioFormat {
        sample_rate: 0,
        ..AudioFormat::default()
    };
    let empty_frames = AudioFormat {
        frame_samples: 0,
        ..AudioFormat::default()
    };

    for format in [stereo, zero_rate, empty_frames] {
        let result = AudioFrameSource::open(&device, format);
        assert!(matches!(result, Err(AudioError::DeviceUnavailable(_))), "{:?}", format);
    }
}

#[test]
fn test_close_is_idempotent_and_frees_device() {
    let scripted = ScriptedDevice::endless();
    let state = scripted.state();
    let device: Arc<dyn AudioDevice> = Arc::new(scripted);

    let mut source = AudioFrameSource::open(&device, AudioFormat::default()).unwrap();
    assert!(state.in_use.load(Ordering::SeqCst));
    assert_eq!(source.read_frame(READ).unwrap(), FrameRead::Timeout);

    // A second source cannot open while the first holds the device
    assert!(AudioFrameSource::open(&device, AudioFormat::default()).is_err());

    source.close();
    source.close();
    assert!(!source.is_open());
    assert!(!state.in_use.load(Ordering::SeqCst));
    assert_eq!(state.closes.load(Ordering::SeqCst), 1);
    assert_eq!(source.read_frame(READ).unwrap(), FrameRead::EndOfStream);

    let reopened = AudioFrameSource::open(&device, AudioFormat::default()).unwrap();
    drop(reopened);
    assert!(!state.in_use.load(Ordering::SeqCst));
    assert_eq!(state.opens.load(Ordering::SeqCst), 2);
}

#[test]
fn test_realtime_wav_paces_frames() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.wav");
    write_wav(&path, 16000, 1, &[5; 4096]);
    let device: Arc<dyn AudioDevice> = Arc::new(WavFileDevice::new(path).realtime(true));

    // 2048 samples at 16kHz = 128ms per frame
    let mut source = AudioFrameSource::open(&device, AudioFormat::default()).unwrap();
    assert_eq!(source.read_frame(Duration::from_millis(20)).unwrap(), FrameRead::Timeout);

    let started = std::time::Instant::now();
    let first = frame(source.read_frame(Duration::from_millis(500)).unwrap());
    assert_eq!(first.sequence, 0);
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[test]
fn test_audio_file_rejects_24_bit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip24.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 24,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for _ in 0..100 {
        writer.write_sample(1000i32).unwrap();
    }
    writer.finalize().unwrap();

    assert!(AudioFile::open(&path).is_err());
}

#[test]
fn test_audio_file_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.wav");
    write_wav(&path, 16000, 2, &[0; 32000]);

    let audio = AudioFile::open(&path).unwrap();
    assert_eq!(audio.sample_rate, 16000);
    assert_eq!(audio.channels, 2);
    assert_eq!(audio.samples.len(), 32000);
    assert!((audio.duration_seconds - 1.0).abs() < 1e-9);
    assert!(audio.path.contains("clip.wav"));
}

#[test]
fn test_conversion_helpers() {
    assert_eq!(stereo_to_mono(&[100, 300, -50, 50]), vec![200, 0]);
    assert_eq!(downmix(&[3, 6, 9, 0, 0, 3], 3).unwrap(), vec![6, 1]);
    assert!(downmix(&[1, 2], 0).is_err());
    assert_eq!(resample(&[1, 2, 3], 16000, 16000).unwrap(), vec![1, 2, 3]);

    assert_eq!(to_session_format(&[7, 9], 16000, 2, 16000).unwrap(), vec![8]);
}

#[test]
fn test_frame_pcm_bytes_little_endian() {
    let frame = loqa_speech::AudioFrame {
        samples: vec![1, -2],
        sample_rate: 16000,
        channels: 1,
        sequence: 0,
        timestamp_ms: 0,
    };
    assert_eq!(frame.to_pcm_bytes(), vec![0x01, 0x00, 0xFE, 0xFF]);
}
