// Integration tests for the streaming (local decoder) backend

mod common;

use common::{model_dir, ScriptedLoader, Step};
use loqa_speech::audio::AudioFrame;
use loqa_speech::error::BackendError;
use loqa_speech::recognition::{RecognitionConfig, RecognitionEvent, StreamingBackend};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn frame(sequence: u64) -> AudioFrame {
    AudioFrame {
        samples: vec![0; 2048],
        sample_rate: 16000,
        channels: 1,
        sequence,
        timestamp_ms: sequence * 128,
    }
}

fn backend(loader: &Arc<ScriptedLoader>) -> StreamingBackend {
    StreamingBackend::new(loader.clone(), 16000)
}

#[test]
fn test_load_model_rejects_bad_paths() {
    let loader = Arc::new(ScriptedLoader::new(Vec::new()));
    let backend = backend(&loader);
    let dir = model_dir();
    let file = dir.path().join("model.bin");
    std::fs::write(&file, b"not a directory").unwrap();

    for path in ["".into(), "   ".into(), dir.path().join("missing"), file] {
        let result = backend.load_model(&path);
        assert!(
            matches!(result, Err(BackendError::ModelLoad(_))),
            "{} should be rejected, got {:?}",
            path.display(),
            result
        );
    }

    assert!(!backend.is_model_loaded());
    assert_eq!(
        backend.start(&RecognitionConfig::default()),
        Err(BackendError::NotInitialized)
    );
    assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
}

#[test]
fn test_valid_load_after_failure() {
    let loader = Arc::new(ScriptedLoader::new(Vec::new()));
    let backend = backend(&loader);
    let dir = model_dir();

    assert!(backend.load_model(dir.path().join("missing")).is_err());
    backend.load_model(dir.path()).unwrap();

    assert!(backend.is_model_loaded());
    assert_eq!(backend.model_path().as_deref(), Some(dir.path()));
    backend.start(&RecognitionConfig::default()).unwrap();
    assert!(backend.is_active());
}

#[test]
fn test_second_load_is_noop() {
    let loader = Arc::new(ScriptedLoader::new(Vec::new()));
    let backend = backend(&loader);
    let first = model_dir();
    let second = model_dir();

    backend.load_model(first.path()).unwrap();
    backend.load_model(second.path()).unwrap();

    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    assert_eq!(backend.model_path().as_deref(), Some(first.path()));
}

#[test]
fn test_loader_failure_is_model_load_error() {
    let loader = Arc::new(ScriptedLoader::failing());
    let backend = backend(&loader);
    let dir = model_dir();

    let result = backend.load_model(dir.path());
    assert!(matches!(result, Err(BackendError::ModelLoad(_))));
    assert!(!backend.is_model_loaded());
}

#[test]
fn test_start_while_active_is_busy() {
    let loader = Arc::new(ScriptedLoader::new(Vec::new()));
    let backend = backend(&loader);
    let dir = model_dir();
    backend.load_model(dir.path()).unwrap();

    backend.start(&RecognitionConfig::default()).unwrap();
    assert_eq!(backend.start(&RecognitionConfig::default()), Err(BackendError::Busy));

    backend.stop();
    assert!(!backend.is_active());
    backend.start(&RecognitionConfig::default()).unwrap();
}

#[test]
fn test_feed_emits_partials_then_final() {
    let loader = Arc::new(ScriptedLoader::new(vec![
        Step::Partial("hel"),
        Step::Partial("hel"),
        Step::Partial("hello"),
        Step::Final("hello world"),
        Step::Partial(""),
    ]));
    let backend = backend(&loader);
    let dir = model_dir();
    backend.load_model(dir.path()).unwrap();
    backend.start(&RecognitionConfig::default()).unwrap();
    let resets_before = loader.resets.load(Ordering::SeqCst);

    let events: Vec<Option<RecognitionEvent>> = (0..5).map(|i| backend.feed(&frame(i)).unwrap()).collect();

    assert_eq!(
        events,
        vec![
            Some(RecognitionEvent::partial("hel")),
            None, // unchanged hypothesis
            Some(RecognitionEvent::partial("hello")),
            Some(RecognitionEvent::final_text("hello world")),
            None, // fresh utterance starts empty
        ]
    );
    assert_eq!(loader.resets.load(Ordering::SeqCst), resets_before + 1);
}

#[test]
fn test_initial_empty_partial_suppressed() {
    let loader = Arc::new(ScriptedLoader::new(Vec::new()));
    let backend = backend(&loader);
    let dir = model_dir();
    backend.load_model(dir.path()).unwrap();
    backend.start(&RecognitionConfig::default()).unwrap();

    assert_eq!(backend.feed(&frame(0)).unwrap(), None);
    assert_eq!(backend.feed(&frame(1)).unwrap(), None);
}

#[test]
fn test_decoder_failure_propagates() {
    let loader = Arc::new(ScriptedLoader::new(vec![Step::Fail("decoder crashed")]));
    let backend = backend(&loader);
    let dir = model_dir();
    backend.load_model(dir.path()).unwrap();
    backend.start(&RecognitionConfig::default()).unwrap();

    assert_eq!(
        backend.feed(&frame(0)),
        Err(BackendError::BackendFailure("decoder crashed".into()))
    );
}

#[test]
fn test_feed_ignored_when_inactive() {
    let loader = Arc::new(ScriptedLoader::new(vec![Step::Final("ignored")]));
    let backend = backend(&loader);
    let dir = model_dir();
    backend.load_model(dir.path()).unwrap();

    assert_eq!(backend.feed(&frame(0)).unwrap(), None);
}

#[test]
fn test_flush_returns_buffered_text() {
    let loader = Arc::new(ScriptedLoader::new(Vec::new()).with_flush("trailing words"));
    let backend = backend(&loader);
    let dir = model_dir();
    backend.load_model(dir.path()).unwrap();
    backend.start(&RecognitionConfig::default()).unwrap();

    assert_eq!(backend.flush().as_deref(), Some("trailing words"));
    // Nothing left the second time
    assert_eq!(backend.flush(), None);
}

#[test]
fn test_release_drops_model() {
    let loader = Arc::new(ScriptedLoader::new(Vec::new()));
    let backend = backend(&loader);
    let dir = model_dir();
    backend.load_model(dir.path()).unwrap();
    backend.start(&RecognitionConfig::default()).unwrap();

    backend.release();

    assert!(!backend.is_active());
    assert!(!backend.is_model_loaded());
    assert_eq!(backend.model_path(), None);
    assert_eq!(
        backend.start(&RecognitionConfig::default()),
        Err(BackendError::NotInitialized)
    );

    backend.load_model(dir.path()).unwrap();
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
}
