//! End-to-end enrollment and verification over synthetic recordings.

use std::{f64::consts::TAU, path::Path, path::PathBuf};

use voxprint::{
    Voxprint, VoxprintConfig, WavReader, WavWriter,
    constants::ENGINE_SAMPLE_RATE,
    pipeline,
    task::TaskContext,
    verify,
};

/// Write an 8 kHz mono WAV holding an equal mix of the given tones.
fn tone_wav(dir: &Path, name: &str, freqs: &[f64], secs: f64) -> PathBuf {
    let n = (secs * ENGINE_SAMPLE_RATE as f64) as usize;
    let samples: Vec<i16> = (0..n)
        .map(|i| {
            let t = i as f64 / ENGINE_SAMPLE_RATE as f64;
            let v: f64 = freqs.iter().map(|f| (TAU * f * t).sin()).sum();
            (v / freqs.len() as f64 * 8000.0) as i16
        })
        .collect();
    let path = dir.join(name);
    let mut w = WavWriter::create(&path, ENGINE_SAMPLE_RATE).unwrap();
    w.write_samples(&samples).unwrap();
    w.finalize().unwrap();
    path
}

fn small_config() -> VoxprintConfig {
    let mut cfg = VoxprintConfig::default();
    cfg.trainer.cluster_count = 4;
    cfg.trainer.seed = Some(42);
    cfg
}

#[test]
fn tone_mixtures_train_separable_codebooks() {
    let dir = tempfile::tempdir().unwrap();
    let mixture = tone_wav(dir.path(), "mixture.wav", &[50.0, 500.0, 2000.0], 1.5);
    let pure = tone_wav(dir.path(), "pure.wav", &[1000.0], 1.5);

    let engine = Voxprint::open(small_config(), dir.path().join("models")).unwrap();
    let mixture_cb = engine.enroll("mixture", &mixture).unwrap();
    let pure_cb = engine.enroll("pure", &pure).unwrap();

    let ctx = TaskContext::detached();
    let mixture_features =
        pipeline::features_from_file(&mixture, engine.config(), &ctx).unwrap();
    let pure_features = pipeline::features_from_file(&pure, engine.config(), &ctx).unwrap();

    // each signal sits strictly closer to its own model
    let self_mix = verify::average_distortion(&mixture_features, &mixture_cb);
    let cross_mix = verify::average_distortion(&mixture_features, &pure_cb);
    assert!(self_mix < cross_mix, "mixture: {self_mix} !< {cross_mix}");

    let self_pure = verify::average_distortion(&pure_features, &pure_cb);
    let cross_pure = verify::average_distortion(&pure_features, &mixture_cb);
    assert!(self_pure < cross_pure, "pure: {self_pure} !< {cross_pure}");
}

#[test]
fn enroll_then_verify_accepts_owner_and_rejects_impostor() {
    let dir = tempfile::tempdir().unwrap();
    let alice_wav = tone_wav(dir.path(), "alice.wav", &[300.0, 900.0], 1.5);
    let bob_wav = tone_wav(dir.path(), "bob.wav", &[1500.0, 3000.0], 1.5);

    let mut cfg = small_config();
    cfg.verifier.max_distortion = 1.0e9;
    let engine = Voxprint::open(cfg, dir.path().join("models")).unwrap();
    engine.enroll("alice", &alice_wav).unwrap();
    engine.enroll("bob", &bob_wav).unwrap();

    let honest = engine.verify("alice", &alice_wav).unwrap();
    assert!(honest.accepted);
    assert_eq!(honest.best_match.as_deref(), Some("alice"));

    // bob's signal claiming to be alice matches bob's model better
    let impostor = engine.verify("alice", &bob_wav).unwrap();
    assert!(!impostor.accepted);
    assert_eq!(impostor.best_match.as_deref(), Some("bob"));

    let unknown = engine.verify("carol", &alice_wav).unwrap();
    assert!(!unknown.accepted);
}

#[test]
fn distortion_ceiling_is_inclusive() {
    let dir = tempfile::tempdir().unwrap();
    let wav = tone_wav(dir.path(), "s.wav", &[700.0], 1.0);

    let mut cfg = small_config();
    cfg.verifier.max_distortion = f64::MAX;
    let engine = Voxprint::open(cfg, dir.path().join("models")).unwrap();
    engine.enroll("s", &wav).unwrap();
    let measured = engine.verify("s", &wav).unwrap();
    assert!(measured.accepted);

    // a ceiling exactly at the measured distortion still accepts
    let mut cfg = small_config();
    cfg.verifier.max_distortion = measured.distortion;
    let engine = Voxprint::open(cfg, dir.path().join("models")).unwrap();
    assert!(engine.verify("s", &wav).unwrap().accepted);

    // just below it rejects
    let mut cfg = small_config();
    cfg.verifier.max_distortion = measured.distortion * (1.0 - 1.0e-9);
    let engine = Voxprint::open(cfg, dir.path().join("models")).unwrap();
    assert!(!engine.verify("s", &wav).unwrap().accepted);
}

#[test]
fn container_interoperates_with_hound() {
    let dir = tempfile::tempdir().unwrap();
    let samples: Vec<i16> = (0..2048).map(|i| (i % 97) as i16 * 31 - 1500).collect();

    // our writer, hound's reader
    let ours = dir.path().join("ours.wav");
    let mut w = WavWriter::create(&ours, ENGINE_SAMPLE_RATE).unwrap();
    w.write_samples(&samples).unwrap();
    w.finalize().unwrap();

    let mut hr = hound::WavReader::open(&ours).unwrap();
    let spec = hr.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, ENGINE_SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);
    let theirs: Vec<i16> = hr.samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(theirs, samples);

    // hound's writer, our reader
    let hounds = dir.path().join("hound.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: ENGINE_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut hw = hound::WavWriter::create(&hounds, spec).unwrap();
    for s in &samples {
        hw.write_sample(*s).unwrap();
    }
    hw.finalize().unwrap();

    let mut r = WavReader::open(&hounds).unwrap();
    assert_eq!(r.header().sample_rate, ENGINE_SAMPLE_RATE);
    assert_eq!(r.header().sample_count(), samples.len());
    let back = r.read_all_samples().unwrap();
    assert_eq!(back, samples);
}

#[test]
fn reenrollment_changes_the_decision_model() {
    let dir = tempfile::tempdir().unwrap();
    let first = tone_wav(dir.path(), "first.wav", &[400.0], 1.0);
    let second = tone_wav(dir.path(), "second.wav", &[2600.0], 1.0);

    let mut cfg = small_config();
    cfg.verifier.max_distortion = f64::MAX;
    let engine = Voxprint::open(cfg, dir.path().join("models")).unwrap();

    engine.enroll("x", &first).unwrap();
    let before = engine.verify("x", &second).unwrap().distortion;

    engine.enroll("x", &second).unwrap();
    let after = engine.verify("x", &second).unwrap().distortion;
    assert!(after < before);
}
