//! End-to-end pipeline tests over the in-memory video backend and the
//! scripted detector stub.

use std::path::Path;

use damage_scan::detect::{
    BackendRegistry, DamageClass, Detection, DetectionSet, SharedBackend, StubBackend,
};
use damage_scan::video::synthetic::SyntheticVideo;
use damage_scan::{Pipeline, PipelineError, ScanConfig, VideoMeta};

fn meta() -> VideoMeta {
    VideoMeta {
        width: 32,
        height: 24,
        fps: 30.0,
    }
}

fn config(dir: &Path) -> ScanConfig {
    ScanConfig {
        media_dir: dir.to_path_buf(),
        ..ScanConfig::default()
    }
}

fn detector(script: impl FnOnce(&mut StubBackend)) -> SharedBackend {
    let mut backend = StubBackend::new();
    script(&mut backend);
    let mut registry = BackendRegistry::new();
    registry.register(backend);
    registry.default_backend().unwrap()
}

fn dent(confidence: f32) -> DetectionSet {
    DetectionSet::new(vec![Detection::new(
        4,
        4,
        10,
        8,
        DamageClass::Dent,
        confidence,
    )])
}

#[test]
fn summary_keeps_the_strongest_sighting_per_label() {
    let dir = tempfile::tempdir().unwrap();
    let detector = detector(|backend| {
        backend.push_detections(dent(80.0));
        backend.push_detections(dent(95.0));
        backend.push_detections(DetectionSet::empty());
    });
    let video = SyntheticVideo::with_black_frames(meta(), 3);
    let written = video.written_frames();
    let pipeline = Pipeline::new(config(dir.path()), detector, Box::new(video));

    let analysis = pipeline.analyze_video(b"fake bytes", "clip.mp4").unwrap();

    assert_eq!(analysis.video_url, "/static/videos/output_clip.mp4");
    assert_eq!(analysis.damage_summary.len(), 1);
    assert_eq!(analysis.damage_summary[0].label, DamageClass::Dent);
    assert_eq!(analysis.damage_summary[0].score, 95.0);
    assert_eq!(written.lock().unwrap().len(), 3);

    // Input was staged and the output file exists under the media dir.
    assert!(dir.path().join("input_clip.mp4").exists());
    assert!(dir.path().join("output_clip.mp4").exists());
}

#[test]
fn response_payload_matches_the_wire_shape() {
    let dir = tempfile::tempdir().unwrap();
    let detector = detector(|backend| {
        backend.push_detections(dent(87.5));
    });
    let video = SyntheticVideo::with_black_frames(meta(), 1);
    let pipeline = Pipeline::new(config(dir.path()), detector, Box::new(video));

    let analysis = pipeline.analyze_video(b"fake bytes", "clip.mp4").unwrap();
    let json = serde_json::to_value(&analysis).unwrap();
    assert_eq!(json["video_url"], "/static/videos/output_clip.mp4");
    assert_eq!(json["damage_summary"][0]["label"], "dent");
    assert_eq!(json["damage_summary"][0]["score"], 87.5);
}

#[test]
fn codec_fallback_changes_the_output_extension() {
    let dir = tempfile::tempdir().unwrap();
    let video = SyntheticVideo::with_black_frames(meta(), 2)
        .reject_codec("libx264")
        .codec_not_ready("mpeg4");
    let pipeline = Pipeline::new(config(dir.path()), detector(|_| {}), Box::new(video));

    let analysis = pipeline.analyze_video(b"fake bytes", "clip.mp4").unwrap();

    assert_eq!(analysis.video_url, "/static/videos/output_clip.avi");
    assert!(dir.path().join("output_clip.avi").exists());
    // Partial files of failed candidates were cleaned up.
    assert!(!dir.path().join("output_clip.mp4").exists());
}

#[test]
fn detector_failure_on_one_frame_does_not_shorten_the_video() {
    let dir = tempfile::tempdir().unwrap();
    let detector = detector(|backend| {
        backend.push_detections(dent(70.0));
        backend.push_failure("inference blew up");
        backend.push_detections(dent(60.0));
    });
    let video = SyntheticVideo::with_black_frames(meta(), 3);
    let written = video.written_frames();
    let pipeline = Pipeline::new(config(dir.path()), detector, Box::new(video));

    let analysis = pipeline.analyze_video(b"fake bytes", "clip.mp4").unwrap();

    assert_eq!(written.lock().unwrap().len(), 3);
    assert_eq!(analysis.damage_summary.len(), 1);
    assert_eq!(analysis.damage_summary[0].score, 70.0);
}

#[test]
fn clean_video_yields_an_empty_summary() {
    let dir = tempfile::tempdir().unwrap();
    let video = SyntheticVideo::with_black_frames(meta(), 2);
    let pipeline = Pipeline::new(config(dir.path()), detector(|_| {}), Box::new(video));

    let analysis = pipeline.analyze_video(b"fake bytes", "clip.mp4").unwrap();
    assert!(analysis.damage_summary.is_empty());
    let json = serde_json::to_value(&analysis).unwrap();
    assert_eq!(json["damage_summary"], serde_json::json!([]));
}

#[test]
fn unopenable_source_is_a_request_fatal_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let video = SyntheticVideo::with_black_frames(meta(), 2).fail_open();
    let pipeline = Pipeline::new(config(dir.path()), detector(|_| {}), Box::new(video));

    match pipeline.analyze_video(b"fake bytes", "clip.mp4") {
        Err(PipelineError::Open(_)) => {}
        other => panic!("expected open failure, got {other:?}"),
    }
    // No output was produced.
    assert!(!dir.path().join("output_clip.mp4").exists());
}

#[test]
fn exhausting_every_encoder_is_request_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let video = SyntheticVideo::with_black_frames(meta(), 2)
        .reject_codec("libx264")
        .reject_codec("mpeg4")
        .reject_codec("mjpeg");
    let pipeline = Pipeline::new(config(dir.path()), detector(|_| {}), Box::new(video));

    match pipeline.analyze_video(b"fake bytes", "clip.mp4") {
        Err(PipelineError::EncoderInit(message)) => {
            assert!(message.contains("libx264"));
            assert!(message.contains("mjpeg"));
        }
        other => panic!("expected encoder init failure, got {other:?}"),
    }
    assert!(!dir.path().join("output_clip.mp4").exists());
    assert!(!dir.path().join("output_clip.avi").exists());
}

#[test]
fn mid_stream_read_error_truncates_instead_of_failing() {
    let dir = tempfile::tempdir().unwrap();
    let detector = detector(|backend| {
        backend.push_detections(dent(66.0));
    });
    let video = SyntheticVideo::with_black_frames(meta(), 5).read_error_after(2);
    let written = video.written_frames();
    let pipeline = Pipeline::new(config(dir.path()), detector, Box::new(video));

    let analysis = pipeline.analyze_video(b"fake bytes", "clip.mp4").unwrap();

    // The two frames served before the error made it into the output.
    assert_eq!(written.lock().unwrap().len(), 2);
    assert_eq!(analysis.damage_summary[0].score, 66.0);
}

#[test]
fn upload_filenames_are_confined_to_the_media_dir() {
    let dir = tempfile::tempdir().unwrap();
    let video = SyntheticVideo::with_black_frames(meta(), 1);
    let pipeline = Pipeline::new(config(dir.path()), detector(|_| {}), Box::new(video));

    let analysis = pipeline
        .analyze_video(b"fake bytes", "../escape/clip.mp4")
        .unwrap();
    assert_eq!(analysis.video_url, "/static/videos/output_clip.mp4");
    assert!(dir.path().join("input_clip.mp4").exists());
}
