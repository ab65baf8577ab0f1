use super::*;
use std::collections::BTreeMap;

/// 100 frames at 10 fps, so one frame every 100 ms at normal speed
fn engine() -> VideoEngine {
    VideoEngine::new(VideoInfo::new(100, 10.0))
}

#[test]
fn test_new_engine_is_stopped() {
    let mut video = engine();
    let status = video.get_frame(5_000);

    assert_eq!(status.state, PlaybackState::Stopped);
    assert_eq!(status.current_frame, 0);
    assert_eq!(status.progress, 0.0);
}

#[test]
fn test_degenerate_info_is_normalized() {
    let info = VideoInfo::new(0, 0.0);
    assert_eq!(info.total_frames, 1);
    assert_eq!(info.fps, 30.0);
    assert_eq!(VideoInfo::new(300, 30.0).duration_ms(), 10_000);
}

#[test]
fn test_play_advances_one_frame_per_interval() {
    let mut video = engine();
    video.play(0);

    assert_eq!(video.get_frame(50).current_frame, 0);
    assert_eq!(video.get_frame(100).current_frame, 1);

    // Catches up over several intervals
    let status = video.get_frame(350);
    assert_eq!(status.current_frame, 3);
    assert_eq!(status.state, PlaybackState::Playing);
    assert_eq!(status.current_time_ms, 300);

    assert_eq!(video.get_frame(400).current_frame, 4);
}

#[test]
fn test_speed_scales_interval_and_is_clamped() {
    let mut video = engine();
    video.set_speed(0.5);
    video.play(0);

    assert_eq!(video.get_frame(150).current_frame, 0);
    assert_eq!(video.get_frame(400).current_frame, 2);

    video.set_speed(10.0);
    assert_eq!(video.speed(), 3.0);
    video.set_speed(0.0);
    assert_eq!(video.speed(), 0.1);
}

#[test]
fn test_pause_holds_frame() {
    let mut video = engine();
    video.play(0);
    video.get_frame(200);
    video.pause();

    let status = video.get_frame(5_000);
    assert_eq!(status.state, PlaybackState::Paused);
    assert_eq!(status.current_frame, 2);

    // Paused time is not caught up on resume
    video.play(5_000);
    assert_eq!(video.get_frame(5_100).current_frame, 3);
}

#[test]
fn test_stops_stepping_at_checkpoint() {
    let mut video = engine();
    let messages = BTreeMap::from([(5, "Raise your arm".to_string())]);
    video.set_checkpoints(&[40, 5], messages);
    video.play(0);

    let status = video.get_frame(1_000);
    assert_eq!(status.current_frame, 5);
    assert!(status.is_at_checkpoint);
    assert_eq!(status.checkpoint_message, "Raise your arm");
    assert_eq!(
        video.drain_events(),
        vec![VideoEvent::CheckpointReached {
            frame: 5,
            message: "Raise your arm".to_string()
        }]
    );

    // The remainder of the catch-up is dropped
    let status = video.get_frame(1_000);
    assert_eq!(status.current_frame, 5);
    assert!(!status.is_at_checkpoint);

    let status = video.get_frame(10_000);
    assert_eq!(status.current_frame, 40);
    assert_eq!(status.checkpoint_message, "Checkpoint reached");
}

#[test]
fn test_finishes_at_last_frame_and_replays() {
    let mut video = VideoEngine::new(VideoInfo::new(5, 10.0));
    video.play(0);

    let status = video.get_frame(10_000);
    assert_eq!(status.state, PlaybackState::Finished);
    assert_eq!(status.current_frame, 4);
    assert_eq!(status.progress, 0.8);
    assert_eq!(video.drain_events(), vec![VideoEvent::Finished]);

    assert_eq!(video.get_frame(20_000).current_frame, 4);
    assert!(video.drain_events().is_empty());

    video.play(20_000);
    let status = video.get_frame(20_100);
    assert_eq!(status.state, PlaybackState::Playing);
    assert_eq!(status.current_frame, 1);
}

#[test]
fn test_loop_wraps_until_limit() {
    let mut video = engine();
    video.start_loop(10, 14, 2);
    assert_eq!(video.state(), PlaybackState::Looping);
    assert_eq!(video.current_frame(), 10);

    video.get_frame(0);
    let status = video.get_frame(400);
    assert_eq!(status.current_frame, 10);
    assert_eq!(status.loop_count, 1);
    assert_eq!(status.state, PlaybackState::Looping);

    let status = video.get_frame(800);
    assert_eq!(status.current_frame, 14);
    assert_eq!(status.loop_count, 2);
    assert_eq!(status.state, PlaybackState::Playing);

    assert_eq!(
        video.drain_events(),
        vec![
            VideoEvent::LoopCompleted { count: 1 },
            VideoEvent::LoopCompleted { count: 2 },
        ]
    );
}

#[test]
fn test_stop_loop_resumes_playing() {
    let mut video = engine();
    video.start_loop(0, 20, 3);
    video.get_frame(0);
    video.get_frame(300);

    video.stop_loop();
    let status = video.get_frame(400);
    assert_eq!(status.state, PlaybackState::Playing);
    assert_eq!(status.loop_count, 0);
    assert_eq!(status.current_frame, 4);
}

#[test]
fn test_seek_clamps_and_pauses() {
    let mut video = engine();
    video.set_checkpoints(&[5, 50], BTreeMap::new());
    video.play(0);

    assert_eq!(video.seek(500), 99);
    assert_eq!(video.state(), PlaybackState::Paused);

    assert_eq!(video.seek_time(2_500), 25);
    assert_eq!(video.status().current_time_ms, 2_500);

    // Checkpoints behind the seek target are not reported again
    video.play(0);
    let status = video.get_frame(10_000);
    assert_eq!(status.current_frame, 50);
    assert!(status.is_at_checkpoint);
    assert_eq!(status.progress, 0.5);
}

#[test]
fn test_stop_rewinds() {
    let mut video = engine();
    video.play(0);
    video.get_frame(700);
    video.stop();

    let status = video.get_frame(2_000);
    assert_eq!(status.state, PlaybackState::Stopped);
    assert_eq!(status.current_frame, 0);
}
