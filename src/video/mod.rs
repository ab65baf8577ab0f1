//! Reference video transport: frame timing, checkpoints and segment loops.

mod engine;

#[cfg(test)]
mod tests;

pub use engine::{PlaybackState, PlaybackStatus, VideoEngine, VideoEvent, VideoInfo};
