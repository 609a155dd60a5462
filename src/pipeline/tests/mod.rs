use super::*;
use crate::config::{Config, PipelineMode};
use crate::error::{Error, PipelineStage};
use crate::pipeline::test_helpers::{
    FakeMuxer, FakeSpeech, FakeText, FakeVideo, temp_store, test_config,
};
use crate::types::{Event, JobState, PipelineOutcome, Prompt, Topic};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

mod video_job;

/// Pipeline wired to the given fakes
fn test_pipeline(
    config: Config,
    text: &Arc<FakeText>,
    speech: &Arc<FakeSpeech>,
    video: &Arc<FakeVideo>,
    muxer: &Arc<FakeMuxer>,
) -> Pipeline {
    Pipeline::with_services(
        config,
        text.clone(),
        speech.clone(),
        video.clone(),
        muxer.clone(),
    )
}

/// Everything emitted so far, in order
fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Index of the first event matching `pred`
fn position(events: &[Event], pred: impl Fn(&Event) -> bool) -> usize {
    events
        .iter()
        .position(pred)
        .unwrap_or_else(|| panic!("event not found in {events:#?}"))
}

fn topic(s: &str) -> Topic {
    Topic::new(s).unwrap()
}
