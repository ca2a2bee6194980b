//! Start → poll → fetch driver for video generation jobs.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::backend::GenerationBackend;
use crate::model::media::SceneImage;
use crate::model::segment::{AnimationState, SegmentId};

/// Status of a long-running job as last reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobHandle {
    pub name: String,
    pub done: bool,
    pub error: Option<String>,
    pub video_uri: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_checks: u32,
}

/// What to do after looking at a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    Wait,
    Fetch(String),
    Fail(String),
}

pub fn evaluate(handle: &JobHandle) -> PollStep {
    if !handle.done {
        return PollStep::Wait;
    }

    if let Some(error) = &handle.error {
        let message = if error.trim().is_empty() {
            "Animation failed in processing.".to_string()
        } else {
            error.clone()
        };
        return PollStep::Fail(message);
    }

    match handle.video_uri.as_deref().map(str::trim) {
        Some(uri) if !uri.is_empty() => PollStep::Fetch(uri.to_string()),
        _ => PollStep::Fail("Animation finished but no video URI was returned.".to_string()),
    }
}

/// Runs one job to a terminal state, reporting every transition.
///
/// The last state passed to `report` is always `Done` or `Failed`.
pub async fn run_animation_job<F>(
    backend: Arc<dyn GenerationBackend>,
    segment: SegmentId,
    image: SceneImage,
    motion_prompt: String,
    policy: PollPolicy,
    mut report: F,
) where
    F: FnMut(AnimationState),
{
    let mut handle = match backend.request_animation_start(&image, &motion_prompt).await {
        Ok(handle) => handle,
        Err(err) => {
            warn!(%segment, %err, "animation job was not accepted");
            report(AnimationState::Failed(err.to_string()));
            return;
        }
    };
    info!(%segment, job = %handle.name, "animation job submitted");
    report(AnimationState::Submitted);

    let mut ticker = interval(policy.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let mut checks = 0;
    loop {
        match evaluate(&handle) {
            PollStep::Wait => {
                if checks >= policy.max_checks {
                    report(AnimationState::Failed(format!(
                        "Animation timed out after {checks} status checks."
                    )));
                    return;
                }

                ticker.tick().await;
                checks += 1;
                debug!(%segment, checks, "checking animation job");
                report(AnimationState::Polling { checks });

                handle = match backend.poll_animation_job(&handle).await {
                    Ok(updated) => updated,
                    Err(err) => {
                        warn!(%segment, %err, "animation status check failed");
                        report(AnimationState::Failed(err.to_string()));
                        return;
                    }
                };
            }
            PollStep::Fetch(uri) => {
                let state = match backend.fetch_rendered_video(&uri).await {
                    Ok(video) => {
                        info!(%segment, checks, "animation ready");
                        AnimationState::Done(video)
                    }
                    Err(err) => {
                        warn!(%segment, %err, "could not download the rendered video");
                        AnimationState::Failed(err.to_string())
                    }
                };
                report(state);
                return;
            }
            PollStep::Fail(message) => {
                warn!(%segment, %message, "animation job failed");
                report(AnimationState::Failed(message));
                return;
            }
        }
    }
}
