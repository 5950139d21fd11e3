//! Queue builds and wait for them to finish.

use std::sync::Arc;

use tracing::info;
use vsync_rest::dto::QueueBuildRequest;
use vsync_rest::ServerApi;

use crate::domain::{JobHandle, JobState, Result, VsyncError};
use crate::wait::{ConvergenceWaiter, WaitOutcome, WaitPolicy};

/// Drives a build from queue to completion on the convergence waiter.
///
/// A successful finish is the target and a failed finish is terminal, so a
/// failing build ends the wait on the first poll that reports it. An
/// unknown build id aborts the wait without retries.
#[derive(Clone)]
pub struct BuildAwaiter {
    api: Arc<dyn ServerApi>,
    waiter: ConvergenceWaiter,
}

impl BuildAwaiter {
    pub fn new(api: Arc<dyn ServerApi>, waiter: ConvergenceWaiter) -> Self {
        BuildAwaiter { api, waiter }
    }

    pub async fn queue(&self, build_type: &str) -> Result<JobHandle> {
        if build_type.trim().is_empty() {
            return Err(VsyncError::InvalidInput(
                "build type id must not be empty".to_string(),
            ));
        }
        let queued = self
            .api
            .queue_build(&QueueBuildRequest::for_build_type(build_type))
            .await?;
        info!(event = "build.queued", build_id = queued.id, build_type = %build_type);
        Ok(JobHandle {
            id: queued.id,
            build_type: build_type.to_string(),
        })
    }

    pub async fn await_completion(
        &self,
        job: &JobHandle,
        policy: WaitPolicy,
    ) -> Result<WaitOutcome<JobState>> {
        let api = self.api.clone();
        let id = job.id;
        self.waiter
            .wait_until(
                &format!("build {id} of {}", job.build_type),
                policy,
                move || {
                    let api = api.clone();
                    async move {
                        api.get_build(id)
                            .await
                            .map(|build| JobState::from_build(&build))
                            .map_err(VsyncError::from)
                    }
                },
                JobState::is_success,
                JobState::is_failure,
            )
            .await
    }

    /// Queue a build and require it to finish successfully.
    ///
    /// The policy and the cancellation token are checked before anything
    /// is queued, so a rejected call leaves no build behind.
    pub async fn queue_and_await_success(
        &self,
        build_type: &str,
        policy: WaitPolicy,
    ) -> Result<JobHandle> {
        policy.validate()?;
        if self.waiter.cancellation().is_cancelled() {
            return Err(VsyncError::Cancelled {
                what: format!("queueing a build of {build_type}"),
            });
        }
        let job = self.queue(build_type).await?;
        let outcome = self.await_completion(&job, policy).await?;
        match outcome {
            WaitOutcome::Converged { .. } => {
                info!(event = "build.succeeded", build_id = job.id, build_type = %job.build_type);
                Ok(job)
            }
            WaitOutcome::Aborted {
                last: Some(state), ..
            } if state.is_failure() => Err(VsyncError::BuildFailed {
                build_id: job.id,
                build_type: job.build_type.clone(),
                detail: state.failure_detail().unwrap_or("failed").to_string(),
            }),
            other => other
                .into_converged(&format!("build {} of {}", job.id, job.build_type))
                .map(|_| job),
        }
    }
}
