//! Scripted `WorkloadController` for unit tests

#![allow(clippy::expect_used)]

use super::readiness::ReadinessSample;
use super::workload::{WorkloadController, WorkloadError};
use crate::config::WorkloadId;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

/// Replays queued readiness results, then falls back to `fallback`
pub struct MockWorkload {
    id: WorkloadId,
    results: Mutex<VecDeque<Result<ReadinessSample, WorkloadError>>>,
    fallback: Option<ReadinessSample>,
    fail_restart: bool,
    missing: bool,
    readiness_calls: AtomicUsize,
    readiness_times: Mutex<Vec<Instant>>,
    restart_times: Mutex<Vec<Instant>>,
}

impl MockWorkload {
    pub fn new() -> Self {
        Self {
            id: WorkloadId::new("default", "web"),
            results: Mutex::new(VecDeque::new()),
            fallback: None,
            fail_restart: false,
            missing: false,
            readiness_calls: AtomicUsize::new(0),
            readiness_times: Mutex::new(Vec::new()),
            restart_times: Mutex::new(Vec::new()),
        }
    }

    pub fn with_samples(self, samples: impl IntoIterator<Item = ReadinessSample>) -> Self {
        self.with_results(samples.into_iter().map(Ok))
    }

    pub fn with_results(
        self,
        results: impl IntoIterator<Item = Result<ReadinessSample, WorkloadError>>,
    ) -> Self {
        self.results
            .lock()
            .expect("results lock")
            .extend(results);
        self
    }

    /// Sample returned once the queue is drained
    pub fn with_fallback(mut self, sample: ReadinessSample) -> Self {
        self.fallback = Some(sample);
        self
    }

    pub fn with_failing_restart(mut self) -> Self {
        self.fail_restart = true;
        self
    }

    pub fn missing(mut self) -> Self {
        self.missing = true;
        self
    }

    pub fn readiness_calls(&self) -> usize {
        self.readiness_calls.load(Ordering::SeqCst)
    }

    pub fn readiness_times(&self) -> Vec<Instant> {
        self.readiness_times.lock().expect("times lock").clone()
    }

    pub fn restart_calls(&self) -> usize {
        self.restart_times.lock().expect("times lock").len()
    }

    pub fn restart_times(&self) -> Vec<Instant> {
        self.restart_times.lock().expect("times lock").clone()
    }
}

#[async_trait]
impl WorkloadController for MockWorkload {
    fn id(&self) -> &WorkloadId {
        &self.id
    }

    async fn get(&self) -> Result<Deployment, WorkloadError> {
        if self.missing {
            return Err(WorkloadError::NotFound {
                namespace: self.id.namespace.clone(),
                name: self.id.name.clone(),
            });
        }
        Ok(Deployment::default())
    }

    async fn readiness(&self) -> Result<ReadinessSample, WorkloadError> {
        self.readiness_calls.fetch_add(1, Ordering::SeqCst);
        self.readiness_times
            .lock()
            .expect("times lock")
            .push(Instant::now());

        let next = self.results.lock().expect("results lock").pop_front();
        match next {
            Some(result) => result,
            None => self
                .fallback
                .ok_or_else(|| WorkloadError::Read("no scripted sample left".to_string())),
        }
    }

    async fn restart(&self) -> Result<(), WorkloadError> {
        self.restart_times
            .lock()
            .expect("times lock")
            .push(Instant::now());

        if self.fail_restart {
            return Err(WorkloadError::Write("conflict".to_string()));
        }
        Ok(())
    }
}
