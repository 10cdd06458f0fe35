//! Job definition.

use crate::error::DispatchResult;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Job type tag, matched against the handler registry.
pub type JobType = String;

/// A unit of asynchronous work.
///
/// Jobs live only in memory: created by the publisher, mutated only by the
/// worker that dequeued them (the retry counter), and discarded after
/// success, terminal failure or a queue drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Which handler and timeout policy apply
    pub job_type: JobType,

    /// Opaque payload, decoded only by the matching handler
    pub payload: Bytes,

    /// Correlation id carried from the originating request
    pub trace_id: String,

    /// Number of retries performed so far; the first execution is retry 0
    pub retry: u32,
}

impl Job {
    /// Create a new job from raw payload bytes.
    pub fn new(job_type: impl Into<JobType>, payload: impl Into<Bytes>) -> Self {
        Self {
            job_type: job_type.into(),
            payload: payload.into(),
            trace_id: String::new(),
            retry: 0,
        }
    }

    /// Create a job whose payload is the JSON encoding of `payload`.
    pub fn from_json<T: Serialize + ?Sized>(
        job_type: impl Into<JobType>,
        payload: &T,
    ) -> DispatchResult<Self> {
        let bytes = serde_json::to_vec(payload)?;
        Ok(Self::new(job_type, bytes))
    }

    /// Set the trace id.
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Decode the JSON payload.
    pub fn decode<T: DeserializeOwned>(&self) -> DispatchResult<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Whether this execution is a retry rather than the first attempt.
    pub fn is_retry(&self) -> bool {
        self.retry > 0
    }
}
