//! Stage pipeline: collaborator service seams and the executors that call them.
//!
//! The [`GroundingService`], [`GenerationService`], and [`PersistenceService`]
//! traits decouple the scheduler from the transport used to reach each
//! external collaborator. Production wiring uses the reqwest clients in
//! [`http`]; tests substitute in-process fakes.

pub mod http;
pub mod progress;
pub mod stage;
pub mod wire;

use std::future::Future;
use std::pin::Pin;

use crate::Result;
use wire::{
    DraftRequest, DraftResponse, GenerationRequest, GenerationResponse, GroundingRequest,
    GroundingResponse,
};

/// Boxed future returned by collaborator calls.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Keyword retrieval service used to seed sessions enqueued without keywords.
pub trait GroundingService: Send + Sync {
    /// Propose keywords for a product transcript.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Upstream`](crate::AppError::Upstream) on transport
    /// failure or a non-2xx answer, and
    /// [`AppError::Malformed`](crate::AppError::Malformed) when the body
    /// cannot be decoded.
    fn ground(&self, request: GroundingRequest) -> ServiceFuture<'_, GroundingResponse>;
}

/// Metadata generation pipeline.
pub trait GenerationService: Send + Sync {
    /// Produce description, timestamps, hashtags, FAQ, and score.
    ///
    /// # Errors
    ///
    /// Same contract as [`GroundingService::ground`].
    fn generate(&self, request: GenerationRequest) -> ServiceFuture<'_, GenerationResponse>;
}

/// Draft storage for completed results.
pub trait PersistenceService: Send + Sync {
    /// Store the assembled result with its input, returning the draft id.
    ///
    /// # Errors
    ///
    /// Any error; callers treat persistence failures as non-fatal.
    fn save_draft(&self, request: DraftRequest) -> ServiceFuture<'_, DraftResponse>;
}
