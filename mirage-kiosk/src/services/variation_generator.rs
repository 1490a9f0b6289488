//! Image variation generator
//!
//! Turns one captured portrait into exactly three subtly altered versions by
//! calling the generation backend once per fixed instruction, one call at a
//! time. Any failed call fails the whole batch; partial results are never
//! returned.

use async_trait::async_trait;
use mirage_common::{ImageData, VARIATION_COUNT};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

/// Fixed instructions, in request order: smile, gaze, chin tilt
pub const VARIATION_INSTRUCTIONS: [&str; VARIATION_COUNT] = [
    "Using the provided portrait photo, create a nearly identical image with these subtle changes: \
     the person's lips are slightly curved upward (subtle smile, about 2-3 degrees), maintaining the \
     exact same pose, lighting, background, and overall composition. The smile should be barely \
     noticeable but present.",
    "Using the provided portrait photo, create a nearly identical image with these subtle changes: \
     the person's gaze is directed 5 degrees to the left, maintaining the exact same facial \
     expression, pose, lighting, background, and overall composition.",
    "Using the provided portrait photo, create a nearly identical image with these subtle changes: \
     the person's chin is tilted 2 degrees upward, maintaining the exact same facial expression, \
     gaze direction, lighting, background, and overall composition.",
];

/// Default spacing between successive backend requests
pub const DEFAULT_PACING_MS: u64 = 500;

const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 8000;

/// Generation failures
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Generation API error {0}: {1}")]
    Api(u16, String),

    #[error("Generation API throttled the request: {0}")]
    Throttled(String),

    #[error("Malformed generation response: {0}")]
    Malformed(String),

    #[error("Expected {expected} generated images, got {actual}")]
    Incomplete { expected: usize, actual: usize },

    #[error("Image generation API key not configured")]
    NotConfigured,
}

/// External image-generation capability
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Backend identifier for logs
    fn name(&self) -> &'static str;

    /// Apply one instruction to the source image and return the first image produced
    async fn request(&self, image: &ImageData, instruction: &str) -> Result<ImageData, GenerationError>;
}

/// Enforces a minimum gap between the end of one request and the start of the next
///
/// The slot lock is held for the whole request, so requests from overlapping
/// visitors are serialized and paced against each other.
struct RequestPacer {
    last_finished: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RequestPacer {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_finished: Mutex::new(None),
            min_interval,
        }
    }

    /// Wait for the next free slot; stamp the guard when the request ends
    async fn acquire(&self) -> MutexGuard<'_, Option<Instant>> {
        let last = self.last_finished.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Generation pacing: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        last
    }
}

/// Sequential three-call generation pipeline
pub struct VariationGenerator {
    backend: Arc<dyn ImageBackend>,
    pacer: RequestPacer,
    throttle_retries: u32,
    initial_backoff: Duration,
}

impl VariationGenerator {
    pub fn new(backend: Arc<dyn ImageBackend>, pacing: Duration) -> Self {
        Self {
            backend,
            pacer: RequestPacer::new(pacing),
            throttle_retries: 0,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    /// Allow up to `retries` extra attempts when the backend reports throttling
    pub fn with_throttle_retries(mut self, retries: u32) -> Self {
        self.throttle_retries = retries;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Produce the three variations of `source`, in instruction order
    pub async fn generate(
        &self,
        source: &ImageData,
    ) -> Result<[ImageData; VARIATION_COUNT], GenerationError> {
        let started = Instant::now();
        let mut images = Vec::with_capacity(VARIATION_COUNT);

        tracing::info!(
            backend = self.backend.name(),
            source_bytes = source.len(),
            mime_type = source.mime_type(),
            "Generating image variations"
        );

        for (variation, instruction) in VARIATION_INSTRUCTIONS.iter().enumerate() {
            let image = self.request_variation(variation, source, instruction).await?;
            images.push(image);
        }

        let actual = images.len();
        let images: [ImageData; VARIATION_COUNT] = images.try_into().map_err(|_| {
            GenerationError::Incomplete {
                expected: VARIATION_COUNT,
                actual,
            }
        })?;

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generated {} image variations",
            VARIATION_COUNT
        );

        Ok(images)
    }

    async fn request_variation(
        &self,
        variation: usize,
        source: &ImageData,
        instruction: &str,
    ) -> Result<ImageData, GenerationError> {
        let mut attempt = 0u32;
        let mut backoff = self.initial_backoff;

        loop {
            let mut slot = self.pacer.acquire().await;
            let result = self.backend.request(source, instruction).await;
            *slot = Some(Instant::now());
            drop(slot);

            match result {
                Ok(image) => {
                    tracing::debug!(
                        variation,
                        mime_type = image.mime_type(),
                        bytes = image.len(),
                        "Variation generated"
                    );
                    return Ok(image);
                }
                Err(GenerationError::Throttled(reason)) if attempt < self.throttle_retries => {
                    attempt += 1;
                    tracing::warn!(
                        variation,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        reason = %reason,
                        "Generation throttled, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_millis(MAX_BACKOFF_MS));
                }
                Err(e) => {
                    tracing::error!(variation, error = %e, "Variation request failed, aborting batch");
                    return Err(e);
                }
            }
        }
    }
}
