//! Visitor flow state machine
//!
//! A visitor walks one session through capture → select → confirm → reveal →
//! persist. Nothing is held in process memory between steps: every call
//! re-reads the session from the tab's transient storage, checks the guard for
//! the requested stage and writes the whole record back. Reloading any stage
//! is therefore safe; a session that has not reached the requested stage is
//! sent back to the furthest stage it can satisfy, never forward.

pub mod storage;

pub use storage::{TabScope, TabStorage, TransientStorage};

use mirage_common::{ImageData, Session, VARIATION_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::services::{GenerationError, PersistenceGateway, VariationGenerator};

/// Storage key of the in-progress session
pub const SESSION_KEY: &str = "photoSession";

/// Storage key of the store-assigned id once the session is persisted
pub const PERSISTED_ID_KEY: &str = "persistedSessionId";

/// Flow stages in strict forward order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Capturing,
    Selecting,
    Confirming,
    Revealing,
    Persisting,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Capturing => "capturing",
            Stage::Selecting => "selecting",
            Stage::Confirming => "confirming",
            Stage::Revealing => "revealing",
            Stage::Persisting => "persisting",
        }
    }

    /// Furthest stage whose preconditions `session` satisfies
    pub fn reached_by(session: &Session) -> Stage {
        if session.generated_images.len() != VARIATION_COUNT {
            Stage::Capturing
        } else if session.selected_image_index.is_none() {
            Stage::Selecting
        } else if session.user_confirmed.is_none() {
            Stage::Confirming
        } else if !session.revealed {
            Stage::Revealing
        } else {
            Stage::Persisting
        }
    }
}

impl FromStr for Stage {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "capturing" => Ok(Stage::Capturing),
            "selecting" => Ok(Stage::Selecting),
            "confirming" => Ok(Stage::Confirming),
            "revealing" => Ok(Stage::Revealing),
            "persisting" => Ok(Stage::Persisting),
            other => Err(FlowError::UnknownStage(other.to_string())),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of entering a stage or performing its action
#[derive(Debug, Clone, PartialEq)]
pub enum Step<T> {
    /// Guard passed; carries the stage's data
    Ready(T),
    /// Guard failed or action was stale; go to this stage instead
    Redirect(Stage),
}

/// Data available on entering a stage
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub stage: Stage,
    pub session: Option<Session>,
}

/// Where a finished session can be found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Store id, or the local id when the store was unavailable
    pub session_id: String,
    pub local_id: String,
    /// False when `session_id` is only the tab-local fallback
    pub durable: bool,
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Image generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Could not encode session: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// State machine bound to one tab's storage
pub struct VisitorFlow<S> {
    storage: S,
}

impl<S: TransientStorage> VisitorFlow<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Read the tab's session; unreadable or inconsistent records count as absent
    pub async fn load(&self) -> Option<Session> {
        let raw = self.storage.get(SESSION_KEY).await?;

        match serde_json::from_slice::<Session>(&raw) {
            Ok(session) => match session.validate() {
                Ok(()) => Some(session),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding inconsistent tab session");
                    self.storage.remove(SESSION_KEY).await;
                    None
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable tab session");
                self.storage.remove(SESSION_KEY).await;
                None
            }
        }
    }

    async fn store(&self, session: &Session) -> Result<(), FlowError> {
        let raw = serde_json::to_vec(session)?;
        self.storage.set(SESSION_KEY, raw).await;
        Ok(())
    }

    /// Check the guard for `stage`
    pub async fn enter(&self, stage: Stage) -> Step<View> {
        let Some(session) = self.load().await else {
            return if stage == Stage::Capturing {
                Step::Ready(View { stage, session: None })
            } else {
                tracing::debug!(requested = %stage, "No tab session, redirecting to capture");
                Step::Redirect(Stage::Capturing)
            };
        };

        let reached = Stage::reached_by(&session);
        if stage <= reached {
            Step::Ready(View {
                stage,
                session: Some(session),
            })
        } else {
            tracing::debug!(requested = %stage, reached = %reached, "Stage guard failed");
            Step::Redirect(reached)
        }
    }

    /// Generate the variations for a fresh capture and start a new session
    ///
    /// On failure the tab is cleared so the visitor starts over from scratch.
    pub async fn capture(
        &self,
        generator: &VariationGenerator,
        source: ImageData,
    ) -> Result<Session, FlowError> {
        let images = match generator.generate(&source).await {
            Ok(images) => images,
            Err(e) => {
                self.reset().await;
                return Err(e.into());
            }
        };

        // The capture itself is not kept; only the synthetic versions are shown
        let session = Session::started_now(images);
        self.storage.remove(PERSISTED_ID_KEY).await;
        self.store(&session).await?;

        tracing::info!(local_id = %session.id, "Visitor session started");
        Ok(session)
    }

    /// Record which image the visitor picked
    pub async fn select(&self, index: usize) -> Result<Step<Session>, FlowError> {
        let mut session = match self.guarded(Stage::Selecting).await {
            Step::Ready(session) => session,
            Step::Redirect(stage) => return Ok(Step::Redirect(stage)),
        };

        if index >= VARIATION_COUNT {
            return Err(FlowError::InvalidInput(format!(
                "Image index {} is out of range 0..{}",
                index, VARIATION_COUNT
            )));
        }

        if session.selected_image_index.is_some() {
            return Ok(Step::Redirect(Stage::reached_by(&session)));
        }

        session.selected_image_index = Some(index);
        self.store(&session).await?;
        tracing::info!(local_id = %session.id, index, "Image selected");
        Ok(Step::Ready(session))
    }

    /// Record whether the visitor believes the pick is their real photo
    pub async fn confirm(&self, answer: bool) -> Result<Step<Session>, FlowError> {
        let mut session = match self.guarded(Stage::Confirming).await {
            Step::Ready(session) => session,
            Step::Redirect(stage) => return Ok(Step::Redirect(stage)),
        };

        if session.user_confirmed.is_some() {
            return Ok(Step::Redirect(Stage::reached_by(&session)));
        }

        session.user_confirmed = Some(answer);
        self.store(&session).await?;
        tracing::info!(local_id = %session.id, confirmed = answer, "Answer recorded");
        Ok(Step::Ready(session))
    }

    /// Mark the truth reveal as shown
    pub async fn reveal(&self) -> Result<Step<Session>, FlowError> {
        let mut session = match self.guarded(Stage::Revealing).await {
            Step::Ready(session) => session,
            Step::Redirect(stage) => return Ok(Step::Redirect(stage)),
        };

        if session.revealed {
            return Ok(Step::Redirect(Stage::Persisting));
        }

        session.revealed = true;
        self.store(&session).await?;
        tracing::info!(local_id = %session.id, "Truth revealed");
        Ok(Step::Ready(session))
    }

    /// Commit the finished session, once per tab
    ///
    /// A store failure does not block the visitor: the local id is handed out
    /// instead and the next entry tries the store again.
    pub async fn persist(&self, gateway: &PersistenceGateway) -> Step<Receipt> {
        let session = match self.guarded(Stage::Persisting).await {
            Step::Ready(session) => session,
            Step::Redirect(stage) => return Step::Redirect(stage),
        };

        if let Some(raw) = self.storage.get(PERSISTED_ID_KEY).await {
            if let Ok(session_id) = String::from_utf8(raw) {
                return Step::Ready(Receipt {
                    session_id,
                    local_id: session.id,
                    durable: true,
                });
            }
        }

        match gateway.persist(&session).await {
            Ok(session_id) => {
                self.storage
                    .set(PERSISTED_ID_KEY, session_id.clone().into_bytes())
                    .await;
                Step::Ready(Receipt {
                    session_id,
                    local_id: session.id,
                    durable: true,
                })
            }
            Err(e) => {
                tracing::error!(
                    local_id = %session.id,
                    error = %e,
                    "Failed to persist session, falling back to local id"
                );
                Step::Ready(Receipt {
                    session_id: session.id.clone(),
                    local_id: session.id,
                    durable: false,
                })
            }
        }
    }

    /// The tab's session if `id` is its local id or the id it was persisted under
    pub async fn find(&self, id: &str) -> Option<Session> {
        let session = self.load().await?;
        if session.id == id {
            return Some(session);
        }

        let persisted = self.storage.get(PERSISTED_ID_KEY).await?;
        (persisted == id.as_bytes()).then_some(session)
    }

    /// Forget everything held for this tab
    pub async fn reset(&self) {
        self.storage.clear().await;
    }

    async fn guarded(&self, stage: Stage) -> Step<Session> {
        match self.enter(stage).await {
            Step::Ready(View {
                session: Some(session),
                ..
            }) => Step::Ready(session),
            Step::Ready(View { session: None, .. }) => Step::Redirect(Stage::Capturing),
            Step::Redirect(stage) => Step::Redirect(stage),
        }
    }
}
