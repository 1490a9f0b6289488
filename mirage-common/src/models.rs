//! Session and statistics models
//!
//! Field names serialize in camelCase so the browser client and the stored
//! records share one shape.

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, ImageData, Result};

/// Number of synthetic variations offered to every visitor
pub const VARIATION_COUNT: usize = 3;

/// One visitor's journey through the installation
///
/// Choice fields are filled in strictly in order: `selected_image_index`,
/// then `user_confirmed`, then `revealed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Creation timestamp for tab-local sessions, store-assigned id once persisted
    pub id: String,

    /// Source capture. Dropped after generation to keep the tab record small.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub original_image: Option<ImageData>,

    /// Exactly [`VARIATION_COUNT`] images, in generation order
    pub generated_images: Vec<ImageData>,

    #[serde(default)]
    pub selected_image_index: Option<usize>,

    #[serde(default)]
    pub user_confirmed: Option<bool>,

    /// Unix epoch milliseconds
    pub timestamp: i64,

    #[serde(default)]
    pub revealed: bool,
}

impl Session {
    /// Create a session with all choice fields unset
    pub fn new(id: impl Into<String>, images: [ImageData; VARIATION_COUNT], timestamp: i64) -> Self {
        Self {
            id: id.into(),
            original_image: None,
            generated_images: images.into(),
            selected_image_index: None,
            user_confirmed: None,
            timestamp,
            revealed: false,
        }
    }

    /// Create a session identified by its creation time
    pub fn started_now(images: [ImageData; VARIATION_COUNT]) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis();
        Self::new(timestamp.to_string(), images, timestamp)
    }

    /// Image the visitor picked, if any
    pub fn selected_image(&self) -> Option<&ImageData> {
        self.selected_image_index
            .and_then(|index| self.generated_images.get(index))
    }

    /// True once every step up to the reveal has been recorded
    pub fn is_complete(&self) -> bool {
        self.selected_image_index.is_some() && self.user_confirmed.is_some() && self.revealed
    }

    /// Check the ordering and range invariants of the record
    pub fn validate(&self) -> Result<()> {
        if self.generated_images.len() != VARIATION_COUNT {
            return Err(Error::InvalidInput(format!(
                "Session must carry exactly {} generated images, found {}",
                VARIATION_COUNT,
                self.generated_images.len()
            )));
        }

        if let Some(index) = self.selected_image_index {
            if index >= VARIATION_COUNT {
                return Err(Error::InvalidInput(format!(
                    "selectedImageIndex {} is out of range 0..{}",
                    index, VARIATION_COUNT
                )));
            }
        }

        if self.user_confirmed.is_some() && self.selected_image_index.is_none() {
            return Err(Error::InvalidInput(
                "userConfirmed is set before selectedImageIndex".to_string(),
            ));
        }

        if self.revealed && self.user_confirmed.is_none() {
            return Err(Error::InvalidInput(
                "revealed is set before userConfirmed".to_string(),
            ));
        }

        Ok(())
    }
}

/// Global participation counters
///
/// `selected_ai` always moves with `total_participants`: every option shown
/// to a visitor is synthetic, so every pick is an AI pick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_participants: i64,
    #[serde(rename = "selectedAI")]
    pub selected_ai: i64,
    pub confirmed_as_real: i64,
}

impl Statistics {
    /// Account for one more finished session
    pub fn record(&mut self, user_confirmed: bool) {
        self.total_participants += 1;
        self.selected_ai += 1;
        if user_confirmed {
            self.confirmed_as_real += 1;
        }
    }
}

// The browser client stores an empty string once the capture is dropped.
fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<ImageData>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(s) if !s.trim().is_empty() => ImageData::parse(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
