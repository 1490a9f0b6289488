//! Inline image payloads
//!
//! Images travel between the browser, the generation backend and the store as
//! `data:<mime>;base64,<payload>` strings. [`ImageData`] keeps the decoded bytes
//! and the declared mime type and serializes back to the data URL form.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Mime type assumed when the payload does not declare one
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Decoded image bytes plus declared mime type
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    mime_type: String,
    bytes: Vec<u8>,
}

impl ImageData {
    /// Wrap raw bytes. An empty mime type falls back to [`DEFAULT_MIME_TYPE`].
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mime_type = mime_type.into();
        let mime_type = if mime_type.trim().is_empty() {
            DEFAULT_MIME_TYPE.to_string()
        } else {
            mime_type
        };
        Self { mime_type, bytes }
    }

    /// Decode a bare base64 payload
    pub fn from_base64(mime_type: Option<&str>, encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(Error::InvalidInput("Image payload is empty".to_string()));
        }

        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| Error::InvalidInput(format!("Image payload is not valid base64: {}", e)))?;

        Ok(Self::new(mime_type.unwrap_or(DEFAULT_MIME_TYPE), bytes))
    }

    /// Parse either a `data:` URL or a bare base64 string
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest.split_once(',').ok_or_else(|| {
                    Error::InvalidInput("Data URL has no payload separator".to_string())
                })?;
                let mime_type = header.strip_suffix(";base64").ok_or_else(|| {
                    Error::InvalidInput("Only base64 data URLs are supported".to_string())
                })?;
                let mime_type = Some(mime_type).filter(|m| !m.is_empty());
                Self::from_base64(mime_type, payload)
            }
            None => Self::from_base64(None, input),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

// Payloads are large; never dump them into logs.
impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl FromStr for ImageData {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for ImageData {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_url())
    }
}

impl<'de> Deserialize<'de> for ImageData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}
