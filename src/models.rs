use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Smallest unit of message content exchanged with the generation service.
///
/// Serializes directly into the service's `parts` entry shape:
/// `{"text": ...}` or `{"inline_data": {"mime_type": ..., "data": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentUnit {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

/// Binary payload tagged with its media type, base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl ContentUnit {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::InlineData { .. } => None,
        }
    }
}

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl Role {
    /// Role name the generation service expects ("model" for the bot side).
    pub fn service_role(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Bot => "model",
        }
    }
}

/// One entry of the conversation log. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: u64,
    pub role: Role,
    pub content: Vec<ContentUnit>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Textual content only, one line per text unit. Inline data is skipped.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentUnit::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A file selected by the user and waiting to go out with the next turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub id: u64,
    pub path: PathBuf,
    pub name: String,
    pub media_type: String,
}

impl PendingAttachment {
    pub fn new(id: u64, path: impl Into<PathBuf>, media_type: impl Into<String>) -> Self {
        let path = path.into();
        let name = file_name(&path);
        Self {
            id,
            path,
            name,
            media_type: media_type.into(),
        }
    }

    /// Attachment whose declared media type is guessed from the file extension.
    pub fn from_path(id: u64, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let media_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .to_string();
        Self::new(id, path, media_type)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Ephemeral request built for a single orchestration cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub history: Vec<WireContent>,
    pub new_turn: Vec<ContentUnit>,
}

impl OutboundRequest {
    /// Flatten history and the new user turn into the service envelope.
    pub fn into_request(self, generation: Option<GenerationConfig>) -> GenerateRequest {
        let mut contents = self.history;
        contents.push(WireContent {
            role: Role::User.service_role().to_string(),
            parts: self.new_turn,
        });
        GenerateRequest {
            contents,
            generation_config: generation,
        }
    }
}

// Gemini generateContent request format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireContent {
    pub role: String,
    pub parts: Vec<ContentUnit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<WireContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

// Gemini generateContent response format
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate, if present and non-empty.
    pub fn reply_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
            .filter(|text| !text.is_empty())
    }
}

// Error payload returned with non-success statuses
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub message: Option<String>,
}
