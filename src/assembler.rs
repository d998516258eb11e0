use futures::future::try_join_all;
use std::sync::Arc;

use crate::error::{ChatError, Result};
use crate::extract::Extractor;
use crate::models::{ContentUnit, OutboundRequest, PendingAttachment, Turn, WireContent};

/// Whether there is anything to send at all.
pub fn has_content(input: &str, attachments: &[PendingAttachment]) -> bool {
    !input.trim().is_empty() || !attachments.is_empty()
}

/// Service-facing view of the stored conversation.
///
/// Every turn is kept so roles keep alternating. Each turn is reduced to its
/// text; inline data from earlier turns is not resent, and a turn that had
/// only inline data is stood in for by one `[Attached: <media type>]` line
/// per item.
pub fn history_view(turns: &[Turn]) -> Vec<WireContent> {
    turns
        .iter()
        .map(|turn| WireContent {
            role: turn.role.service_role().to_string(),
            parts: vec![ContentUnit::text(history_text(turn))],
        })
        .collect()
}

fn history_text(turn: &Turn) -> String {
    let text = turn.text();
    if !text.is_empty() {
        return text;
    }
    let placeholders: Vec<String> = turn
        .content
        .iter()
        .filter_map(|unit| match unit {
            ContentUnit::InlineData { inline_data } => {
                Some(format!("[Attached: {}]", inline_data.mime_type))
            }
            ContentUnit::Text { .. } => None,
        })
        .collect();
    if placeholders.is_empty() {
        tracing::debug!(turn_id = turn.id, "Turn has no content, sending a placeholder");
        return "[empty]".to_string();
    }
    placeholders.join("\n")
}

/// Merges typed input, extracted attachments and history into one request.
pub struct TurnAssembler {
    extractor: Arc<dyn Extractor>,
}

impl TurnAssembler {
    pub fn new(extractor: Arc<dyn Extractor>) -> Self {
        Self { extractor }
    }

    pub async fn assemble(
        &self,
        input: &str,
        attachments: &[PendingAttachment],
        history: &[Turn],
    ) -> Result<OutboundRequest> {
        if !has_content(input, attachments) {
            return Err(ChatError::EmptyTurn);
        }

        // Extraction runs concurrently; try_join_all yields results in
        // attachment order and fails on the first error.
        let extracted = try_join_all(
            attachments
                .iter()
                .map(|attachment| self.extractor.extract(attachment)),
        )
        .await?;

        let text = input.trim();
        let mut new_turn = Vec::new();
        if !text.is_empty() {
            new_turn.push(ContentUnit::text(text));
        }
        new_turn.extend(extracted.into_iter().flatten());

        tracing::info!(
            attachments = attachments.len(),
            units = new_turn.len(),
            history = history.len(),
            "Assembled outbound turn"
        );

        Ok(OutboundRequest {
            history: history_view(history),
            new_turn,
        })
    }
}
