use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};

use crate::assembler::{TurnAssembler, has_content};
use crate::config::Config;
use crate::error::{ChatError, Result};
use crate::extract::FileExtractor;
use crate::models::{ContentUnit, GenerationConfig, OutboundRequest, PendingAttachment, Role, Turn};
use crate::store::ConversationStore;
use crate::transport::{GeminiTransport, Transport};

/// Where the pipeline is for the current user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Composing,
    Sending,
}

/// Why a send intent did not start a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    EmptyTurn,
    AlreadySending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// No request was issued.
    Refused(Refusal),
    /// The service replied; the bot turn has been appended.
    Replied(Turn),
    /// Something failed; an error turn has been appended.
    Failed(Turn),
}

#[derive(Debug, Default)]
struct Draft {
    input: String,
    attachments: Vec<PendingAttachment>,
    next_attachment_id: u64,
}

impl Draft {
    fn push(&mut self, build: impl FnOnce(u64) -> PendingAttachment) -> PendingAttachment {
        self.next_attachment_id += 1;
        let attachment = build(self.next_attachment_id);
        self.attachments.push(attachment.clone());
        attachment
    }
}

/// Clears the sending flag however the cycle ends.
struct SendingGuard<'a>(&'a AtomicBool);

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives one assemble -> send -> append cycle per user send action and owns
/// the conversation and the pending attachments.
pub struct ChatOrchestrator {
    assembler: TurnAssembler,
    transport: Arc<dyn Transport>,
    credential: Option<String>,
    generation: Option<GenerationConfig>,
    store: RwLock<ConversationStore>,
    draft: Mutex<Draft>,
    sending: AtomicBool,
}

impl ChatOrchestrator {
    pub fn new(
        assembler: TurnAssembler,
        transport: Arc<dyn Transport>,
        credential: Option<String>,
        generation: Option<GenerationConfig>,
    ) -> Self {
        Self {
            assembler,
            transport,
            credential,
            generation,
            store: RwLock::new(ConversationStore::new()),
            draft: Mutex::new(Draft::default()),
            sending: AtomicBool::new(false),
        }
    }

    /// Orchestrator reading files from disk and talking to Gemini.
    pub fn from_config(cfg: &Config) -> Self {
        let transport = Arc::new(GeminiTransport::from_config(&cfg.gemini));
        tracing::info!(url = %transport.url(), "Generation endpoint configured");
        Self::new(
            TurnAssembler::new(Arc::new(FileExtractor::new())),
            transport,
            cfg.credential().map(str::to_string),
            cfg.gemini.generation.clone(),
        )
    }

    pub async fn submit_text(&self, text: impl Into<String>) {
        self.draft.lock().await.input = text.into();
    }

    /// Attach a file with an explicitly declared media type.
    pub async fn attach(
        &self,
        path: impl Into<PathBuf>,
        media_type: impl Into<String>,
    ) -> PendingAttachment {
        let (path, media_type) = (path.into(), media_type.into());
        let attachment = self
            .draft
            .lock()
            .await
            .push(|id| PendingAttachment::new(id, path, media_type));
        tracing::debug!(file = %attachment.name, id = attachment.id, "Attached file");
        attachment
    }

    /// Attach files, guessing each declared media type from its extension.
    pub async fn attach_files<I, P>(&self, paths: I) -> Vec<PendingAttachment>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut draft = self.draft.lock().await;
        paths
            .into_iter()
            .map(|path| {
                let path = path.into();
                let attachment = draft.push(|id| PendingAttachment::from_path(id, path));
                tracing::debug!(
                    file = %attachment.name,
                    id = attachment.id,
                    media_type = %attachment.media_type,
                    "Attached file"
                );
                attachment
            })
            .collect()
    }

    pub async fn remove_attachment(&self, id: u64) -> bool {
        let mut draft = self.draft.lock().await;
        let before = draft.attachments.len();
        draft.attachments.retain(|attachment| attachment.id != id);
        draft.attachments.len() != before
    }

    pub async fn pending_attachments(&self) -> Vec<PendingAttachment> {
        self.draft.lock().await.attachments.clone()
    }

    pub async fn snapshot(&self) -> Vec<Turn> {
        self.store.read().await.snapshot()
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    pub async fn phase(&self) -> Phase {
        if self.is_sending() {
            return Phase::Sending;
        }
        let draft = self.draft.lock().await;
        if !has_content(&draft.input, &draft.attachments) {
            Phase::Idle
        } else {
            Phase::Composing
        }
    }

    /// Run one orchestration cycle for the current draft.
    ///
    /// Refused outright while another cycle is in flight or when there is
    /// nothing to send. Otherwise the draft is cleared, the user turn is
    /// appended, and exactly one bot turn (reply or error) follows.
    pub async fn send_turn(&self) -> SendOutcome {
        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::info!("Send rejected: a request is already in flight");
            return SendOutcome::Refused(Refusal::AlreadySending);
        }
        let _guard = SendingGuard(&self.sending);

        let (input, attachments) = {
            let mut draft = self.draft.lock().await;
            if !has_content(&draft.input, &draft.attachments) {
                return SendOutcome::Refused(Refusal::EmptyTurn);
            }
            (
                std::mem::take(&mut draft.input),
                std::mem::take(&mut draft.attachments),
            )
        };

        match self.cycle(&input, &attachments).await {
            Ok(reply) => {
                let turn = self
                    .store
                    .write()
                    .await
                    .append(Role::Bot, vec![ContentUnit::text(reply)]);
                tracing::info!(turn_id = turn.id, "Reply received");
                SendOutcome::Replied(turn)
            }
            Err(err) => {
                tracing::error!(error = %err, "Send failed");
                let turn = self
                    .store
                    .write()
                    .await
                    .append(Role::Bot, vec![ContentUnit::text(err.turn_text())]);
                SendOutcome::Failed(turn)
            }
        }
    }

    async fn cycle(&self, input: &str, attachments: &[PendingAttachment]) -> Result<String> {
        let history = self.store.read().await.snapshot();
        let prepared = self.prepare(input, attachments, &history).await;

        let user_content = match &prepared {
            Ok((_, outbound)) => outbound.new_turn.clone(),
            Err(_) => display_content(input, attachments),
        };
        self.store.write().await.append(Role::User, user_content);

        let (credential, outbound) = prepared?;
        let request = outbound.into_request(self.generation.clone());
        let response = self.transport.generate(&request, credential).await?;

        response
            .reply_text()
            .map(str::to_string)
            .ok_or_else(|| ChatError::MalformedResponse("response contained no reply text".to_string()))
    }

    async fn prepare(
        &self,
        input: &str,
        attachments: &[PendingAttachment],
        history: &[Turn],
    ) -> Result<(&str, OutboundRequest)> {
        let credential = self.credential.as_deref().ok_or_else(|| {
            ChatError::Configuration("GEMINI_API_KEY is not set".to_string())
        })?;
        let outbound = self.assembler.assemble(input, attachments, history).await?;
        Ok((credential, outbound))
    }
}

/// What to record for the user's turn when the request could not be built.
fn display_content(input: &str, attachments: &[PendingAttachment]) -> Vec<ContentUnit> {
    let text = input.trim();
    let mut content = Vec::with_capacity(attachments.len() + 1);
    if !text.is_empty() {
        content.push(ContentUnit::text(text));
    }
    content.extend(
        attachments
            .iter()
            .map(|attachment| ContentUnit::text(format!("[Attached: {}]", attachment.name))),
    );
    content
}
