use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use super::events::SessionEvent;
use crate::insights::InsightBuilder;
use crate::temp::TempStore;
use crate::transcribe::{TranscriptionError, Transcriber};

const SIGNAL_BUFFER: usize = 64;

/// Acknowledgement returned to the channel on session start.
#[derive(Debug, Clone)]
pub struct StartAck {
    pub session_id: String,
    pub display_name: Option<String>,
}

enum Signal {
    Chunk {
        bytes: Vec<u8>,
        format_hint: Option<String>,
    },
    End,
}

struct SessionHandle {
    tx: mpsc::Sender<Signal>,
}

/// Registry of live sessions.
///
/// Each session gets a dedicated task fed by an mpsc channel, so chunks for
/// one session are processed strictly in arrival order while different
/// sessions run concurrently. All mutation for an id flows through that one
/// task; the registry map only tracks which sessions are live.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    transcriber: Arc<Transcriber>,
    insights: Arc<InsightBuilder>,
    temp: Arc<TempStore>,
}

impl SessionRegistry {
    pub fn new(
        transcriber: Arc<Transcriber>,
        insights: Arc<InsightBuilder>,
        temp: Arc<TempStore>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            transcriber,
            insights,
            temp,
        }
    }

    /// Start a session, creating its record and task. Starting an id that is
    /// already live leaves the existing session untouched — there is at most
    /// one live session per id.
    pub async fn start(
        &self,
        session_id: Option<String>,
        display_name: Option<String>,
        events: mpsc::Sender<SessionEvent>,
    ) -> StartAck {
        let id = session_id.unwrap_or_else(|| format!("ws-{}", uuid::Uuid::new_v4()));

        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(&id) {
            let (tx, rx) = mpsc::channel(SIGNAL_BUFFER);
            tokio::spawn(session_task(
                id.clone(),
                rx,
                events,
                Arc::clone(&self.transcriber),
                Arc::clone(&self.insights),
                Arc::clone(&self.temp),
            ));
            sessions.insert(id.clone(), SessionHandle { tx });
            info!(session_id = %id, "Session started");
        } else {
            warn!(session_id = %id, "Session already live, reusing");
        }

        StartAck {
            session_id: id,
            display_name,
        }
    }

    /// Route one chunk to its session. Unknown ids are a silent no-op — the
    /// channel may have reconnected or the session may already be closed.
    pub async fn chunk(&self, id: &str, bytes: Vec<u8>, format_hint: Option<String>) {
        let tx = {
            let sessions = self.sessions.read().await;
            sessions.get(id).map(|h| h.tx.clone())
        };
        let Some(tx) = tx else {
            debug!(session_id = %id, "Chunk for unknown session ignored");
            return;
        };
        if tx
            .send(Signal::Chunk { bytes, format_hint })
            .await
            .is_err()
        {
            debug!(session_id = %id, "Session task gone, chunk dropped");
        }
    }

    /// End a session. The registry entry is removed before finalization
    /// begins, so no further chunks can reach it and a repeated end is a
    /// no-op; the task emits the final event and exits on its own.
    pub async fn end(&self, id: &str) {
        let handle = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(id)
        };
        let Some(handle) = handle else {
            debug!(session_id = %id, "End for unknown session ignored");
            return;
        };
        if handle.tx.send(Signal::End).await.is_err() {
            debug!(session_id = %id, "Session task already gone");
        }
    }

    pub async fn is_live(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    pub async fn live_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

async fn session_task(
    id: String,
    mut rx: mpsc::Receiver<Signal>,
    events: mpsc::Sender<SessionEvent>,
    transcriber: Arc<Transcriber>,
    insights: Arc<InsightBuilder>,
    temp: Arc<TempStore>,
) {
    let mut fragments: Vec<String> = Vec::new();
    let mut ended = false;

    while let Some(signal) = rx.recv().await {
        match signal {
            Signal::Chunk { bytes, format_hint } => {
                match process_chunk(&transcriber, &temp, &bytes, format_hint.as_deref()).await {
                    Ok(Some(text)) => {
                        fragments.push(text.clone());
                        if events
                            .send(SessionEvent::PartialTranscript { text })
                            .await
                            .is_err()
                        {
                            debug!(session_id = %id, "Channel gone, partial dropped");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        // One bad chunk never aborts the session.
                        warn!(session_id = %id, error = %e, "Chunk skipped");
                    }
                }
            }
            Signal::End => {
                ended = true;
                break;
            }
        }
    }

    if !ended {
        // Registry (or process) shut down without an end signal; nothing to
        // finalize and nobody listening.
        debug!(session_id = %id, "Session channel closed without end");
        return;
    }

    let transcript = fragments.join("\n");
    info!(
        session_id = %id,
        fragments = fragments.len(),
        chars = transcript.len(),
        "Finalizing session"
    );

    // Insight building runs on its own task so that even a panic in the
    // build surfaces as a final(error) instead of a silently dead channel.
    let build = {
        let insights = Arc::clone(&insights);
        let transcript = transcript.clone();
        tokio::spawn(async move { insights.build(&transcript).await })
    };

    let event = match build.await {
        Ok(result) => SessionEvent::final_result(transcript, result),
        Err(e) => {
            error!(session_id = %id, error = %e, "Finalization failed");
            SessionEvent::final_error("finalize_failed")
        }
    };

    if events.send(event).await.is_err() {
        debug!(session_id = %id, "Channel gone, final event dropped");
    }

    info!(session_id = %id, "Session closed");
}

/// Stage the chunk bytes to a temp artifact and transcribe it. The artifact
/// is released when the guard drops, on success and failure alike. Empty
/// transcriptions collapse to None so silence does not pad the transcript.
async fn process_chunk(
    transcriber: &Transcriber,
    temp: &TempStore,
    bytes: &[u8],
    format_hint: Option<&str>,
) -> Result<Option<String>, TranscriptionError> {
    let guard = temp.stage("chunk", format_hint.unwrap_or("webm"), bytes)?;
    let text = transcriber.transcribe_path(guard.path()).await?;
    Ok((!text.is_empty()).then_some(text))
}
