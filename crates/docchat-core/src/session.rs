//! Streaming query sessions

use std::sync::Arc;

use docchat_client::{ChannelEvent, ChannelStream, QueryTransport, TerminateReason};
use futures::StreamExt;

use crate::{
    events::{SessionEvent, SessionHandle, SessionId},
    transcript::{Transcript, TranscriptEntry},
};

/// The live exchange. Exists only while streaming.
struct StreamSession {
    id: SessionId,
    query: String,
    partial: String,
    channel: Channel,
}

enum Channel {
    Open(ChannelStream),
    /// `open` itself failed; the failure is reported by the next event
    FailedToOpen(String),
}

/// Owns the transcript and at most one live query session.
///
/// The controller is Idle when no session exists and Streaming otherwise.
/// A session starts with [`begin`](Self::begin) and is driven by repeated
/// calls to [`next_event`](Self::next_event) until it reports
/// [`SessionEvent::Finished`]. Dropping the controller drops any open
/// channel, which closes the connection.
pub struct StreamSessionController {
    transport: Arc<dyn QueryTransport>,
    transcript: Transcript,
    session: Option<StreamSession>,
    last_id: u64,
}

impl StreamSessionController {
    /// Create an idle controller with an empty transcript
    pub fn new(transport: Arc<dyn QueryTransport>) -> Self {
        Self {
            transport,
            transcript: Transcript::new(),
            session: None,
            last_id: 0,
        }
    }

    /// Start a session for `query`.
    ///
    /// Returns `None` and does nothing when the query is blank or a session
    /// is already live. Otherwise the user entry is appended right away and
    /// the channel is opened; a failed open still yields a handle and the
    /// session terminates on the next event.
    pub async fn begin(&mut self, query: &str) -> Option<SessionHandle> {
        if query.trim().is_empty() {
            tracing::debug!("Ignoring blank query");
            return None;
        }
        if let Some(live) = &self.session {
            tracing::debug!("Ignoring query while session {} is streaming", live.id);
            return None;
        }

        self.last_id += 1;
        let id = SessionId(self.last_id);
        self.transcript.push(TranscriptEntry::user(query));

        let channel = match self.transport.open(query).await {
            Ok(stream) => Channel::Open(stream),
            Err(e) => {
                tracing::warn!("Failed to open query channel for session {}: {}", id, e);
                Channel::FailedToOpen(e.to_string())
            }
        };
        tracing::debug!("Session {} started", id);

        self.session = Some(StreamSession {
            id,
            query: query.to_string(),
            partial: String::new(),
            channel,
        });

        Some(SessionHandle {
            id,
            query: query.to_string(),
        })
    }

    /// Wait for the live channel's next event and apply it.
    ///
    /// Returns `None` when idle. Cancel safe: if the returned future is
    /// dropped before completion no chunk is lost.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let session = self.session.as_mut()?;

        let reason = match &mut session.channel {
            Channel::FailedToOpen(reason) => TerminateReason::Failed(reason.clone()),
            Channel::Open(stream) => match stream.next().await {
                Some(ChannelEvent::Chunk(chunk)) => {
                    session.partial.push(' ');
                    session.partial.push_str(&chunk);
                    return Some(SessionEvent::Partial {
                        session: session.id,
                        chunk,
                        text: session.partial.clone(),
                    });
                }
                Some(ChannelEvent::Terminated(reason)) => reason,
                None => TerminateReason::Completed,
            },
        };

        let session = self.session.take()?;
        Some(self.finish(session, reason))
    }

    fn finish(&mut self, session: StreamSession, reason: TerminateReason) -> SessionEvent {
        let StreamSession {
            id,
            query,
            partial,
            channel,
        } = session;
        drop(channel);

        if reason.is_failure() {
            tracing::warn!("Session {} for {:?} {}", id, query, reason);
        } else {
            tracing::debug!("Session {} completed ({} chars)", id, partial.len());
        }

        let entry = TranscriptEntry::assistant(partial);
        self.transcript.push(entry.clone());

        SessionEvent::Finished {
            session: id,
            entry,
            reason,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_streaming(&self) -> bool {
        self.session.is_some()
    }

    /// Partial answer of the live session
    pub fn partial(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.partial.as_str())
    }

    /// Query of the live session
    pub fn active_query(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.query.as_str())
    }
}

impl Drop for StreamSessionController {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::debug!("Closing query channel of session {} on drop", session.id);
        }
    }
}
