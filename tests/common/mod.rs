//! Common test utilities.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use viva::api::VoiceSettings;
use viva::conversation::{
    AgentExchange, AgentService, ConversationError, ConversationResult, TurnContext,
};
use viva::orchestrator::Orchestrator;
use viva::store::SessionStore;
use viva::streaming::{
    CredentialIssuer, ResilientStreaming, SpeakReceipt, StreamingApi, StreamingCredential,
    StreamingError, StreamingResult, StreamingSession,
};

// ============================================================================
// Fake Streaming Provider
// ============================================================================

/// In-process stand-in for the streaming provider. Serves as both the
/// credential issuer and the session API, and counts calls per operation so
/// tests can assert which paths reached the provider at all.
pub struct FakeStreamingProvider {
    fail: bool,
    pub issue_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    pub speak_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
}

impl FakeStreamingProvider {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self::with_fail(false))
    }

    /// Every operation returns a provider-side error.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self::with_fail(true))
    }

    fn with_fail(fail: bool) -> Self {
        Self {
            fail,
            issue_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            speak_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
        }
    }

    fn outcome<T>(&self, value: T) -> StreamingResult<T> {
        if self.fail {
            Err(StreamingError::Api {
                status: 503,
                message: "provider down".to_string(),
            })
        } else {
            Ok(value)
        }
    }
}

#[async_trait]
impl CredentialIssuer for FakeStreamingProvider {
    async fn issue(&self) -> StreamingResult<StreamingCredential> {
        self.issue_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome(StreamingCredential::new("fake-token"))
    }
}

#[async_trait]
impl StreamingApi for FakeStreamingProvider {
    async fn create_session(
        &self,
        _credential: &StreamingCredential,
        _avatar_name: &str,
        _voice: &VoiceSettings,
    ) -> StreamingResult<StreamingSession> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome(StreamingSession {
            session_id: "fake-stream-1".to_string(),
            stream_endpoint: "wss://fake.stream.test/fake-stream-1".to_string(),
            access_token: Some("fake-access-token".to_string()),
            is_mock: false,
        })
    }

    async fn start_session(
        &self,
        _credential: &StreamingCredential,
        _session: &StreamingSession,
    ) -> StreamingResult<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome(())
    }

    async fn speak(
        &self,
        _credential: &StreamingCredential,
        _session: &StreamingSession,
        _text: &str,
    ) -> StreamingResult<SpeakReceipt> {
        self.speak_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome(SpeakReceipt {
            task_id: "fake-task-1".to_string(),
            is_mock: false,
        })
    }

    async fn stop_session(
        &self,
        _credential: &StreamingCredential,
        _session: &StreamingSession,
    ) -> StreamingResult<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome(())
    }
}

// ============================================================================
// Fake Agent Service
// ============================================================================

/// Scripted conversational agent. The first exchange of a conversation (no
/// chat session id yet) greets; later exchanges echo the utterance.
pub struct FakeAgentService {
    fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeAgentService {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        })
    }

    /// Flip failure mode mid-test.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AgentService for FakeAgentService {
    async fn exchange(&self, turn: &TurnContext) -> ConversationResult<AgentExchange> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ConversationError::Api {
                status: 500,
                message: "agent down".to_string(),
            });
        }

        let prompt = match &turn.chat_session_id {
            None => "Welcome. Tell me about the case.".to_string(),
            Some(_) => format!("Noted: {}. Next question?", turn.utterance),
        };
        Ok(AgentExchange {
            raw_reply: format!(r#"{{"next_question":"{prompt}"}}"#),
            prompt,
            chat_session_id: turn
                .chat_session_id
                .clone()
                .unwrap_or_else(|| "chat-test".to_string()),
        })
    }
}

// ============================================================================
// Wiring Helpers
// ============================================================================

/// Orchestrator over the given store, with failure masking on.
pub fn orchestrator_with_store(
    provider: Arc<FakeStreamingProvider>,
    agent: Arc<FakeAgentService>,
    store: Arc<dyn SessionStore>,
) -> Arc<Orchestrator> {
    let streaming =
        ResilientStreaming::new(provider.clone(), provider, true, Duration::from_millis(0));
    Arc::new(Orchestrator::new(streaming, agent, store))
}
