//! Conversation state driven by streamed replies

use crate::client::{ClientError, ClientResult, GatewayClient};
use crate::relay::{RelayEvent, StreamRelay};
use futures::StreamExt;
use gateway_core::llm::{ChatRequest, Message, ProviderId};
use tracing::{debug, warn};

/// One conversation with the gateway.
///
/// Holds the ordered turns, the reply currently being streamed and a loading flag.
#[derive(Debug)]
pub struct ChatSession {
    client: GatewayClient,
    messages: Vec<Message>,
    current_response: String,
    is_loading: bool,
}

impl ChatSession {
    pub fn new(client: GatewayClient) -> Self {
        Self {
            client,
            messages: Vec::new(),
            current_response: String::new(),
            is_loading: false,
        }
    }

    /// Start from an existing conversation
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn current_response(&self) -> &str {
        &self.current_response
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Send a user turn and stream the reply.
    ///
    /// `on_update` receives the accumulated reply after every delta. On success exactly one
    /// assistant message is appended and returned. The in-progress text and the loading
    /// flag are cleared whether or not the call succeeded; the user turn stays either way.
    pub async fn send_message<F>(
        &mut self,
        content: impl Into<String>,
        model: &str,
        provider: ProviderId,
        on_update: F,
    ) -> ClientResult<Message>
    where
        F: FnMut(&str),
    {
        self.messages.push(Message::user(content));
        self.is_loading = true;
        self.current_response.clear();

        let request = ChatRequest::new(model, self.messages.clone()).streaming(true);
        let result = self.stream_reply(provider, &request, on_update).await;

        self.is_loading = false;
        self.current_response.clear();

        match result {
            Ok(message) => {
                self.messages.push(message.clone());
                Ok(message)
            }
            Err(e) => {
                warn!(error = %e, "Chat request failed");
                Err(e)
            }
        }
    }

    async fn stream_reply<F>(
        &mut self,
        provider: ProviderId,
        request: &ChatRequest,
        mut on_update: F,
    ) -> ClientResult<Message>
    where
        F: FnMut(&str),
    {
        let mut chunks = self.client.chat_stream(provider, request).await?;
        let mut relay = StreamRelay::new();

        'read: while let Some(chunk) = chunks.next().await {
            for event in relay.feed(&chunk?) {
                match event {
                    RelayEvent::Delta { accumulated } => {
                        on_update(&accumulated);
                        self.current_response = accumulated;
                    }
                    RelayEvent::Done => break 'read,
                    RelayEvent::Error { message } => return Err(ClientError::Stream(message)),
                }
            }
        }

        if !relay.is_done() {
            debug!("Stream closed without end-of-stream sentinel");
        }

        Ok(relay
            .finish()?
            .unwrap_or_else(|| Message::assistant(String::new())))
    }
}
