use config::ResponseFormat;
use serde::{Deserialize, Serialize};

const MARKDOWN_INSTRUCTION: &str = "Format your answer in Markdown. Use headings, lists and fenced code blocks where they help readability.";

/// Body of a chat request as sent by the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    /// Prior turns of the conversation.
    pub messages: Vec<InboundMessage>,
    /// The new user turn, appended after `messages`.
    pub message: Option<String>,
    /// Requested answer format.
    pub format: Option<ResponseFormat>,
}

/// A message as received, before its role is validated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InboundMessage {
    pub role: String,
    pub content: String,
}

/// Roles the upstream understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    fn parse(role: &str) -> Option<Self> {
        match role {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One message in upstream wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// An inbound conversation, owned by one relay run.
#[derive(Debug, Clone)]
pub struct Conversation {
    request: ChatRequest,
}

impl From<ChatRequest> for Conversation {
    fn from(request: ChatRequest) -> Self {
        Self { request }
    }
}

impl Conversation {
    /// Length in bytes of the new user turn, or of the last user message.
    pub fn input_length(&self) -> usize {
        self.final_user_text().map(str::len).unwrap_or_default()
    }

    fn final_user_text(&self) -> Option<&str> {
        match self.request.message.as_deref() {
            Some(message) if !message.is_empty() => Some(message),
            _ => self
                .request
                .messages
                .iter()
                .rev()
                .find(|message| message.role == "user")
                .map(|message| message.content.as_str()),
        }
    }

    /// Builds the message list sent upstream.
    ///
    /// Messages with unknown roles are dropped, the `message` field becomes
    /// the final user turn, and a Markdown instruction is prepended when
    /// requested or when the user text mentions markdown.
    pub fn normalize(&self, default_format: Option<ResponseFormat>) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.request.messages.len() + 2);

        if self.wants_markdown(default_format) {
            messages.push(Message::new(Role::System, MARKDOWN_INSTRUCTION));
        }

        for message in &self.request.messages {
            match Role::parse(&message.role) {
                Some(role) => messages.push(Message::new(role, message.content.clone())),
                None => log::debug!("Dropping message with unrecognized role '{}'", message.role),
            }
        }

        if let Some(message) = self.request.message.as_deref().filter(|message| !message.is_empty()) {
            messages.push(Message::new(Role::User, message));
        }

        messages
    }

    fn wants_markdown(&self, default_format: Option<ResponseFormat>) -> bool {
        match self.request.format.or(default_format) {
            Some(ResponseFormat::Markdown) => true,
            Some(ResponseFormat::Plain) => false,
            None => self
                .final_user_text()
                .is_some_and(|text| text.to_lowercase().contains("markdown")),
        }
    }
}
