//! Inbound activities, outbound replies and conversation addressing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// An item posted to the bot by the transport layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub text: String,
    /// Structured payload (card submissions, postbacks)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl Activity {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            value: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Trimmed text, the form triggers and prompts match against
    pub fn trimmed(&self) -> &str {
        self.text.trim()
    }
}

/// A message posted back to the user during a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Identity of one user inside one conversation on one channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub channel_id: String,
    pub conversation_id: String,
    pub user_id: String,
}

impl ConversationKey {
    pub fn new(
        channel_id: impl Into<String>,
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Storage address of the data bag for `scope`. Ids are escaped so
    /// distinct keys never share an address.
    pub fn address(&self, scope: Scope) -> String {
        let channel = escape(&self.channel_id);
        match scope {
            Scope::User => format!("user/{channel}/{}", escape(&self.user_id)),
            Scope::Conversation => {
                format!("conversation/{channel}/{}", escape(&self.conversation_id))
            }
            Scope::PrivateConversation => format!(
                "private/{channel}/{}/{}",
                escape(&self.conversation_id),
                escape(&self.user_id)
            ),
        }
    }

    /// Key under which the dialog stack snapshot is stored
    pub fn snapshot_key(&self) -> String {
        self.address(Scope::PrivateConversation)
    }
}

/// Percent-escape the separator and the escape character itself
fn escape(id: &str) -> Cow<'_, str> {
    if id.contains(['/', '%']) {
        Cow::Owned(id.replace('%', "%25").replace('/', "%2F"))
    } else {
        Cow::Borrowed(id)
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.channel_id, self.conversation_id, self.user_id
        )
    }
}

/// Data bag scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Follows the user across conversations
    User,
    /// Shared by every user in the conversation
    Conversation,
    /// One user inside one conversation
    PrivateConversation,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::User, Scope::Conversation, Scope::PrivateConversation];
}
