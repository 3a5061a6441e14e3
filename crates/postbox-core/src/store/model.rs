//! Message content types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Result;
use crate::identity::{IdentityDirectory, User, UserId};

/// Unique identifier for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub i64);

impl MessageId {
    /// Create a new message ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which recipient list a fan-out row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecipientClass {
    /// Primary recipients.
    To,
    /// Carbon copy.
    Cc,
    /// Blind carbon copy.
    Bcc,
}

impl RecipientClass {
    /// All classes in storage order.
    pub const ALL: [Self; 3] = [Self::To, Self::Cc, Self::Bcc];

    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TO" => Some(Self::To),
            "CC" => Some(Self::Cc),
            "BCC" => Some(Self::Bcc),
            _ => None,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::To => "TO",
            Self::Cc => "CC",
            Self::Bcc => "BCC",
        }
    }
}

/// The editable part of a message: recipients, subject and body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composition {
    /// Primary recipients.
    pub to: Vec<UserId>,
    /// Carbon-copy recipients.
    pub cc: Vec<UserId>,
    /// Blind carbon-copy recipients.
    pub bcc: Vec<UserId>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

impl Composition {
    /// A composition addressed to `to` with no copies.
    #[must_use]
    pub fn new(to: Vec<UserId>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to,
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Set the carbon-copy list.
    #[must_use]
    pub fn with_cc(mut self, cc: Vec<UserId>) -> Self {
        self.cc = cc;
        self
    }

    /// Set the blind carbon-copy list.
    #[must_use]
    pub fn with_bcc(mut self, bcc: Vec<UserId>) -> Self {
        self.bcc = bcc;
        self
    }

    /// Recipients of one class.
    #[must_use]
    pub fn recipients(&self, class: RecipientClass) -> &[UserId] {
        match class {
            RecipientClass::To => &self.to,
            RecipientClass::Cc => &self.cc,
            RecipientClass::Bcc => &self.bcc,
        }
    }
}

/// A stored message. Users are referenced by id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier.
    pub id: MessageId,
    /// Author.
    pub sender: UserId,
    /// Primary recipients, in the order they were addressed.
    pub to: Vec<UserId>,
    /// Carbon-copy recipients.
    pub cc: Vec<UserId>,
    /// Blind carbon-copy recipients.
    pub bcc: Vec<UserId>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// When the message was last saved (drafts) or sent.
    pub sent_at: DateTime<Utc>,
}

impl Message {
    /// The editable content of this message.
    #[must_use]
    pub fn composition(&self) -> Composition {
        Composition {
            to: self.to.clone(),
            cc: self.cc.clone(),
            bcc: self.bcc.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
        }
    }

    /// Resolve sender and recipient ids against `directory`.
    ///
    /// A sender that no longer resolves becomes `None` and unresolvable
    /// recipients are omitted; neither fails the read.
    ///
    /// # Errors
    ///
    /// Returns an error only if the directory lookup itself fails.
    pub async fn resolve<D: IdentityDirectory>(&self, directory: &D) -> Result<ResolvedMessage> {
        let mut cache: HashMap<UserId, Option<User>> = HashMap::new();

        let sender = lookup(directory, &mut cache, self.sender).await?;
        if sender.is_none() {
            warn!("Message {} has dangling sender {}", self.id, self.sender);
        }

        let mut resolved = [Vec::new(), Vec::new(), Vec::new()];
        for (slot, ids) in resolved.iter_mut().zip([&self.to, &self.cc, &self.bcc]) {
            for &id in ids {
                match lookup(directory, &mut cache, id).await? {
                    Some(user) => slot.push(user),
                    None => warn!("Message {} has dangling recipient {id}", self.id),
                }
            }
        }
        let [to, cc, bcc] = resolved;

        Ok(ResolvedMessage {
            id: self.id,
            sender,
            to,
            cc,
            bcc,
            subject: self.subject.clone(),
            body: self.body.clone(),
            sent_at: self.sent_at,
        })
    }
}

async fn lookup<D: IdentityDirectory>(
    directory: &D,
    cache: &mut HashMap<UserId, Option<User>>,
    id: UserId,
) -> Result<Option<User>> {
    if let Some(hit) = cache.get(&id) {
        return Ok(hit.clone());
    }
    let user = directory.find_by_id(id).await?;
    cache.insert(id, user.clone());
    Ok(user)
}

/// A message with its user references resolved for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMessage {
    /// Unique identifier.
    pub id: MessageId,
    /// Author, or `None` if the sender's record no longer exists.
    pub sender: Option<User>,
    /// Primary recipients that still resolve.
    pub to: Vec<User>,
    /// Carbon-copy recipients that still resolve.
    pub cc: Vec<User>,
    /// Blind carbon-copy recipients that still resolve.
    pub bcc: Vec<User>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// When the message was last saved or sent.
    pub sent_at: DateTime<Utc>,
}

impl ResolvedMessage {
    /// Sender display string, or a placeholder when the sender is gone.
    #[must_use]
    pub fn sender_display(&self) -> String {
        self.sender
            .as_ref()
            .map_or_else(|| "(unknown sender)".to_string(), User::display)
    }
}
