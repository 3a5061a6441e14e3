//! Mailbox entry types.

use serde::{Deserialize, Serialize};

use crate::identity::UserId;
use crate::store::Message;

/// Folder an entry is filed under. Trash is the `is_deleted` flag, not a
/// folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Folder {
    /// Received messages.
    Inbox,
    /// Messages the user sent.
    Sent,
    /// Unsent messages the user is still editing.
    Drafts,
}

impl Folder {
    /// All folders in display order.
    pub const ALL: [Self; 3] = [Self::Inbox, Self::Sent, Self::Drafts];

    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INBOX" => Some(Self::Inbox),
            "SENT" => Some(Self::Sent),
            "DRAFTS" => Some(Self::Drafts),
            _ => None,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inbox => "INBOX",
            Self::Sent => "SENT",
            Self::Drafts => "DRAFTS",
        }
    }

    /// Human-readable display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Inbox => "Inbox",
            Self::Sent => "Sent",
            Self::Drafts => "Drafts",
        }
    }
}

/// One user's view of a shared message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxEntry {
    /// Owner of this view.
    pub user: UserId,
    /// The shared message.
    pub message: Message,
    /// Folder placement.
    pub folder: Folder,
    /// Read flag. Only ever goes from false to true.
    pub is_read: bool,
    /// Soft-delete (trash) flag. Only ever goes from false to true.
    pub is_deleted: bool,
}

/// Entry counts for one folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSummary {
    /// The folder.
    pub folder: Folder,
    /// Entries not marked deleted.
    pub total: u32,
    /// Entries neither read nor deleted.
    pub unread: u32,
}
