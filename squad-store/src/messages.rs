//! Message bus: insert, inbox, previews, read-on-demand, threads.
//!
//! The two-step notification/read pattern bounds what an LLM pays to scan
//! its inbox: `check_inbox_previews` exposes only 50-character previews, and
//! the full content is fetched (and marked read) by `read_message`.

use crate::documents::{MessageDoc, MessagePreview};
use crate::{backend, is_duplicate_key};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Collection;
use squad_core::{
    AgentId, EntityIdType, MessageId, MessagePriority, MessageType, SquadResult, StorageError,
    ThreadId,
};
use tracing::debug;

/// Preview length exposed by inbox notifications, in characters.
pub const PREVIEW_CHARS: usize = 50;

/// Default number of previews returned by `check_inbox_previews`.
pub const DEFAULT_PREVIEW_LIMIT: i64 = 10;

/// Render the notification preview of a message body: the first 50
/// characters, with `"..."` appended iff the content was truncated.
pub fn preview_of(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Typed facade over the messages collection.
#[derive(Debug, Clone)]
pub struct MessageBus {
    collection: Collection<MessageDoc>,
}

impl MessageBus {
    pub fn new(collection: Collection<MessageDoc>) -> Self {
        Self { collection }
    }

    /// Insert a new message. `thread_id` defaults to a fresh thread and
    /// `priority` to normal. Returns the stored record.
    pub async fn send_message(
        &self,
        from_agent: &AgentId,
        to_agent: &AgentId,
        content: impl Into<String>,
        message_type: MessageType,
        thread_id: Option<ThreadId>,
        priority: Option<MessagePriority>,
    ) -> SquadResult<MessageDoc> {
        let priority = priority.unwrap_or_default();
        let message = MessageDoc {
            message_id: MessageId::new_v4().to_string(),
            from_agent: from_agent.to_string(),
            to_agent: to_agent.to_string(),
            content: content.into(),
            message_type,
            thread_id: thread_id.unwrap_or_else(ThreadId::new_v4).to_string(),
            priority,
            priority_rank: priority.rank(),
            read_at: None,
            created_at: Utc::now(),
        };

        self.collection
            .insert_one(&message, None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    StorageError::Duplicate {
                        entity: "message",
                        id: message.message_id.clone(),
                    }
                } else {
                    backend(e)
                }
            })?;

        debug!(
            message_id = %message.message_id,
            from = %message.from_agent,
            to = %message.to_agent,
            "Message sent"
        );
        Ok(message)
    }

    /// Unread messages for an agent, high priority first, FIFO inside each
    /// priority level.
    pub async fn get_inbox(
        &self,
        agent_id: &AgentId,
        limit: Option<i64>,
    ) -> SquadResult<Vec<MessageDoc>> {
        let options = FindOptions::builder()
            .sort(doc! { "priorityRank": -1, "createdAt": 1 })
            .limit(limit)
            .build();
        let cursor = self
            .collection
            .find(
                doc! { "toAgent": agent_id.to_string(), "readAt": null },
                options,
            )
            .await
            .map_err(backend)?;
        cursor.try_collect().await.map_err(|e| backend(e).into())
    }

    /// Lightweight unread notifications: metadata plus a 50-character
    /// preview, same ordering as [`MessageBus::get_inbox`].
    pub async fn check_inbox_previews(
        &self,
        agent_id: &AgentId,
        limit: Option<i64>,
    ) -> SquadResult<Vec<MessagePreview>> {
        let inbox = self
            .get_inbox(agent_id, Some(limit.unwrap_or(DEFAULT_PREVIEW_LIMIT)))
            .await?;
        Ok(inbox
            .into_iter()
            .map(|m| MessagePreview {
                message_id: m.message_id,
                from_agent: m.from_agent,
                message_type: m.message_type,
                priority: m.priority,
                preview: preview_of(&m.content),
                created_at: m.created_at,
            })
            .collect())
    }

    /// Fetch the full message and mark it read in one atomic update.
    ///
    /// The read-mark is idempotent: a second call returns the same record
    /// with the `readAt` of the first read. Returns `None` for unknown ids.
    pub async fn read_message(&self, message_id: &MessageId) -> SquadResult<Option<MessageDoc>> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let marked = self
            .collection
            .find_one_and_update(
                doc! { "messageId": message_id.to_string(), "readAt": null },
                doc! { "$set": { "readAt": mongodb::bson::DateTime::now() } },
                options,
            )
            .await
            .map_err(backend)?;

        if marked.is_some() {
            return Ok(marked);
        }

        // Already read (keep the original readAt) or unknown.
        self.collection
            .find_one(doc! { "messageId": message_id.to_string() }, None)
            .await
            .map_err(|e| backend(e).into())
    }

    /// Every message of a thread, ascending by insertion time.
    pub async fn get_thread(&self, thread_id: &ThreadId) -> SquadResult<Vec<MessageDoc>> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": 1 })
            .build();
        let cursor = self
            .collection
            .find(doc! { "threadId": thread_id.to_string() }, options)
            .await
            .map_err(backend)?;
        cursor.try_collect().await.map_err(|e| backend(e).into())
    }

    /// Number of unread messages for an agent.
    pub async fn count_unread(&self, agent_id: &AgentId) -> SquadResult<u64> {
        self.collection
            .count_documents(
                doc! { "toAgent": agent_id.to_string(), "readAt": null },
                None,
            )
            .await
            .map_err(|e| backend(e).into())
    }

    /// Most recent messages across all agents (REST index route).
    pub async fn list_recent(&self, limit: i64) -> SquadResult<Vec<MessageDoc>> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .limit(limit)
            .build();
        let cursor = self
            .collection
            .find(doc! {}, options)
            .await
            .map_err(backend)?;
        cursor.try_collect().await.map_err(|e| backend(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_content_untouched() {
        assert_eq!(preview_of("hello"), "hello");
        assert_eq!(preview_of(""), "");
    }

    #[test]
    fn test_preview_exactly_fifty_chars_no_ellipsis() {
        let content = "a".repeat(50);
        assert_eq!(preview_of(&content), content);
    }

    #[test]
    fn test_preview_fifty_one_chars_truncates() {
        let content = "b".repeat(51);
        let preview = preview_of(&content);
        assert_eq!(preview.chars().count(), 53);
        assert!(preview.ends_with("..."));
        assert!(preview.starts_with(&"b".repeat(50)));
    }

    #[test]
    fn test_preview_counts_characters_not_bytes() {
        // 51 multi-byte characters must still truncate at 50 characters
        let content = "é".repeat(51);
        let preview = preview_of(&content);
        assert_eq!(preview.chars().count(), 53);
        assert!(preview.ends_with("..."));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Previews are exactly min(50, len) characters plus "..." iff the
        /// content was truncated.
        #[test]
        fn prop_preview_length_contract(content in ".{0,200}") {
            let preview = preview_of(&content);
            let content_chars = content.chars().count();
            if content_chars <= PREVIEW_CHARS {
                prop_assert_eq!(preview.as_str(), content.as_str());
            } else {
                prop_assert_eq!(preview.chars().count(), PREVIEW_CHARS + 3);
                prop_assert!(preview.ends_with("..."));
                let head: String = content.chars().take(PREVIEW_CHARS).collect();
                prop_assert!(preview.starts_with(&head));
            }
        }
    }
}
