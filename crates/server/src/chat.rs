//! Chat records and CRUD over the backing store.
//!
//! Thin glue: users live at `user:<username>`, messages at `message:<id>`,
//! everything is a JSON document. This module is also where usernames get
//! prefixed into ring keys — the placement engine never sees a bare
//! username.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use admin::{MessageFeed, UserDirectory};
use registry::{get_typed, set_typed, KvStore, MessageRef, StoreError};

use crate::error::ApiError;

const USER_PREFIX: &str = "user:";
const MESSAGE_PREFIX: &str = "message:";

/// Ring key for a username.
pub fn user_key(username: &str) -> String {
    format!("{USER_PREFIX}{username}")
}

fn message_key(id: &str) -> String {
    format!("{MESSAGE_PREFIX}{id}")
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Persisted user record, profile fields included.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar: String,
    pub status: String,
    pub theme: String,
    pub notifications: bool,
    pub privacy: String,
    pub joined_at: u64,
    pub last_active: u64,
    pub created_at: u64,
}

/// Persisted message record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub from: String,
    pub to: String,
    pub text: String,
    pub timestamp: u64,
    pub read: bool,
}

/// One conversation partner with the latest message and unread count.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub username: String,
    pub name: String,
    pub last_message: Message,
    pub unread_count: u64,
}

/// Aggregate message statistics for a profile page.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub total_messages: u64,
    pub active_conversations: u64,
}

/// Partial profile update; absent fields are left untouched.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub status: Option<String>,
    pub theme: Option<String>,
    pub notifications: Option<bool>,
    pub privacy: Option<String>,
}

impl ProfileUpdate {
    /// Names of the fields present in this update, for the audit log.
    pub fn updated_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.bio.is_some() {
            fields.push("bio");
        }
        if self.avatar.is_some() {
            fields.push("avatar");
        }
        if self.status.is_some() {
            fields.push("status");
        }
        if self.theme.is_some() {
            fields.push("theme");
        }
        if self.notifications.is_some() {
            fields.push("notifications");
        }
        if self.privacy.is_some() {
            fields.push("privacy");
        }
        fields
    }
}

/// User and message CRUD over the shared [`KvStore`].
pub struct ChatStore {
    store: Arc<dyn KvStore>,
}

impl ChatStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn get_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        get_typed(&*self.store, &user_key(username)).await
    }

    async fn put_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        set_typed(&*self.store, &user_key(&user.username), user).await
    }

    async fn require_user(&self, username: &str) -> Result<UserRecord, ApiError> {
        self.get_user(username).await?.ok_or(ApiError::NotFound {
            what: "user".to_string(),
        })
    }

    /// Create a user with profile defaults. Fails if the username is taken.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        name: &str,
    ) -> Result<UserRecord, ApiError> {
        if self.get_user(username).await?.is_some() {
            return Err(ApiError::Conflict {
                what: "username".to_string(),
            });
        }

        let now = now_ms();
        let user = UserRecord {
            username: username.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            email: format!("{username}@example.com"),
            bio: String::new(),
            avatar: String::new(),
            status: "online".to_string(),
            theme: "light".to_string(),
            notifications: true,
            privacy: "public".to_string(),
            joined_at: now,
            last_active: now,
            created_at: now,
        };
        self.put_user(&user).await?;
        info!(username, "user created");
        Ok(user)
    }

    /// Check a username/password pair.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserRecord, ApiError> {
        match self.get_user(username).await? {
            Some(user) if user.password == password => Ok(user),
            _ => Err(ApiError::Unauthorized {
                message: "invalid credentials".to_string(),
            }),
        }
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let values = self.store.get_by_prefix(USER_PREFIX).await?;
        values
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(StoreError::from))
            .collect()
    }

    async fn list_messages(&self) -> Result<Vec<Message>, StoreError> {
        let values = self.store.get_by_prefix(MESSAGE_PREFIX).await?;
        values
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(StoreError::from))
            .collect()
    }

    /// Store a new message. Both endpoints must exist.
    pub async fn send_message(
        &self,
        from: &str,
        to: &str,
        text: &str,
    ) -> Result<Message, ApiError> {
        self.require_user(from).await?;
        self.require_user(to).await?;

        let id = format!("{}-{:08x}", now_ms(), rand::thread_rng().gen::<u32>());
        let message = Message {
            id: id.clone(),
            from: from.to_string(),
            to: to.to_string(),
            text: text.to_string(),
            timestamp: now_ms(),
            read: false,
        };
        set_typed(&*self.store, &message_key(&id), &message).await?;
        Ok(message)
    }

    /// All messages touching a user, newest first.
    pub async fn inbox(&self, username: &str) -> Result<Vec<Message>, StoreError> {
        let mut messages: Vec<Message> = self
            .list_messages()
            .await?
            .into_iter()
            .filter(|m| m.from == username || m.to == username)
            .collect();
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(messages)
    }

    /// Mark messages from `other` to `username` as read; returns how many.
    pub async fn mark_read(&self, username: &str, other: &str) -> Result<u64, StoreError> {
        let unread: Vec<Message> = self
            .list_messages()
            .await?
            .into_iter()
            .filter(|m| m.to == username && m.from == other && !m.read)
            .collect();

        let updated = unread.len() as u64;
        for mut message in unread {
            message.read = true;
            set_typed(&*self.store, &message_key(&message.id), &message).await?;
        }
        Ok(updated)
    }

    /// Conversation list for a user, most recent partner first.
    pub async fn conversations(&self, username: &str) -> Result<Vec<Conversation>, StoreError> {
        let mut partners: BTreeMap<String, (Message, u64)> = BTreeMap::new();
        for message in self.inbox(username).await? {
            let partner = if message.to == username {
                message.from.clone()
            } else {
                message.to.clone()
            };
            let unread = u64::from(message.to == username && !message.read);
            match partners.entry(partner) {
                Entry::Occupied(mut entry) => {
                    let (last, count) = entry.get_mut();
                    if message.timestamp > last.timestamp {
                        *last = message;
                    }
                    *count += unread;
                }
                Entry::Vacant(entry) => {
                    entry.insert((message, unread));
                }
            }
        }

        let mut conversations = Vec::new();
        for (partner, (last_message, unread_count)) in partners {
            // Skip partners whose account no longer exists.
            if let Some(user) = self.get_user(&partner).await? {
                conversations.push(Conversation {
                    username: partner,
                    name: user.name,
                    last_message,
                    unread_count,
                });
            }
        }
        conversations.sort_by(|a, b| b.last_message.timestamp.cmp(&a.last_message.timestamp));
        Ok(conversations)
    }

    /// Message statistics for a profile page.
    pub async fn profile_stats(&self, username: &str) -> Result<ProfileStats, StoreError> {
        let messages = self.list_messages().await?;
        let sent = messages.iter().filter(|m| m.from == username).count() as u64;
        let received = messages.iter().filter(|m| m.to == username).count() as u64;

        let partners: std::collections::BTreeSet<&str> = messages
            .iter()
            .filter(|m| m.from == username || m.to == username)
            .map(|m| {
                if m.from == username {
                    m.to.as_str()
                } else {
                    m.from.as_str()
                }
            })
            .collect();

        Ok(ProfileStats {
            messages_sent: sent,
            messages_received: received,
            total_messages: sent + received,
            active_conversations: partners.len() as u64,
        })
    }

    /// Apply a partial profile update and bump `last_active`.
    pub async fn update_profile(
        &self,
        username: &str,
        update: &ProfileUpdate,
    ) -> Result<UserRecord, ApiError> {
        let mut user = self.require_user(username).await?;
        if let Some(name) = &update.name {
            user.name = name.clone();
        }
        if let Some(bio) = &update.bio {
            user.bio = bio.clone();
        }
        if let Some(avatar) = &update.avatar {
            user.avatar = avatar.clone();
        }
        if let Some(status) = &update.status {
            user.status = status.clone();
        }
        if let Some(theme) = &update.theme {
            user.theme = theme.clone();
        }
        if let Some(notifications) = update.notifications {
            user.notifications = notifications;
        }
        if let Some(privacy) = &update.privacy {
            user.privacy = privacy.clone();
        }
        user.last_active = now_ms();
        self.put_user(&user).await?;
        Ok(user)
    }

    /// Replace the password after verifying the current one.
    pub async fn change_password(
        &self,
        username: &str,
        current: &str,
        new: &str,
    ) -> Result<(), ApiError> {
        let mut user = self.require_user(username).await?;
        if user.password != current {
            return Err(ApiError::Unauthorized {
                message: "current password is incorrect".to_string(),
            });
        }
        user.password = new.to_string();
        self.put_user(&user).await?;
        Ok(())
    }

    /// Delete a user and every message touching them.
    pub async fn delete_account(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let user = self.require_user(username).await?;
        if user.password != password {
            return Err(ApiError::Unauthorized {
                message: "password is incorrect".to_string(),
            });
        }

        self.store.delete(&user_key(username)).await?;
        for message in self.inbox(username).await? {
            self.store.delete(&message_key(&message.id)).await?;
        }
        info!(username, "account deleted");
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for ChatStore {
    async fn user_keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .list_users()
            .await?
            .into_iter()
            .map(|u| user_key(&u.username))
            .collect())
    }

    async fn display_name(&self, key: &str) -> Result<Option<String>, StoreError> {
        let username = key.strip_prefix(USER_PREFIX).unwrap_or(key);
        Ok(self.get_user(username).await?.map(|u| u.name))
    }
}

#[async_trait]
impl MessageFeed for ChatStore {
    async fn message_refs(&self) -> Result<Vec<MessageRef>, StoreError> {
        Ok(self
            .list_messages()
            .await?
            .into_iter()
            .map(|m| MessageRef {
                from: user_key(&m.from),
                to: user_key(&m.to),
            })
            .collect())
    }
}
