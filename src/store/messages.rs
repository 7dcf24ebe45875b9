//! Chat messages and the fragments attached to assistant results.

use super::now_timestamp;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Assistant => "ASSISTANT",
        }
    }

    fn parse(raw: &str) -> Self {
        if raw == "ASSISTANT" {
            Self::Assistant
        } else {
            Self::User
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Result,
    Error,
}

impl MessageType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Result => "RESULT",
            Self::Error => "ERROR",
        }
    }

    fn parse(raw: &str) -> Self {
        if raw == "ERROR" {
            Self::Error
        } else {
            Self::Result
        }
    }
}

/// Generated artifact of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub id: String,
    pub message_id: String,
    pub sandbox_url: String,
    pub title: String,
    pub files: HashMap<String, String>,
    pub created_at: String,
}

/// Fragment fields supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFragment {
    pub sandbox_url: String,
    pub title: String,
    pub files: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub project_id: String,
    pub content: String,
    pub role: MessageRole,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub created_at: String,
    pub fragment: Option<Fragment>,
}

fn insert_message(
    conn: &Connection,
    project_id: &str,
    content: &str,
    role: MessageRole,
    kind: MessageType,
) -> Result<Message> {
    let message = Message {
        id: uuid::Uuid::new_v4().to_string(),
        project_id: project_id.to_string(),
        content: content.to_string(),
        role,
        kind,
        created_at: now_timestamp(),
        fragment: None,
    };
    conn.execute(
        "INSERT INTO messages (id, project_id, content, role, type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            message.id,
            message.project_id,
            message.content,
            role.as_str(),
            kind.as_str(),
            message.created_at
        ],
    )?;
    super::projects::touch_project(conn, project_id)?;
    Ok(message)
}

/// Store the user's instruction.
pub fn create_user_message(conn: &Connection, project_id: &str, content: &str) -> Result<Message> {
    insert_message(conn, project_id, content, MessageRole::User, MessageType::Result)
}

/// Store an assistant reply, with its fragment when the run succeeded.
/// Message and fragment are written in one transaction.
pub fn create_assistant_message(
    conn: &Connection,
    project_id: &str,
    content: &str,
    kind: MessageType,
    fragment: Option<NewFragment>,
) -> Result<Message> {
    let tx = conn.unchecked_transaction()?;
    let mut message = insert_message(&tx, project_id, content, MessageRole::Assistant, kind)?;

    if let Some(new) = fragment {
        let files_json = serde_json::to_string(&new.files)
            .map_err(|e| anyhow::anyhow!("Failed to serialize fragment files: {e}"))?;
        let fragment = Fragment {
            id: uuid::Uuid::new_v4().to_string(),
            message_id: message.id.clone(),
            sandbox_url: new.sandbox_url,
            title: new.title,
            files: new.files,
            created_at: now_timestamp(),
        };
        tx.execute(
            "INSERT INTO fragments (id, message_id, sandbox_url, title, files, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                fragment.id,
                fragment.message_id,
                fragment.sandbox_url,
                fragment.title,
                files_json,
                fragment.created_at
            ],
        )?;
        message.fragment = Some(fragment);
    }

    tx.commit()?;
    Ok(message)
}

const SELECT_MESSAGE: &str = "SELECT id, project_id, content, role, type, created_at FROM messages";

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(3)?;
    let kind: String = row.get(4)?;
    Ok(Message {
        id: row.get(0)?,
        project_id: row.get(1)?,
        content: row.get(2)?,
        role: MessageRole::parse(&role),
        kind: MessageType::parse(&kind),
        created_at: row.get(5)?,
        fragment: None,
    })
}

fn load_fragment(conn: &Connection, message_id: &str) -> Result<Option<Fragment>> {
    let row = conn
        .query_row(
            "SELECT id, message_id, sandbox_url, title, files, created_at
             FROM fragments WHERE message_id = ?1",
            params![message_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((id, message_id, sandbox_url, title, files_json, created_at)) = row else {
        return Ok(None);
    };
    let files: HashMap<String, String> = serde_json::from_str(&files_json)
        .map_err(|e| anyhow::anyhow!("Failed to deserialize fragment files: {e}"))?;
    Ok(Some(Fragment {
        id,
        message_id,
        sandbox_url,
        title,
        files,
        created_at,
    }))
}

/// All messages of a project, oldest first, with their fragments.
pub fn list_messages(conn: &Connection, project_id: &str) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_MESSAGE} WHERE project_id = ?1 ORDER BY created_at ASC, rowid ASC"
    ))?;
    let mut messages = stmt
        .query_map(params![project_id], message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for message in &mut messages {
        message.fragment = load_fragment(conn, &message.id)?;
    }
    Ok(messages)
}

/// The last `limit` messages of a project, returned oldest first.
pub fn recent_history(conn: &Connection, project_id: &str, limit: usize) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_MESSAGE} WHERE project_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
    ))?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut messages = stmt
        .query_map(params![project_id, limit], message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    messages.reverse();
    Ok(messages)
}
