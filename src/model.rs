// Value objects returned by the API client, plus the private wire
// structs they are decoded from. Wire structs mirror the JSON attribute
// names one to one and decode leniently (missing fields default); each
// maps into its public counterpart through a single From impl, with
// epoch-millisecond fields converted through `datetime_from_millis`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An OAuth token/secret pair. The same shape serves as the application
/// identity, the short-lived temporary credentials, and the long-lived
/// access token. Serializable so callers can persist the access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub token: String,
    pub secret: String,
}

/// Account information for the authorized user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserInfo {
    pub id: String,
    pub user: String,
    pub register_time: DateTime<Utc>,
    pub last_login_time: DateTime<Utc>,
    pub last_modify_time: DateTime<Utc>,
    /// Total quota in bytes.
    pub total_size: i64,
    /// Used quota in bytes.
    pub used_size: i64,
    /// Path to the default notebook.
    pub default_notebook: String,
}

/// A named container of notes, identified by a server-assigned path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotebookInfo {
    pub name: String,
    /// Group the notebook is filed under; empty for ungrouped notebooks.
    pub group: String,
    pub path: String,
    pub notes_num: i64,
    pub create_time: DateTime<Utc>,
    pub modify_time: DateTime<Utc>,
}

/// A single note, including its HTML content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteInfo {
    pub title: String,
    pub author: String,
    pub source: String,
    /// Size of the note in bytes.
    pub size: i64,
    pub create_time: DateTime<Utc>,
    pub modify_time: DateTime<Utc>,
    pub content: String,
}

/// Result of an attachment upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentInfo {
    /// URL of the stored attachment.
    pub url: String,
    /// Source URL for non-image attachments; `None` for images.
    pub src: Option<String>,
}

/// Converts a server epoch-millisecond timestamp into a UTC instant.
/// Out-of-range values clamp to the epoch.
pub(crate) fn datetime_from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub(crate) struct UserWire {
    id: String,
    user: String,
    register_time: i64,
    last_login_time: i64,
    last_modify_time: i64,
    total_size: i64,
    used_size: i64,
    default_notebook: String,
}

impl From<UserWire> for UserInfo {
    fn from(wire: UserWire) -> Self {
        UserInfo {
            id: wire.id,
            user: wire.user,
            register_time: datetime_from_millis(wire.register_time),
            last_login_time: datetime_from_millis(wire.last_login_time),
            last_modify_time: datetime_from_millis(wire.last_modify_time),
            total_size: wire.total_size,
            used_size: wire.used_size,
            default_notebook: wire.default_notebook,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub(crate) struct NotebookWire {
    name: String,
    group: String,
    path: String,
    notes_num: i64,
    create_time: i64,
    modify_time: i64,
}

impl From<NotebookWire> for NotebookInfo {
    fn from(wire: NotebookWire) -> Self {
        NotebookInfo {
            name: wire.name,
            group: wire.group,
            path: wire.path,
            notes_num: wire.notes_num,
            create_time: datetime_from_millis(wire.create_time),
            modify_time: datetime_from_millis(wire.modify_time),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub(crate) struct NoteWire {
    title: String,
    author: String,
    source: String,
    size: i64,
    create_time: i64,
    modify_time: i64,
    content: String,
}

impl From<NoteWire> for NoteInfo {
    fn from(wire: NoteWire) -> Self {
        NoteInfo {
            title: wire.title,
            author: wire.author,
            source: wire.source,
            size: wire.size,
            create_time: datetime_from_millis(wire.create_time),
            modify_time: datetime_from_millis(wire.modify_time),
            content: wire.content,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub(crate) struct AttachmentWire {
    url: String,
    src: String,
}

impl From<AttachmentWire> for AttachmentInfo {
    fn from(wire: AttachmentWire) -> Self {
        AttachmentInfo {
            url: wire.url,
            src: if wire.src.is_empty() {
                None
            } else {
                Some(wire.src)
            },
        }
    }
}

/// Wire shape of responses that carry only a note path.
#[derive(Deserialize, Default)]
#[serde(default)]
pub(crate) struct NotePathWire {
    pub(crate) path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_conversion_round_trips() {
        let millis = 1_700_000_123_456;
        assert_eq!(datetime_from_millis(millis).timestamp_millis(), millis);
    }

    #[test]
    fn out_of_range_millis_clamp_to_epoch() {
        assert_eq!(
            datetime_from_millis(i64::MAX).timestamp_millis(),
            DateTime::<Utc>::UNIX_EPOCH.timestamp_millis()
        );
    }

    #[test]
    fn notebook_wire_maps_fields() {
        let wire: NotebookWire = serde_json::from_str(
            r#"{"name":"Work","group":"Projects","path":"/nb/1",
                "notes_num":4,"create_time":1000,"modify_time":2000}"#,
        )
        .unwrap();
        let info = NotebookInfo::from(wire);
        assert_eq!(info.name, "Work");
        assert_eq!(info.group, "Projects");
        assert_eq!(info.path, "/nb/1");
        assert_eq!(info.notes_num, 4);
        assert_eq!(info.create_time.timestamp_millis(), 1000);
        assert_eq!(info.modify_time.timestamp_millis(), 2000);
    }

    #[test]
    fn notebook_wire_tolerates_missing_and_unknown_fields() {
        let wire: NotebookWire =
            serde_json::from_str(r#"{"name":"Inbox","path":"/nb/2","extra":true}"#).unwrap();
        let info = NotebookInfo::from(wire);
        assert_eq!(info.name, "Inbox");
        assert_eq!(info.group, "");
        assert_eq!(info.notes_num, 0);
    }

    #[test]
    fn empty_attachment_src_becomes_none() {
        let image: AttachmentWire =
            serde_json::from_str(r#"{"url":"http://files.example.com/a.png","src":""}"#).unwrap();
        assert_eq!(AttachmentInfo::from(image).src, None);

        let document: AttachmentWire = serde_json::from_str(
            r#"{"url":"http://files.example.com/a.pdf","src":"http://files.example.com/dl/a.pdf"}"#,
        )
        .unwrap();
        assert_eq!(
            AttachmentInfo::from(document).src.as_deref(),
            Some("http://files.example.com/dl/a.pdf")
        );
    }
}
