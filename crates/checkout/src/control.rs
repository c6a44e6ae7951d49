//! Control channel wire types
//!
//! Commands arrive as a JSON batch of `Message`s; every command yields one
//! tagged `Response` per affected task. Codes are numeric on the wire,
//! HTTP-flavored for the response side.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::TaskKind;

/// Command kinds accepted on the control channel.
///
/// Create/Update/Start/Stop/Reset/Delete are accepted but answered with
/// NotImplemented — single-task management is a declared stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Create,
    Update,
    Start,
    Stop,
    Reset,
    Delete,
    SetupAll,
    StartAll,
    QuickTask,
}

impl MessageKind {
    pub fn code(&self) -> u8 {
        match self {
            MessageKind::Create => 0,
            MessageKind::Update => 1,
            MessageKind::Start => 3,
            MessageKind::Stop => 4,
            MessageKind::Reset => 5,
            MessageKind::Delete => 6,
            MessageKind::SetupAll => 7,
            MessageKind::StartAll => 8,
            MessageKind::QuickTask => 9,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MessageKind::Create),
            1 => Some(MessageKind::Update),
            3 => Some(MessageKind::Start),
            4 => Some(MessageKind::Stop),
            5 => Some(MessageKind::Reset),
            6 => Some(MessageKind::Delete),
            7 => Some(MessageKind::SetupAll),
            8 => Some(MessageKind::StartAll),
            9 => Some(MessageKind::QuickTask),
            _ => None,
        }
    }

    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            MessageKind::Create => "create",
            MessageKind::Update => "update",
            MessageKind::Start => "start",
            MessageKind::Stop => "stop",
            MessageKind::Reset => "reset",
            MessageKind::Delete => "delete",
            MessageKind::SetupAll => "setup_all",
            MessageKind::StartAll => "start_all",
            MessageKind::QuickTask => "quick_task",
        }
    }
}

impl Serialize for MessageKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        MessageKind::from_code(code)
            .ok_or_else(|| D::Error::custom(format!("unknown message code {code}")))
    }
}

/// One inbound control command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "message_code")]
    pub kind: MessageKind,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub task_kind: Option<TaskKind>,
    #[serde(default)]
    pub variant_ids: Option<Vec<u64>>,
}

/// Response kinds, HTTP-flavored numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    ActionSuccess,
    Created,
    InvalidMessage,
    TaskNotFound,
    CannotAction,
    NotImplemented,
}

impl ResponseKind {
    pub fn code(&self) -> u16 {
        match self {
            ResponseKind::ActionSuccess => 200,
            ResponseKind::Created => 201,
            ResponseKind::InvalidMessage => 400,
            ResponseKind::TaskNotFound => 404,
            ResponseKind::CannotAction => 406,
            ResponseKind::NotImplemented => 501,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            200 => Some(ResponseKind::ActionSuccess),
            201 => Some(ResponseKind::Created),
            400 => Some(ResponseKind::InvalidMessage),
            404 => Some(ResponseKind::TaskNotFound),
            406 => Some(ResponseKind::CannotAction),
            501 => Some(ResponseKind::NotImplemented),
            _ => None,
        }
    }
}

impl Serialize for ResponseKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.code())
    }
}

impl<'de> Deserialize<'de> for ResponseKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u16::deserialize(deserializer)?;
        ResponseKind::from_code(code)
            .ok_or_else(|| D::Error::custom(format!("unknown response code {code}")))
    }
}

/// One outbound response, correlated by task identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "response_code")]
    pub kind: ResponseKind,
    #[serde(rename = "task_identifier")]
    pub task_id: String,
}

impl Response {
    pub fn success(task_id: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::ActionSuccess,
            task_id: task_id.into(),
        }
    }

    pub fn cannot_action(task_id: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::CannotAction,
            task_id: task_id.into(),
        }
    }

    pub fn not_found(task_id: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::TaskNotFound,
            task_id: task_id.into(),
        }
    }

    pub fn not_implemented(task_id: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::NotImplemented,
            task_id: task_id.into(),
        }
    }

    pub fn invalid(task_id: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::InvalidMessage,
            task_id: task_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_decodes_from_numeric_code() {
        let msg: Message = serde_json::from_str(
            r#"{"message_code": 9, "task_kind": "variant", "variant_ids": [115604, 118563]}"#,
        )
        .unwrap();
        assert_eq!(msg.kind, MessageKind::QuickTask);
        assert_eq!(msg.task_kind, Some(TaskKind::Variant));
        assert_eq!(msg.variant_ids.as_deref(), Some(&[115604, 118563][..]));
        assert!(msg.task_id.is_none());
    }

    #[test]
    fn unknown_message_code_is_rejected() {
        let result = serde_json::from_str::<Message>(r#"{"message_code": 42}"#);
        assert!(result.is_err());
    }

    #[test]
    fn response_serializes_numeric_code() {
        let json = serde_json::to_string(&Response::success("task-1")).unwrap();
        assert_eq!(
            json,
            r#"{"response_code":200,"task_identifier":"task-1"}"#
        );
    }

    #[test]
    fn response_codes_round_trip() {
        for kind in [
            ResponseKind::ActionSuccess,
            ResponseKind::Created,
            ResponseKind::InvalidMessage,
            ResponseKind::TaskNotFound,
            ResponseKind::CannotAction,
            ResponseKind::NotImplemented,
        ] {
            assert_eq!(ResponseKind::from_code(kind.code()), Some(kind));
        }
    }

    #[test]
    fn batch_of_messages_decodes() {
        let batch: Vec<Message> =
            serde_json::from_str(r#"[{"message_code": 7}, {"message_code": 8}]"#).unwrap();
        assert_eq!(batch[0].kind, MessageKind::SetupAll);
        assert_eq!(batch[1].kind, MessageKind::StartAll);
    }
}
