use serde::{Deserialize, Serialize};

use crate::error::ReverbError;

pub const CONNECTION_ESTABLISHED: &str = "pusher:connection_established";
pub const PING: &str = "pusher:ping";
pub const PONG: &str = "pusher:pong";
pub const ERROR: &str = "pusher:error";
pub const SUBSCRIBE: &str = "pusher:subscribe";
pub const UNSUBSCRIBE: &str = "pusher:unsubscribe";

/// Pusher protocol message structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PusherMessage {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub channel: Option<String>,
}

impl PusherMessage {
    pub fn parse(text: &str) -> Result<Self, ReverbError> {
        serde_json::from_str(text).map_err(|e| ReverbError::MalformedFrame(e.to_string()))
    }

    /// Payload as the string the sink receives.
    ///
    /// Servers usually send `data` as a JSON-encoded string; anything else is
    /// re-serialized so the sink always gets text.
    pub fn data_string(&self) -> String {
        match &self.data {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Decode the nested `pusher:connection_established` payload.
    pub fn connection_data(&self) -> Result<ConnectionData, ReverbError> {
        let parsed = match &self.data {
            serde_json::Value::String(s) => serde_json::from_str::<ConnectionData>(s),
            other => serde_json::from_value::<ConnectionData>(other.clone()),
        };
        parsed.map_err(|e| {
            ReverbError::MalformedFrame(format!("invalid connection_established data: {}", e))
        })
    }

    pub fn error_data(&self) -> Result<ErrorData, ReverbError> {
        let parsed = match &self.data {
            serde_json::Value::String(s) => serde_json::from_str::<ErrorData>(s),
            other => serde_json::from_value::<ErrorData>(other.clone()),
        };
        parsed.map_err(|e| ReverbError::MalformedFrame(format!("invalid error data: {}", e)))
    }
}

/// Connection data received after establishing connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionData {
    pub socket_id: String,
    #[serde(default)]
    pub activity_timeout: Option<u32>,
}

/// Error data structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    #[serde(default)]
    pub code: Option<u32>,
    pub message: String,
}

/// Subscribe message structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SubscribeMessage {
    pub event: String,
    pub data: SubscribeData,
}

/// Subscribe data structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SubscribeData {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct UnsubscribeMessage {
    pub event: String,
    pub data: UnsubscribeData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct UnsubscribeData {
    pub channel: String,
}

pub(crate) fn subscribe_frame(channel: &str, auth: Option<String>) -> Result<String, ReverbError> {
    let message = SubscribeMessage {
        event: SUBSCRIBE.to_string(),
        data: SubscribeData {
            channel: channel.to_string(),
            auth,
        },
    };
    Ok(serde_json::to_string(&message)?)
}

pub(crate) fn unsubscribe_frame(channel: &str) -> Result<String, ReverbError> {
    let message = UnsubscribeMessage {
        event: UNSUBSCRIBE.to_string(),
        data: UnsubscribeData {
            channel: channel.to_string(),
        },
    };
    Ok(serde_json::to_string(&message)?)
}

pub(crate) fn pong_frame() -> String {
    serde_json::json!({ "event": PONG }).to_string()
}

pub(crate) fn ping_frame() -> String {
    serde_json::json!({ "event": PING, "data": {} }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn public_subscribe_has_no_auth_field() {
        let frame: Value = serde_json::from_str(&subscribe_frame("chat", None).unwrap()).unwrap();
        assert_eq!(
            frame,
            json!({"event": "pusher:subscribe", "data": {"channel": "chat"}})
        );
    }

    #[test]
    fn private_subscribe_embeds_auth_verbatim() {
        let frame: Value = serde_json::from_str(
            &subscribe_frame("private-room", Some("k1:abcdef".to_string())).unwrap(),
        )
        .unwrap();
        assert_eq!(frame["data"]["auth"], "k1:abcdef");
        assert_eq!(frame["data"]["channel"], "private-room");
    }

    #[test]
    fn unsubscribe_frame_shape() {
        let frame: Value = serde_json::from_str(&unsubscribe_frame("chat").unwrap()).unwrap();
        assert_eq!(
            frame,
            json!({"event": "pusher:unsubscribe", "data": {"channel": "chat"}})
        );
    }

    #[test]
    fn pong_frame_has_only_event() {
        let frame: Value = serde_json::from_str(&pong_frame()).unwrap();
        assert_eq!(frame, json!({"event": "pusher:pong"}));
    }

    #[test]
    fn connection_data_is_decoded_from_nested_string() {
        let msg = PusherMessage::parse(
            r#"{"event":"pusher:connection_established","data":"{\"socket_id\":\"abc123\",\"activity_timeout\":30}"}"#,
        )
        .unwrap();
        let data = msg.connection_data().unwrap();
        assert_eq!(data.socket_id, "abc123");
        assert_eq!(data.activity_timeout, Some(30));
    }

    #[test]
    fn connection_data_without_socket_id_is_malformed() {
        let msg = PusherMessage::parse(
            r#"{"event":"pusher:connection_established","data":"{\"activity_timeout\":30}"}"#,
        )
        .unwrap();
        assert!(matches!(
            msg.connection_data(),
            Err(ReverbError::MalformedFrame(_))
        ));
    }

    #[test]
    fn object_data_is_reserialized() {
        let msg =
            PusherMessage::parse(r#"{"event":"message","channel":"chat","data":{"a":1}}"#).unwrap();
        assert_eq!(msg.data_string(), r#"{"a":1}"#);
    }

    #[test]
    fn missing_event_is_malformed() {
        assert!(matches!(
            PusherMessage::parse(r#"{"channel":"chat"}"#),
            Err(ReverbError::MalformedFrame(_))
        ));
        assert!(matches!(
            PusherMessage::parse("not json"),
            Err(ReverbError::MalformedFrame(_))
        ));
    }

    #[test]
    fn error_data_accepts_object_payload() {
        let msg = PusherMessage::parse(
            r#"{"event":"pusher:error","data":{"code":4001,"message":"Application does not exist"}}"#,
        )
        .unwrap();
        let data = msg.error_data().unwrap();
        assert_eq!(data.code, Some(4001));
        assert_eq!(data.message, "Application does not exist");
    }
}
