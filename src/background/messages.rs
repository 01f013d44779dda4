//! Usage: Cross-domain message contract (`{videoId}`, `"authorize"`, `"isAuthorized"`).

use crate::shared::error::{AppError, AppResult, UNKNOWN_MESSAGE};
use serde_json::Value;

pub const AUTHORIZE: &str = "authorize";
pub const IS_AUTHORIZED: &str = "isAuthorized";
const VIDEO_ID_KEY: &str = "videoId";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundMessage {
    OriginalTitle { video_id: String },
    Authorize,
    IsAuthorized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundReply {
    Title(String),
    Authorized(bool),
    Done,
}

impl BackgroundMessage {
    pub fn parse(value: &Value) -> AppResult<Self> {
        match value {
            Value::String(s) if s == AUTHORIZE => Ok(Self::Authorize),
            Value::String(s) if s == IS_AUTHORIZED => Ok(Self::IsAuthorized),
            Value::Object(map) => match map.get(VIDEO_ID_KEY) {
                Some(Value::String(id)) if !id.is_empty() => Ok(Self::OriginalTitle {
                    video_id: id.clone(),
                }),
                _ => Err(unknown(value)),
            },
            _ => Err(unknown(value)),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::OriginalTitle { video_id } => {
                let mut map = serde_json::Map::new();
                map.insert(VIDEO_ID_KEY.to_string(), Value::String(video_id.clone()));
                Value::Object(map)
            }
            Self::Authorize => Value::String(AUTHORIZE.to_string()),
            Self::IsAuthorized => Value::String(IS_AUTHORIZED.to_string()),
        }
    }
}

impl BackgroundReply {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Title(title) => Value::String(title.clone()),
            Self::Authorized(authorized) => Value::Bool(*authorized),
            Self::Done => Value::Null,
        }
    }
}

fn unknown(value: &Value) -> AppError {
    let mut shown = value.to_string();
    if shown.len() > 120 {
        let mut cut = 120;
        while !shown.is_char_boundary(cut) {
            cut -= 1;
        }
        shown.truncate(cut);
        shown.push_str("...");
    }
    AppError::new(UNKNOWN_MESSAGE, format!("unrecognized message {shown}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recognizes_the_three_shapes() {
        assert_eq!(
            BackgroundMessage::parse(&json!({"videoId": "xyz"})).expect("video"),
            BackgroundMessage::OriginalTitle {
                video_id: "xyz".to_string()
            }
        );
        assert_eq!(
            BackgroundMessage::parse(&json!("authorize")).expect("authorize"),
            BackgroundMessage::Authorize
        );
        assert_eq!(
            BackgroundMessage::parse(&json!("isAuthorized")).expect("is authorized"),
            BackgroundMessage::IsAuthorized
        );
    }

    #[test]
    fn unrecognized_object_is_unknown_message() {
        let err = BackgroundMessage::parse(&json!({"foo": 1})).expect_err("unknown");
        assert_eq!(err.code(), UNKNOWN_MESSAGE);
    }

    #[test]
    fn empty_or_non_string_video_id_is_unknown_message() {
        for value in [
            json!({"videoId": ""}),
            json!({"videoId": 42}),
            json!({"videoId": null}),
            json!("Authorize"),
            json!(null),
            json!([1, 2]),
        ] {
            let err = BackgroundMessage::parse(&value).expect_err("unknown");
            assert_eq!(err.code(), UNKNOWN_MESSAGE, "{value}");
        }
    }

    #[test]
    fn messages_encode_to_their_wire_shape() {
        for message in [
            BackgroundMessage::OriginalTitle {
                video_id: "xyz".to_string(),
            },
            BackgroundMessage::Authorize,
            BackgroundMessage::IsAuthorized,
        ] {
            assert_eq!(
                BackgroundMessage::parse(&message.to_json()).expect("parse"),
                message
            );
        }
    }

    #[test]
    fn replies_encode_as_plain_json_values() {
        assert_eq!(BackgroundReply::Title("Foo".into()).to_json(), json!("Foo"));
        assert_eq!(BackgroundReply::Authorized(true).to_json(), json!(true));
        assert_eq!(BackgroundReply::Done.to_json(), Value::Null);
    }
}
