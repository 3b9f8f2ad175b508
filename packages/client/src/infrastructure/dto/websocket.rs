//! WebSocket message DTOs for the live chat endpoint.
//!
//! Every frame is a JSON object with a `type` discriminator. Server frames
//! are decoded into [`ServerMessage`] and converted to the domain
//! [`InboundEvent`]; domain [`OutboundCommand`]s are converted to
//! [`ClientMessage`] before being serialized.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::domain::{
    Acknowledgement, Appearance, CaptchaDigest, ChatMessage, Color, DefaultNames, InboundEvent,
    Nonce, OutboundCommand, Seq, Snapshot, StreamStats, TokenHash, Tripcode, User,
    ValueObjectError, entity::DEFAULT_SCROLLBACK,
};

/// Why a server frame could not be turned into an [`InboundEvent`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, unknown `type`, or missing fields
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed JSON carrying invalid values
    #[error("invalid value in message: {0}")]
    Invalid(#[from] ValueObjectError),

    /// A message lacking the fields its kind requires
    #[error("incomplete {0} message")]
    Incomplete(&'static str),

    /// A number that does not fit the type it stands for
    #[error("{0} is out of range")]
    OutOfRange(&'static str),
}

/// Stream uptime and viewer count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsDto {
    pub uptime: f64,
    pub viewership: u64,
}

/// Tripcode badge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripcodeDto {
    pub digest: String,
    pub background_color: String,
    pub foreground_color: String,
}

/// Roster entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDto {
    #[serde(default)]
    pub name: Option<String>,
    pub color: String,
    #[serde(default)]
    pub tripcode: Option<TripcodeDto>,
    #[serde(default)]
    pub broadcaster: bool,
    #[serde(default)]
    pub watching: Option<bool>,
    #[serde(default)]
    pub tag: Option<String>,
}

/// Chat message as broadcast by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageDto {
    pub seq: u64,
    pub token_hash: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time_minutes: String,
    #[serde(default)]
    pub time_seconds: String,
    pub markup: String,
}

/// Default names keyed by "is broadcaster"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultNamesDto {
    #[serde(rename = "true")]
    pub broadcaster: String,
    #[serde(rename = "false")]
    pub anonymous: String,
}

/// Initial snapshot sent right after the connection opens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitMessage {
    pub nonce: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub stats: Option<StatsDto>,
    #[serde(default)]
    pub messages: Vec<ChatMessageDto>,
    #[serde(default)]
    pub users: HashMap<String, UserDto>,
    #[serde(default)]
    pub default: Option<DefaultNamesDto>,
    #[serde(default)]
    pub scrollback: Option<usize>,
    #[serde(default)]
    pub digest: Option<String>,
    /// Server ping interval in seconds
    #[serde(default)]
    pub pingpong: Option<f64>,
}

/// Partial stream info update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Absent: unchanged. `null`: the stream went offline.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub stats: Option<Option<StatsDto>>,
}

/// Acknowledgement of a chat message command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckMessage {
    pub nonce: String,
    pub next: String,
    #[serde(default)]
    pub notice: Option<String>,
    #[serde(default)]
    pub clear: bool,
    #[serde(default)]
    pub digest: Option<String>,
}

/// Result of an appearance change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppearanceMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Server → client frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Init(Box<InitMessage>),
    Title { title: String },
    Info(InfoMessage),
    Ack(AckMessage),
    Reject { notice: String },
    Error { because: String },
    Message { message: ChatMessageDto },
    Delete { seqs: Vec<u64> },
    SetUsers { users: HashMap<String, UserDto> },
    RemUsers { token_hashes: Vec<String> },
    Captcha { digest: Option<String> },
    Appearance(AppearanceMessage),
    Ping,
    Kick,
}

/// Chat form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFormDto {
    pub nonce: String,
    pub comment: String,
    #[serde(
        rename = "captcha-digest",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub captcha_digest: Option<String>,
    #[serde(
        rename = "captcha-answer",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub captcha_answer: Option<String>,
}

/// Appearance form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppearanceFormDto {
    pub nonce: String,
    pub name: String,
    pub color: String,
    pub password: String,
}

/// Client → server frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Message { form: MessageFormDto },
    Appearance { form: AppearanceFormDto },
    Captcha,
    Pong,
}

fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Parse one text frame into a domain event.
pub fn decode_server_message(text: &str) -> Result<InboundEvent, DecodeError> {
    let message: ServerMessage = serde_json::from_str(text)?;
    InboundEvent::try_from(message)
}

/// Serialize a domain command into a text frame.
pub fn encode_client_message(command: OutboundCommand) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ClientMessage::from(command))
}

impl From<StatsDto> for StreamStats {
    fn from(dto: StatsDto) -> Self {
        Self {
            uptime: dto.uptime,
            viewership: dto.viewership,
        }
    }
}

impl TryFrom<TripcodeDto> for Tripcode {
    type Error = ValueObjectError;

    fn try_from(dto: TripcodeDto) -> Result<Self, Self::Error> {
        Ok(Self {
            digest: dto.digest,
            background_color: Color::parse(&dto.background_color)?,
            foreground_color: Color::parse(&dto.foreground_color)?,
        })
    }
}

impl TryFrom<UserDto> for User {
    type Error = ValueObjectError;

    fn try_from(dto: UserDto) -> Result<Self, Self::Error> {
        Ok(Self {
            name: dto.name,
            color: Color::parse(&dto.color)?,
            tripcode: dto.tripcode.map(Tripcode::try_from).transpose()?,
            broadcaster: dto.broadcaster,
            watching: dto.watching.into(),
            tag: dto.tag,
        })
    }
}

impl TryFrom<ChatMessageDto> for ChatMessage {
    type Error = ValueObjectError;

    fn try_from(dto: ChatMessageDto) -> Result<Self, Self::Error> {
        Ok(Self {
            seq: Seq::new(dto.seq),
            token_hash: TokenHash::new(dto.token_hash)?,
            date: dto.date,
            time: dto.time_seconds,
            markup: dto.markup,
        })
    }
}

fn convert_users(
    users: HashMap<String, UserDto>,
) -> Result<HashMap<TokenHash, User>, ValueObjectError> {
    users
        .into_iter()
        .map(|(token_hash, user)| Ok((TokenHash::new(token_hash)?, User::try_from(user)?)))
        .collect()
}

fn convert_digest(digest: Option<String>) -> Result<Option<CaptchaDigest>, ValueObjectError> {
    digest.map(CaptchaDigest::new).transpose()
}

fn flatten_error(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text,
        serde_json::Value::Array(parts) => parts
            .into_iter()
            .map(|part| match part {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

impl TryFrom<ServerMessage> for InboundEvent {
    type Error = DecodeError;

    fn try_from(message: ServerMessage) -> Result<Self, DecodeError> {
        let event = match message {
            ServerMessage::Init(init) => {
                let InitMessage {
                    nonce,
                    title,
                    stats,
                    messages,
                    users,
                    default,
                    scrollback,
                    digest,
                    pingpong,
                } = *init;
                let messages = messages
                    .into_iter()
                    .map(ChatMessage::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                let default_names = default
                    .map(|d| DefaultNames {
                        broadcaster: d.broadcaster,
                        anonymous: d.anonymous,
                    })
                    .unwrap_or_default();
                let ping_interval = pingpong
                    .filter(|secs| secs.is_finite() && *secs > 0.0)
                    .map(|secs| {
                        Duration::try_from_secs_f64(secs)
                            .map_err(|_| DecodeError::OutOfRange("pingpong"))
                    })
                    .transpose()?;
                InboundEvent::Init(Box::new(Snapshot {
                    nonce: Nonce::new(nonce)?,
                    title,
                    stats: stats.map(StreamStats::from),
                    messages,
                    users: convert_users(users)?,
                    default_names,
                    scrollback: scrollback.unwrap_or(DEFAULT_SCROLLBACK),
                    captcha: convert_digest(digest)?,
                    ping_interval,
                }))
            }
            ServerMessage::Title { title } => InboundEvent::Title(title),
            ServerMessage::Info(info) => InboundEvent::Info {
                title: info.title,
                stats: info.stats.map(|stats| stats.map(StreamStats::from)),
            },
            ServerMessage::Ack(ack) => InboundEvent::Ack(Acknowledgement {
                nonce: Nonce::new(ack.nonce)?,
                next: Nonce::new(ack.next)?,
                notice: ack.notice,
                clear: ack.clear,
                captcha: convert_digest(ack.digest)?,
            }),
            ServerMessage::Reject { notice } => InboundEvent::Reject { notice },
            ServerMessage::Error { because } => InboundEvent::Error { because },
            ServerMessage::Message { message } => {
                InboundEvent::Message(ChatMessage::try_from(message)?)
            }
            ServerMessage::Delete { seqs } => {
                InboundEvent::Delete(seqs.into_iter().map(Seq::new).collect())
            }
            ServerMessage::SetUsers { users } => InboundEvent::SetUsers(convert_users(users)?),
            ServerMessage::RemUsers { token_hashes } => InboundEvent::RemoveUsers(
                token_hashes
                    .into_iter()
                    .map(TokenHash::new)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            ServerMessage::Captcha { digest } => InboundEvent::Captcha(convert_digest(digest)?),
            ServerMessage::Appearance(appearance) => match appearance.errors {
                Some(errors) if !errors.is_empty() => InboundEvent::Appearance(Err(errors
                    .into_iter()
                    .map(flatten_error)
                    .collect())),
                _ => {
                    let color = appearance
                        .color
                        .ok_or(DecodeError::Incomplete("appearance"))?;
                    InboundEvent::Appearance(Ok(Appearance {
                        name: appearance.name,
                        color: Color::parse(&color)?,
                    }))
                }
            },
            ServerMessage::Ping => InboundEvent::Ping,
            ServerMessage::Kick => InboundEvent::Kick,
        };
        Ok(event)
    }
}

impl From<OutboundCommand> for ClientMessage {
    fn from(command: OutboundCommand) -> Self {
        match command {
            OutboundCommand::Message {
                nonce,
                comment,
                captcha,
            } => {
                let (captcha_digest, captcha_answer) = match captcha {
                    Some(captcha) => (
                        Some(captcha.digest.as_str().to_string()),
                        Some(captcha.answer),
                    ),
                    None => (None, None),
                };
                ClientMessage::Message {
                    form: MessageFormDto {
                        nonce: nonce.as_str().to_string(),
                        comment: comment.into_string(),
                        captcha_digest,
                        captcha_answer,
                    },
                }
            }
            OutboundCommand::Appearance { nonce, form } => ClientMessage::Appearance {
                form: AppearanceFormDto {
                    nonce: nonce.as_str().to_string(),
                    name: form.name,
                    color: form.color.to_string(),
                    password: form.password,
                },
            },
            OutboundCommand::Pong => ClientMessage::Pong,
            OutboundCommand::RequestCaptcha => ClientMessage::Captcha,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AppearanceForm, CaptchaAnswer, Comment};
    use serde_json::json;

    #[test]
    fn test_decode_init() {
        // テスト項目: init メッセージをドメインのスナップショットに変換できる
        // given (前提条件):
        let text = json!({
            "type": "init",
            "nonce": "abc",
            "title": "Live now",
            "stats": {"uptime": 61.5, "viewership": 4},
            "messages": [{
                "seq": 1,
                "token_hash": "h1",
                "date": "2022-03-01",
                "time_minutes": "12:00",
                "time_seconds": "12:00:30",
                "markup": "hello &amp; welcome"
            }],
            "users": {
                "h1": {
                    "broadcaster": false,
                    "name": null,
                    "color": "#a0b0c0",
                    "tripcode": {"digest": "xyz", "background_color": "#000000", "foreground_color": "#ffffff"},
                    "tag": "a1b2",
                    "watching": true
                }
            },
            "default": {"true": "Broadcaster", "false": "Anonymous"},
            "scrollback": 50,
            "digest": null,
            "pingpong": 8.0,
            "emotes": []
        })
        .to_string();

        // when (操作):
        let event = decode_server_message(&text).unwrap();

        // then (期待する結果):
        let InboundEvent::Init(snapshot) = event else {
            panic!("expected init, got {event:?}");
        };
        assert_eq!(snapshot.nonce.as_str(), "abc");
        assert_eq!(snapshot.scrollback, 50);
        assert_eq!(snapshot.ping_interval, Some(Duration::from_secs(8)));
        assert_eq!(snapshot.messages[0].time, "12:00:30");
        let user = &snapshot.users[&TokenHash::new("h1".to_string()).unwrap()];
        assert_eq!(user.color, Color::from_rgb(0xa0, 0xb0, 0xc0));
        assert_eq!(user.tripcode.as_ref().unwrap().digest, "xyz");
        assert_eq!(snapshot.default_names.anonymous, "Anonymous");
    }

    #[test]
    fn test_decode_info_distinguishes_absent_and_null_stats() {
        // テスト項目: info の stats は「なし」と「null」を区別する
        let absent = decode_server_message(r#"{"type":"info","title":"t"}"#).unwrap();
        let null = decode_server_message(r#"{"type":"info","stats":null}"#).unwrap();

        assert_eq!(
            absent,
            InboundEvent::Info {
                title: Some("t".to_string()),
                stats: None
            }
        );
        assert_eq!(
            null,
            InboundEvent::Info {
                title: None,
                stats: Some(None)
            }
        );
    }

    #[test]
    fn test_decode_small_messages() {
        // テスト項目: 各種の小さなメッセージを変換できる
        assert_eq!(
            decode_server_message(r#"{"type":"ping"}"#).unwrap(),
            InboundEvent::Ping
        );
        assert_eq!(
            decode_server_message(r#"{"type":"kick"}"#).unwrap(),
            InboundEvent::Kick
        );
        assert_eq!(
            decode_server_message(r#"{"type":"delete","seqs":[4,5]}"#).unwrap(),
            InboundEvent::Delete(vec![Seq::new(4), Seq::new(5)])
        );
        assert_eq!(
            decode_server_message(r#"{"type":"rem-users","token_hashes":["a"]}"#).unwrap(),
            InboundEvent::RemoveUsers(vec![TokenHash::new("a".to_string()).unwrap()])
        );
        assert_eq!(
            decode_server_message(r#"{"type":"captcha","digest":null}"#).unwrap(),
            InboundEvent::Captcha(None)
        );
    }

    #[test]
    fn test_decode_appearance_errors() {
        // テスト項目: appearance のエラー一覧は文字列に平坦化される
        let text = r#"{"type":"appearance","errors":[["Name was too long", 24], "Bad color"]}"#;

        let event = decode_server_message(text).unwrap();

        assert_eq!(
            event,
            InboundEvent::Appearance(Err(vec![
                "Name was too long 24".to_string(),
                "Bad color".to_string()
            ]))
        );
    }

    #[test]
    fn test_decode_unknown_or_invalid_fails() {
        // テスト項目: 未知の type や不正な値はエラーになる
        assert!(matches!(
            decode_server_message(r#"{"type":"dance"}"#),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode_server_message("not json"),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode_server_message(
                r##"{"type":"set-users","users":{"h":{"color":"red"}}}"##
            ),
            Err(DecodeError::Invalid(ValueObjectError::ColorInvalidFormat(_)))
        ));
        assert!(matches!(
            decode_server_message(r#"{"type":"appearance","result":"ok"}"#),
            Err(DecodeError::Incomplete("appearance"))
        ));
    }

    #[test]
    fn test_decode_out_of_range_pingpong_fails() {
        // テスト項目: Duration に収まらない pingpong は不正なメッセージとして扱い、panic しない
        // when (操作):
        let result = decode_server_message(r#"{"type":"init","nonce":"n","pingpong":1e20}"#);

        // then (期待する結果):
        assert!(matches!(result, Err(DecodeError::OutOfRange("pingpong"))));
    }

    #[test]
    fn test_encode_message_command() {
        // テスト項目: チャット送信コマンドはフォーム形式で nonce と captcha を含む
        // given (前提条件):
        let command = OutboundCommand::Message {
            nonce: Nonce::new("n1".to_string()).unwrap(),
            comment: Comment::new("hi".to_string()).unwrap(),
            captcha: Some(CaptchaAnswer {
                digest: CaptchaDigest::new("d".to_string()).unwrap(),
                answer: "42".to_string(),
            }),
        };

        // when (操作):
        let text = encode_client_message(command).unwrap();

        // then (期待する結果):
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "message",
                "form": {"nonce": "n1", "comment": "hi", "captcha-digest": "d", "captcha-answer": "42"}
            })
        );
    }

    #[test]
    fn test_encode_appearance_and_pong() {
        // テスト項目: 外見変更と pong のエンコード
        let appearance = OutboundCommand::Appearance {
            nonce: Nonce::new("n1".to_string()).unwrap(),
            form: AppearanceForm {
                name: "alice".to_string(),
                color: Color::from_rgb(255, 0, 16),
                password: String::new(),
            },
        };

        let value: serde_json::Value =
            serde_json::from_str(&encode_client_message(appearance).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "appearance",
                "form": {"nonce": "n1", "name": "alice", "color": "#ff0010", "password": ""}
            })
        );
        assert_eq!(
            encode_client_message(OutboundCommand::Pong).unwrap(),
            r#"{"type":"pong"}"#
        );
    }
}
