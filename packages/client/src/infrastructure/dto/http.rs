//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

use crate::domain::health::HeartbeatSnapshot;

/// Response of `GET /heartbeat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResponseDto {
    #[serde(default)]
    pub viewers: u64,
    #[serde(default)]
    pub online: bool,
    /// Kept loosely typed: the server may send `null` or a non-integer
    #[serde(default)]
    pub current_segment: Option<serde_json::Value>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub start_abs: Option<f64>,
    #[serde(default)]
    pub start_rel: Option<f64>,
}

impl From<HeartbeatResponseDto> for HeartbeatSnapshot {
    fn from(dto: HeartbeatResponseDto) -> Self {
        Self {
            viewers: dto.viewers,
            title: dto.title,
            online: dto.online,
            current_segment: dto.current_segment.as_ref().and_then(serde_json::Value::as_i64),
            start_abs: dto.start_abs,
            start_rel: dto.start_rel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_response_conversion() {
        // テスト項目: current_segment が整数でない場合は None になる
        // given (前提条件):
        let integer = r#"{"viewers":3,"online":true,"current_segment":42,"title":"t","start_abs":1.5,"start_rel":30}"#;
        let fractional = r#"{"viewers":3,"online":true,"current_segment":4.5,"title":"t"}"#;
        let missing = r#"{"online":false,"title":"t","start_abs":null,"start_rel":null}"#;

        // when (操作):
        let parse = |text: &str| {
            HeartbeatSnapshot::from(serde_json::from_str::<HeartbeatResponseDto>(text).unwrap())
        };

        // then (期待する結果):
        let snapshot = parse(integer);
        assert_eq!(snapshot.current_segment, Some(42));
        assert_eq!(snapshot.start_rel, Some(30.0));
        assert_eq!(parse(fractional).current_segment, None);
        let offline = parse(missing);
        assert_eq!(offline.current_segment, None);
        assert!(!offline.online);
        assert_eq!(offline.viewers, 0);
    }
}
