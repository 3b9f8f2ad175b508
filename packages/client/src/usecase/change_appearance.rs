//! UseCase: 外見（名前・色・トリップ）の変更

use crate::domain::{AppearanceForm, Color, OutboundCommand, SessionState};

use super::error::SubmitError;

/// 外見変更のユースケース
#[derive(Debug, Default, Clone, Copy)]
pub struct ChangeAppearanceUseCase;

impl ChangeAppearanceUseCase {
    /// 新しい ChangeAppearanceUseCase を作成
    pub fn new() -> Self {
        Self
    }

    /// 外見変更コマンドを作成し、外見変更の送信ボタンを無効化する
    ///
    /// # Arguments
    ///
    /// * `name` - 表示名（前後の空白は除去される）
    /// * `color` - `#rrggbb` 形式の色
    /// * `password` - トリップのパスワード（空ならトリップなし）
    pub fn execute(
        &self,
        state: &mut SessionState,
        name: &str,
        color: &str,
        password: String,
    ) -> Result<OutboundCommand, SubmitError> {
        let form = AppearanceForm {
            name: name.trim().to_string(),
            color: Color::parse(color)?,
            password,
        };
        Ok(state.begin_appearance(form)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        DefaultNames, InboundEvent, Nonce, SessionError, Snapshot, ValueObjectError,
    };
    use std::collections::HashMap;

    fn connected_state() -> SessionState {
        let mut state = SessionState::new();
        state.begin_connecting().unwrap();
        state.on_open();
        state.apply(InboundEvent::Init(Box::new(Snapshot {
            nonce: Nonce::new("n1".to_string()).unwrap(),
            title: String::new(),
            stats: None,
            messages: Vec::new(),
            users: HashMap::new(),
            default_names: DefaultNames::default(),
            scrollback: 10,
            captcha: None,
            ping_interval: None,
        })));
        state
    }

    #[test]
    fn test_change_appearance_success() {
        // テスト項目: 外見変更コマンドに nonce と整形済みの値が入る
        // given (前提条件):
        let mut state = connected_state();

        // when (操作):
        let command = ChangeAppearanceUseCase::new()
            .execute(&mut state, "  alice ", "#00FF00", "secret".to_string())
            .unwrap();

        // then (期待する結果):
        assert_eq!(
            command,
            OutboundCommand::Appearance {
                nonce: Nonce::new("n1".to_string()).unwrap(),
                form: AppearanceForm {
                    name: "alice".to_string(),
                    color: Color::from_rgb(0, 255, 0),
                    password: "secret".to_string(),
                },
            }
        );
    }

    #[test]
    fn test_change_appearance_invalid_color_fails() {
        // テスト項目: 不正な色は送信前に拒否される
        let mut state = connected_state();

        let result =
            ChangeAppearanceUseCase::new().execute(&mut state, "alice", "green", String::new());

        assert_eq!(
            result,
            Err(SubmitError::Invalid(ValueObjectError::ColorInvalidFormat(
                "green".to_string()
            )))
        );
        assert!(state.can_submit_appearance());
    }

    #[test]
    fn test_change_appearance_waits_for_result() {
        // テスト項目: 結果を受信するまで次の外見変更は送信できない
        let mut state = connected_state();
        let usecase = ChangeAppearanceUseCase::new();
        usecase
            .execute(&mut state, "a", "#000000", String::new())
            .unwrap();

        let second = usecase.execute(&mut state, "b", "#000000", String::new());
        assert_eq!(
            second,
            Err(SubmitError::Session(SessionError::AwaitingAcknowledgement(
                "appearance change"
            )))
        );

        state.apply(InboundEvent::Appearance(Err(vec![
            "Name was too long".to_string(),
        ])));
        assert!(
            usecase
                .execute(&mut state, "b", "#000000", String::new())
                .is_ok()
        );
    }
}
