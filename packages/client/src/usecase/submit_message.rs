//! UseCase: チャットメッセージ送信
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SubmitMessageUseCase::execute() メソッド
//! - コメントの検証と送信制御（ack 待ちの間は送信不可）
//!
//! ### なぜこのテストが必要か
//! - 同じ nonce での二重送信を防ぐ
//! - captcha の回答だけを送る空コメントを許容する
//!
//! ### どのような状況を想定しているか
//! - 正常系：接続済みでの送信
//! - 異常系：空コメント、長すぎるコメント、ack 待ち中の再送信

use crate::domain::{Comment, OutboundCommand, SessionState};

use super::error::SubmitError;

/// チャットメッセージ送信のユースケース
#[derive(Debug, Default, Clone, Copy)]
pub struct SubmitMessageUseCase;

impl SubmitMessageUseCase {
    /// 新しい SubmitMessageUseCase を作成
    pub fn new() -> Self {
        Self
    }

    /// メッセージ送信コマンドを作成し、送信ボタンを無効化する
    ///
    /// # Arguments
    ///
    /// * `state` - セッション状態
    /// * `text` - 入力されたコメント
    /// * `captcha_answer` - captcha の回答（要求されている場合）
    ///
    /// # Returns
    ///
    /// * `Ok(OutboundCommand)` - 送信すべきコマンド
    /// * `Err(SubmitError)` - 送信不可
    pub fn execute(
        &self,
        state: &mut SessionState,
        text: String,
        captcha_answer: Option<String>,
    ) -> Result<OutboundCommand, SubmitError> {
        // 1. 空コメントは captcha の回答がある場合のみ許可
        let answering_captcha = captcha_answer.as_deref().is_some_and(|a| !a.is_empty());
        if text.is_empty() && !answering_captcha {
            return Err(SubmitError::EmptyComment);
        }

        // 2. コメント長の検証
        let comment = Comment::new(text)?;

        // 3. セッション状態の確認とコマンド作成
        Ok(state.begin_message(comment, captcha_answer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Acknowledgement, DefaultNames, InboundEvent, Nonce, SessionError, Snapshot,
        ValueObjectError, value_object::MAX_COMMENT_CHARS,
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
    fn test_submit_message_success() {
        // テスト項目: 接続済みならコマンドが作成され、送信ボタンが無効化される
        // given (前提条件):
        let mut state = connected_state();
        let usecase = SubmitMessageUseCase::new();

        // when (操作):
        let result = usecase.execute(&mut state, "hello".to_string(), None);

        // then (期待する結果):
        assert!(matches!(result, Ok(OutboundCommand::Message { .. })));
        assert!(!state.can_submit_message());
    }

    #[test]
    fn test_submit_message_twice_before_ack_fails() {
        // テスト項目: ack 受信前の二回目の送信は拒否され、ack 後は送信できる
        // given (前提条件):
        let mut state = connected_state();
        let usecase = SubmitMessageUseCase::new();
        usecase
            .execute(&mut state, "first".to_string(), None)
            .unwrap();

        // when (操作):
        let result = usecase.execute(&mut state, "second".to_string(), None);

        // then (期待する結果):
        assert_eq!(
            result,
            Err(SubmitError::Session(SessionError::AwaitingAcknowledgement(
                "message"
            )))
        );

        // when (操作): ack を受信
        state.apply(InboundEvent::Ack(Acknowledgement {
            nonce: Nonce::new("n1".to_string()).unwrap(),
            next: Nonce::new("n2".to_string()).unwrap(),
            notice: None,
            clear: true,
            captcha: None,
        }));

        // then (期待する結果):
        assert!(
            usecase
                .execute(&mut state, "second".to_string(), None)
                .is_ok()
        );
    }

    #[test]
    fn test_submit_empty_comment_fails() {
        // テスト項目: captcha の回答が無い空コメントは送信できない
        let mut state = connected_state();
        let usecase = SubmitMessageUseCase::new();

        let result = usecase.execute(&mut state, String::new(), Some(String::new()));

        assert_eq!(result, Err(SubmitError::EmptyComment));
        assert!(state.can_submit_message());
    }

    #[test]
    fn test_submit_empty_comment_with_captcha_answer() {
        // テスト項目: captcha の回答のみの送信は許可される
        let mut state = connected_state();
        let usecase = SubmitMessageUseCase::new();

        let result = usecase.execute(&mut state, String::new(), Some("x7k2".to_string()));

        assert!(result.is_ok());
    }

    #[test]
    fn test_submit_too_long_comment_fails() {
        // テスト項目: 長すぎるコメントは送信できず、送信ボタンは有効なまま
        let mut state = connected_state();
        let usecase = SubmitMessageUseCase::new();

        let result = usecase.execute(&mut state, "a".repeat(MAX_COMMENT_CHARS + 1), None);

        assert_eq!(
            result,
            Err(SubmitError::Invalid(ValueObjectError::CommentTooLong {
                max: MAX_COMMENT_CHARS,
                actual: MAX_COMMENT_CHARS + 1
            }))
        );
        assert!(state.can_submit_message());
    }
}
