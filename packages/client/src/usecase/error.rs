//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::{SessionError, ValueObjectError};

/// コマンド送信（チャット・外見変更）のエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// 空のコメント（captcha の回答も無い場合）
    #[error("Comment cannot be empty")]
    EmptyComment,

    /// 入力値の検証エラー
    #[error(transparent)]
    Invalid(#[from] ValueObjectError),

    /// セッション状態により送信できない
    #[error(transparent)]
    Session(#[from] SessionError),
}
