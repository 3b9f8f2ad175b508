//! UseCase 層
//!
//! ビジネスロジックを実装するレイヤー。
//! UI 層から呼び出され、Domain 層を操作します。

pub mod change_appearance;
pub mod check_stream_health;
pub mod error;
pub mod submit_message;

pub use change_appearance::ChangeAppearanceUseCase;
pub use check_stream_health::{CheckStreamHealthUseCase, HealthReport, HeartbeatOutcome};
pub use error::SubmitError;
pub use submit_message::SubmitMessageUseCase;
