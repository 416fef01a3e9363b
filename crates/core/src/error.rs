use thiserror::Error;

/// Errors raised while turning raw settings into typed values.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("no authorized chat ids configured (CHAT_ID is empty)")]
    NoChatIds,

    #[error("failed to parse chat id {0:?}")]
    InvalidChatId(String),

    #[error("invalid duration {0:?}: expected forms like 500ms, 2s, 5m, 1h")]
    InvalidDuration(String),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}
