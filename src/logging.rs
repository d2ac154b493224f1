//! ログ出力の初期化
//!
//! ライブラリ側は `tracing` のマクロを呼ぶだけで、購読者の設定は
//! 組み込み先（モバイルシェルや診断用バイナリ）が一度だけ行います。

use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

static INITIALISED: OnceLock<()> = OnceLock::new();

/// 既定のフィルタ（`RUST_LOG` で上書き可能）
pub const DEFAULT_FILTER: &str = "info";

/// グローバルな tracing 購読者を設定する
///
/// 購読者の登録に失敗した場合はガードを立てないので、再度呼び出せる。
pub fn init_tracing() -> Result<(), InitError> {
    guarded_init(&INITIALISED, install_subscriber)
}

fn guarded_init(
    guard: &OnceLock<()>,
    install: impl FnOnce() -> Result<(), String>,
) -> Result<(), InitError> {
    if guard.get().is_some() {
        return Err(InitError::AlreadyInitialised);
    }
    install().map_err(InitError::Subscriber)?;
    guard.set(()).map_err(|_| InitError::AlreadyInitialised)
}

fn install_subscriber() -> Result<(), String> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| e.to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("tracing has already been initialised")]
    AlreadyInitialised,
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_rejected() {
        // 他のテストが先に購読者を入れていても、2回目は必ず拒否される
        let _ = init_tracing();
        assert!(matches!(init_tracing(), Err(InitError::AlreadyInitialised)));
    }

    #[test]
    fn test_failed_install_can_be_retried() {
        let guard = OnceLock::new();

        let first = guarded_init(&guard, || Err("global default already set".to_string()));
        assert!(matches!(first, Err(InitError::Subscriber(_))));
        assert!(guard.get().is_none());

        // 失敗の後でも登録をやり直せる
        assert!(guarded_init(&guard, || Ok(())).is_ok());
        assert!(matches!(
            guarded_init(&guard, || Ok(())),
            Err(InitError::AlreadyInitialised)
        ));
    }
}
