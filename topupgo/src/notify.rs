//! Notification port.
//!
//! The payment flow reports progress and failures through a [`Notifier`]
//! instead of talking to a toast library directly. A notice carries a kind, a
//! message, and an optional dedupe key; a later notice with the same key
//! replaces the earlier one (a `Loading` notice becoming `Success`).

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// How a notice is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// Progress indicator (spinner toast).
    Loading,
    /// Positive outcome.
    Success,
    /// Failure toast.
    Error,
    /// Non-fatal warning shown inline.
    Advisory,
    /// Blocking dialog the user must acknowledge.
    Modal,
    /// Removes the notice with the same dedupe key.
    Dismiss,
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
            Self::Advisory => "advisory",
            Self::Modal => "modal",
            Self::Dismiss => "dismiss",
        };
        f.write_str(s)
    }
}

/// A single notification as recorded by [`MemoryNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Presentation kind.
    pub kind: NoticeKind,
    /// User-facing text.
    pub message: String,
    /// Replacement key, if any.
    pub dedupe_key: Option<String>,
}

/// Sink for user-facing notifications.
///
/// Implementations must be cheap and non-blocking; they are called from
/// inside async payment steps.
pub trait Notifier: Send + Sync {
    /// Emits a notice.
    fn notify(&self, kind: NoticeKind, message: &str, dedupe_key: Option<&str>);
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, kind: NoticeKind, message: &str, dedupe_key: Option<&str>) {
        (**self).notify(kind, message, dedupe_key);
    }
}

/// Notifier that writes every notice to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NoticeKind, message: &str, dedupe_key: Option<&str>) {
        match kind {
            NoticeKind::Error => tracing::error!(%kind, key = ?dedupe_key, "{message}"),
            NoticeKind::Advisory => tracing::warn!(%kind, key = ?dedupe_key, "{message}"),
            NoticeKind::Dismiss => tracing::debug!(%kind, key = ?dedupe_key, "dismissed"),
            NoticeKind::Loading | NoticeKind::Success | NoticeKind::Modal => {
                tracing::info!(%kind, key = ?dedupe_key, "{message}");
            }
        }
    }
}

/// Notifier that buffers notices in memory until drained.
///
/// Useful for front-ends that render notices on their own schedule.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl MemoryNotifier {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all buffered notices.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns all buffered notices.
    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns `true` if a notice of `kind` with exactly `message` was recorded.
    #[must_use]
    pub fn contains(&self, kind: NoticeKind, message: &str) -> bool {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|n| n.kind == kind && n.message == message)
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, kind: NoticeKind, message: &str, dedupe_key: Option<&str>) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Notice {
                kind,
                message: message.to_owned(),
                dedupe_key: dedupe_key.map(str::to_owned),
            });
    }
}
