//! Recipient tag resolution.
//!
//! [`AddressResolver`] maps a tag to a deposit address. [`RecipientField`]
//! models the tag input of the send form: it caches the last successful
//! resolution for exactly the tag it was made for, and drops that cache on
//! every edit, so a tag that is edited and then typed back is looked up again.

use std::future::Future;
use std::sync::Arc;

use alloy_primitives::Address;

use crate::error::ResolveError;
use crate::notify::{NoticeKind, Notifier};

/// User-facing text of the recipient-not-found modal.
pub const RECIPIENT_NOT_FOUND: &str = "This recipient was not found";

/// Resolves recipient tags to addresses.
pub trait AddressResolver: Send + Sync {
    /// Looks up the deposit address for `tag`.
    ///
    /// Implementations trim the tag and return [`ResolveError::EmptyTag`]
    /// without issuing a request when nothing is left.
    fn resolve(&self, tag: &str) -> impl Future<Output = Result<Address, ResolveError>> + Send;
}

impl<T: AddressResolver> AddressResolver for Arc<T> {
    fn resolve(&self, tag: &str) -> impl Future<Output = Result<Address, ResolveError>> + Send {
        (**self).resolve(tag)
    }
}

/// Lookup state shown next to the tag input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressStatus {
    /// Nothing looked up for the current value.
    #[default]
    Idle,
    /// A lookup is running.
    Loading,
    /// The current value resolved.
    Found,
    /// The last lookup for the current value failed.
    Error,
}

/// A tag together with the address it resolved to, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecipient {
    /// Trimmed tag.
    pub tag: String,
    /// Resolved address.
    pub address: Option<Address>,
}

/// The tag input of the send form.
#[derive(Debug, Clone, Default)]
pub struct RecipientField {
    value: String,
    status: AddressStatus,
    resolved: Option<ResolvedRecipient>,
}

impl RecipientField {
    /// Creates an empty field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a field pre-filled with `value` and no cached resolution.
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Raw input value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Trimmed tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        self.value.trim()
    }

    /// Current lookup state.
    #[must_use]
    pub const fn status(&self) -> AddressStatus {
        self.status
    }

    /// Last resolution, kept only while the input is unchanged.
    #[must_use]
    pub const fn resolved(&self) -> Option<&ResolvedRecipient> {
        self.resolved.as_ref()
    }

    /// Applies a keystroke: stores the new value and invalidates any cached
    /// resolution, even if the value ends up identical to the old one.
    pub fn edit(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.status = AddressStatus::Idle;
        self.resolved = None;
    }

    /// Returns the cached address if it was resolved for the current tag.
    #[must_use]
    pub fn cached_address(&self) -> Option<Address> {
        if self.status != AddressStatus::Found {
            return None;
        }
        self.resolved
            .as_ref()
            .filter(|r| r.tag == self.tag())
            .and_then(|r| r.address)
    }

    /// Resolves the current tag, as on blur.
    ///
    /// An empty tag puts the field back to [`AddressStatus::Idle`] without a
    /// lookup. A failed lookup raises the not-found modal.
    pub async fn blur<R, N>(&mut self, resolver: &R, notifier: &N) -> Option<Address>
    where
        R: AddressResolver + ?Sized,
        N: Notifier + ?Sized,
    {
        let tag = self.tag().to_owned();
        if tag.is_empty() {
            self.status = AddressStatus::Idle;
            self.resolved = None;
            return None;
        }

        self.status = AddressStatus::Loading;
        self.resolved = None;
        match resolver.resolve(&tag).await {
            Ok(address) => {
                self.record(tag, address);
                Some(address)
            }
            Err(err) => {
                tracing::debug!(%tag, error = %err, "Recipient lookup failed");
                self.mark_failed(tag);
                notifier.notify(NoticeKind::Modal, RECIPIENT_NOT_FOUND, None);
                None
            }
        }
    }

    /// Records a successful resolution of `tag`.
    pub(crate) fn record(&mut self, tag: String, address: Address) {
        self.status = AddressStatus::Found;
        self.resolved = Some(ResolvedRecipient {
            tag,
            address: Some(address),
        });
    }

    /// Records a failed resolution of `tag`.
    pub(crate) fn mark_failed(&mut self, tag: String) {
        self.status = AddressStatus::Error;
        self.resolved = Some(ResolvedRecipient { tag, address: None });
    }
}

/// Resolves the field's tag for submission.
///
/// Reuses the cached address only when it was resolved for the exact current
/// tag; otherwise runs the lookup again and records the outcome on the field.
///
/// # Errors
///
/// Returns the resolver's error when the lookup fails.
pub async fn resolve_for_submit<R>(
    field: &mut RecipientField,
    resolver: &R,
) -> Result<Address, ResolveError>
where
    R: AddressResolver + ?Sized,
{
    if let Some(address) = field.cached_address() {
        return Ok(address);
    }
    let tag = field.tag().to_owned();
    match resolver.resolve(&tag).await {
        Ok(address) => {
            field.record(tag, address);
            Ok(address)
        }
        Err(err) => {
            field.mark_failed(tag);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryNotifier;
    use alloy_primitives::address;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ALICE: Address = address!("00000000000000000000000000000000000a11ce");

    #[derive(Default)]
    struct MapResolver {
        entries: HashMap<String, Address>,
        lookups: AtomicUsize,
    }

    impl MapResolver {
        fn with(tag: &str, address: Address) -> Self {
            let mut entries = HashMap::new();
            entries.insert(tag.to_owned(), address);
            Self {
                entries,
                lookups: AtomicUsize::new(0),
            }
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    impl AddressResolver for MapResolver {
        async fn resolve(&self, tag: &str) -> Result<Address, ResolveError> {
            let tag = tag.trim();
            if tag.is_empty() {
                return Err(ResolveError::EmptyTag);
            }
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.entries
                .get(tag)
                .copied()
                .ok_or_else(|| ResolveError::NotFound {
                    tag: tag.to_owned(),
                    reason: "unknown".into(),
                })
        }
    }

    #[tokio::test]
    async fn test_blur_resolves_and_caches() {
        let resolver = MapResolver::with("alice", ALICE);
        let notifier = MemoryNotifier::new();
        let mut field = RecipientField::with_value(" alice ");

        assert_eq!(field.blur(&resolver, &notifier).await, Some(ALICE));
        assert_eq!(field.status(), AddressStatus::Found);
        assert_eq!(field.cached_address(), Some(ALICE));
        assert!(notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_blur_empty_tag_is_idle_without_lookup() {
        let resolver = MapResolver::default();
        let notifier = MemoryNotifier::new();
        let mut field = RecipientField::with_value("   ");

        assert_eq!(field.blur(&resolver, &notifier).await, None);
        assert_eq!(field.status(), AddressStatus::Idle);
        assert_eq!(resolver.lookups(), 0);
    }

    #[tokio::test]
    async fn test_blur_failure_raises_modal() {
        let resolver = MapResolver::default();
        let notifier = MemoryNotifier::new();
        let mut field = RecipientField::with_value("nobody");

        assert_eq!(field.blur(&resolver, &notifier).await, None);
        assert_eq!(field.status(), AddressStatus::Error);
        assert!(notifier.contains(NoticeKind::Modal, RECIPIENT_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_edit_invalidates_cache() {
        let resolver = MapResolver::with("alice", ALICE);
        let notifier = MemoryNotifier::new();
        let mut field = RecipientField::with_value("alice");
        field.blur(&resolver, &notifier).await;

        field.edit("alic");
        assert_eq!(field.status(), AddressStatus::Idle);
        assert_eq!(field.cached_address(), None);
    }

    #[tokio::test]
    async fn test_edit_then_revert_re_resolves_on_submit() {
        let resolver = MapResolver::with("alice", ALICE);
        let notifier = MemoryNotifier::new();
        let mut field = RecipientField::with_value("alice");
        field.blur(&resolver, &notifier).await;
        assert_eq!(resolver.lookups(), 1);

        field.edit("alicex");
        field.edit("alice");
        let address = resolve_for_submit(&mut field, &resolver).await.unwrap();
        assert_eq!(address, ALICE);
        assert_eq!(resolver.lookups(), 2);
    }

    #[tokio::test]
    async fn test_submit_reuses_cache_for_same_tag() {
        let resolver = MapResolver::with("alice", ALICE);
        let notifier = MemoryNotifier::new();
        let mut field = RecipientField::with_value("alice");
        field.blur(&resolver, &notifier).await;

        resolve_for_submit(&mut field, &resolver).await.unwrap();
        assert_eq!(resolver.lookups(), 1);
    }

    #[tokio::test]
    async fn test_submit_failure_marks_error() {
        let resolver = MapResolver::default();
        let mut field = RecipientField::with_value("ghost");

        let err = resolve_for_submit(&mut field, &resolver).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
        assert_eq!(field.status(), AddressStatus::Error);
        assert_eq!(field.cached_address(), None);
    }
}
