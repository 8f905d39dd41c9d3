//! Cached credential snapshot and the in-memory store that owns it.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Snapshot of the trust material cached for one user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Identity the token was issued for.
	pub user: String,
	/// Bearer token; empty until the first successful fetch.
	pub access_token: TokenSecret,
	/// Identity assertion; empty when the authorization server omitted it.
	pub id_token: TokenSecret,
	/// Instant of the last successful (re)fetch or seed.
	pub issued_at: Option<OffsetDateTime>,
	/// Configured validity window.
	pub lifetime: Duration,
}
impl Credential {
	/// Returns the instant after which the credential stops validating.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.issued_at.map(|issued| issued + self.lifetime)
	}

	/// Checks the validity invariant against the provided instant.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		if self.access_token.is_empty() {
			return false;
		}

		match self.issued_at {
			Some(issued) => instant - issued < self.lifetime,
			None => false,
		}
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("user", &self.user)
			.field("access_token", &"<redacted>")
			.field("id_token", &(!self.id_token.is_empty()).then_some("<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("lifetime", &self.lifetime)
			.finish()
	}
}

/// Thread-safe holder for the single credential a generator caches.
///
/// The store is a plain data holder: it never talks to the network and has no error
/// conditions. Writers replace the access token, id token, and issue instant together so
/// readers never observe a half-updated credential.
#[derive(Debug)]
pub struct CredentialStore(RwLock<Credential>);
impl CredentialStore {
	/// Creates an empty store for `user` with the provided lifetime.
	pub fn new(user: impl Into<String>, lifetime: Duration) -> Self {
		Self(RwLock::new(Credential {
			user: user.into(),
			access_token: TokenSecret::default(),
			id_token: TokenSecret::default(),
			issued_at: None,
			lifetime,
		}))
	}

	/// Creates a store pre-seeded with an externally supplied token.
	///
	/// The seed counts as issued at `issued_at`; an empty `access_token` leaves the store empty.
	pub fn seeded(
		user: impl Into<String>,
		lifetime: Duration,
		access_token: impl Into<String>,
		id_token: Option<String>,
		issued_at: OffsetDateTime,
	) -> Self {
		let store = Self::new(user, lifetime);
		let access_token = access_token.into();

		if !access_token.is_empty() {
			store.write(access_token, id_token, issued_at);
		}

		store
	}

	/// Returns `true` if the cached token is usable right now.
	pub fn is_valid(&self) -> bool {
		self.is_valid_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the cached token is usable at `instant`.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		self.0.read().is_valid_at(instant)
	}

	/// Returns a snapshot of the cached credential.
	pub fn read(&self) -> Credential {
		self.0.read().clone()
	}

	/// Replaces the cached values; a missing id token is stored as empty.
	pub fn write(
		&self,
		access_token: impl Into<String>,
		id_token: Option<String>,
		issued_at: OffsetDateTime,
	) {
		let mut guard = self.0.write();

		guard.access_token = TokenSecret::new(access_token);
		guard.id_token = TokenSecret::new(id_token.unwrap_or_default());
		guard.issued_at = Some(issued_at);
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn empty_store_is_never_valid() {
		let store = CredentialStore::new("a@example.com", Duration::hours(1));
		let snapshot = store.read();

		assert!(!store.is_valid());
		assert!(snapshot.access_token.is_empty());
		assert!(snapshot.id_token.is_empty());
		assert_eq!(snapshot.issued_at, None);
		assert_eq!(snapshot.expires_at(), None);
	}

	#[test]
	fn validity_follows_the_lifetime_window() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let store = CredentialStore::seeded(
			"a@example.com",
			Duration::seconds(3600),
			"abc",
			None,
			issued,
		);

		assert!(store.is_valid_at(issued));
		assert!(store.is_valid_at(macros::datetime!(2025-01-01 00:59:59 UTC)));
		assert!(!store.is_valid_at(macros::datetime!(2025-01-01 01:00 UTC)));
		assert_eq!(store.read().expires_at(), Some(macros::datetime!(2025-01-01 01:00 UTC)));
	}

	#[test]
	fn zero_lifetime_never_validates() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let store = CredentialStore::seeded("a@example.com", Duration::ZERO, "abc", None, issued);

		assert!(!store.is_valid_at(issued));
	}

	#[test]
	fn empty_seed_leaves_store_empty() {
		let store = CredentialStore::seeded(
			"a@example.com",
			Duration::hours(1),
			"",
			Some("id".into()),
			OffsetDateTime::now_utc(),
		);

		assert!(!store.is_valid());
		assert!(store.read().id_token.is_empty());
	}

	#[test]
	fn write_replaces_all_cached_values() {
		let store = CredentialStore::new("a@example.com", Duration::hours(1));
		let first = macros::datetime!(2025-01-01 00:00 UTC);
		let second = macros::datetime!(2025-01-01 00:30 UTC);

		store.write("tok1", Some("id1".into()), first);
		store.write("tok2", None, second);

		let snapshot = store.read();

		assert_eq!(snapshot.access_token.expose(), "tok2");
		assert_eq!(snapshot.id_token.expose(), "");
		assert_eq!(snapshot.issued_at, Some(second));
	}

	#[test]
	fn debug_output_redacts_tokens() {
		let store = CredentialStore::seeded(
			"a@example.com",
			Duration::hours(1),
			"very-secret",
			Some("id-secret".into()),
			OffsetDateTime::now_utc(),
		);
		let rendered = format!("{:?}", store.read());

		assert!(!rendered.contains("very-secret"));
		assert!(!rendered.contains("id-secret"));
		assert!(rendered.contains("a@example.com"));
	}
}
