//! Instance-scoped `token` event fan-out.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{_prelude::*, auth::TokenSecret};

/// Callback invoked with every [`TokenEvent`].
pub type TokenListener = Arc<dyn Fn(&TokenEvent) + Send + Sync>;

/// Payload of the `token` event fired after each successful refresh or manual update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEvent {
	/// Identity the token was issued for.
	pub user: String,
	/// Newly committed access token.
	pub access_token: TokenSecret,
	/// Configured cache lifetime in seconds.
	pub timeout: u32,
	/// Newly committed id token (empty when the server omitted it).
	pub id_token: TokenSecret,
}

/// Handle identifying a registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct ListenerEntry {
	id: SubscriptionId,
	once: bool,
	listener: TokenListener,
}

/// Observer list owned by a single generator.
#[derive(Default)]
pub struct TokenListeners {
	next_id: AtomicU64,
	entries: Mutex<Vec<ListenerEntry>>,
}
impl TokenListeners {
	/// Registers a listener that fires on every event.
	pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
	where
		F: 'static + Fn(&TokenEvent) + Send + Sync,
	{
		self.insert(Arc::new(listener), false)
	}

	/// Registers a listener that is removed after its first delivery.
	pub fn subscribe_once<F>(&self, listener: F) -> SubscriptionId
	where
		F: 'static + Fn(&TokenEvent) + Send + Sync,
	{
		self.insert(Arc::new(listener), true)
	}

	/// Removes a listener; returns `false` if it was already gone.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let mut entries = self.entries.lock();
		let before = entries.len();

		entries.retain(|entry| entry.id != id);

		entries.len() != before
	}

	/// Returns the number of registered listeners.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Returns `true` when nobody is listening.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Delivers `event` to every listener registered at call time.
	///
	/// Listeners run outside the lock, so they may subscribe or unsubscribe re-entrantly.
	pub fn emit(&self, event: &TokenEvent) {
		let snapshot = {
			let mut entries = self.entries.lock();
			let snapshot =
				entries.iter().map(|entry| entry.listener.clone()).collect::<Vec<_>>();

			entries.retain(|entry| !entry.once);

			snapshot
		};

		for listener in snapshot {
			listener(event);
		}
	}

	fn insert(&self, listener: TokenListener, once: bool) -> SubscriptionId {
		let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

		self.entries.lock().push(ListenerEntry { id, once, listener });

		id
	}
}
impl Debug for TokenListeners {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenListeners").field("len", &self.len()).finish()
	}
}
