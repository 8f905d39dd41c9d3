//! XOAUTH2 token generator: cache lookups, coalesced refreshes, and `token` events.
//!
//! [`XOAuth2Generator::get_token`] answers from the [`CredentialStore`] while the cached
//! token is inside its lifetime window. Once the token is stale or absent, callers join a
//! single in-flight refresh: the first caller installs a shared cell in the in-flight slot,
//! every later caller awaits the same cell, and whichever task drives the cell performs the
//! `grant_type=refresh_token` exchange. A successful exchange commits the store, fires the
//! `token` event, and only then resolves the waiters; a failed one leaves the store untouched
//! and hands every waiter the same error. The slot is cleared as soon as the exchange
//! resolves or its driving future is dropped, so the next call after a failure retries.

mod event;
mod metrics;

pub use event::*;
pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{self, Credential, CredentialStore, TokenSecret},
	config::GeneratorConfig,
	http::TokenHttpClient,
	oauth::{self, TransportErrorMapper},
	obs::{self, RefreshOutcome, RefreshSpan},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

type InFlight = Arc<AsyncOnceCell<Result<XOAuth2Token>>>;

#[cfg(feature = "reqwest")]
/// Generator specialized for the crate's default reqwest transport stack.
pub type ReqwestGenerator = XOAuth2Generator<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// A currently valid token, ready for SASL XOAUTH2 authentication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XOAuth2Token {
	/// Base64 XOAUTH2 initial response for the generator's user.
	pub auth_string: TokenSecret,
	/// Bearer token the auth string was built from.
	pub access_token: TokenSecret,
	/// Identity assertion; empty when the authorization server omitted it.
	pub id_token: TokenSecret,
}

/// Issues and caches XOAUTH2 credentials for a single user.
///
/// Clones are cheap and share the same cache, in-flight slot, listeners, and metrics, so a
/// clone behaves as another handle to the same generator. Separately constructed generators
/// share nothing.
pub struct XOAuth2Generator<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every exchange.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Counters for cache hits, coalesced joins, and exchange outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	config: Arc<GeneratorConfig>,
	store: Arc<CredentialStore>,
	listeners: Arc<TokenListeners>,
	in_flight: Arc<Mutex<Option<InFlight>>>,
}
impl<C, M> XOAuth2Generator<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a generator that reuses the caller-provided transport + mapper pair.
	///
	/// A pre-seeded `access_token` counts as issued now and obeys the configured lifetime.
	pub fn with_http_client(
		config: GeneratorConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		config.validate()?;

		let store = match &config.access_token {
			Some(seed) => CredentialStore::seeded(
				config.user.clone(),
				config.lifetime(),
				seed.expose(),
				config.id_token.as_ref().map(|token| token.expose().to_owned()),
				OffsetDateTime::now_utc(),
			),
			None => CredentialStore::new(config.user.clone(), config.lifetime()),
		};

		Ok(Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			refresh_metrics: Default::default(),
			config: Arc::new(config),
			store: Arc::new(store),
			listeners: Default::default(),
			in_flight: Default::default(),
		})
	}

	/// Returns the immutable configuration.
	pub fn config(&self) -> &GeneratorConfig {
		&self.config
	}

	/// Returns the identity tokens are issued for.
	pub fn user(&self) -> &str {
		&self.config.user
	}

	/// Returns a snapshot of the cached credential.
	pub fn credential(&self) -> Credential {
		self.store.read()
	}

	/// Returns `true` if the cached token can be served without an exchange.
	pub fn is_valid(&self) -> bool {
		self.store.is_valid()
	}

	/// Registers a `token` listener.
	pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
	where
		F: 'static + Fn(&TokenEvent) + Send + Sync,
	{
		self.listeners.subscribe(listener)
	}

	/// Registers a `token` listener that is removed after its first delivery.
	pub fn subscribe_once<F>(&self, listener: F) -> SubscriptionId
	where
		F: 'static + Fn(&TokenEvent) + Send + Sync,
	{
		self.listeners.subscribe_once(listener)
	}

	/// Removes a `token` listener; returns `false` if it was already gone.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		self.listeners.unsubscribe(id)
	}

	/// Builds the base64 SASL XOAUTH2 initial response for `access_token`.
	pub fn generate_auth_string(&self, access_token: &str) -> Result<String> {
		auth::xoauth2_auth_string(&self.config.user, access_token)
	}

	/// Returns a currently valid token, refreshing it when the cache is stale or empty.
	///
	/// Concurrent callers that miss the cache share one exchange and observe the same outcome.
	pub async fn get_token(&self) -> Result<XOAuth2Token> {
		let span = RefreshSpan::new(&self.config.user, "get_token");

		span.instrument(async move {
			if let Some(token) = self.cached_token()? {
				self.refresh_metrics.record_cache_hit();
				obs::record_refresh_outcome(RefreshOutcome::CacheHit);
				obs::trace_refresh_outcome(RefreshOutcome::CacheHit, None);

				return Ok(token);
			}

			self.refresh(false).await
		})
		.await
	}

	/// Refreshes the token regardless of cache validity.
	///
	/// An exchange already in flight is joined instead of starting a second one.
	pub async fn generate_token(&self) -> Result<XOAuth2Token> {
		let span = RefreshSpan::new(&self.config.user, "generate_token");

		span.instrument(self.refresh(true)).await
	}

	/// Commits an externally obtained token as if it had been refreshed just now.
	///
	/// The `token` event fires exactly as it does after an exchange.
	pub fn update_token(
		&self,
		access_token: impl Into<String>,
		id_token: Option<String>,
	) -> Result<XOAuth2Token> {
		self.commit(TokenSecret::new(access_token), id_token.map(TokenSecret::new))
	}

	async fn refresh(&self, force: bool) -> Result<XOAuth2Token> {
		let cell = {
			let mut slot = self.in_flight.lock();

			match slot.as_ref() {
				Some(cell) => {
					self.refresh_metrics.record_coalesced();
					obs::record_refresh_outcome(RefreshOutcome::Coalesced);
					obs::trace_refresh_outcome(RefreshOutcome::Coalesced, None);

					cell.clone()
				},
				None => {
					// A refresh may have committed between the caller's cache check and here.
					if !force && let Some(token) = self.cached_token()? {
						self.refresh_metrics.record_cache_hit();
						obs::record_refresh_outcome(RefreshOutcome::CacheHit);

						return Ok(token);
					}

					let cell = Arc::new(AsyncOnceCell::new());

					*slot = Some(cell.clone());

					cell
				},
			}
		};

		cell.get_or_init(|| self.exchange(cell.clone())).await.clone()
	}

	async fn exchange(&self, cell: InFlight) -> Result<XOAuth2Token> {
		// Clears the slot even when the driving future is dropped mid-exchange.
		let release = InFlightRelease { slot: &self.in_flight, cell };

		self.refresh_metrics.record_attempt();
		obs::record_refresh_outcome(RefreshOutcome::Attempt);

		let result = oauth::exchange_refresh_token(
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			&self.config,
		)
		.await
		.and_then(|grant| self.commit(grant.access_token, grant.id_token));

		drop(release);

		match &result {
			Ok(_) => {
				self.refresh_metrics.record_success();
				obs::record_refresh_outcome(RefreshOutcome::Success);
				obs::trace_refresh_outcome(RefreshOutcome::Success, None);
			},
			Err(err) => {
				self.refresh_metrics.record_failure();
				obs::record_refresh_outcome(RefreshOutcome::Failure);
				obs::trace_refresh_outcome(RefreshOutcome::Failure, Some(err));
			},
		}

		result
	}

	fn commit(
		&self,
		access_token: TokenSecret,
		id_token: Option<TokenSecret>,
	) -> Result<XOAuth2Token> {
		let auth_string = self.generate_auth_string(access_token.expose())?;
		let id_token = id_token.unwrap_or_default();

		self.store.write(
			access_token.expose(),
			Some(id_token.expose().to_owned()),
			OffsetDateTime::now_utc(),
		);
		self.listeners.emit(&TokenEvent {
			user: self.config.user.clone(),
			access_token: access_token.clone(),
			timeout: self.config.timeout,
			id_token: id_token.clone(),
		});

		Ok(XOAuth2Token { auth_string: TokenSecret::new(auth_string), access_token, id_token })
	}

	fn cached_token(&self) -> Result<Option<XOAuth2Token>> {
		let credential = self.store.read();

		if !credential.is_valid_at(OffsetDateTime::now_utc()) {
			return Ok(None);
		}

		let auth_string = self.generate_auth_string(credential.access_token.expose())?;

		Ok(Some(XOAuth2Token {
			auth_string: TokenSecret::new(auth_string),
			access_token: credential.access_token,
			id_token: credential.id_token,
		}))
	}
}

struct InFlightRelease<'a> {
	slot: &'a Mutex<Option<InFlight>>,
	cell: InFlight,
}
impl Drop for InFlightRelease<'_> {
	fn drop(&mut self) {
		let mut slot = self.slot.lock();

		if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, &self.cell)) {
			*slot = None;
		}
	}
}

#[cfg(feature = "reqwest")]
impl XOAuth2Generator<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a generator backed by a default reqwest transport.
	pub fn new(config: GeneratorConfig) -> Result<Self> {
		Self::with_http_client(
			config,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Clone for XOAuth2Generator<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			config: self.config.clone(),
			store: self.store.clone(),
			listeners: self.listeners.clone(),
			in_flight: self.in_flight.clone(),
		}
	}
}
impl<C, M> Debug for XOAuth2Generator<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("XOAuth2Generator")
			.field("user", &self.config.user)
			.field("client_id", &self.config.client_id)
			.field("access_url", &self.config.access_url)
			.field("credential", &self.store.read())
			.field("refresh_in_flight", &self.in_flight.lock().is_some())
			.finish()
	}
}
