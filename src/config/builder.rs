// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::{DEFAULT_TIMEOUT_SECS, GeneratorConfig},
	error::ConfigError,
};

/// Builder for [`GeneratorConfig`] values.
#[derive(Debug)]
pub struct GeneratorConfigBuilder {
	user: String,
	client_id: String,
	client_secret: TokenSecret,
	refresh_token: TokenSecret,
	access_url: Option<String>,
	access_token: Option<TokenSecret>,
	id_token: Option<TokenSecret>,
	timeout: u32,
	extra_params: BTreeMap<String, String>,
	extra_headers: BTreeMap<String, String>,
}
impl GeneratorConfigBuilder {
	/// Creates a new builder for the provided user.
	pub fn new(user: impl Into<String>) -> Self {
		Self {
			user: user.into(),
			client_id: String::new(),
			client_secret: TokenSecret::default(),
			refresh_token: TokenSecret::default(),
			access_url: None,
			access_token: None,
			id_token: None,
			timeout: DEFAULT_TIMEOUT_SECS,
			extra_params: BTreeMap::new(),
			extra_headers: BTreeMap::new(),
		}
	}

	/// Sets the OAuth 2.0 client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = client_id.into();

		self
	}

	/// Sets the OAuth 2.0 client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = TokenSecret::new(secret);

		self
	}

	/// Sets the refresh token.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = TokenSecret::new(token);

		self
	}

	/// Sets the token endpoint; parsed when [`build`](Self::build) runs.
	pub fn access_url(mut self, url: impl Into<String>) -> Self {
		self.access_url = Some(url.into());

		self
	}

	/// Pre-seeds the cache with an access token.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Pre-seeds the cache with an id token.
	pub fn id_token(mut self, token: impl Into<String>) -> Self {
		self.id_token = Some(TokenSecret::new(token));

		self
	}

	/// Overrides the cache lifetime in seconds (defaults to 3600).
	pub fn timeout(mut self, secs: u32) -> Self {
		self.timeout = secs;

		self
	}

	/// Appends a form parameter to every refresh request.
	pub fn extra_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra_params.insert(name.into(), value.into());

		self
	}

	/// Adds a header to every refresh request.
	pub fn extra_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra_headers.insert(name.into(), value.into());

		self
	}

	/// Validates the collected values and produces a [`GeneratorConfig`].
	pub fn build(self) -> Result<GeneratorConfig, ConfigError> {
		let access_url = self
			.access_url
			.map(|raw| Url::parse(&raw).map_err(|source| ConfigError::InvalidAccessUrl { source }))
			.transpose()?;
		let config = GeneratorConfig {
			user: self.user,
			client_id: self.client_id,
			client_secret: self.client_secret,
			refresh_token: self.refresh_token,
			access_url,
			access_token: self.access_token,
			id_token: self.id_token,
			timeout: self.timeout,
			extra_params: self.extra_params,
			extra_headers: self.extra_headers,
		};

		config.validate()?;

		Ok(config)
	}
}
