//! Generator configuration: immutable per instance, assembled via serde or the builder.

/// Builder API for assembling generator configurations.
pub mod builder;

pub use builder::*;

// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, sasl::SEPARATOR},
	error::ConfigError,
};

/// Token endpoint used when the configuration omits `access_url`.
pub const DEFAULT_ACCESS_URL: &str = "https://accounts.google.com/o/oauth2/token";
/// Cache lifetime, in seconds, used when the configuration omits `timeout`.
pub const DEFAULT_TIMEOUT_SECS: u32 = 3_600;

/// Form fields the refresh exchange always sets itself.
pub(crate) const RESERVED_PARAMS: [&str; 4] =
	["client_id", "client_secret", "refresh_token", "grant_type"];

/// Immutable configuration for one [`XOAuth2Generator`](crate::generator::XOAuth2Generator).
///
/// Field names deserialize in camelCase (`clientId`, `refreshToken`, `accessUrl`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
	/// Identity the tokens are issued for.
	pub user: String,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// OAuth 2.0 client secret.
	pub client_secret: TokenSecret,
	/// Long-lived refresh token exchanged for access tokens.
	pub refresh_token: TokenSecret,
	/// Authorization server token endpoint; [`DEFAULT_ACCESS_URL`] when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub access_url: Option<Url>,
	/// Optional access token that pre-seeds the cache.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub access_token: Option<TokenSecret>,
	/// Optional id token that pre-seeds the cache.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<TokenSecret>,
	/// Cache lifetime in seconds.
	#[serde(default = "default_timeout")]
	pub timeout: u32,
	/// Extra form parameters appended to every refresh request.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub extra_params: BTreeMap<String, String>,
	/// Extra headers added to every refresh request.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub extra_headers: BTreeMap<String, String>,
}
impl GeneratorConfig {
	/// Creates a builder for the provided user.
	pub fn builder(user: impl Into<String>) -> GeneratorConfigBuilder {
		GeneratorConfigBuilder::new(user)
	}

	/// Returns the configured token endpoint, falling back to [`DEFAULT_ACCESS_URL`].
	pub fn access_url(&self) -> Result<Url, ConfigError> {
		match &self.access_url {
			Some(url) => Ok(url.clone()),
			None => Url::parse(DEFAULT_ACCESS_URL)
				.map_err(|source| ConfigError::InvalidAccessUrl { source }),
		}
	}

	/// Returns the cache lifetime as a [`Duration`].
	pub fn lifetime(&self) -> Duration {
		Duration::seconds(i64::from(self.timeout))
	}

	/// Checks required fields and reserved parameter names.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.user.trim().is_empty() {
			return Err(ConfigError::MissingField { field: "user" });
		}
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingField { field: "client_id" });
		}
		if self.client_secret.is_empty() {
			return Err(ConfigError::MissingField { field: "client_secret" });
		}
		if self.refresh_token.is_empty() {
			return Err(ConfigError::MissingField { field: "refresh_token" });
		}
		if self.timeout == 0 {
			return Err(ConfigError::NonPositiveTimeout);
		}
		if self.user.contains(SEPARATOR) {
			return Err(ConfigError::InvalidAuthInput { reason: "user contains a \\x01 byte" });
		}
		if self.access_token.as_ref().is_some_and(|seed| seed.expose().contains(SEPARATOR)) {
			return Err(ConfigError::InvalidAuthInput {
				reason: "seeded access token contains a \\x01 byte",
			});
		}

		self.access_url()?;

		if let Some(name) =
			self.extra_params.keys().find(|name| RESERVED_PARAMS.contains(&name.as_str()))
		{
			return Err(ConfigError::ReservedParam { name: name.clone() });
		}

		Ok(())
	}
}

fn default_timeout() -> u32 {
	DEFAULT_TIMEOUT_SECS
}
