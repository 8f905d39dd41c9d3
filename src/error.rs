//! Generator-level error types shared across the store, transport, and refresh paths.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shared error source.
///
/// A single refresh outcome is handed to every coalesced caller, so sources are reference
/// counted instead of boxed.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The authorization server answered, but not with a usable token.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Authorization server rejected the refresh token.
	#[error("Authorization server rejected the grant: {reason}.")]
	InvalidGrant {
		/// Server-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Server-supplied reason string.
		reason: String,
	},
}

/// Configuration and validation failures.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// HTTP request construction failed.
	#[error("Refresh request could not be constructed.")]
	HttpRequest {
		/// Underlying `http` builder failure.
		#[source]
		source: SharedError,
	},
	/// Access URL cannot be parsed.
	#[error("Access URL is invalid.")]
	InvalidAccessUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Generator configuration is missing a required field.
	#[error("Generator configuration is missing `{field}`.")]
	MissingField {
		/// Name of the missing field.
		field: &'static str,
	},
	/// Cache lifetime must be positive.
	#[error("Token timeout must be a positive number of seconds.")]
	NonPositiveTimeout,
	/// Extra request data collides with a field the exchange sets itself.
	#[error("The `{name}` parameter is reserved for the refresh exchange.")]
	ReservedParam {
		/// Reserved parameter name.
		name: String,
	},
	/// SASL auth string input contains forbidden bytes.
	#[error("Cannot build an XOAUTH2 auth string: {reason}.")]
	InvalidAuthInput {
		/// Which input failed validation.
		reason: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
impl From<oauth2::http::Error> for ConfigError {
	fn from(e: oauth2::http::Error) -> Self {
		Self::HttpRequest { source: Arc::new(e) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures reported after the authorization server responded.
#[derive(Clone, Debug, ThisError)]
pub enum ProtocolError {
	/// Server returned a non-success status.
	#[error("Token endpoint returned HTTP {status}: {message}.")]
	UnexpectedStatus {
		/// HTTP status code.
		status: u16,
		/// Server-supplied message or a body preview.
		message: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Server returned an OAuth error that does not map to a dedicated variant.
	#[error("Token endpoint returned an OAuth error: {message}.")]
	OAuth {
		/// OAuth `error` code.
		code: String,
		/// Human-readable summary.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with a body that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure, including the offending path.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Response parsed but carried no usable access token.
	#[error("Token endpoint response is missing access_token.")]
	MissingAccessToken,
}

/// Transport-level failures (network, IO).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io {
		/// IO failure.
		#[source]
		source: Arc<std::io::Error>,
	},
	/// Transport failed without a structured error.
	#[error("HTTP client error occurred while calling the token endpoint: {message}.")]
	Other {
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Arc::new(src) }
	}
}
impl From<std::io::Error> for TransportError {
	fn from(e: std::io::Error) -> Self {
		Self::Io { source: Arc::new(e) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
