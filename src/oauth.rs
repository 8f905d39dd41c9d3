//! OAuth 2.0 `refresh_token` grant exchange and response classification.

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method, Request,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
use url::form_urlencoded::Serializer;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::GeneratorConfig,
	error::{ConfigError, ProtocolError, TransportError},
	http::{self, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};

/// Grant type identifier sent with every exchange.
pub const GRANT_TYPE_REFRESH_TOKEN: &str = "refresh_token";

const BODY_PREVIEW_LIMIT: usize = 256;

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		_metadata: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(*inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::from(inner).into(),
			HttpClientError::Other(message) => TransportError::Other { message }.into(),
			_ => TransportError::Other { message: "unrecognized transport failure".into() }.into(),
		}
	}
}

/// Token material extracted from a successful exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshGrant {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Identity assertion, when the server returned one.
	pub id_token: Option<TokenSecret>,
}

#[derive(Debug, Deserialize)]
struct RawTokenResponse {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	id_token: Option<String>,
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	error_description: Option<String>,
}

/// Performs one `grant_type=refresh_token` exchange against the configured endpoint.
///
/// The request is form encoded and carries `client_id`, `client_secret`, `refresh_token`,
/// and `grant_type`, followed by any configured extra parameters and headers.
pub async fn exchange_refresh_token<C, M>(
	http_client: &C,
	mapper: &M,
	config: &GeneratorConfig,
) -> Result<RefreshGrant>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let request = build_refresh_request(config)?;
	let meta = ResponseMetadataSlot::default();
	let handle = http_client.with_metadata(meta.clone());
	let response = handle
		.call(request)
		.await
		.map_err(|err| mapper.map_transport_error(meta.take().as_ref(), err))?;

	parse_refresh_response(response)
}

/// Builds the form-encoded refresh request for `config`.
pub fn build_refresh_request(config: &GeneratorConfig) -> Result<HttpRequest> {
	let access_url = config.access_url()?;
	let mut form = Serializer::new(String::new());

	form.append_pair("client_id", &config.client_id)
		.append_pair("client_secret", config.client_secret.expose())
		.append_pair("refresh_token", config.refresh_token.expose())
		.append_pair("grant_type", GRANT_TYPE_REFRESH_TOKEN);

	for (name, value) in &config.extra_params {
		form.append_pair(name, value);
	}

	let mut builder = Request::builder()
		.method(Method::POST)
		.uri(access_url.as_str())
		.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
		.header(ACCEPT, "application/json");

	for (name, value) in &config.extra_headers {
		builder = builder.header(name.as_str(), value.as_str());
	}

	builder.body(form.finish().into_bytes()).map_err(|err| ConfigError::from(err).into())
}

/// Classifies an exchange response into a [`RefreshGrant`] or an error.
pub fn parse_refresh_response(response: HttpResponse) -> Result<RefreshGrant> {
	let status = response.status();
	let body = response.body();

	if !status.is_success() {
		let retry_after = http::parse_retry_after(response.headers());

		return Err(match parse_body(body, status.as_u16()) {
			Ok(RawTokenResponse { error: Some(code), error_description, .. }) =>
				classify_oauth_error(code, error_description, Some(status.as_u16())),
			_ => ProtocolError::UnexpectedStatus {
				status: status.as_u16(),
				message: body_preview(body),
				retry_after,
			}
			.into(),
		});
	}

	let raw = parse_body(body, status.as_u16())?;

	if let Some(code) = raw.error {
		return Err(classify_oauth_error(code, raw.error_description, Some(status.as_u16())));
	}

	let access_token = raw
		.access_token
		.filter(|token| !token.is_empty())
		.ok_or(ProtocolError::MissingAccessToken)?;

	Ok(RefreshGrant {
		access_token: TokenSecret::new(access_token),
		id_token: raw.id_token.map(TokenSecret::new),
	})
}

fn parse_body(body: &[u8], status: u16) -> Result<RawTokenResponse> {
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
		ProtocolError::TokenResponseParse { source: Arc::new(source), status: Some(status) }.into()
	})
}

fn classify_oauth_error(code: String, description: Option<String>, status: Option<u16>) -> Error {
	let reason = description.unwrap_or_else(|| code.clone());

	if code.eq_ignore_ascii_case("invalid_grant") || code.eq_ignore_ascii_case("access_denied") {
		Error::InvalidGrant { reason }
	} else if code.eq_ignore_ascii_case("invalid_client")
		|| code.eq_ignore_ascii_case("unauthorized_client")
	{
		Error::InvalidClient { reason }
	} else {
		ProtocolError::OAuth { code, message: reason, status }.into()
	}
}

fn body_preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);

	if text.chars().count() <= BODY_PREVIEW_LIMIT {
		return text.into_owned();
	}

	let mut buf = text.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}

	TransportError::from(err).into()
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{StatusCode, header::RETRY_AFTER};
	// self
	use super::*;

	fn config() -> GeneratorConfig {
		GeneratorConfig::builder("test@example.com")
			.client_id("{Client ID}")
			.client_secret("{Client Secret}")
			.refresh_token("saladus")
			.access_url("http://localhost:8993/token")
			.extra_param("scope", "mail")
			.extra_header("x-trace", "abc")
			.build()
			.expect("Config fixture should build.")
	}

	fn response(status: StatusCode, body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() = status;

		response
	}

	#[test]
	fn request_carries_refresh_grant_form() {
		let request = build_refresh_request(&config()).expect("Request should build.");
		let body = String::from_utf8(request.body().clone()).expect("Form body should be UTF-8.");

		assert_eq!(request.method(), Method::POST);
		assert_eq!(request.uri(), "http://localhost:8993/token");
		assert_eq!(
			request.headers().get(CONTENT_TYPE).and_then(|value| value.to_str().ok()),
			Some("application/x-www-form-urlencoded")
		);
		assert_eq!(request.headers().get("x-trace").and_then(|v| v.to_str().ok()), Some("abc"));
		assert_eq!(
			body,
			"client_id=%7BClient+ID%7D&client_secret=%7BClient+Secret%7D&refresh_token=saladus&grant_type=refresh_token&scope=mail"
		);
	}

	#[test]
	fn success_without_id_token_yields_none() {
		let grant = parse_refresh_response(response(
			StatusCode::OK,
			r#"{"access_token":"tok1","token_type":"Bearer","expires_in":3600}"#,
		))
		.expect("Well-formed response should parse.");

		assert_eq!(grant.access_token.expose(), "tok1");
		assert_eq!(grant.id_token, None);
	}

	#[test]
	fn success_with_id_token_keeps_it() {
		let grant = parse_refresh_response(response(
			StatusCode::OK,
			r#"{"access_token":"tok1","id_token":"id1"}"#,
		))
		.expect("Well-formed response should parse.");

		assert_eq!(grant.id_token.as_ref().map(TokenSecret::expose), Some("id1"));
	}

	#[test]
	fn missing_access_token_is_a_protocol_error() {
		let err = parse_refresh_response(response(StatusCode::OK, r#"{"id_token":"id1"}"#))
			.expect_err("Responses without access_token should fail.");

		assert!(matches!(err, Error::Protocol(ProtocolError::MissingAccessToken)));
	}

	#[test]
	fn malformed_body_reports_the_json_path() {
		let err = parse_refresh_response(response(StatusCode::OK, r#"{"access_token":42}"#))
			.expect_err("Non-string access tokens should fail.");

		match err {
			Error::Protocol(ProtocolError::TokenResponseParse { source, status }) => {
				assert_eq!(source.path().to_string(), "access_token");
				assert_eq!(status, Some(200));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}

		let err = parse_refresh_response(response(StatusCode::OK, "<html>nope</html>"))
			.expect_err("Non-JSON bodies should fail.");

		assert!(matches!(err, Error::Protocol(ProtocolError::TokenResponseParse { .. })));
	}

	#[test]
	fn oauth_error_bodies_are_classified() {
		let err = parse_refresh_response(response(
			StatusCode::BAD_REQUEST,
			r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
		))
		.expect_err("invalid_grant should fail.");

		assert!(
			matches!(err, Error::InvalidGrant { ref reason } if reason == "Token has been expired or revoked.")
		);

		let err = parse_refresh_response(response(
			StatusCode::UNAUTHORIZED,
			r#"{"error":"invalid_client"}"#,
		))
		.expect_err("invalid_client should fail.");

		assert!(matches!(err, Error::InvalidClient { ref reason } if reason == "invalid_client"));

		let err = parse_refresh_response(response(StatusCode::OK, r#"{"error":"slow_down"}"#))
			.expect_err("An error field on a 2xx response should fail.");

		assert!(matches!(
			err,
			Error::Protocol(ProtocolError::OAuth { ref code, status: Some(200), .. }) if code == "slow_down"
		));
	}

	#[test]
	fn non_json_error_status_keeps_preview_and_retry_hint() {
		let mut failed = response(StatusCode::SERVICE_UNAVAILABLE, "upstream down");

		failed.headers_mut().insert(RETRY_AFTER, "30".parse().expect("Header should parse."));

		let err = parse_refresh_response(failed).expect_err("503 should fail.");

		match err {
			Error::Protocol(ProtocolError::UnexpectedStatus { status, message, retry_after }) => {
				assert_eq!(status, 503);
				assert_eq!(message, "upstream down");
				assert_eq!(retry_after, Some(Duration::seconds(30)));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn body_preview_truncates_long_payloads() {
		let long = "x".repeat(BODY_PREVIEW_LIMIT + 10);
		let preview = body_preview(long.as_bytes());

		assert_eq!(preview.chars().count(), BODY_PREVIEW_LIMIT + 1);
		assert!(preview.ends_with('…'));
	}
}
