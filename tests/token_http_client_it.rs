// std
use std::{
	collections::VecDeque,
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	future::Future,
	pin::Pin,
	sync::Arc,
};
// crates.io
use parking_lot::Mutex;
use time::Duration;
// self
use xoauth2_broker::{
	config::GeneratorConfig,
	error::{ConfigError, Error, ProtocolError, Result, TransportError},
	generator::XOAuth2Generator,
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	oauth::{
		TransportErrorMapper,
		oauth2::{
			AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http::StatusCode,
		},
	},
};

#[derive(Debug)]
enum FakeTransportError {
	Throttled,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Throttled => write!(f, "Transport throttled."),
		}
	}
}
impl StdError for FakeTransportError {}

enum Scripted {
	Respond(u16, &'static str),
	Throttle(Duration),
}

#[derive(Clone, Default)]
struct FakeHttpClient {
	script: Arc<Mutex<VecDeque<Scripted>>>,
	requests: Arc<Mutex<Vec<String>>>,
}
impl FakeHttpClient {
	fn scripted(steps: impl IntoIterator<Item = Scripted>) -> Self {
		Self { script: Arc::new(Mutex::new(steps.into_iter().collect())), ..Default::default() }
	}

	fn recorded_bodies(&self) -> Vec<String> {
		self.requests.lock().clone()
	}
}
impl TokenHttpClient for FakeHttpClient {
	type Handle = FakeHttpHandle;
	type TransportError = FakeTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		FakeHttpHandle { slot, client: self.clone() }
	}
}

struct FakeHttpHandle {
	slot: ResponseMetadataSlot,
	client: FakeHttpClient,
}
impl<'a> AsyncHttpClient<'a> for FakeHttpHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		let slot = self.slot.clone();
		let client = self.client.clone();

		Box::pin(async move {
			assert!(
				slot.take().is_none(),
				"ResponseMetadataSlot must be clear before dispatching a request."
			);

			client.requests.lock().push(
				String::from_utf8(request.body().clone()).expect("Form body should be UTF-8."),
			);

			let step =
				client.script.lock().pop_front().expect("Fake client ran out of scripted steps.");

			match step {
				Scripted::Respond(status, body) => {
					let status =
						StatusCode::from_u16(status).expect("Scripted status should be valid.");
					let mut response = HttpResponse::new(body.as_bytes().to_vec());

					*response.status_mut() = status;

					slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after: None });

					Ok(response)
				},
				Scripted::Throttle(retry_after) => {
					slot.store(ResponseMetadata {
						status: Some(429),
						retry_after: Some(retry_after),
					});

					Err(HttpClientError::Reqwest(Box::new(FakeTransportError::Throttled)))
				},
			}
		})
	}
}

#[derive(Clone, Default)]
struct RecordingTransportErrorMapper {
	metadata: Arc<Mutex<Vec<Option<ResponseMetadata>>>>,
}
impl RecordingTransportErrorMapper {
	fn recorded_metadata(&self) -> Vec<Option<ResponseMetadata>> {
		self.metadata.lock().clone()
	}
}
impl TransportErrorMapper<FakeTransportError> for RecordingTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<FakeTransportError>,
	) -> Error {
		let status = meta.and_then(|value| value.status).unwrap_or_default();
		let retry_after = meta.and_then(|value| value.retry_after);

		self.metadata.lock().push(meta.cloned());

		match err {
			HttpClientError::Reqwest(inner) => ProtocolError::UnexpectedStatus {
				status,
				message: format!("Fake transport error: {inner}"),
				retry_after,
			}
			.into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::from(inner).into(),
			HttpClientError::Other(message) => TransportError::Other { message }.into(),
			other => TransportError::Other { message: format!("{other:?}") }.into(),
		}
	}
}

fn build_generator(
	http_client: FakeHttpClient,
	mapper: RecordingTransportErrorMapper,
) -> XOAuth2Generator<FakeHttpClient, RecordingTransportErrorMapper> {
	let config = GeneratorConfig::builder("test@example.com")
		.client_id("{Client ID}")
		.client_secret("{Client Secret}")
		.refresh_token("saladus")
		.access_url("https://mock.example.com/token")
		.build()
		.expect("Failed to build fake generator config.");

	XOAuth2Generator::with_http_client(config, http_client, mapper)
		.expect("Failed to build fake generator.")
}

#[tokio::test]
async fn fake_token_http_client_surfaces_metadata() {
	let http_client = FakeHttpClient::scripted([Scripted::Throttle(Duration::seconds(30))]);
	let mapper = RecordingTransportErrorMapper::default();
	let generator = build_generator(http_client, mapper.clone());
	let err = generator.get_token().await.expect_err("Request should be throttled with HTTP 429.");

	match err {
		Error::Protocol(ProtocolError::UnexpectedStatus { status, retry_after, .. }) => {
			assert_eq!(status, 429);
			assert_eq!(retry_after, Some(Duration::seconds(30)));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	let observed = mapper.recorded_metadata();

	assert_eq!(observed.len(), 1, "Mapper must record a single request.");
	assert_eq!(
		observed[0],
		Some(ResponseMetadata { status: Some(429), retry_after: Some(Duration::seconds(30)) })
	);
}

#[tokio::test]
async fn failed_exchange_is_retried_on_the_next_call() {
	let http_client = FakeHttpClient::scripted([
		Scripted::Respond(503, "try later"),
		Scripted::Respond(200, r#"{"access_token":"recovered","id_token":"id1"}"#),
	]);
	let generator = build_generator(http_client.clone(), Default::default());
	let err = generator.get_token().await.expect_err("First exchange should fail.");

	assert!(matches!(
		err,
		Error::Protocol(ProtocolError::UnexpectedStatus { status: 503, .. })
	));
	assert!(generator.credential().access_token.is_empty());
	assert!(generator.credential().issued_at.is_none());

	let token = generator.get_token().await.expect("Second exchange should succeed.");

	assert_eq!(token.access_token.expose(), "recovered");
	assert_eq!(token.id_token.expose(), "id1");
	assert_eq!(generator.refresh_metrics.attempts(), 2);
	assert_eq!(generator.refresh_metrics.failures(), 1);
	assert_eq!(generator.refresh_metrics.successes(), 1);

	let bodies = http_client.recorded_bodies();

	assert_eq!(bodies.len(), 2);
	assert!(bodies.iter().all(|body| body.contains("grant_type=refresh_token")));
	assert!(bodies.iter().all(|body| body.contains("refresh_token=saladus")));
}

#[tokio::test]
async fn invalid_client_is_not_confused_with_invalid_grant() {
	let http_client = FakeHttpClient::scripted([Scripted::Respond(
		401,
		r#"{"error":"unauthorized_client","error_description":"Unauthorized"}"#,
	)]);
	let generator = build_generator(http_client, Default::default());
	let err = generator.generate_token().await.expect_err("Client errors should fail.");

	assert!(matches!(err, Error::InvalidClient { ref reason } if reason == "Unauthorized"));
}
