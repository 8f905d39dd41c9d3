//! Demonstrates fetching an XOAUTH2 token through a mocked token endpoint, listening for the
//! `token` event, and reusing the cached auth string for a second SMTP login.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use xoauth2_broker::{config::GeneratorConfig, generator::XOAuth2Generator};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/o/oauth2/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let config = GeneratorConfig::builder("user@example.com")
		.client_id("demo-client")
		.client_secret("demo-secret")
		.refresh_token("demo-refresh")
		.access_url(format!("http://{}/o/oauth2/token", server.address()))
		.build()?;
	let generator = XOAuth2Generator::new(config)?;

	generator.subscribe(|event| {
		println!("Token refreshed for {} (valid for {}s).", event.user, event.timeout);
	});

	let first = generator.get_token().await?;
	let second = generator.get_token().await?;

	println!("AUTH XOAUTH2 {}", first.auth_string.expose());
	println!("Second login reused the cache: {}.", first == second);

	token_mock.assert_async().await;

	Ok(())
}
