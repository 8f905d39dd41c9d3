//! SASL XOAUTH2 initial-response encoding.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
// self
use crate::{_prelude::*, error::ConfigError};

/// Field separator of the XOAUTH2 initial response.
pub const SEPARATOR: char = '\x01';

/// Builds the base64 XOAUTH2 initial response for `user` and `access_token`.
///
/// Format before encoding: `user=<user>\x01auth=Bearer <token>\x01\x01`.
pub fn xoauth2_auth_string(user: &str, access_token: &str) -> Result<String> {
	if user.contains(SEPARATOR) {
		return Err(ConfigError::InvalidAuthInput { reason: "user contains a \\x01 byte" }.into());
	}
	if access_token.is_empty() {
		return Err(ConfigError::InvalidAuthInput { reason: "access token is empty" }.into());
	}
	if access_token.contains(SEPARATOR) {
		return Err(
			ConfigError::InvalidAuthInput { reason: "access token contains a \\x01 byte" }.into()
		);
	}

	let raw = format!("user={user}{SEPARATOR}auth=Bearer {access_token}{SEPARATOR}{SEPARATOR}");

	Ok(STANDARD.encode(raw))
}
