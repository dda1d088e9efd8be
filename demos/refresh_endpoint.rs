//! Demonstrates an [`AccountManager`] whose refresh operation calls a real OAuth 2.0 token
//! endpoint (served here by `httpmock`), including the login signal raised when the refresh token
//! is revoked.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use oauth2_account::{
	account::AccountManager,
	auth::{AccountData, AccountName, AccountType, TokenPair},
	coordinator::Coordinator,
	http::ReqwestHttpClient,
	refresh::{ClientAuthMethod, TokenEndpoint, TokenEndpointConfig},
	reqwest::Client,
	store::MemoryStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let mut rotate = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access-2\",\"refresh_token\":\"demo-refresh-2\",\"token_type\":\"bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let config = TokenEndpointConfig::builder(Url::parse(&server.url("/token"))?, "demo-client")
		.client_secret("demo-secret")
		.auth_method(ClientAuthMethod::ClientSecretPost)
		.build()?;
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let endpoint = TokenEndpoint::<ReqwestHttpClient>::with_http_client(config, http_client)?;
	let coordinator = Coordinator::new(Arc::new(MemoryStore::default()), Arc::new(endpoint));
	let mut login_requests = coordinator.subscribe_login_requests();
	let accounts = AccountManager::new(coordinator, AccountType::new("com.example.demo")?);

	accounts
		.login(
			AccountName::new("alice")?,
			TokenPair::new("demo-access-1", "demo-refresh-1"),
			AccountData::with("display_name", "Alice"),
		)
		.await?;

	println!("Cached token: {}.", accounts.access_token().await?.expose());

	let renewed = accounts.new_access_token("demo-access-1").await?;

	println!("Renewed token after a simulated 401: {}.", renewed.expose());

	rotate.delete_async().await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"session revoked\"}");
		})
		.await;

	if let Err(e) = accounts.new_access_token(renewed.expose()).await {
		println!("Refresh failed: {e}");
	}
	if let Ok(request) = login_requests.try_recv() {
		println!("Login required for {} ({:?}).", request.identity, request.reason);
	}

	println!("Refresh metrics: {:?}.", accounts.coordinator().metrics());

	Ok(())
}
