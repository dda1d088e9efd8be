//! Demonstrates [`AuthenticatedClient`] recovering from a rejected access token: the first call
//! gets `401`, the token is refreshed once, and the request is replayed with the new token.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use oauth2_account::{
	auth::{Credential, Identity, TokenSecret},
	coordinator::Coordinator,
	http::ReqwestHttpClient,
	middleware::AuthenticatedClient,
	refresh::{TokenEndpoint, TokenEndpointConfig},
	reqwest::{Client, Method},
	store::MemoryStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"fresh-access\",\"refresh_token\":\"fresh-refresh\",\"token_type\":\"bearer\"}",
			);
		})
		.await;
	let rejected_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/profile").header("authorization", "Bearer expired-access");
			then.status(401).header("www-authenticate", "Bearer error=\"invalid_token\"");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/profile").header("authorization", "Bearer fresh-access");
			then.status(200).header("content-type", "application/json").body("{\"name\":\"alice\"}");
		})
		.await;

	let http = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()?;
	let config = TokenEndpointConfig::builder(Url::parse(&server.url("/token"))?, "demo-client")
		.client_secret("demo-secret")
		.build()?;
	let endpoint = TokenEndpoint::<ReqwestHttpClient>::with_http_client(
		config,
		ReqwestHttpClient::with_client(http.clone()),
	)?;
	let store = Arc::new(MemoryStore::default());
	let identity = Identity::parse("alice", "com.example.demo")?;

	store.insert(
		identity.clone(),
		Credential::new(TokenSecret::new("expired-access"), Some(TokenSecret::new("old-refresh"))),
	);

	let coordinator = Coordinator::new(store, Arc::new(endpoint));
	let client = AuthenticatedClient::new(http, coordinator.for_identity(identity));
	let response = client.send(client.request(Method::GET, server.url("/profile"))).await?;

	println!("Profile status: {}.", response.status());
	println!("Profile body: {}.", response.text().await?);
	println!(
		"Rejected calls: {}, token refreshes: {}.",
		rejected_mock.calls_async().await,
		token_mock.calls_async().await
	);

	Ok(())
}
