//! OAuth 2.0 `refresh_token` grant implemented on top of the `oauth2` crate.

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError, RefreshToken,
	RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicRequestTokenError},
};
// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
use crate::{
	_prelude::*,
	auth::{Identity, TokenPair, TokenSecret},
	error::{ConfigError, SharedError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	obs::{self, OpKind, OpOutcome, OpSpan},
	refresh::{RefreshFuture, RefreshOperation},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
	/// Public clients that only send `client_id`.
	None,
}

/// Errors raised while validating a [`TokenEndpointConfig`].
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenEndpointConfigError {
	/// Token endpoints must use HTTPS.
	#[error("The token endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// `client_id` is mandatory.
	#[error("Client identifier cannot be empty.")]
	MissingClientId,
	/// Confidential client methods need a secret.
	#[error("Client authentication method {method:?} requires a client secret.")]
	MissingClientSecret {
		/// Method that was configured.
		method: ClientAuthMethod,
	},
	/// Scopes cannot be blank or contain whitespace.
	#[error("Scope {scope:?} is empty or contains whitespace.")]
	InvalidScope {
		/// Offending scope value.
		scope: String,
	},
}

/// Token endpoint settings, loadable from any serde format.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEndpointConfig {
	/// Token endpoint receiving `grant_type=refresh_token` requests.
	pub token_url: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret for confidential clients.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_secret: Option<String>,
	/// How the client authenticates to the token endpoint.
	#[serde(default)]
	pub auth_method: ClientAuthMethod,
	/// Scopes requested on every refresh. Empty keeps the originally granted scope.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub scopes: Vec<String>,
}
impl TokenEndpointConfig {
	/// Starts a builder for the given endpoint and client identifier.
	pub fn builder(token_url: Url, client_id: impl Into<String>) -> TokenEndpointConfigBuilder {
		TokenEndpointConfigBuilder::new(token_url, client_id)
	}

	/// Checks every invariant; call after deserializing a config by hand.
	pub fn validate(&self) -> Result<(), TokenEndpointConfigError> {
		if self.token_url.scheme() != "https" {
			return Err(TokenEndpointConfigError::InsecureEndpoint {
				url: self.token_url.to_string(),
			});
		}
		if self.client_id.trim().is_empty() {
			return Err(TokenEndpointConfigError::MissingClientId);
		}
		if self.auth_method != ClientAuthMethod::None
			&& self.client_secret.as_deref().is_none_or(str::is_empty)
		{
			return Err(TokenEndpointConfigError::MissingClientSecret { method: self.auth_method });
		}
		if let Some(scope) =
			self.scopes.iter().find(|s| s.is_empty() || s.chars().any(char::is_whitespace))
		{
			return Err(TokenEndpointConfigError::InvalidScope { scope: scope.clone() });
		}

		Ok(())
	}

	fn oauth_client(&self) -> Result<ConfiguredBasicClient, ConfigError> {
		self.validate()?;

		let token_url = TokenUrl::new(self.token_url.to_string())
			.map_err(|source| ConfigError::InvalidTokenUrl { source })?;
		let mut client =
			BasicClient::new(ClientId::new(self.client_id.clone())).set_token_uri(token_url);

		match self.auth_method {
			ClientAuthMethod::ClientSecretBasic | ClientAuthMethod::ClientSecretPost => {
				if let Some(secret) = &self.client_secret {
					client = client.set_client_secret(ClientSecret::new(secret.clone()));
				}
			},
			ClientAuthMethod::None => {},
		}

		if self.auth_method != ClientAuthMethod::ClientSecretBasic {
			client = client.set_auth_type(AuthType::RequestBody);
		}

		Ok(client)
	}
}
impl Debug for TokenEndpointConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenEndpointConfig")
			.field("token_url", &self.token_url.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
			.field("auth_method", &self.auth_method)
			.field("scopes", &self.scopes)
			.finish()
	}
}

/// Builder for [`TokenEndpointConfig`] values.
#[derive(Debug)]
pub struct TokenEndpointConfigBuilder {
	config: TokenEndpointConfig,
}
impl TokenEndpointConfigBuilder {
	/// Creates a builder defaulting to [`ClientAuthMethod::ClientSecretBasic`] without scopes.
	pub fn new(token_url: Url, client_id: impl Into<String>) -> Self {
		Self {
			config: TokenEndpointConfig {
				token_url,
				client_id: client_id.into(),
				client_secret: None,
				auth_method: ClientAuthMethod::default(),
				scopes: Vec::new(),
			},
		}
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.config.client_secret = Some(secret.into());

		self
	}

	/// Overrides the client authentication method.
	pub fn auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.config.auth_method = method;

		self
	}

	/// Adds one scope to every refresh request.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.config.scopes.push(scope.into());

		self
	}

	/// Consumes the builder and validates the resulting config.
	pub fn build(self) -> Result<TokenEndpointConfig, TokenEndpointConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}

/// [`RefreshOperation`] that exchanges refresh tokens at an OAuth 2.0 token endpoint.
#[cfg(feature = "reqwest")]
pub struct TokenEndpoint<C = ReqwestHttpClient>
where
	C: ?Sized + TokenHttpClient,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	token_url: Url,
	scopes: Vec<String>,
}
/// [`RefreshOperation`] that exchanges refresh tokens at an OAuth 2.0 token endpoint.
#[cfg(not(feature = "reqwest"))]
pub struct TokenEndpoint<C>
where
	C: ?Sized + TokenHttpClient,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	token_url: Url,
	scopes: Vec<String>,
}
#[cfg(feature = "reqwest")]
impl TokenEndpoint<ReqwestHttpClient> {
	/// Builds an endpoint backed by a default reqwest client with redirects disabled.
	pub fn new(config: TokenEndpointConfig) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Self::with_http_client(config, ReqwestHttpClient::with_client(client))
	}
}
impl<C> TokenEndpoint<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Builds an endpoint using a caller-provided transport.
	pub fn with_http_client(
		config: TokenEndpointConfig,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self, ConfigError> {
		Ok(Self {
			oauth_client: config.oauth_client()?,
			http_client: http_client.into(),
			token_url: config.token_url,
			scopes: config.scopes,
		})
	}
}
impl<C> Debug for TokenEndpoint<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenEndpoint")
			.field("token_url", &self.token_url.as_str())
			.field("scopes", &self.scopes)
			.finish_non_exhaustive()
	}
}
impl<C> RefreshOperation for TokenEndpoint<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn refresh<'a>(
		&'a self,
		identity: &'a Identity,
		refresh_token: &'a TokenSecret,
	) -> RefreshFuture<'a> {
		let span = OpSpan::new(OpKind::Refresh, "token_endpoint", Some(identity));
		let meta = ResponseMetadataSlot::default();

		Box::pin(span.instrument(async move {
			let handle = self.http_client.with_metadata(meta.clone());
			let secret = RefreshToken::new(refresh_token.expose().to_owned());
			let mut request = self.oauth_client.exchange_refresh_token(&secret);

			for scope in &self.scopes {
				request = request.add_scope(Scope::new(scope.clone()));
			}

			let result = request.request_async(&handle).await;

			match result {
				Ok(response) => Ok(TokenPair {
					access_token: TokenSecret::new(response.access_token().secret().to_owned()),
					refresh_token: response
						.refresh_token()
						.and_then(|token| TokenSecret::non_empty(token.secret().to_owned())),
				}),
				Err(e) => {
					let err = map_request_error(meta.take(), e);

					obs::record_op_outcome(OpKind::Refresh, OpOutcome::Failure);

					#[cfg(feature = "tracing")]
					tracing::warn!(error = %err, "token endpoint refused the refresh");

					Err(err)
				},
			}
		}))
	}
}

fn map_request_error<E>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	let status = meta.as_ref().and_then(|m| m.status);
	let retry_after = meta.as_ref().and_then(|m| m.retry_after);

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response(response, status, retry_after),
		RequestTokenError::Request(error) => map_transport_error(error, status, retry_after),
		RequestTokenError::Parse(error, _body) if status.is_some_and(is_unavailable) =>
			Error::Network {
				message: format!("Token endpoint is unavailable (HTTP {})", status.unwrap_or(0)),
				status,
				retry_after,
				source: Some(Arc::new(error)),
			},
		RequestTokenError::Parse(error, _body) => Error::Unexpected {
			message: format!("Token endpoint returned a malformed response: {error}"),
			source: Some(Arc::new(error)),
		},
		RequestTokenError::Other(message) => Error::Unexpected {
			message: format!("Token endpoint returned an unexpected response: {message}"),
			source: None,
		},
	}
}

fn map_server_response(
	response: BasicErrorResponse,
	status: Option<u16>,
	retry_after: Option<Duration>,
) -> Error {
	let reason = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	match response.error() {
		BasicErrorResponseType::InvalidGrant
		| BasicErrorResponseType::UnauthorizedClient
		| BasicErrorResponseType::InvalidClient => Error::Rejected { reason },
		_ if status.is_some_and(is_unavailable) => Error::Network {
			message: format!("Token endpoint is unavailable ({reason})"),
			status,
			retry_after,
			source: None,
		},
		_ => Error::Rejected { reason },
	}
}

fn is_unavailable(status: u16) -> bool {
	status == 429 || status >= 500
}

fn map_transport_error<E>(
	err: HttpClientError<E>,
	status: Option<u16>,
	retry_after: Option<Duration>,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	let (message, source): (String, Option<SharedError>) = match err {
		HttpClientError::Reqwest(inner) => {
			let source: Box<dyn StdError + Send + Sync> = inner;

			(source.to_string(), Some(Arc::from(source)))
		},
		HttpClientError::Http(inner) => (inner.to_string(), Some(Arc::new(inner))),
		HttpClientError::Io(inner) => (inner.to_string(), Some(Arc::new(inner))),
		HttpClientError::Other(message) => (message, None),
		_ => ("unknown HTTP client failure".into(), None),
	};

	Error::Network {
		message: format!("Failed to reach the token endpoint: {message}"),
		status,
		retry_after,
		source,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Fixture URL should parse.")
	}

	#[test]
	fn builder_validates_endpoint_and_client() {
		let err = TokenEndpointConfig::builder(url("http://auth.example.com/token"), "app")
			.client_secret("s")
			.build()
			.expect_err("Plain HTTP endpoints should be rejected.");

		assert!(matches!(err, TokenEndpointConfigError::InsecureEndpoint { .. }));
		assert_eq!(
			TokenEndpointConfig::builder(url("https://auth.example.com/token"), " ")
				.auth_method(ClientAuthMethod::None)
				.build(),
			Err(TokenEndpointConfigError::MissingClientId)
		);
		assert_eq!(
			TokenEndpointConfig::builder(url("https://auth.example.com/token"), "app").build(),
			Err(TokenEndpointConfigError::MissingClientSecret {
				method: ClientAuthMethod::ClientSecretBasic
			})
		);
		assert!(matches!(
			TokenEndpointConfig::builder(url("https://auth.example.com/token"), "app")
				.auth_method(ClientAuthMethod::None)
				.scope("read write")
				.build(),
			Err(TokenEndpointConfigError::InvalidScope { .. })
		));
	}

	#[test]
	fn config_deserializes_with_defaults_and_redacts_secret() {
		let config: TokenEndpointConfig = serde_json::from_str(
			r#"{"token_url":"https://auth.example.com/token","client_id":"app","client_secret":"hunter2"}"#,
		)
		.expect("Config JSON should deserialize.");

		assert_eq!(config.auth_method, ClientAuthMethod::ClientSecretBasic);
		assert!(config.scopes.is_empty());
		assert!(config.validate().is_ok());
		assert!(!format!("{config:?}").contains("hunter2"));
	}

	#[test]
	fn server_errors_are_classified_by_code_and_status() {
		let invalid_grant = BasicErrorResponse::new(
			BasicErrorResponseType::InvalidGrant,
			Some("refresh token revoked".into()),
			None,
		);

		assert!(matches!(
			map_server_response(invalid_grant, Some(400), None),
			Error::Rejected { reason } if reason == "invalid_grant: refresh token revoked"
		));

		let overloaded = BasicErrorResponse::new(
			BasicErrorResponseType::Extension("temporarily_unavailable".into()),
			None,
			None,
		);

		assert!(matches!(
			map_server_response(overloaded, Some(503), Some(Duration::seconds(30))),
			Error::Network { status: Some(503), retry_after: Some(_), .. }
		));

		let bad_request =
			BasicErrorResponse::new(BasicErrorResponseType::InvalidRequest, None, None);

		assert!(map_server_response(bad_request, Some(400), None).requires_login());
	}

	#[test]
	fn transport_failures_become_network_errors() {
		let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
		let err = map_transport_error::<std::io::Error>(HttpClientError::Io(io), None, None);

		assert!(err.is_transient());
		assert!(StdError::source(&err).is_some());
	}
}
