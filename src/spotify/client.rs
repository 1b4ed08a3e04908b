use async_trait::async_trait;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, RefreshToken, RequestTokenError, Scope, TokenResponse, TokenUrl,
    basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType},
};
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::models::{CurrentlyPlaying, TrackItem};
use crate::{
    config::SpotifyConfig,
    credentials::CredentialRecord,
    error::{AppError, RelayError, RelayResult},
};

// Avoid oauth2 type madness
pub type Oauth2Client =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Result of exchanging a refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Present only when the provider rotated the refresh token.
    pub refresh_token: Option<String>,
}

/// Music-service operations the bot depends on
#[async_trait]
pub trait SpotifyApi: Send + Sync {
    /// Authorization page URL carrying `state` back to the callback.
    fn authorize_url(&self, state: &str) -> String;

    /// Trade an authorization code for a token pair.
    async fn exchange_code(&self, code: &str) -> RelayResult<CredentialRecord>;

    /// Trade a refresh token for a new access token.
    ///
    /// Fails with [`RelayError::UpstreamAuthExpired`] when the provider
    /// rejects the refresh token itself.
    async fn refresh_access_token(&self, refresh_token: &str) -> RelayResult<RefreshedToken>;

    /// Currently playing track, or `None` when nothing is playing.
    async fn currently_playing(&self, access_token: &str) -> RelayResult<Option<TrackItem>>;
}

pub struct SpotifyClient {
    oauth: Oauth2Client,
    scopes: Vec<String>,
    api_url: String,
    http_client: Client,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig) -> Result<Self, AppError> {
        let auth_url = AuthUrl::new(config.auth_url.clone()).map_err(|e| {
            AppError::Internal(format!("Invalid Spotify authorization URL: {}", e))
        })?;
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| AppError::Internal(format!("Invalid Spotify token URL: {}", e)))?;
        let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
            .map_err(|e| AppError::Internal(format!("Invalid Spotify redirect URI: {}", e)))?;

        let oauth = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        let http_client = reqwest::ClientBuilder::new()
            // Following redirects opens the client up to SSRF vulnerabilities.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Internal(format!("reqwest build error: {e}")))?;

        Ok(Self {
            oauth,
            scopes: config.scopes.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }
}

fn map_token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> RelayError
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => match response.error() {
            BasicErrorResponseType::InvalidGrant => {
                RelayError::UpstreamAuthExpired(response.to_string())
            }
            _ => RelayError::UpstreamUnavailable(response.to_string()),
        },
        other => RelayError::UpstreamUnavailable(other.to_string()),
    }
}

#[async_trait]
impl SpotifyApi for SpotifyClient {
    fn authorize_url(&self, state: &str) -> String {
        let state = state.to_string();
        let (url, _csrf_token) = self
            .oauth
            .authorize_url(|| CsrfToken::new(state))
            .add_scopes(self.scopes.iter().map(|s| Scope::new(s.clone())))
            .url();
        url.to_string()
    }

    async fn exchange_code(&self, code: &str) -> RelayResult<CredentialRecord> {
        let token = self
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(map_token_error)?;

        let refresh_token = token.refresh_token().ok_or_else(|| {
            RelayError::UpstreamUnavailable("token response has no refresh token".to_string())
        })?;

        Ok(CredentialRecord::new(
            token.access_token().secret().clone(),
            refresh_token.secret().clone(),
        ))
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> RelayResult<RefreshedToken> {
        let token = self
            .oauth
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(map_token_error)?;

        Ok(RefreshedToken {
            access_token: token.access_token().secret().clone(),
            refresh_token: token.refresh_token().map(|t| t.secret().clone()),
        })
    }

    async fn currently_playing(&self, access_token: &str) -> RelayResult<Option<TrackItem>> {
        let url = format!("{}/me/player/currently-playing", self.api_url);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => {
                debug!("currently-playing returned no content");
                Ok(None)
            }
            StatusCode::UNAUTHORIZED => Err(RelayError::UpstreamUnavailable(
                "access token rejected by currently-playing".to_string(),
            )),
            status if status.is_success() => {
                let body: CurrentlyPlaying = response.json().await?;
                Ok(body.item)
            }
            status => Err(RelayError::UpstreamUnavailable(format!(
                "currently-playing returned {}",
                status
            ))),
        }
    }
}
