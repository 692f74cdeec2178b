//! [Sol-Ark Cloud](https://www.mysolark.com) client.

mod auth;
mod endpoint;
mod response;

use std::time::Duration;

use async_trait::async_trait;
use bon::bon;
use chrono::Local;
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::Value;
use tokio::sync::{Mutex, OnceCell};

pub use self::auth::AuthMode;
use self::{
    auth::{ACCESS_TOKEN, HeaderSet, TokenRequest},
    endpoint::Endpoint,
    response::Status,
};
use crate::{
    coordinator::{Snapshot, Source},
    error::{Error, Result},
    payload,
    prelude::*,
};

pub const DEFAULT_BASE_URL: &str = "https://api.solarkcloud.com";

enum Session {
    /// No token yet, or the previous one has been rejected.
    ///
    /// Remembers the header set which worked before, if any.
    Unauthenticated { header_set: Option<HeaderSet> },

    Ready { token: String, header_set: HeaderSet },

    /// Credentials have been rejected: every call fails fast until the client is rebuilt.
    Failed { reason: String },
}

/// Outcome of calling a single endpoint shape.
enum Reply {
    Supported(Value),

    /// The server does not know the endpoint, try the next shape.
    Unsupported(StatusCode),
}

pub struct Api {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
    auth_mode: AuthMode,
    session: Mutex<Session>,

    /// Resolved at most once per client.
    account_id: OnceCell<String>,
}

#[bon]
impl Api {
    #[builder]
    pub fn new(
        #[builder(into)] username: String,
        #[builder(into)] password: String,
        #[builder(into)] account_id: Option<String>,
        mut base_url: Url,
        #[builder(default)] auth_mode: AuthMode,
    ) -> Result<Self> {
        if username.is_empty() || password.is_empty() {
            return Err(Error::Auth(anyhow!("username and password must not be empty")));
        }
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let client = Client::builder()
            .user_agent(concat!("solark-cloud/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build the HTTP client")
            .map_err(Error::Auth)?;
        Ok(Self {
            client,
            base_url,
            username,
            password,
            auth_mode,
            session: Mutex::new(Session::Unauthenticated { header_set: None }),
            account_id: OnceCell::new_with(account_id.filter(|id| !id.is_empty())),
        })
    }

    /// List the plants visible to the account, in the upstream order.
    #[instrument(skip_all)]
    pub async fn list_accounts(&self) -> Result<Vec<Value>> {
        info!("listing plants…");
        let body = self
            .first_supported(endpoint::PLANTS, "")
            .await?
            .context("none of the known plant listing endpoints is supported")?;
        let plants = endpoint::plants(&body)
            .with_context(|| format!("unsupported plant listing response: {body}"))?;
        info!(n_plants = plants.len(), "listed");
        Ok(plants.clone())
    }

    /// Configured plant ID, or the ID of the first listed plant.
    ///
    /// The result is cached, so the plants get listed at most once per client.
    #[instrument(skip_all)]
    pub async fn resolve_default_account(&self) -> Result<&str> {
        self.account_id
            .get_or_try_init(|| async {
                let plants = self.list_accounts().await?;
                let plant = plants.first().context("no plants available on this account")?;
                let account_id = endpoint::plant_id(plant).with_context(|| {
                    format!("could not determine the plant ID from `{plant}`, please set it explicitly")
                })?;
                info!(%account_id, "resolved the default plant");
                Ok::<_, Error>(account_id)
            })
            .await
            .map(String::as_str)
    }

    /// Raw instantaneous telemetry.
    #[instrument(skip_all, fields(account_id = account_id))]
    pub async fn get_power_flow(&self, account_id: &str) -> Result<Value> {
        info!("fetching the power flow…");
        Ok(self
            .first_supported(endpoint::FLOW, account_id)
            .await?
            .context("none of the known power flow endpoints is supported")?)
    }

    /// Raw daily aggregate.
    ///
    /// Best-effort: [`None`] when none of the known endpoint shapes is supported.
    #[instrument(skip_all, fields(account_id = account_id))]
    pub async fn get_day_energy(&self, account_id: &str) -> Result<Option<Value>> {
        info!("fetching the day energy…");
        let day = self.first_supported(endpoint::DAY, account_id).await?;
        if day.is_none() {
            warn!("none of the known day energy endpoints is supported");
        }
        Ok(day)
    }

    /// Try the endpoint shapes in order, the first supported one is authoritative.
    async fn first_supported(&self, endpoints: &[Endpoint], account_id: &str) -> Result<Option<Value>> {
        let today = Local::now().date_naive();
        for endpoint in endpoints {
            let url = endpoint.url(&self.base_url, account_id, today)?;
            match self.get(&url).await? {
                Reply::Supported(body) => return Ok(Some(body)),
                Reply::Unsupported(status) => {
                    debug!(%url, %status, "unsupported, trying the next shape…");
                }
            }
        }
        Ok(None)
    }

    #[instrument(skip_all, level = Level::DEBUG, fields(path = url.path()))]
    async fn get(&self, url: &Url) -> Result<Reply> {
        let mut response = self.send_authorized(url).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("access token rejected, re-authenticating…");
            self.invalidate().await;
            response = self.send_authorized(url).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(self.fail(anyhow!("`{url}` rejects freshly issued tokens")).await);
            }
        }

        let status = response.status();
        if matches!(status, StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED) {
            return Ok(Reply::Unsupported(status));
        }
        let body = response
            .error_for_status()
            .with_context(|| format!("`{url}` failed"))?
            .json::<Value>()
            .await
            .with_context(|| format!("failed to deserialize `{url}` response JSON"))?;
        debug!(%body, "call succeeded");
        Status::check(&body).with_context(|| format!("`{url}` failed"))?;
        Ok(Reply::Supported(body))
    }

    async fn send_authorized(&self, url: &Url) -> Result<Response> {
        let token = self.token().await?;
        Ok(self
            .client
            .get(url.clone())
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("failed to call `{url}`"))?)
    }

    /// Current access token, authenticating when needed.
    async fn token(&self) -> Result<String> {
        // Held across the token request: concurrent callers wait for a single authentication.
        let mut session = self.session.lock().await;
        let preferred = match &*session {
            Session::Ready { token, .. } => return Ok(token.clone()),
            Session::Failed { reason } => {
                return Err(Error::Auth(anyhow!("{reason} (reconfigure to retry)")));
            }
            Session::Unauthenticated { header_set } => *header_set,
        };
        match self.authenticate(preferred).await {
            Ok((token, header_set)) => {
                *session = Session::Ready { token: token.clone(), header_set };
                Ok(token)
            }
            Err(Error::Auth(error)) => {
                *session = Session::Failed { reason: format!("{error:#}") };
                Err(Error::Auth(error))
            }
            Err(error) => Err(error),
        }
    }

    /// Obtain a token with the preferred header set, or with every header set the mode allows.
    #[instrument(skip_all, fields(auth_mode = ?self.auth_mode))]
    async fn authenticate(&self, preferred: Option<HeaderSet>) -> Result<(String, HeaderSet)> {
        info!("authenticating…");
        let preferred = preferred.map(|header_set| [header_set]);
        let header_sets = preferred.as_ref().map_or(self.auth_mode.header_sets(), |it| it.as_slice());

        let mut rejection = None;
        for &header_set in header_sets {
            match self.request_token(header_set).await {
                Ok(token) => {
                    info!(?header_set, "authenticated");
                    return Ok((token, header_set));
                }
                Err(Error::Auth(error)) => {
                    warn!(?header_set, "token request rejected: {error:#}");
                    rejection = Some(error);
                }
                Err(error) => return Err(error),
            }
        }
        Err(Error::Auth(rejection.unwrap_or_else(|| anyhow!("no header sets to try"))))
    }

    async fn request_token(&self, header_set: HeaderSet) -> Result<String> {
        let url = self.base_url.join("oauth/token").context("invalid base URL")?;
        let response = self
            .client
            .post(url)
            .headers(header_set.headers())
            .json(&TokenRequest::new(&self.username, &self.password))
            .send()
            .await
            .context("failed to request an access token")?;
        let status = response.status();
        if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        {
            return Err(Error::Auth(anyhow!("token request returned {status}")));
        }
        let body = response
            .error_for_status()
            .context("token request failed")?
            .json::<Value>()
            .await
            .context("failed to deserialize the token response")?;
        Status::check(&body).map_err(Error::Auth)?;
        payload::find(&body, ACCESS_TOKEN, Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| Error::Auth(anyhow!("no access token in the response")))
    }

    /// Drop the current token but remember which header set obtained it.
    async fn invalidate(&self) {
        let mut session = self.session.lock().await;
        if let Session::Ready { header_set, .. } = *session {
            *session = Session::Unauthenticated { header_set: Some(header_set) };
        }
    }

    async fn fail(&self, error: anyhow::Error) -> Error {
        *self.session.lock().await = Session::Failed { reason: format!("{error:#}") };
        Error::Auth(error)
    }
}

#[async_trait]
impl Source for Api {
    /// Resolve the plant if needed, then fetch the flow and the day energy, in this order.
    #[instrument(skip_all)]
    async fn fetch_snapshot(&self) -> Result<Snapshot> {
        let account_id = self.resolve_default_account().await?;
        let flow = self.get_power_flow(account_id).await?;
        let day = self.get_day_energy(account_id).await?;
        Ok(Snapshot { account_id: account_id.to_owned(), flow, day, fetched_at: Local::now() })
    }
}
