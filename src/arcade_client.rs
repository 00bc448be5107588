use crate::{
    bet::{
        BetRequest,
        PlayResult,
    },
    config::Config,
    error::{
        ArcadeError,
        Result,
        TransportError,
        TransportErrorKind,
        rejection,
    },
    permit::{
        PermitDescriptor,
        PrepareRequest,
    },
    signer::WalletSigner,
};
use alloy_primitives::Address;
use chrono::Utc;
use color_eyre::eyre::{
    self,
    WrapErr,
};
use reqwest::{
    Method,
    RequestBuilder,
};
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use serde_json::json;

pub const WALLET_ADDRESS_HEADER: &str = "X-Wallet-Address";
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// `{success, data?, error?, code?}` as returned by every arcade endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            ApiEnvelope {
                success: true,
                data: Some(data),
                ..
            } => Ok(data),
            ApiEnvelope {
                success: true,
                data: None,
                ..
            } => Err(ArcadeError::MalformedResponse(
                "successful response carried no data".to_string(),
            )),
            ApiEnvelope { error, code, .. } => Err(rejection(code.as_deref(), error)),
        }
    }

    /// For endpoints whose success carries nothing of interest.
    pub fn into_ack(self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(rejection(self.code.as_deref(), self.error))
        }
    }
}

/// The two endpoints the gasless bet flow depends on.
///
/// Implementations return the envelope untouched; interpreting `success:false`
/// is left to the caller. `Err` means the request could not be sent or its
/// answer could not be read.
pub trait GameApi {
    fn prepare_permit(
        &self,
        request: &PrepareRequest,
    ) -> impl Future<Output = Result<ApiEnvelope<PermitDescriptor>>>;

    fn play_gasless(
        &self,
        request: &BetRequest,
    ) -> impl Future<Output = Result<ApiEnvelope<PlayResult>>>;
}

/// Wallet and arcade-floor endpoints used by the CLI and autopilot.
pub trait LobbyApi {
    fn balance(&self) -> impl Future<Output = Result<ApiEnvelope<Balance>>>;

    fn enter(&self, name: &str) -> impl Future<Output = Result<ApiEnvelope<serde_json::Value>>>;

    fn leave(&self) -> impl Future<Output = Result<ApiEnvelope<serde_json::Value>>>;

    fn chat(&self, message: &str) -> impl Future<Output = Result<ApiEnvelope<serde_json::Value>>>;

    fn move_to(
        &self,
        x: i64,
        y: i64,
    ) -> impl Future<Output = Result<ApiEnvelope<serde_json::Value>>>;

    fn agents(&self) -> impl Future<Output = Result<ApiEnvelope<AgentList>>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(default)]
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentList {
    #[serde(default)]
    pub agents: Vec<AgentSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub name: String,
}

pub struct HttpArcadeApi<S> {
    base_url: String,
    namespace: String,
    require_signature: bool,
    wallet: Option<Address>,
    signer: Option<S>,
    http: reqwest::Client,
}

impl<S: WalletSigner> HttpArcadeApi<S> {
    pub fn new(
        config: &Config,
        wallet: Option<Address>,
        signer: Option<S>,
    ) -> eyre::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .wrap_err("failed to build HTTP client for arcade API")?;
        Ok(Self {
            base_url: config.api_url(),
            namespace: config.auth_namespace.clone(),
            require_signature: config.require_signed_requests,
            wallet,
            signer,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn signer(&self) -> Option<&S> {
        self.signer.as_ref()
    }

    async fn authenticated(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = format!("{}{}", self.base_url, path);
        let timestamp = Utc::now().timestamp_millis().to_string();
        let mut request = self
            .http
            .request(method, url)
            .header(TIMESTAMP_HEADER, timestamp.as_str());

        let Some(wallet) = self.wallet else {
            if self.require_signature {
                return Err(ArcadeError::CapabilityUnavailable("request authentication"));
            }
            return Ok(request);
        };
        request = request.header(WALLET_ADDRESS_HEADER, wallet.to_string());

        let message = format!("{}:{}:{}", self.namespace, wallet, timestamp);
        let signature = match &self.signer {
            Some(signer) => signer.sign_message(&message).await,
            None => Err(ArcadeError::CapabilityUnavailable("request signing")),
        };
        match signature {
            Ok(signature) => Ok(request.header(SIGNATURE_HEADER, signature)),
            Err(err) if self.require_signature => Err(err),
            Err(err) => {
                tracing::warn!(%err, path, "sending unsigned arcade request");
                Ok(request)
            }
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiEnvelope<T>> {
        let mut request = self.authenticated(method.clone(), path).await?;
        if let Some(body) = body {
            request = request.json(&body);
        }
        tracing::debug!(%method, path, "arcade request");
        let res = request.send().await.map_err(TransportError::from)?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(TransportError::from)?;
        match serde_json::from_slice::<ApiEnvelope<T>>(&bytes) {
            Ok(envelope) => {
                tracing::debug!(%status, path, success = envelope.success, "arcade response");
                Ok(envelope)
            }
            Err(e) if status.is_success() => Err(TransportError::decode(format!(
                "invalid arcade payload from {path}: {e}"
            ))
            .into()),
            Err(_) => {
                let body = String::from_utf8_lossy(&bytes);
                Err(TransportError::new(
                    TransportErrorKind::Status(status.as_u16()),
                    format!("arcade responded with {status} on {path}: {body}"),
                )
                .into())
            }
        }
    }
}

impl<S: WalletSigner> GameApi for HttpArcadeApi<S> {
    async fn prepare_permit(
        &self,
        request: &PrepareRequest,
    ) -> Result<ApiEnvelope<PermitDescriptor>> {
        let body = serde_json::to_value(request)
            .map_err(|e| ArcadeError::MalformedResponse(e.to_string()))?;
        self.call(Method::POST, "/wallet/deposit/prepare", Some(body))
            .await
    }

    async fn play_gasless(
        &self,
        request: &BetRequest,
    ) -> Result<ApiEnvelope<PlayResult>> {
        let body = serde_json::to_value(request)
            .map_err(|e| ArcadeError::MalformedResponse(e.to_string()))?;
        self.call(Method::POST, "/game/play-gasless", Some(body)).await
    }
}

impl<S: WalletSigner> LobbyApi for HttpArcadeApi<S> {
    async fn balance(&self) -> Result<ApiEnvelope<Balance>> {
        self.call(Method::GET, "/wallet/balance", None).await
    }

    async fn enter(&self, name: &str) -> Result<ApiEnvelope<serde_json::Value>> {
        self.call(Method::POST, "/arcade/enter", Some(json!({ "name": name })))
            .await
    }

    async fn leave(&self) -> Result<ApiEnvelope<serde_json::Value>> {
        self.call(Method::POST, "/arcade/leave", None).await
    }

    async fn chat(&self, message: &str) -> Result<ApiEnvelope<serde_json::Value>> {
        self.call(Method::POST, "/arcade/chat", Some(json!({ "message": message })))
            .await
    }

    async fn move_to(
        &self,
        x: i64,
        y: i64,
    ) -> Result<ApiEnvelope<serde_json::Value>> {
        self.call(Method::POST, "/arcade/move", Some(json!({ "x": x, "y": y })))
            .await
    }

    async fn agents(&self) -> Result<ApiEnvelope<AgentList>> {
        self.call(Method::GET, "/arcade/agents", None).await
    }
}
