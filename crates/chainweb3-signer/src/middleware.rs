//! Provider middleware that answers account and signing methods locally.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use chainweb3_core::{
    JsonRpcRequest, JsonRpcResponse, Provider, ProviderError, RequestIdCounter, RpcClient,
    TransactionRequest, TypedData, ValidationError,
};

use crate::config::SigningConfig;
use crate::network::{NetworkIdentity, NetworkResolver};
use crate::pipeline;
use crate::signer::Signer;
use crate::transaction::{SignedTransaction, UnsignedTransaction};

/// The JSON-RPC methods served by the signing middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMethod {
    Accounts,
    /// `eth_sign`: params `[account, data]`.
    Sign,
    /// `personal_sign`: params `[data, account]`.
    PersonalSign,
    SendTransaction,
    SignTypedData,
    PersonalSignTypedData,
}

impl SigningMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "eth_accounts" => Self::Accounts,
            "eth_sign" => Self::Sign,
            "personal_sign" => Self::PersonalSign,
            "eth_sendTransaction" => Self::SendTransaction,
            "eth_signTypedData" => Self::SignTypedData,
            "personal_signTypedData" => Self::PersonalSignTypedData,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Accounts => "eth_accounts",
            Self::Sign => "eth_sign",
            Self::PersonalSign => "personal_sign",
            Self::SendTransaction => "eth_sendTransaction",
            Self::SignTypedData => "eth_signTypedData",
            Self::PersonalSignTypedData => "personal_signTypedData",
        }
    }
}

/// Signs locally through an external [`Signer`] and submits raw transactions.
///
/// Nonce, gas and gas price are filled from the wrapped provider when the
/// caller leaves them out. Requests for any other method pass through.
pub struct SigningMiddleware {
    inner: Arc<dyn Provider>,
    client: RpcClient,
    signer: Arc<dyn Signer>,
    network: NetworkResolver,
}

impl SigningMiddleware {
    /// Wrap `inner`. Requests issued by the pipeline draw ids from `ids`.
    pub fn new(
        inner: Arc<dyn Provider>,
        signer: Arc<dyn Signer>,
        ids: Arc<RequestIdCounter>,
        config: SigningConfig,
    ) -> Self {
        Self {
            client: RpcClient::new(inner.clone(), ids),
            inner,
            signer,
            network: NetworkResolver::new(config.chain_id),
        }
    }

    /// Network and chain id, resolved on first use.
    pub async fn network_identity(&self) -> Result<NetworkIdentity, ProviderError> {
        self.network.resolve(&self.client).await
    }

    pub async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let identity = self.network_identity().await?;
        Ok(self.signer.accounts(identity.network_id).await?)
    }

    pub async fn sign_data(&self, account: Address, data: Bytes) -> Result<Bytes, ProviderError> {
        let identity = self.network_identity().await?;
        Ok(self.signer.sign_data(account, data, identity.network_id).await?)
    }

    pub async fn sign_typed_data(
        &self,
        account: Address,
        typed_data: TypedData,
    ) -> Result<Bytes, ProviderError> {
        let identity = self.network_identity().await?;
        Ok(self.signer.sign_typed_data(account, typed_data, identity.network_id).await?)
    }

    /// Fill, then sign `tx` without submitting it.
    ///
    /// Steps run in order (nonce, gas, network identity, signer) and stop at
    /// the first failure.
    pub async fn sign_transaction(
        &self,
        tx: TransactionRequest,
    ) -> Result<SignedTransaction, ProviderError> {
        if tx.from.is_none() {
            return Err(ValidationError::MissingField("from").into());
        }
        let tx = pipeline::fill_nonce(&self.client, tx).await?;
        let tx = pipeline::fill_gas(&self.client, tx).await?;
        let identity = self.network_identity().await?;
        let unsigned = UnsignedTransaction::try_from(tx)?;
        pipeline::sign(self.signer.as_ref(), &unsigned, identity).await
    }

    /// Sign `tx` and submit it with `eth_sendRawTransaction`.
    pub async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, ProviderError> {
        let signed = self.sign_transaction(tx).await?;
        let hash = self.client.send_raw_transaction(signed.encode_rlp()).await?;
        info!(%hash, nonce = %signed.nonce, chain_id = signed.chain_id, "transaction submitted");
        Ok(hash)
    }

    async fn handle(&self, method: SigningMethod, req: &JsonRpcRequest) -> Result<Value, ProviderError> {
        let value = match method {
            SigningMethod::Accounts => serde_json::to_value(self.accounts().await?)?,
            SigningMethod::Sign => {
                require_params(req, 2)?;
                let account = req.decode_param(0)?;
                let data = req.decode_param(1)?;
                serde_json::to_value(self.sign_data(account, data).await?)?
            }
            SigningMethod::PersonalSign => {
                require_params(req, 2)?;
                let data = req.decode_param(0)?;
                let account = req.decode_param(1)?;
                serde_json::to_value(self.sign_data(account, data).await?)?
            }
            SigningMethod::SendTransaction => {
                let tx = req.decode_param(0)?;
                serde_json::to_value(self.send_transaction(tx).await?)?
            }
            SigningMethod::SignTypedData | SigningMethod::PersonalSignTypedData => {
                require_params(req, 2)?;
                // A trailing password param is accepted and ignored.
                let account = req.decode_param(0)?;
                let typed_data = req.decode_param(1)?;
                serde_json::to_value(self.sign_typed_data(account, typed_data).await?)?
            }
        };
        Ok(value)
    }
}

fn require_params(req: &JsonRpcRequest, count: usize) -> Result<(), ValidationError> {
    if req.params.len() < count {
        return Err(ValidationError::InvalidParams {
            method: req.method.clone(),
            reason: format!("expected {count} params, got {}", req.params.len()),
        });
    }
    Ok(())
}

#[async_trait]
impl Provider for SigningMiddleware {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, ProviderError> {
        let Some(method) = SigningMethod::from_name(&req.method) else {
            return self.inner.send(req).await;
        };
        debug!(method = method.name(), id = %req.id, "serving signing method locally");
        let result = self.handle(method, &req).await?;
        Ok(JsonRpcResponse::success(req.id, result))
    }

    fn url(&self) -> &str {
        self.inner.url()
    }
}

impl std::fmt::Debug for SigningMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningMiddleware")
            .field("url", &self.inner.url())
            .field("network", &self.network)
            .finish()
    }
}
