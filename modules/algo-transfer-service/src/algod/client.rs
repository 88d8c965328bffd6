//! Algod v2 REST client.
//!
//! Implements [`ChainClient`] against a public or private algod node:
//! suggested params, raw transaction submission, round waiting and pending
//! transaction lookups.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::codec::{self, PUBLIC_KEY_LENGTH};
use super::transaction::{PaymentTxn, SuggestedParams, VALIDITY_WINDOW};
use super::{Account, ChainClient, ChainTxStatus, Confirmation, TransferDetail};
use crate::error::ChainError;

const TOKEN_HEADER: &str = "X-Algo-API-Token";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ParamsResponse {
    fee: u64,
    #[serde(rename = "genesis-hash")]
    genesis_hash: String,
    #[serde(rename = "genesis-id")]
    genesis_id: String,
    #[serde(rename = "last-round")]
    last_round: u64,
    #[serde(rename = "min-fee")]
    min_fee: u64,
}

#[derive(Debug, Deserialize)]
struct NodeStatusResponse {
    #[serde(rename = "last-round")]
    last_round: u64,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    #[serde(rename = "txId")]
    tx_id: String,
}

#[derive(Debug, Deserialize)]
struct PendingTxnResponse {
    #[serde(rename = "confirmed-round")]
    confirmed_round: Option<u64>,
    #[serde(rename = "pool-error", default)]
    pool_error: String,
    txn: Option<SignedTxnJson>,
}

#[derive(Debug, Deserialize)]
struct SignedTxnJson {
    txn: Option<TxnJson>,
}

/// Transaction body as algod renders it in JSON; byte fields are base64.
#[derive(Debug, Deserialize)]
struct TxnJson {
    #[serde(rename = "type")]
    tx_type: Option<String>,
    #[serde(default)]
    amt: u64,
    snd: Option<String>,
    rcv: Option<String>,
    note: Option<String>,
}

impl TxnJson {
    fn into_transfer(self) -> Option<TransferDetail> {
        if self.tx_type.as_deref() != Some("pay") {
            return None;
        }
        let sender = decode_key(self.snd.as_deref()?)?;
        // a zero receiver is omitted from the canonical encoding
        let receiver = match self.rcv.as_deref() {
            Some(rcv) => decode_key(rcv)?,
            None => [0u8; PUBLIC_KEY_LENGTH],
        };
        let note = self
            .note
            .and_then(|n| BASE64.decode(n).ok())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .filter(|n| !n.is_empty());
        Some(TransferDetail {
            sender: codec::encode_address(&sender),
            receiver: codec::encode_address(&receiver),
            amount: self.amt,
            note,
        })
    }
}

fn decode_key(encoded: &str) -> Option<[u8; PUBLIC_KEY_LENGTH]> {
    BASE64.decode(encoded).ok()?.try_into().ok()
}

pub struct AlgodClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl AlgodClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        if self.token.is_empty() {
            builder
        } else {
            builder.header(TOKEN_HEADER, &self.token)
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ChainError> {
        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ChainError::Decode(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);

        if status == StatusCode::NOT_FOUND {
            Err(ChainError::NotFound(message))
        } else {
            Err(ChainError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    pub async fn suggested_params(&self) -> Result<SuggestedParams, ChainError> {
        let params: ParamsResponse = self
            .send(self.request(Method::GET, "/v2/transactions/params"))
            .await?;

        let genesis_hash = BASE64
            .decode(&params.genesis_hash)
            .ok()
            .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
            .ok_or_else(|| ChainError::Decode("genesis-hash is not 32 bytes".to_string()))?;

        Ok(SuggestedParams {
            fee_per_byte: params.fee,
            min_fee: params.min_fee,
            first_valid: params.last_round,
            last_valid: params.last_round + VALIDITY_WINDOW,
            genesis_id: params.genesis_id,
            genesis_hash,
        })
    }

    pub async fn last_round(&self) -> Result<u64, ChainError> {
        let status: NodeStatusResponse = self.send(self.request(Method::GET, "/v2/status")).await?;
        Ok(status.last_round)
    }

    /// Block until the node has seen a round after `round`.
    pub async fn wait_for_block_after(&self, round: u64) -> Result<u64, ChainError> {
        let path = format!("/v2/status/wait-for-block-after/{}", round);
        let status: NodeStatusResponse = self.send(self.request(Method::GET, &path)).await?;
        Ok(status.last_round)
    }

    pub async fn pending_transaction(&self, tx_id: &str) -> Result<ChainTxStatus, ChainError> {
        if !codec::is_valid_transaction_id(tx_id) {
            return Err(ChainError::Encode(format!("malformed transaction id {:?}", tx_id)));
        }
        let path = format!("/v2/transactions/pending/{}?format=json", tx_id);
        let pending: PendingTxnResponse = self.send(self.request(Method::GET, &path)).await?;

        Ok(ChainTxStatus {
            confirmed_round: pending.confirmed_round.filter(|r| *r > 0),
            pool_error: Some(pending.pool_error).filter(|e| !e.is_empty()),
            transfer: pending
                .txn
                .and_then(|signed| signed.txn)
                .and_then(TxnJson::into_transfer),
        })
    }

    pub async fn send_raw(&self, signed: Vec<u8>) -> Result<String, ChainError> {
        let builder = self
            .request(Method::POST, "/v2/transactions")
            .header(reqwest::header::CONTENT_TYPE, "application/x-binary")
            .body(signed);
        let response: BroadcastResponse = self.send(builder).await?;
        Ok(response.tx_id)
    }
}

#[async_trait]
impl ChainClient for AlgodClient {
    async fn build_and_broadcast(
        &self,
        signer: &Account,
        recipient: &str,
        amount: u64,
        note: Option<&str>,
    ) -> Result<String, ChainError> {
        let receiver = codec::decode_address(recipient)
            .ok_or_else(|| ChainError::Encode(format!("invalid recipient address {}", recipient)))?;

        let params = self.suggested_params().await?;
        let txn = PaymentTxn::new(signer.public_key(), receiver, amount, note, &params)?;
        let signed = txn.sign(signer)?;

        let accepted = self.send_raw(signed.bytes).await?;
        if accepted != signed.tx_id {
            log::warn!(
                "[ALGOD] Node reported txId {} for locally computed {}",
                accepted,
                signed.tx_id
            );
        }
        log::info!(
            "[ALGOD] Broadcast {} ({} microAlgos, fee {}, rounds {}-{})",
            signed.tx_id,
            amount,
            txn.fee,
            txn.first_valid,
            txn.last_valid
        );
        Ok(signed.tx_id)
    }

    async fn await_confirmation(
        &self,
        tx_id: &str,
        max_rounds: u64,
    ) -> Result<Confirmation, ChainError> {
        let start = self.last_round().await?;
        let mut current = start;

        while current < start + max_rounds {
            match self.pending_transaction(tx_id).await {
                Ok(status) => {
                    if let Some(round) = status.confirmed_round {
                        return Ok(Confirmation {
                            confirmed_round: round,
                        });
                    }
                    if let Some(reason) = status.pool_error {
                        return Err(ChainError::PoolRejected(reason));
                    }
                }
                // the node may not have seen the transaction yet
                Err(ChainError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
            self.wait_for_block_after(current).await?;
            current += 1;
        }

        Err(ChainError::Timeout { rounds: max_rounds })
    }

    async fn query_status(&self, tx_id: &str) -> Result<ChainTxStatus, ChainError> {
        self.pending_transaction(tx_id).await
    }

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }
}
