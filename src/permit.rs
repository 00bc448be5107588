//! Gasless permit preparation: policy check, server-issued descriptor, local
//! EIP-712 signature.

use crate::{
    arcade_client::GameApi,
    error::{
        ArcadeError,
        PolicyViolation,
        Result,
    },
    signer::{
        SignatureParts,
        WalletSigner,
    },
};
use alloy_primitives::Address;
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Map,
    Value,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BetPolicy {
    pub min_bet: f64,
    pub max_bet: f64,
}

impl BetPolicy {
    pub fn new(min_bet: f64, max_bet: f64) -> Self {
        Self { min_bet, max_bet }
    }

    pub fn check(&self, amount: f64) -> Result<f64, PolicyViolation> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(PolicyViolation::InvalidAmount(amount.to_string()));
        }
        if amount < self.min_bet || amount > self.max_bet {
            return Err(PolicyViolation::AmountOutOfBounds {
                amount,
                min: self.min_bet,
                max: self.max_bet,
            });
        }
        Ok(amount)
    }

    pub fn parse(&self, raw: &str) -> Result<f64, PolicyViolation> {
        let amount = raw
            .trim()
            .parse::<f64>()
            .map_err(|_| PolicyViolation::InvalidAmount(raw.to_string()))?;
        self.check(amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRequest {
    pub amount: f64,
    pub wallet_address: String,
}

/// Typed-data descriptor issued by the arcade for exactly one signature.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PermitDescriptor {
    pub domain: Value,
    pub types: Map<String, Value>,
    pub value: PermitValue,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PermitValue {
    pub value: Value,
    pub deadline: Value,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl PermitValue {
    /// Seconds since the epoch, when the server sent something numeric.
    pub fn deadline_secs(&self) -> Option<u64> {
        as_unix_secs(&self.deadline)
    }

    /// `value` and `deadline` are echoed back verbatim, so a JSON number
    /// must survive the round trip unchanged.
    pub fn ensure_exact(&self) -> Result<()> {
        for (field, value) in [("value", &self.value), ("deadline", &self.deadline)] {
            if let Value::Number(n) = value {
                if !n.is_u64() {
                    return Err(ArcadeError::MalformedResponse(format!(
                        "permit {field} {n} is not an exact unsigned integer"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn as_unix_secs(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SignedPermit {
    pub owner: String,
    pub value: Value,
    pub deadline: Value,
    pub v: u8,
    pub r: String,
    pub s: String,
}

impl SignedPermit {
    pub fn assemble(owner: Address, descriptor: PermitDescriptor, signature: SignatureParts) -> Self {
        let PermitValue {
            value, deadline, ..
        } = descriptor.value;
        Self {
            owner: owner.to_string(),
            value,
            deadline,
            v: signature.v,
            r: signature.r,
            s: signature.s,
        }
    }

    pub fn deadline_secs(&self) -> Option<u64> {
        as_unix_secs(&self.deadline)
    }

    pub fn is_expired(&self, now_secs: u64) -> bool {
        self.deadline_secs()
            .is_some_and(|deadline| deadline <= now_secs)
    }

    pub fn ensure_unexpired(&self) -> Result<()> {
        if self.is_expired(Utc::now().timestamp().max(0) as u64) {
            return Err(ArcadeError::PermitExpired {
                deadline: self.deadline_secs().unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// Requests a permit descriptor for `amount` and signs it with `signer`.
///
/// Nothing is sent when the amount violates `policy`, when no signer is
/// available or when the signer does not own `wallet`.
pub async fn build_signed_permit<A, S>(
    api: &A,
    signer: Option<&S>,
    policy: &BetPolicy,
    amount: f64,
    wallet: Address,
) -> Result<SignedPermit>
where
    A: GameApi,
    S: WalletSigner,
{
    let amount = policy.check(amount)?;
    let signer = signer.ok_or(ArcadeError::CapabilityUnavailable("typed-data signing"))?;
    if signer.address() != wallet {
        return Err(ArcadeError::OwnerMismatch {
            wallet: wallet.to_string(),
            signer: signer.address().to_string(),
        });
    }

    let request = PrepareRequest {
        amount,
        wallet_address: wallet.to_string(),
    };
    tracing::info!(amount, wallet = %wallet, "requesting permit descriptor");
    let descriptor = api.prepare_permit(&request).await?.into_result()?;
    descriptor.value.ensure_exact()?;
    tracing::debug!(
        value = %descriptor.value.value,
        deadline = %descriptor.value.deadline,
        "permit descriptor received"
    );

    let signature = signer.sign_permit(&descriptor).await?;
    Ok(SignedPermit::assemble(wallet, descriptor, signature))
}
