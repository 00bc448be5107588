use crate::{
    error::{
        ArcadeError,
        Result,
    },
    permit::PermitDescriptor,
};
use alloy_dyn_abi::TypedData;
use alloy_primitives::{
    Address,
    Signature,
};
use alloy_signer::Signer;
use alloy_signer_local::{
    LocalSignerError,
    PrivateKeySigner,
};
use serde_json::{
    Value,
    json,
};
use std::{
    collections::HashSet,
    fmt,
};

const DOMAIN_TYPE: &str = "EIP712Domain";

/// Signing capability backed by the local key store.
pub trait WalletSigner {
    fn address(&self) -> Address;

    /// Personal-message signature, `0x`-prefixed hex of `r || s || v`.
    fn sign_message(&self, message: &str) -> impl Future<Output = Result<String>>;

    fn sign_permit(
        &self,
        descriptor: &PermitDescriptor,
    ) -> impl Future<Output = Result<SignatureParts>>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureParts {
    pub v: u8,
    pub r: String,
    pub s: String,
}

impl From<Signature> for SignatureParts {
    fn from(signature: Signature) -> Self {
        Self {
            v: 27 + u8::from(signature.v()),
            r: format!("0x{}", hex::encode(signature.r().to_be_bytes::<32>())),
            s: format!("0x{}", hex::encode(signature.s().to_be_bytes::<32>())),
        }
    }
}

#[derive(Clone)]
pub struct LocalSigner {
    inner: PrivateKeySigner,
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.inner.address())
            .finish_non_exhaustive()
    }
}

impl LocalSigner {
    pub fn random() -> Self {
        Self {
            inner: PrivateKeySigner::random(),
        }
    }

    pub fn from_private_key(private_key: &str) -> Result<Self, LocalSignerError> {
        let inner = private_key.trim().parse::<PrivateKeySigner>()?;
        Ok(Self { inner })
    }

    pub fn address(&self) -> Address {
        self.inner.address()
    }

    pub fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.inner.credential().to_bytes()))
    }
}

impl WalletSigner for LocalSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        let signature = Signer::sign_message(&self.inner, message.as_bytes())
            .await
            .map_err(|e| ArcadeError::Signing(e.to_string()))?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }

    async fn sign_permit(&self, descriptor: &PermitDescriptor) -> Result<SignatureParts> {
        let typed_data = typed_data(descriptor)?;
        let signature = self
            .inner
            .sign_dynamic_typed_data(&typed_data)
            .await
            .map_err(|e| ArcadeError::Signing(e.to_string()))?;
        tracing::debug!(primary_type = %typed_data.primary_type, "permit signed locally");
        Ok(signature.into())
    }
}

/// The single struct type no other struct type refers to.
pub fn primary_type(types: &serde_json::Map<String, Value>) -> Result<String> {
    let referenced: HashSet<&str> = types
        .iter()
        .filter(|(name, _)| name.as_str() != DOMAIN_TYPE)
        .filter_map(|(_, fields)| fields.as_array())
        .flatten()
        .filter_map(|field| field.get("type").and_then(Value::as_str))
        .map(|ty| ty.trim_end_matches("[]"))
        .collect();

    let mut roots = types
        .keys()
        .filter(|name| name.as_str() != DOMAIN_TYPE && !referenced.contains(name.as_str()));
    match (roots.next(), roots.next()) {
        (Some(root), None) => Ok(root.clone()),
        (None, _) => Err(ArcadeError::MalformedResponse(
            "permit types declare no primary struct".to_string(),
        )),
        (Some(_), Some(_)) => Err(ArcadeError::MalformedResponse(
            "permit types declare more than one primary struct".to_string(),
        )),
    }
}

pub fn typed_data(descriptor: &PermitDescriptor) -> Result<TypedData> {
    let primary_type = primary_type(&descriptor.types)?;
    let message = serde_json::to_value(&descriptor.value)
        .map_err(|e| ArcadeError::MalformedResponse(e.to_string()))?;
    let payload = json!({
        "types": descriptor.types,
        "primaryType": primary_type,
        "domain": descriptor.domain,
        "message": message,
    });
    serde_json::from_value(payload)
        .map_err(|e| ArcadeError::MalformedResponse(format!("invalid permit typed data: {e}")))
}
