use crate::{
    arcade_client::{
        AgentList,
        ApiEnvelope,
        Balance,
        GameApi,
        LobbyApi,
    },
    bet::{
        BetRequest,
        PlayResult,
        SeedSource,
    },
    error::{
        ArcadeError,
        Result,
    },
    permit::{
        PermitDescriptor,
        PrepareRequest,
    },
    signer::{
        SignatureParts,
        WalletSigner,
    },
};
use alloy_primitives::Address;
use serde_json::{
    Value,
    json,
};
use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{
            AtomicUsize,
            Ordering,
        },
    },
};

pub const USDC_BASE: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
pub const PERMIT_SPENDER: &str = "0x00000000000000000000000000000000000c1a05";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// EIP-2612 permit descriptor shaped like the ones the arcade hands out.
pub fn permit_descriptor(value: Value, deadline: Value) -> PermitDescriptor {
    let raw = json!({
        "domain": {
            "name": "USD Coin",
            "version": "2",
            "chainId": 8453,
            "verifyingContract": USDC_BASE,
        },
        "types": {
            "EIP712Domain": [
                {"name": "name", "type": "string"},
                {"name": "version", "type": "string"},
                {"name": "chainId", "type": "uint256"},
                {"name": "verifyingContract", "type": "address"}
            ],
            "Permit": [
                {"name": "owner", "type": "address"},
                {"name": "spender", "type": "address"},
                {"name": "value", "type": "uint256"},
                {"name": "nonce", "type": "uint256"},
                {"name": "deadline", "type": "uint256"}
            ]
        },
        "value": {
            "owner": "0x0000000000000000000000000000000000000001",
            "spender": PERMIT_SPENDER,
            "value": value,
            "nonce": 0,
            "deadline": deadline,
        }
    });
    match serde_json::from_value(raw) {
        Ok(descriptor) => descriptor,
        Err(e) => panic!("test permit descriptor does not deserialize: {e}"),
    }
}

pub fn won(payout: f64, game_id: &str) -> PlayResult {
    PlayResult {
        won: Some(true),
        outcome_text: Some("HEADS".to_string()),
        payout: Some(payout),
        game_id: Some(json!(game_id)),
        ..PlayResult::default()
    }
}

pub fn lost(game_id: &str) -> PlayResult {
    PlayResult {
        won: Some(false),
        outcome_text: Some("TAILS".to_string()),
        payout: Some(0.0),
        game_id: Some(json!(game_id)),
        ..PlayResult::default()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LobbyCall {
    Balance,
    Enter(String),
    Leave,
    Chat(String),
    Move(i64, i64),
    Agents,
}

/// In-memory arcade. Scripted responses are consumed in order; once a queue
/// is empty the fake answers with a plausible success.
#[derive(Default)]
pub struct FakeArcade {
    prepare_responses: Mutex<VecDeque<Result<ApiEnvelope<PermitDescriptor>>>>,
    play_responses: Mutex<VecDeque<Result<ApiEnvelope<PlayResult>>>>,
    lobby_failures: Mutex<VecDeque<ArcadeError>>,
    prepare_requests: Mutex<Vec<PrepareRequest>>,
    play_requests: Mutex<Vec<Value>>,
    lobby_calls: Mutex<Vec<LobbyCall>>,
}

impl FakeArcade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_prepare(&self, response: Result<ApiEnvelope<PermitDescriptor>>) {
        lock(&self.prepare_responses).push_back(response);
    }

    pub fn push_play(&self, response: Result<ApiEnvelope<PlayResult>>) {
        lock(&self.play_responses).push_back(response);
    }

    /// The next lobby call of any kind fails with `err`.
    pub fn push_lobby_failure(&self, err: ArcadeError) {
        lock(&self.lobby_failures).push_back(err);
    }

    pub fn prepare_calls(&self) -> usize {
        lock(&self.prepare_requests).len()
    }

    pub fn play_calls(&self) -> usize {
        lock(&self.play_requests).len()
    }

    pub fn prepare_requests(&self) -> Vec<PrepareRequest> {
        lock(&self.prepare_requests).clone()
    }

    /// Bet bodies exactly as they would go over the wire.
    pub fn play_requests(&self) -> Vec<Value> {
        lock(&self.play_requests).clone()
    }

    pub fn lobby_calls(&self) -> Vec<LobbyCall> {
        lock(&self.lobby_calls).clone()
    }

    pub fn chats(&self) -> Vec<String> {
        self.lobby_calls()
            .into_iter()
            .filter_map(|call| match call {
                LobbyCall::Chat(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn record_lobby(&self, call: LobbyCall) -> Result<()> {
        lock(&self.lobby_calls).push(call);
        match lock(&self.lobby_failures).pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl GameApi for FakeArcade {
    async fn prepare_permit(
        &self,
        request: &PrepareRequest,
    ) -> Result<ApiEnvelope<PermitDescriptor>> {
        lock(&self.prepare_requests).push(request.clone());
        let scripted = lock(&self.prepare_responses).pop_front();
        scripted.unwrap_or_else(|| {
            let units = (request.amount * 1_000_000.0).round() as u64;
            Ok(ApiEnvelope::ok(permit_descriptor(
                json!(units.to_string()),
                json!(u64::MAX.to_string()),
            )))
        })
    }

    async fn play_gasless(&self, request: &BetRequest) -> Result<ApiEnvelope<PlayResult>> {
        let body = serde_json::to_value(request)
            .map_err(|e| ArcadeError::MalformedResponse(e.to_string()))?;
        let game_id = format!("game-{}", lock(&self.play_requests).len() + 1);
        lock(&self.play_requests).push(body);
        let scripted = lock(&self.play_responses).pop_front();
        scripted.unwrap_or_else(|| Ok(ApiEnvelope::ok(lost(&game_id))))
    }
}

impl LobbyApi for FakeArcade {
    async fn balance(&self) -> Result<ApiEnvelope<Balance>> {
        self.record_lobby(LobbyCall::Balance)?;
        Ok(ApiEnvelope::ok(Balance { balance: 0.0 }))
    }

    async fn enter(&self, name: &str) -> Result<ApiEnvelope<Value>> {
        self.record_lobby(LobbyCall::Enter(name.to_string()))?;
        Ok(ApiEnvelope::ok(json!({ "name": name })))
    }

    async fn leave(&self) -> Result<ApiEnvelope<Value>> {
        self.record_lobby(LobbyCall::Leave)?;
        Ok(ApiEnvelope::ok(json!({})))
    }

    async fn chat(&self, message: &str) -> Result<ApiEnvelope<Value>> {
        self.record_lobby(LobbyCall::Chat(message.to_string()))?;
        Ok(ApiEnvelope::ok(json!({})))
    }

    async fn move_to(&self, x: i64, y: i64) -> Result<ApiEnvelope<Value>> {
        self.record_lobby(LobbyCall::Move(x, y))?;
        Ok(ApiEnvelope::ok(json!({ "x": x, "y": y })))
    }

    async fn agents(&self) -> Result<ApiEnvelope<AgentList>> {
        self.record_lobby(LobbyCall::Agents)?;
        Ok(ApiEnvelope::ok(AgentList::default()))
    }
}

/// Signer with a fixed address and a canned signature.
pub struct FakeSigner {
    address: Address,
    fail: bool,
    permit_signatures: AtomicUsize,
}

impl FakeSigner {
    pub fn new() -> Self {
        Self::with_address([0x11; 20])
    }

    pub fn with_address(bytes: [u8; 20]) -> Self {
        Self {
            address: Address::from(bytes),
            fail: false,
            permit_signatures: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn permit_signatures(&self) -> usize {
        self.permit_signatures.load(Ordering::SeqCst)
    }
}

impl Default for FakeSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletSigner for FakeSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_message(&self, _message: &str) -> Result<String> {
        if self.fail {
            return Err(ArcadeError::Signing("fake signer refused".to_string()));
        }
        Ok(format!("0x{}1b", "ab".repeat(64)))
    }

    async fn sign_permit(&self, _descriptor: &PermitDescriptor) -> Result<SignatureParts> {
        self.permit_signatures.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ArcadeError::Signing("fake signer refused".to_string()));
        }
        Ok(SignatureParts {
            v: 27,
            r: format!("0x{}", "aa".repeat(32)),
            s: format!("0x{}", "bb".repeat(32)),
        })
    }
}

/// Hands out the same seed every time.
pub struct FixedSeeds(String);

impl FixedSeeds {
    pub fn new(seed: &str) -> Self {
        Self(seed.to_string())
    }
}

impl SeedSource for FixedSeeds {
    fn next_seed(&self) -> String {
        self.0.clone()
    }
}
