use crate::{
    arcade_client::GameApi,
    error::{
        ArcadeError,
        PolicyViolation,
        Result,
        TransportError,
    },
    permit::{
        BetPolicy,
        SignedPermit,
    },
};
use chrono::Utc;
use rand::Rng;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;
use std::{
    fmt,
    str::FromStr,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Choice {
    Heads,
    Tails,
}

impl Choice {
    /// Wire encoding: heads = 0, tails = 1.
    pub fn code(self) -> u8 {
        match self {
            Choice::Heads => 0,
            Choice::Tails => 1,
        }
    }

    pub fn normalize(raw: &str) -> Result<Self, PolicyViolation> {
        match raw {
            "heads" | "0" => Ok(Choice::Heads),
            "tails" | "1" => Ok(Choice::Tails),
            _ => Err(PolicyViolation::InvalidChoice(raw.to_string())),
        }
    }
}

impl FromStr for Choice {
    type Err = PolicyViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Choice::normalize(s)
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Choice::Heads => "heads",
            Choice::Tails => "tails",
        };
        write!(f, "{name}")
    }
}

/// Source of per-bet client seeds.
pub trait SeedSource {
    fn next_seed(&self) -> String;
}

/// `flip-<unix millis>-<64 random bits as hex>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomSeeds;

impl SeedSource for RandomSeeds {
    fn next_seed(&self) -> String {
        let mut entropy = [0u8; 8];
        rand::rng().fill(&mut entropy);
        format!(
            "flip-{}-{}",
            Utc::now().timestamp_millis(),
            hex::encode(entropy)
        )
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BetRequest {
    pub amount: f64,
    pub choice: u8,
    pub client_seed: String,
    pub permit: SignedPermit,
}

/// `data` of a play response, as sent by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayResult {
    #[serde(default)]
    pub won: Option<bool>,
    #[serde(default)]
    pub outcome_text: Option<String>,
    #[serde(default)]
    pub payout: Option<f64>,
    #[serde(default)]
    pub bet_amount: Option<f64>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub game_id: Option<Value>,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub won: bool,
    pub outcome_text: String,
    /// Only set for wins.
    pub payout: Option<f64>,
    pub bet_amount: f64,
    pub game_id: Option<String>,
    pub tx_hash: Option<String>,
    pub client_seed: String,
}

impl Outcome {
    pub fn interpret(result: PlayResult, wagered: f64, client_seed: String) -> Result<Self> {
        let won = result.won.ok_or_else(|| {
            ArcadeError::MalformedResponse("play result is missing the 'won' flag".to_string())
        })?;
        let game_id = result.game_id.and_then(|id| match id {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        });
        Ok(Self {
            won,
            outcome_text: result
                .outcome_text
                .unwrap_or_else(|| if won { "WIN" } else { "LOSS" }.to_string()),
            payout: if won { result.payout } else { None },
            bet_amount: result.bet_amount.or(result.amount).unwrap_or(wagered),
            game_id,
            tx_hash: result.tx_hash,
            client_seed,
        })
    }
}

/// Once the bet is sent, an answer that cannot be read says nothing about
/// whether it settled.
fn unsettled(err: ArcadeError) -> ArcadeError {
    match err {
        ArcadeError::MalformedResponse(message) => TransportError::decode(message).into(),
        other => other,
    }
}

/// Submits one bet backed by `permit`. The permit is consumed whatever the
/// result, and the request is never retried.
pub async fn submit_bet<A, R>(
    api: &A,
    policy: &BetPolicy,
    amount: f64,
    choice: Choice,
    permit: SignedPermit,
    seeds: &R,
) -> Result<Outcome>
where
    A: GameApi,
    R: SeedSource,
{
    let amount = policy.check(amount)?;
    permit.ensure_unexpired()?;

    let client_seed = seeds.next_seed();
    let request = BetRequest {
        amount,
        choice: choice.code(),
        client_seed: client_seed.clone(),
        permit,
    };
    tracing::info!(amount, %choice, %client_seed, "submitting gasless bet");

    let outcome = api
        .play_gasless(&request)
        .await
        .and_then(|envelope| envelope.into_result())
        .and_then(|result| Outcome::interpret(result, amount, client_seed.clone()))
        .map_err(unsettled)
        .inspect_err(|err| {
            if err.is_indeterminate() {
                tracing::error!(%err, %client_seed, "bet submission failed, resolution unknown");
            }
        })?;
    tracing::info!(
        won = outcome.won,
        game_id = ?outcome.game_id,
        payout = ?outcome.payout,
        "bet resolved"
    );
    Ok(outcome)
}
