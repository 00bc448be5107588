//! One gasless bet from raw user input to a terminal state.

use crate::{
    arcade_client::GameApi,
    bet::{
        Choice,
        Outcome,
        SeedSource,
        submit_bet,
    },
    error::{
        ArcadeError,
        Result,
    },
    permit::{
        BetPolicy,
        build_signed_permit,
    },
    signer::WalletSigner,
};
use alloy_primitives::Address;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BetState {
    Idle,
    PermitRequested,
    PermitSigned,
    Submitted,
    Resolved,
    Rejected,
    TransportFailed,
}

impl BetState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BetState::Resolved | BetState::Rejected | BetState::TransportFailed
        )
    }

    fn can_advance_to(self, next: BetState) -> bool {
        use BetState::*;
        match (self, next) {
            (Idle, PermitRequested)
            | (PermitRequested, PermitSigned)
            | (PermitSigned, Submitted)
            | (Submitted, Resolved) => true,
            (from, Rejected | TransportFailed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for BetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State of a single bet. A new bet always starts a new session.
#[derive(Clone, Debug, PartialEq)]
pub struct BetSession {
    state: BetState,
    history: Vec<BetState>,
}

impl Default for BetSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BetSession {
    pub fn new() -> Self {
        Self {
            state: BetState::Idle,
            history: vec![BetState::Idle],
        }
    }

    pub fn state(&self) -> BetState {
        self.state
    }

    pub fn history(&self) -> &[BetState] {
        &self.history
    }

    /// Whether the play request went out.
    pub fn was_submitted(&self) -> bool {
        self.history.contains(&BetState::Submitted)
    }

    /// Moves to `next`. Illegal transitions leave the session untouched.
    pub fn advance(&mut self, next: BetState) -> bool {
        if !self.state.can_advance_to(next) {
            tracing::warn!(from = %self.state, to = %next, "ignoring illegal bet transition");
            return false;
        }
        tracing::debug!(from = %self.state, to = %next, "bet state change");
        self.state = next;
        self.history.push(next);
        true
    }

    pub fn fail(&mut self, err: &ArcadeError) {
        let next = if err.is_indeterminate() {
            BetState::TransportFailed
        } else {
            BetState::Rejected
        };
        self.advance(next);
    }
}

#[derive(Debug)]
pub struct BetReport {
    pub session: BetSession,
    pub result: Result<Outcome>,
}

impl BetReport {
    /// The play request was sent and its answer was lost.
    pub fn is_indeterminate(&self) -> bool {
        self.session.state() == BetState::TransportFailed && self.session.was_submitted()
    }
}

/// Gasless coin-flip table bound to one wallet.
pub struct GaslessTable<'a, A, S> {
    api: &'a A,
    signer: Option<&'a S>,
    policy: BetPolicy,
    wallet: Address,
}

impl<'a, A, S> GaslessTable<'a, A, S>
where
    A: GameApi,
    S: WalletSigner,
{
    pub fn new(api: &'a A, signer: Option<&'a S>, policy: BetPolicy, wallet: Address) -> Self {
        Self {
            api,
            signer,
            policy,
            wallet,
        }
    }

    /// Validates raw user input, then plays. Malformed input never reaches the
    /// network.
    pub async fn play<R: SeedSource>(
        &self,
        amount_raw: &str,
        choice_raw: &str,
        seeds: &R,
    ) -> BetReport {
        let parsed = self
            .policy
            .parse(amount_raw)
            .and_then(|amount| Choice::normalize(choice_raw).map(|choice| (amount, choice)));
        match parsed {
            Ok((amount, choice)) => self.play_parsed(amount, choice, seeds).await,
            Err(violation) => {
                tracing::warn!(%violation, amount_raw, choice_raw, "bet rejected locally");
                let err = ArcadeError::from(violation);
                let mut session = BetSession::new();
                session.fail(&err);
                BetReport {
                    session,
                    result: Err(err),
                }
            }
        }
    }

    pub async fn play_parsed<R: SeedSource>(
        &self,
        amount: f64,
        choice: Choice,
        seeds: &R,
    ) -> BetReport {
        let mut session = BetSession::new();
        let result = self.run(&mut session, amount, choice, seeds).await;
        if let Err(err) = &result {
            session.fail(err);
        }
        tracing::info!(state = %session.state(), amount, %choice, "bet finished");
        BetReport { session, result }
    }

    async fn run<R: SeedSource>(
        &self,
        session: &mut BetSession,
        amount: f64,
        choice: Choice,
        seeds: &R,
    ) -> Result<Outcome> {
        let amount = self.policy.check(amount)?;

        session.advance(BetState::PermitRequested);
        let permit =
            build_signed_permit(self.api, self.signer, &self.policy, amount, self.wallet)
                .await?;
        session.advance(BetState::PermitSigned);

        permit.ensure_unexpired()?;
        session.advance(BetState::Submitted);
        let outcome = submit_bet(self.api, &self.policy, amount, choice, permit, seeds).await?;
        session.advance(BetState::Resolved);
        Ok(outcome)
    }
}
