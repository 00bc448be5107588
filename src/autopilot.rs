//! Autonomous arcade presence: wander, chat and occasionally flip.

use crate::{
    arcade_client::{
        ApiEnvelope,
        GameApi,
        LobbyApi,
    },
    bet::{
        Choice,
        SeedSource,
    },
    config::AutonomousConfig,
    error::Result,
    permit::BetPolicy,
    session::GaslessTable,
    signer::WalletSigner,
};
use rand::{
    Rng,
    seq::IndexedRandom,
};
use std::time::Duration;

pub const FLOOR_WIDTH: i64 = 600;
pub const FLOOR_HEIGHT: i64 = 500;
pub const GREETING: &str = "Hey everyone!";
const SETTLE_DELAY: Duration = Duration::from_secs(1);
const REACTION_DELAY: Duration = Duration::from_secs(2);

pub const CHAT_MESSAGES: &[&str] = &[
    "Let's go!",
    "Heads never fails",
    "Tails gang",
    "50/50 my favorite odds",
    "Who's hot today?",
    "Any big flips?",
    "House edge is brutal today",
    "Anyone else on a streak?",
    "Ready to flip!",
    "Feeling lucky",
    "Double or nothing vibes",
];

pub const WIN_REACTIONS: &[&str] = &[
    "Let's go!",
    "Easy money!",
    "The coin favors me!",
    "Boom!",
    "Called it!",
    "Too easy",
];

pub const LOSE_REACTIONS: &[&str] = &[
    "Ouch",
    "House got me",
    "Next one for sure",
    "Rough",
    "The flip gods hate me",
    "Pain",
];

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Balanced,
    Aggressive,
    Social,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AutopilotSettings {
    pub chat_probability: f64,
    pub play_probability: f64,
    pub min_bet: f64,
    pub max_bet: f64,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub policy: BetPolicy,
}

impl AutopilotSettings {
    pub fn new(config: &AutonomousConfig, mode: Mode, policy: BetPolicy) -> Self {
        let (chat_probability, play_probability) = match mode {
            Mode::Balanced => (config.chat_probability, config.play_probability),
            Mode::Aggressive => (config.chat_probability, 0.4),
            Mode::Social => (0.5, 0.1),
        };
        Self {
            chat_probability,
            play_probability,
            min_bet: config.min_bet_usdc,
            max_bet: config.max_bet_usdc,
            min_delay: Duration::from_secs(config.min_delay_secs),
            max_delay: Duration::from_secs(config.max_delay_secs),
            policy,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlannedBet {
    pub amount: f64,
    pub choice: Choice,
}

/// Everything one loop iteration will do, decided up front.
#[derive(Clone, Debug, PartialEq)]
pub struct TickPlan {
    pub delay: Duration,
    pub position: (i64, i64),
    pub chat: Option<&'static str>,
    pub bet: Option<PlannedBet>,
}

pub fn plan_tick<R: Rng>(settings: &AutopilotSettings, rng: &mut R) -> TickPlan {
    let delay = if settings.max_delay > settings.min_delay {
        rng.random_range(settings.min_delay..=settings.max_delay)
    } else {
        settings.min_delay
    };
    let position = (
        rng.random_range(0..FLOOR_WIDTH),
        rng.random_range(0..FLOOR_HEIGHT),
    );
    let chat = if rng.random_bool(settings.chat_probability) {
        CHAT_MESSAGES.choose(rng).copied()
    } else {
        None
    };
    let bet = rng
        .random_bool(settings.play_probability)
        .then(|| plan_bet(settings, rng));
    TickPlan {
        delay,
        position,
        chat,
        bet,
    }
}

fn plan_bet<R: Rng>(settings: &AutopilotSettings, rng: &mut R) -> PlannedBet {
    let choice = if rng.random_bool(0.5) {
        Choice::Heads
    } else {
        Choice::Tails
    };
    let raw = if settings.max_bet > settings.min_bet {
        rng.random_range(settings.min_bet..settings.max_bet)
    } else {
        settings.min_bet
    };
    let amount = raw
        .floor()
        .clamp(settings.policy.min_bet, settings.policy.max_bet);
    PlannedBet { amount, choice }
}

pub fn pick_reaction<R: Rng>(won: bool, rng: &mut R) -> &'static str {
    let pool = if won { WIN_REACTIONS } else { LOSE_REACTIONS };
    pool.choose(rng).copied().unwrap_or("...")
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AutopilotSummary {
    pub loops: u64,
    pub bets_placed: u64,
    pub bets_won: u64,
    pub failures: u64,
}

pub struct Autopilot<'a, A, S> {
    api: &'a A,
    table: GaslessTable<'a, A, S>,
    settings: AutopilotSettings,
    agent_name: String,
}

impl<'a, A, S> Autopilot<'a, A, S>
where
    A: GameApi + LobbyApi,
    S: WalletSigner,
{
    pub fn new(
        api: &'a A,
        table: GaslessTable<'a, A, S>,
        settings: AutopilotSettings,
        agent_name: impl Into<String>,
    ) -> Self {
        Self {
            api,
            table,
            settings,
            agent_name: agent_name.into(),
        }
    }

    /// Runs until `max_loops` iterations are done, or forever. Leaving the
    /// arcade is up to the caller, see [`Autopilot::leave`].
    pub async fn run<R, Q>(
        &self,
        rng: &mut R,
        seeds: &Q,
        max_loops: Option<u64>,
    ) -> AutopilotSummary
    where
        R: Rng,
        Q: SeedSource,
    {
        let mut summary = AutopilotSummary::default();
        tracing::info!(agent = %self.agent_name, ?max_loops, "starting autonomous mode");

        self.step("enter", self.api.enter(&self.agent_name).await, &mut summary);
        tokio::time::sleep(SETTLE_DELAY).await;
        self.step("chat", self.api.chat(GREETING).await, &mut summary);

        while max_loops.is_none_or(|max| summary.loops < max) {
            summary.loops += 1;
            let plan = plan_tick(&self.settings, rng);
            tracing::info!(
                iteration = summary.loops,
                delay_secs = plan.delay.as_secs(),
                "waiting before next action"
            );
            tokio::time::sleep(plan.delay).await;

            let (x, y) = plan.position;
            self.step("move", self.api.move_to(x, y).await, &mut summary);

            if let Some(message) = plan.chat {
                self.step("chat", self.api.chat(message).await, &mut summary);
            }

            if let Some(PlannedBet { amount, choice }) = plan.bet {
                tracing::info!(amount, %choice, "autonomous bet");
                let report = self.table.play_parsed(amount, choice, seeds).await;
                let indeterminate = report.is_indeterminate();
                match report.result {
                    Ok(outcome) => {
                        summary.bets_placed += 1;
                        if outcome.won {
                            summary.bets_won += 1;
                        }
                        tokio::time::sleep(REACTION_DELAY).await;
                        let reaction = pick_reaction(outcome.won, rng);
                        self.step("chat", self.api.chat(reaction).await, &mut summary);
                    }
                    Err(err) => {
                        summary.failures += 1;
                        tracing::warn!(
                            %err,
                            indeterminate,
                            "autonomous bet failed"
                        );
                    }
                }
            }
            tracing::debug!(iteration = summary.loops, "still autonomous");
        }
        tracing::info!(?summary, "autonomous mode finished");
        summary
    }

    pub async fn leave(&self) -> Result<()> {
        self.api.leave().await?.into_ack()
    }

    fn step<T>(
        &self,
        action: &'static str,
        response: Result<ApiEnvelope<T>>,
        summary: &mut AutopilotSummary,
    ) {
        if let Err(err) = response.and_then(|envelope| envelope.into_ack()) {
            summary.failures += 1;
            tracing::warn!(action, %err, "autonomous action failed, continuing");
        }
    }
}
