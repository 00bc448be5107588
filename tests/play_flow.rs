#![allow(non_snake_case)]

use clawsvegas::{
    arcade_client::ApiEnvelope,
    bet::RandomSeeds,
    error::{
        ArcadeError,
        PolicyViolation,
        TransportError,
    },
    permit::BetPolicy,
    report::{
        render_failure,
        render_outcome,
    },
    session::{
        BetState,
        GaslessTable,
    },
    signer::WalletSigner,
    test_helpers::{
        FakeArcade,
        FakeSigner,
        permit_descriptor,
        won,
    },
};
use serde_json::json;

fn policy() -> BetPolicy {
    BetPolicy::new(1.0, 100.0)
}

#[tokio::test]
async fn play__five_on_heads_wins_nine_point_eight() {
    // given
    let api = FakeArcade::new();
    api.push_prepare(Ok(ApiEnvelope::ok(permit_descriptor(
        json!(500000),
        json!(4_102_444_800u64),
    ))));
    api.push_play(Ok(ApiEnvelope::ok(won(9.8, "abc123"))));
    let signer = FakeSigner::new();
    let table = GaslessTable::new(&api, Some(&signer), policy(), signer.address());

    // when
    let report = table.play("5", "heads", &RandomSeeds).await;

    // then
    assert_eq!(
        report.session.history(),
        &[
            BetState::Idle,
            BetState::PermitRequested,
            BetState::PermitSigned,
            BetState::Submitted,
            BetState::Resolved,
        ]
    );
    let outcome = report.result.unwrap();
    assert!(outcome.won);
    assert_eq!(outcome.payout, Some(9.8));
    assert!(render_outcome(&outcome, "USDC").contains("+9.8 USDC"));

    let sent = api.play_requests();
    assert_eq!(sent[0]["choice"], json!(0));
    assert_eq!(sent[0]["amount"], json!(5.0));
    assert_eq!(sent[0]["permit"]["value"], json!(500000));
    assert_eq!(sent[0]["permit"]["deadline"], json!(4_102_444_800u64));
    assert_eq!(sent[0]["permit"]["owner"], json!(signer.address().to_string()));
    assert_eq!(signer.permit_signatures(), 1);
}

#[tokio::test]
async fn play__one_hundred_fifty_is_rejected_before_any_request() {
    // given
    let api = FakeArcade::new();
    let signer = FakeSigner::new();
    let table = GaslessTable::new(&api, Some(&signer), policy(), signer.address());

    // when
    let report = table.play("150", "heads", &RandomSeeds).await;

    // then
    assert!(matches!(
        report.result,
        Err(ArcadeError::Policy(PolicyViolation::AmountOutOfBounds { .. }))
    ));
    assert_eq!(api.prepare_calls(), 0);
    assert_eq!(api.play_calls(), 0);
    assert_eq!(signer.permit_signatures(), 0);
}

#[tokio::test]
async fn play__submit_timeout_is_reported_as_unknown_not_lost() {
    // given
    let api = FakeArcade::new();
    api.push_play(Err(TransportError::timeout("no answer within 30s").into()));
    let signer = FakeSigner::new();
    let table = GaslessTable::new(&api, Some(&signer), policy(), signer.address());

    // when
    let report = table.play("5", "1", &RandomSeeds).await;

    // then
    assert!(report.is_indeterminate());
    let err = report.result.unwrap_err();
    assert!(render_failure(&err).contains("unknown"));
    assert_eq!(api.play_calls(), 1);
}

#[tokio::test]
async fn play__each_bet_uses_a_fresh_seed_and_permit() {
    // given
    let api = FakeArcade::new();
    let signer = FakeSigner::new();
    let table = GaslessTable::new(&api, Some(&signer), policy(), signer.address());

    // when
    for _ in 0..3 {
        let report = table.play("2", "tails", &RandomSeeds).await;
        assert!(report.result.is_ok());
    }

    // then
    let seeds: std::collections::HashSet<String> = api
        .play_requests()
        .iter()
        .map(|body| body["clientSeed"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(seeds.len(), 3);
    assert_eq!(api.prepare_calls(), 3);
    assert_eq!(signer.permit_signatures(), 3);
}
