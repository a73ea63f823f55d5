use std::time::Duration;

use epic_box::{
    CancelToken,
    EntityKind,
    PollError,
    PollerConfig,
    cancellation,
    reveal,
    rewards::{
        AssetKind,
        decode_rewards,
    },
    test_helpers::*,
};
use generated_abi::{
    SolEvent,
    redeemer_types::{
        LandTicketTransferred,
        PlayerMinted,
        ScoutMinted,
    },
};

fn config() -> PollerConfig {
    PollerConfig::constant(4, Duration::from_millis(5))
}

#[tokio::test]
async fn reveal__decoded_receipt_settles_before_returning() {
    // given
    let redeemer = polygon_redeemer();
    let logs = vec![
        minted_log(redeemer, PlayerMinted::SIGNATURE_HASH, 101, true),
        minted_log(redeemer, ScoutMinted::SIGNATURE_HASH, 202, true),
        minted_log(redeemer, LandTicketTransferred::SIGNATURE_HASH, 303, false),
    ];
    let rewards = decode_rewards(&logs, redeemer, &polygon_reward_contracts()).unwrap();
    let index = ScriptedIndex::new()
        .respond(EntityKind::Player, 101, vec![empty()], found(101))
        .respond(EntityKind::Scout, 202, vec![empty(), empty()], found(202));
    let sync = RecordingSync::new();

    // when
    let outcome = reveal(
        &index,
        &sync,
        "polygon",
        rewards,
        &config(),
        &CancelToken::never(),
    )
    .await;

    // then
    let revealed = outcome.into_result().unwrap();
    let kinds: Vec<_> = revealed.iter().map(|r| r.reward.asset_kind).collect();
    assert_eq!(kinds, vec![AssetKind::Player, AssetKind::Scout, AssetKind::Land]);
    assert_eq!(index.calls_for(EntityKind::Player, 101), 2);
    assert_eq!(index.calls_for(EntityKind::Scout, 202), 3);
    assert_eq!(sync.calls().len(), 2);
}

#[tokio::test]
async fn reveal__failed_reward_can_be_retried_manually() {
    // given
    let index = ScriptedIndex::new()
        .respond(EntityKind::Player, 1, vec![], found(1))
        .respond(EntityKind::Scout, 2, vec![empty(); 4], found(2));
    let sync = RecordingSync::new();
    let rewards = vec![reward(AssetKind::Player, 1), reward(AssetKind::Scout, 2)];
    let first = reveal(
        &index,
        &sync,
        "polygon",
        rewards,
        &config(),
        &CancelToken::never(),
    )
    .await;
    let err = first.clone().into_result().unwrap_err();
    assert_eq!(err.failures.len(), 1);
    assert!(matches!(err.failures[0].1, PollError::Exhausted { .. }));

    // when
    let second = first
        .retry_failed(&index, &sync, &config(), &CancelToken::never())
        .await;

    // then
    assert!(second.is_ready());
    assert_eq!(index.calls_for(EntityKind::Player, 1), 1);
    assert_eq!(index.calls_for(EntityKind::Scout, 2), 5);
}

#[tokio::test]
async fn reveal__dropping_the_handle_stops_outstanding_polls() {
    // given
    let index = ScriptedIndex::new();
    let sync = RecordingSync::new();
    let (handle, token) = cancellation();
    let slow = PollerConfig::constant(90, Duration::from_secs(30));

    // when
    let (outcome, _) = tokio::join!(
        reveal(
            &index,
            &sync,
            "polygon",
            vec![reward(AssetKind::Player, 8), reward(AssetKind::Land, 9)],
            &slow,
            &token,
        ),
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(handle);
        }
    );

    // then
    assert!(matches!(
        outcome.rewards[0].result,
        Err(PollError::Cancelled { attempts: 1 })
    ));
    assert!(outcome.rewards[1].is_ready());
}
