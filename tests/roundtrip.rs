// SPDX-License-Identifier: MIT OR Apache-2.0

use age_bridge::test_utils::setup_logging;
use age_bridge::{AgeEngine, Bridge, BridgeError, ErrorKind, WorkerError};
use assert_matches::assert_matches;
use futures_util::future::join_all;

#[tokio::test]
async fn full_round_trip_over_the_bridge() {
    setup_logging();

    let bridge = Bridge::builder(AgeEngine::new()).spawn();

    let pair = bridge.generate_identity().await.unwrap();
    assert!(pair.private.starts_with("AGE-SECRET-KEY-1"));
    assert!(pair.public.starts_with("age1"));

    let ciphertext = bridge
        .encrypt("secret plans", vec![pair.public.clone()])
        .await
        .unwrap();
    assert!(ciphertext.starts_with("-----BEGIN AGE ENCRYPTED FILE-----"));

    let plaintext = bridge.decrypt(ciphertext, pair.private).await.unwrap();
    assert_eq!(plaintext, "secret plans");
}

#[tokio::test]
async fn any_recipient_can_decrypt() {
    let bridge = Bridge::builder(AgeEngine::new()).spawn();

    let alice = bridge.generate_identity().await.unwrap();
    let bob = bridge.generate_identity().await.unwrap();

    let ciphertext = bridge
        .encrypt(
            "for both of you",
            vec![alice.public.clone(), bob.public.clone()],
        )
        .await
        .unwrap();

    let via_alice = bridge
        .decrypt(ciphertext.clone(), alice.private)
        .await
        .unwrap();
    let via_bob = bridge.decrypt(ciphertext, bob.private).await.unwrap();

    assert_eq!(via_alice, "for both of you");
    assert_eq!(via_bob, "for both of you");
}

#[tokio::test]
async fn queue_survives_a_failing_call() {
    setup_logging();

    // Scenario:
    //
    // - Three calls are queued together, the middle one decrypting garbage
    //
    // Assert: the middle call rejects with an engine error while its neighbours resolve
    // untouched

    let bridge = Bridge::builder(AgeEngine::new()).spawn();
    let pair = bridge.generate_identity().await.unwrap();

    let before = bridge.encrypt("before", vec![pair.public.clone()]);
    let failing = bridge.decrypt("this is not an age file", pair.private.clone());
    let after = bridge.encrypt("after", vec![pair.public.clone()]);

    let before = before.await.unwrap();
    assert_matches!(
        failing.await.unwrap_err(),
        BridgeError::Worker(WorkerError {
            kind: ErrorKind::Engine,
            ..
        })
    );
    let after = after.await.unwrap();

    assert_eq!(
        bridge
            .decrypt(before, pair.private.clone())
            .await
            .unwrap(),
        "before"
    );
    assert_eq!(bridge.decrypt(after, pair.private).await.unwrap(), "after");
}

#[tokio::test]
async fn concurrent_calls_settle_in_call_order() {
    let bridge = Bridge::builder(AgeEngine::new()).spawn();
    let pair = bridge.generate_identity().await.unwrap();

    let ciphertexts = join_all(
        (0..8).map(|i| bridge.encrypt(format!("message {i}"), vec![pair.public.clone()])),
    )
    .await;
    let plaintexts = join_all(
        ciphertexts
            .into_iter()
            .map(|ciphertext| bridge.decrypt(ciphertext.unwrap(), pair.private.clone())),
    )
    .await;

    for (i, plaintext) in plaintexts.into_iter().enumerate() {
        assert_eq!(plaintext.unwrap(), format!("message {i}"));
    }
}
