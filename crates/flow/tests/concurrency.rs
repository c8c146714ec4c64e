mod common;

use std::time::Duration;

use cosign_contract::{ProductColor, ProductStatus};
use cosign_flow::{FlowConfig, FlowError, InMemoryNetwork};
use cosign_ledger::{LedgerQueryService, QueryCriteria};

use common::harness_with;

/// Long enough that every racing attempt queries before any reaches the
/// notary.
const LATENCY: Duration = Duration::from_millis(20);

#[tokio::test]
async fn racing_updates_on_one_record_commit_exactly_once() {
    let h = harness_with(InMemoryNetwork::with_latency(LATENCY), FlowConfig::default()).await;
    h.a.issues()
        .initiate_create(&h.a.party, &h.b.party, ProductColor::Green)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let coordinator = h.a.updates();
        let (from, to) = (h.a.party.clone(), h.b.party.clone());
        handles.push(tokio::spawn(async move {
            coordinator
                .initiate_update(&from, &to, ProductStatus::Received, ProductColor::Green)
                .await
        }));
    }

    let mut committed = Vec::new();
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(c) => committed.push(c),
            Err(FlowError::Conflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(committed.len(), 1);
    assert_eq!(conflicts, 1);

    let pending = QueryCriteria::new().status(ProductStatus::Pending);
    let received = QueryCriteria::new().status(ProductStatus::Received);
    for vault in [&h.a.vault, &h.b.vault] {
        assert!(vault.query(&pending).await.unwrap().is_empty());
        assert_eq!(
            vault.query(&received).await.unwrap(),
            vec![committed[0].output.clone()]
        );
    }
}

#[tokio::test]
async fn both_parties_racing_on_one_record_commit_exactly_once() {
    let h = harness_with(InMemoryNetwork::with_latency(LATENCY), FlowConfig::default()).await;
    h.a.issues()
        .initiate_create(&h.a.party, &h.b.party, ProductColor::Red)
        .await
        .unwrap();

    let from_a = {
        let coordinator = h.a.updates();
        let (from, to) = (h.a.party.clone(), h.b.party.clone());
        tokio::spawn(async move {
            coordinator
                .initiate_update(&from, &to, ProductStatus::Received, ProductColor::Red)
                .await
        })
    };
    let from_b = {
        let coordinator = h.b.updates();
        let (from, to) = (h.b.party.clone(), h.a.party.clone());
        tokio::spawn(async move {
            coordinator
                .initiate_update(&from, &to, ProductStatus::Received, ProductColor::Red)
                .await
        })
    };

    let results = [from_a.await.unwrap(), from_b.await.unwrap()];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(FlowError::Conflict { .. })))
        .count();
    assert_eq!((winners, conflicts), (1, 1));
    assert_eq!(h.notary.committed_count().await, 2);
}

#[tokio::test]
async fn updates_on_different_records_all_commit() {
    let h = harness_with(InMemoryNetwork::with_latency(LATENCY), FlowConfig::default()).await;
    let issues = h.a.issues();
    let mut record_ids = Vec::new();
    for color in [ProductColor::Red, ProductColor::Green, ProductColor::Red] {
        let created = issues
            .initiate_create(&h.a.party, &h.b.party, color)
            .await
            .unwrap();
        record_ids.push(created.output.record.record_id);
    }

    let mut handles = Vec::new();
    for record_id in record_ids {
        let coordinator = h.a.updates();
        let (from, to) = (h.a.party.clone(), h.b.party.clone());
        handles.push(tokio::spawn(async move {
            coordinator
                .initiate_update_by_id(&from, &to, ProductStatus::Received, record_id)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.notary.committed_count().await, 6);
    let received = QueryCriteria::new().status(ProductStatus::Received);
    assert_eq!(h.b.vault.query(&received).await.unwrap().len(), 3);
}

#[tokio::test]
async fn losing_proposal_is_dropped_once_the_winner_is_final() {
    let h = harness_with(InMemoryNetwork::with_latency(LATENCY), FlowConfig::default()).await;
    h.a.issues()
        .initiate_create(&h.a.party, &h.b.party, ProductColor::Red)
        .await
        .unwrap();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let coordinator = h.a.updates();
            let (from, to) = (h.a.party.clone(), h.b.party.clone());
            tokio::spawn(async move {
                coordinator
                    .initiate_update(&from, &to, ProductStatus::Received, ProductColor::Red)
                    .await
            })
        })
        .collect();
    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    // B co-signed both proposals; the loser spends the same input as the
    // recorded winner and can never be finalised.
    assert!(h.b.responder.awaiting_finality().await.is_empty());
}
