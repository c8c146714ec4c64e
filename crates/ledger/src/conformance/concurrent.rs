use std::future::Future;
use std::sync::Arc;

use cosign_contract::{LocalIdentity, ProductColor};

use super::{identities, issue_and_record, update_tx, TestResult};
use crate::{Ledger, LedgerError, NotaryFinalityService};

/// Number of concurrent tasks to spawn in each test.
const TASKS: usize = 10;

pub(super) async fn run_concurrent_tests<L, N, F, Fut>(factory: &F) -> Vec<TestResult>
where
    L: Ledger + 'static,
    N: NotaryFinalityService + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_spends_exactly_one_wins",
            concurrent_spends_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_spends_of_different_inputs_all_succeed",
            concurrent_spends_of_different_inputs_all_succeed(factory).await,
        ),
    ]
}

/// N tasks each submit a different transaction consuming the same input.
/// Exactly one is notarised; the rest must get Conflict.
async fn concurrent_spends_exactly_one_wins<L, N, F, Fut>(factory: &F) -> Result<(), String>
where
    L: Ledger + 'static,
    N: NotaryFinalityService + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    let (ledger, notary) = factory().await;
    let notary = Arc::new(notary);
    let (a, b) = identities();
    let issued = issue_and_record(&ledger, notary.as_ref(), &a, &b, ProductColor::Green).await?;

    let mut handles = Vec::new();
    for i in 0..TASKS {
        let counterparty = LocalIdentity::generate(format!("Bidder-{i}"));
        let tx = update_tx(notary.identity(), issued.clone(), &a, &counterparty);
        let n = notary.clone();
        handles.push(tokio::spawn(async move {
            match n.submit(&tx).await {
                Ok(_) => Ok(true),
                Err(LedgerError::Conflict { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("notary error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != TASKS - 1 {
        return Err(format!("expected {} losers, got {losers}", TASKS - 1));
    }
    Ok(())
}

/// N tasks each spend a different input. No false conflicts.
async fn concurrent_spends_of_different_inputs_all_succeed<L, N, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    L: Ledger + 'static,
    N: NotaryFinalityService + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    let (ledger, notary) = factory().await;
    let notary = Arc::new(notary);
    let (a, b) = identities();

    let mut handles = Vec::new();
    for i in 0..TASKS {
        let issued = issue_and_record(&ledger, notary.as_ref(), &a, &b, ProductColor::Red).await?;
        let tx = update_tx(notary.identity(), issued, &a, &b);
        let n = notary.clone();
        handles.push(tokio::spawn(async move {
            n.submit(&tx).await.map_err(|e| format!("task {i}: {e}"))
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))??;
    }
    Ok(())
}
