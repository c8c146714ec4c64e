use std::future::Future;

use cosign_contract::{ProductColor, ProductStatus};

use super::{identities, issue_and_record, update_tx, TestResult};
use crate::{Ledger, NotaryFinalityService, QueryCriteria, RecordOutcome};

pub(super) async fn run_consume_tests<L, N, F, Fut>(factory: &F) -> Vec<TestResult>
where
    L: Ledger,
    N: NotaryFinalityService,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    vec![
        TestResult::from_result(
            "consume",
            "consumed_version_not_returned",
            consumed_version_not_returned(factory).await,
        ),
        TestResult::from_result(
            "consume",
            "record_is_idempotent",
            record_is_idempotent(factory).await,
        ),
        TestResult::from_result(
            "consume",
            "recorded_transaction_is_retrievable",
            recorded_transaction_is_retrievable(factory).await,
        ),
    ]
}

/// After an update commits, the record id resolves to the new version only,
/// and the Pending filter that found the old version finds nothing.
async fn consumed_version_not_returned<L, N, F, Fut>(factory: &F) -> Result<(), String>
where
    L: Ledger,
    N: NotaryFinalityService,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    let (ledger, notary) = factory().await;
    let (a, b) = identities();
    let issued = issue_and_record(&ledger, &notary, &a, &b, ProductColor::Green).await?;
    let record_id = issued.record.record_id;

    let update = update_tx(notary.identity(), issued, &a, &b);
    let notarised = notary
        .submit(&update)
        .await
        .map_err(|e| format!("submit update: {e}"))?;
    ledger
        .record(&notarised)
        .await
        .map_err(|e| format!("record update: {e}"))?;

    let current = ledger
        .query(&QueryCriteria::new().record_id(record_id))
        .await
        .map_err(|e| format!("query by id: {e}"))?;
    if current.len() != 1 || current[0].record.status != ProductStatus::Received {
        return Err(format!(
            "expected exactly the Received version, got {current:?}"
        ));
    }

    let pending = ledger
        .query(
            &QueryCriteria::new()
                .status(ProductStatus::Pending)
                .color(ProductColor::Green),
        )
        .await
        .map_err(|e| format!("query pending: {e}"))?;
    if !pending.is_empty() {
        return Err(format!("consumed version still visible: {pending:?}"));
    }
    Ok(())
}

async fn record_is_idempotent<L, N, F, Fut>(factory: &F) -> Result<(), String>
where
    L: Ledger,
    N: NotaryFinalityService,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    let (ledger, notary) = factory().await;
    let (a, b) = identities();
    let issued = issue_and_record(&ledger, &notary, &a, &b, ProductColor::Red).await?;

    let update = update_tx(notary.identity(), issued, &b, &a);
    let notarised = notary
        .submit(&update)
        .await
        .map_err(|e| format!("submit update: {e}"))?;

    let first = ledger
        .record(&notarised)
        .await
        .map_err(|e| format!("first record: {e}"))?;
    let second = ledger
        .record(&notarised)
        .await
        .map_err(|e| format!("second record: {e}"))?;
    if first != RecordOutcome::Recorded || second != RecordOutcome::AlreadyRecorded {
        return Err(format!("expected Recorded then AlreadyRecorded, got {first:?} then {second:?}"));
    }

    let all = ledger
        .query(&QueryCriteria::new())
        .await
        .map_err(|e| format!("query: {e}"))?;
    if all.len() != 1 {
        return Err(format!("expected one unconsumed record, got {}", all.len()));
    }
    Ok(())
}

async fn recorded_transaction_is_retrievable<L, N, F, Fut>(factory: &F) -> Result<(), String>
where
    L: Ledger,
    N: NotaryFinalityService,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    let (ledger, notary) = factory().await;
    let (a, b) = identities();
    let issued = issue_and_record(&ledger, &notary, &a, &b, ProductColor::Green).await?;

    let stored = ledger
        .transaction(&issued.state_ref.tx_id)
        .await
        .map_err(|e| format!("transaction lookup: {e}"))?
        .ok_or_else(|| "issuing transaction not stored".to_string())?;
    if stored.id() != issued.state_ref.tx_id {
        return Err(format!(
            "stored transaction id {} does not match {}",
            stored.id(),
            issued.state_ref.tx_id
        ));
    }
    stored
        .verify_notary(&notary.identity())
        .map_err(|e| format!("stored notarisation: {e}"))
}
