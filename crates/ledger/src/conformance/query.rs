use std::future::Future;

use cosign_contract::{ProductColor, ProductStatus};

use super::{identities, issue_and_record, TestResult};
use crate::{Ledger, NotaryFinalityService, QueryCriteria};

pub(super) async fn run_query_tests<L, N, F, Fut>(factory: &F) -> Vec<TestResult>
where
    L: Ledger,
    N: NotaryFinalityService,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    vec![
        TestResult::from_result(
            "query",
            "empty_ledger_returns_nothing",
            empty_ledger_returns_nothing(factory).await,
        ),
        TestResult::from_result(
            "query",
            "recorded_output_is_queryable",
            recorded_output_is_queryable(factory).await,
        ),
        TestResult::from_result(
            "query",
            "filters_exclude_non_matching",
            filters_exclude_non_matching(factory).await,
        ),
    ]
}

async fn empty_ledger_returns_nothing<L, N, F, Fut>(factory: &F) -> Result<(), String>
where
    L: Ledger,
    N: NotaryFinalityService,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    let (ledger, _notary) = factory().await;
    let found = ledger
        .query(&QueryCriteria::new())
        .await
        .map_err(|e| format!("query: {e}"))?;
    if !found.is_empty() {
        return Err(format!("expected empty ledger, got {} records", found.len()));
    }
    Ok(())
}

async fn recorded_output_is_queryable<L, N, F, Fut>(factory: &F) -> Result<(), String>
where
    L: Ledger,
    N: NotaryFinalityService,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    let (ledger, notary) = factory().await;
    let (a, b) = identities();
    let issued = issue_and_record(&ledger, &notary, &a, &b, ProductColor::Green).await?;

    let criteria = [
        QueryCriteria::new(),
        QueryCriteria::new().status(ProductStatus::Pending),
        QueryCriteria::new().color(ProductColor::Green),
        QueryCriteria::new().record_id(issued.record.record_id),
        QueryCriteria::new().participant(b.party().owning_key),
    ];
    for c in &criteria {
        let found = ledger.query(c).await.map_err(|e| format!("query {c}: {e}"))?;
        if found != vec![issued.clone()] {
            return Err(format!("query {c}: expected the issued record, got {found:?}"));
        }
    }
    Ok(())
}

async fn filters_exclude_non_matching<L, N, F, Fut>(factory: &F) -> Result<(), String>
where
    L: Ledger,
    N: NotaryFinalityService,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    let (ledger, notary) = factory().await;
    let (a, b) = identities();
    let red = issue_and_record(&ledger, &notary, &a, &b, ProductColor::Red).await?;
    let green = issue_and_record(&ledger, &notary, &a, &b, ProductColor::Green).await?;

    let found = ledger
        .query(&QueryCriteria::new().color(ProductColor::Red))
        .await
        .map_err(|e| format!("query red: {e}"))?;
    if found != vec![red] {
        return Err(format!("color filter: expected only the red record, got {found:?}"));
    }

    let found = ledger
        .query(&QueryCriteria::new().status(ProductStatus::Received))
        .await
        .map_err(|e| format!("query received: {e}"))?;
    if !found.is_empty() {
        return Err(format!("status filter: expected nothing Received, got {found:?}"));
    }

    let found = ledger
        .query(&QueryCriteria::new().record_id(green.record.record_id))
        .await
        .map_err(|e| format!("query green id: {e}"))?;
    if found != vec![green] {
        return Err(format!("record id filter: expected the green record, got {found:?}"));
    }
    Ok(())
}
