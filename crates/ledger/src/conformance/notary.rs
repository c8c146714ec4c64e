use std::future::Future;

use cosign_contract::{
    ContractError, LocalIdentity, ProductColor, SignedTransaction,
};

use super::{identities, issue_and_record, issue_tx, update_tx, TestResult};
use crate::{Ledger, LedgerError, NotaryFinalityService};

pub(super) async fn run_notary_tests<L, N, F, Fut>(factory: &F) -> Vec<TestResult>
where
    L: Ledger,
    N: NotaryFinalityService,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    vec![
        TestResult::from_result(
            "notary",
            "fully_signed_submit_is_notarised",
            fully_signed_submit_is_notarised(factory).await,
        ),
        TestResult::from_result(
            "notary",
            "missing_signature_rejected",
            missing_signature_rejected(factory).await,
        ),
        TestResult::from_result(
            "notary",
            "wrong_notary_rejected",
            wrong_notary_rejected(factory).await,
        ),
        TestResult::from_result(
            "notary",
            "double_spend_conflicts",
            double_spend_conflicts(factory).await,
        ),
        TestResult::from_result(
            "notary",
            "resubmission_is_idempotent",
            resubmission_is_idempotent(factory).await,
        ),
    ]
}

async fn fully_signed_submit_is_notarised<L, N, F, Fut>(factory: &F) -> Result<(), String>
where
    L: Ledger,
    N: NotaryFinalityService,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    let (_ledger, notary) = factory().await;
    let (a, b) = identities();
    let stx = issue_tx(notary.identity(), &a, &b, ProductColor::Green);
    let notarised = notary
        .submit(&stx)
        .await
        .map_err(|e| format!("submit: {e}"))?;
    if notarised.id() != stx.id() {
        return Err("notarised transaction id differs from submitted".to_string());
    }
    notarised
        .verify_notary(&notary.identity())
        .map_err(|e| format!("notary signature: {e}"))
}

async fn missing_signature_rejected<L, N, F, Fut>(factory: &F) -> Result<(), String>
where
    L: Ledger,
    N: NotaryFinalityService,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    let (_ledger, notary) = factory().await;
    let (a, b) = identities();
    let full = issue_tx(notary.identity(), &a, &b, ProductColor::Red);
    let id = full.id();
    let partial = SignedTransaction::new(full.tx, a.sign(&id));

    match notary.submit(&partial).await {
        Err(LedgerError::Contract(ContractError::MissingSignatures { missing })) => {
            if missing != vec![b.party().owning_key.fingerprint()] {
                return Err(format!("expected only Beta missing, got {missing:?}"));
            }
            Ok(())
        }
        Err(e) => Err(format!("expected MissingSignatures, got {e}")),
        Ok(_) => Err("partially signed transaction was notarised".to_string()),
    }
}

async fn wrong_notary_rejected<L, N, F, Fut>(factory: &F) -> Result<(), String>
where
    L: Ledger,
    N: NotaryFinalityService,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    let (_ledger, notary) = factory().await;
    let (a, b) = identities();
    let elsewhere = LocalIdentity::generate("Elsewhere");
    let stx = issue_tx(elsewhere.party().owning_key, &a, &b, ProductColor::Red);

    match notary.submit(&stx).await {
        Err(LedgerError::WrongNotary { .. }) => Ok(()),
        Err(e) => Err(format!("expected WrongNotary, got {e}")),
        Ok(_) => Err("transaction for another notary was notarised".to_string()),
    }
}

/// Two different transactions consuming the same input: the second is a
/// conflict naming the first as the consumer.
async fn double_spend_conflicts<L, N, F, Fut>(factory: &F) -> Result<(), String>
where
    L: Ledger,
    N: NotaryFinalityService,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    let (ledger, notary) = factory().await;
    let (a, b) = identities();
    let issued = issue_and_record(&ledger, &notary, &a, &b, ProductColor::Green).await?;

    let first = update_tx(notary.identity(), issued.clone(), &a, &b);
    let second = update_tx(notary.identity(), issued.clone(), &b, &a);
    notary
        .submit(&first)
        .await
        .map_err(|e| format!("first submit: {e}"))?;

    match notary.submit(&second).await {
        Err(LedgerError::Conflict {
            state_ref,
            consumed_by,
        }) => {
            if state_ref != issued.state_ref {
                return Err(format!("conflict on {state_ref}, expected {}", issued.state_ref));
            }
            if consumed_by != first.id() {
                return Err(format!("conflict names {consumed_by}, expected {}", first.id()));
            }
            Ok(())
        }
        Err(e) => Err(format!("expected Conflict, got {e}")),
        Ok(_) => Err("double spend was notarised".to_string()),
    }
}

async fn resubmission_is_idempotent<L, N, F, Fut>(factory: &F) -> Result<(), String>
where
    L: Ledger,
    N: NotaryFinalityService,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    let (ledger, notary) = factory().await;
    let (a, b) = identities();
    let issued = issue_and_record(&ledger, &notary, &a, &b, ProductColor::Red).await?;
    let update = update_tx(notary.identity(), issued, &a, &b);

    let first = notary
        .submit(&update)
        .await
        .map_err(|e| format!("first submit: {e}"))?;
    let again = notary
        .submit(&update)
        .await
        .map_err(|e| format!("resubmit: {e}"))?;
    if first != again {
        return Err("resubmission returned a different notarisation".to_string());
    }
    Ok(())
}
