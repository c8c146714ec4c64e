//! Conformance test suite for ledger and notary backends.
//!
//! Any pair of [`Ledger`] and [`NotaryFinalityService`] implementations can
//! run this suite to check the behaviour the cosigning protocol relies on:
//!
//! - **Query**: unconsumed records are visible and filterable
//! - **Consume**: a consumed version never shows up again; recording is idempotent
//! - **Notary**: signatures enforced, double spends rejected, resubmission idempotent
//! - **Concurrent**: racing spends of one input produce exactly one winner
//!
//! # Usage
//!
//! ```ignore
//! use cosign_ledger::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn in_memory_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         (InMemoryVault::new(), InMemoryNotary::new("Notary"))
//!     })
//!     .await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod consume;
mod notary;
mod query;

use std::fmt;
use std::future::Future;

use cosign_contract::{
    Command, LocalIdentity, PartyKey, ProductColor, ProductRecord, ProductStatus,
    SignedTransaction, StateAndRef, TransactionBuilder,
};

use crate::{Ledger, NotaryFinalityService};

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "query", "notary").
    pub category: String,
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in self.results.iter().filter(|r| !r.passed) {
            writeln!(
                f,
                "  FAIL [{}/{}]: {}",
                r.category,
                r.name,
                r.message.as_deref().unwrap_or("(no message)")
            )?;
        }
        Ok(())
    }
}

/// Run the full conformance suite.
///
/// `factory` is called once per test and must return a fresh, empty ledger
/// and a fresh notary.
pub async fn run_conformance_suite<L, N, F, Fut>(factory: F) -> ConformanceReport
where
    L: Ledger + 'static,
    N: NotaryFinalityService + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = (L, N)>,
{
    let mut results = Vec::new();

    results.extend(query::run_query_tests(&factory).await);
    results.extend(consume::run_consume_tests(&factory).await);
    results.extend(notary::run_notary_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: signed transactions with sensible defaults ─────────────────────

fn identities() -> (LocalIdentity, LocalIdentity) {
    (LocalIdentity::generate("Alpha"), LocalIdentity::generate("Beta"))
}

/// A Create transaction signed by both participants.
fn issue_tx(
    notary: PartyKey,
    a: &LocalIdentity,
    b: &LocalIdentity,
    color: ProductColor,
) -> SignedTransaction {
    let record = ProductRecord::issue(a.party().clone(), b.party().clone(), color);
    let keys = record.participant_keys();
    let tx = TransactionBuilder::new(notary)
        .add_output(record)
        .add_command(Command::Create, keys)
        .build();
    let id = tx.id();
    SignedTransaction::new(tx, a.sign(&id)).with_signature(b.sign(&id))
}

/// An UpdateStatus transaction moving `input` to Received, signed by both
/// new participants.
fn update_tx(
    notary: PartyKey,
    input: StateAndRef,
    from: &LocalIdentity,
    to: &LocalIdentity,
) -> SignedTransaction {
    let output = input.record.next_version(
        from.party().clone(),
        to.party().clone(),
        ProductStatus::Received,
    );
    let keys = output.participant_keys();
    let tx = TransactionBuilder::new(notary)
        .add_input(input)
        .add_output(output)
        .add_command(Command::UpdateStatus, keys)
        .build();
    let id = tx.id();
    SignedTransaction::new(tx, from.sign(&id)).with_signature(to.sign(&id))
}

/// Issue a record through the notary and record it in `ledger`.
async fn issue_and_record<L, N>(
    ledger: &L,
    notary: &N,
    a: &LocalIdentity,
    b: &LocalIdentity,
    color: ProductColor,
) -> Result<StateAndRef, String>
where
    L: Ledger,
    N: NotaryFinalityService,
{
    let stx = issue_tx(notary.identity(), a, b, color);
    let notarised = notary
        .submit(&stx)
        .await
        .map_err(|e| format!("submit issue: {e}"))?;
    ledger
        .record(&notarised)
        .await
        .map_err(|e| format!("record issue: {e}"))?;
    notarised
        .output_states()
        .into_iter()
        .next()
        .ok_or_else(|| "issue produced no output".to_string())
}
