//! Runs the backend conformance suite against the in-memory vault and notary.

use cosign_ledger::conformance::run_conformance_suite;
use cosign_ledger::{InMemoryNotary, InMemoryVault};

#[tokio::test]
async fn in_memory_backends_pass_conformance() {
    let report = run_conformance_suite(|| async {
        (InMemoryVault::new(), InMemoryNotary::new("Notary"))
    })
    .await;
    assert!(report.total > 0);
    assert!(report.failed == 0, "{report}");
}
