//! Transition validator for product transactions.
//!
//! [`verify`] is a pure function of the transaction. It dispatches on the
//! single command the transaction carries and evaluates every rule of that
//! command's rule set, returning all violations together rather than stopping
//! at the first.
//!
//! Field rules need a record to look at. When the transaction is missing the
//! input or output a rule depends on, the shape violation is reported and the
//! dependent field rules are skipped.

use std::collections::BTreeSet;

use crate::command::Command;
use crate::error::{ContractError, Violation};
use crate::party::PartyKey;
use crate::record::{ProductColor, ProductRecord, ProductStatus, PRODUCT_NAME};
use crate::transaction::WireTransaction;

/// Accumulates rule outcomes.
#[derive(Default)]
struct Requirements {
    violations: Vec<Violation>,
}

impl Requirements {
    fn using(&mut self, holds: bool, violation: impl FnOnce() -> Violation) {
        if !holds {
            self.violations.push(violation());
        }
    }

    fn finish(self, command: Command) -> Result<(), ContractError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ContractError::Validation {
                command,
                violations: self.violations,
            })
        }
    }
}

/// Verify a proposed transaction against the product contract.
pub fn verify(tx: &WireTransaction) -> Result<(), ContractError> {
    let command = tx.single_command()?;
    let mut req = Requirements::default();
    match command.command {
        Command::Create => verify_create(tx, &command.signers, &mut req),
        Command::UpdateStatus => verify_update_status(tx, &command.signers, &mut req),
    }
    req.finish(command.command)
}

fn verify_create(tx: &WireTransaction, signers: &BTreeSet<PartyKey>, req: &mut Requirements) {
    req.using(tx.inputs.is_empty(), || Violation::InputsOnCreate {
        found: tx.inputs.len(),
    });
    req.using(tx.outputs.len() == 1, || Violation::OutputCount {
        expected: 1,
        found: tx.outputs.len(),
    });

    let Some(product) = tx.outputs.first() else {
        return;
    };
    req.using(product.product_name == PRODUCT_NAME, || {
        Violation::ProductName {
            found: product.product_name.clone(),
        }
    });
    req.using(
        ProductColor::ISSUABLE.contains(&product.product_color),
        || Violation::ProductColor {
            found: product.product_color,
        },
    );
    req.using(product.status == ProductStatus::Pending, || {
        Violation::InitialStatus {
            found: product.status,
        }
    });
    check_participants(product, signers, req);
}

fn verify_update_status(
    tx: &WireTransaction,
    signers: &BTreeSet<PartyKey>,
    req: &mut Requirements,
) {
    req.using(tx.inputs.len() == 1, || Violation::InputCount {
        expected: 1,
        found: tx.inputs.len(),
    });
    req.using(tx.outputs.len() == 1, || Violation::OutputCount {
        expected: 1,
        found: tx.outputs.len(),
    });

    let Some(output) = tx.outputs.first() else {
        return;
    };
    req.using(output.status == ProductStatus::Received, || {
        Violation::TerminalStatus {
            found: output.status,
        }
    });
    check_participants(output, signers, req);

    let Some(input) = tx.inputs.first().map(|s| &s.record) else {
        return;
    };
    req.using(input.status != output.status, || Violation::StatusUnchanged {
        status: output.status,
    });
    req.using(output.product_name == input.product_name, || {
        Violation::ImmutableFieldChanged {
            field: "product_name".to_string(),
            from: input.product_name.clone(),
            to: output.product_name.clone(),
        }
    });
    req.using(output.product_color == input.product_color, || {
        Violation::ImmutableFieldChanged {
            field: "product_color".to_string(),
            from: input.product_color.to_string(),
            to: output.product_color.to_string(),
        }
    });
    req.using(output.record_id == input.record_id, || {
        Violation::RecordIdChanged
    });
}

/// Two distinct participants, and the command's signers are exactly their keys.
fn check_participants(
    product: &ProductRecord,
    signers: &BTreeSet<PartyKey>,
    req: &mut Requirements,
) {
    let keys = product.participant_keys();
    req.using(keys.len() == 2, || Violation::DuplicateParticipant);
    req.using(*signers == keys, || Violation::Signers {
        expected: keys.clone(),
        found: signers.clone(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::LocalIdentity;
    use crate::transaction::{StateAndRef, TransactionBuilder};

    struct Fixture {
        a: LocalIdentity,
        b: LocalIdentity,
        notary: LocalIdentity,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                a: LocalIdentity::generate("A"),
                b: LocalIdentity::generate("B"),
                notary: LocalIdentity::generate("Notary"),
            }
        }

        fn issued(&self) -> ProductRecord {
            ProductRecord::issue(
                self.a.party().clone(),
                self.b.party().clone(),
                ProductColor::Green,
            )
        }

        fn create(&self, output: ProductRecord) -> WireTransaction {
            let keys = output.participant_keys();
            TransactionBuilder::new(self.notary.party().owning_key)
                .add_output(output)
                .add_command(Command::Create, keys)
                .build()
        }

        fn committed_input(&self) -> StateAndRef {
            let create = self.create(self.issued());
            create.output_states().remove(0)
        }

        fn update(&self, input: StateAndRef, output: ProductRecord) -> WireTransaction {
            let keys = output.participant_keys();
            TransactionBuilder::new(self.notary.party().owning_key)
                .add_input(input)
                .add_output(output)
                .add_command(Command::UpdateStatus, keys)
                .build()
        }

        fn received(&self, input: &StateAndRef) -> ProductRecord {
            input.record.next_version(
                self.a.party().clone(),
                self.b.party().clone(),
                ProductStatus::Received,
            )
        }
    }

    fn violations(tx: &WireTransaction) -> Vec<Violation> {
        match verify(tx) {
            Ok(()) => Vec::new(),
            Err(e) => e.violations().to_vec(),
        }
    }

    // ── Create ──────────────────────────────────────────────────────────────

    #[test]
    fn create_well_formed_is_accepted() {
        let f = Fixture::new();
        assert_eq!(verify(&f.create(f.issued())), Ok(()));
    }

    #[test]
    fn create_with_wrong_name_names_that_rule() {
        let f = Fixture::new();
        let mut record = f.issued();
        record.product_name = "Widgets".to_string();
        assert_eq!(
            violations(&f.create(record)),
            vec![Violation::ProductName {
                found: "Widgets".to_string()
            }]
        );
    }

    #[test]
    fn create_with_received_status_names_that_rule() {
        let f = Fixture::new();
        let mut record = f.issued();
        record.status = ProductStatus::Received;
        assert_eq!(
            violations(&f.create(record)),
            vec![Violation::InitialStatus {
                found: ProductStatus::Received
            }]
        );
    }

    #[test]
    fn create_with_input_names_that_rule() {
        let f = Fixture::new();
        let input = f.committed_input();
        let output = f.issued();
        let keys = output.participant_keys();
        let tx = TransactionBuilder::new(f.notary.party().owning_key)
            .add_input(input)
            .add_output(output)
            .add_command(Command::Create, keys)
            .build();
        assert_eq!(
            violations(&tx),
            vec![Violation::InputsOnCreate { found: 1 }]
        );
    }

    #[test]
    fn create_with_two_outputs_names_that_rule() {
        let f = Fixture::new();
        let first = f.issued();
        let keys = first.participant_keys();
        let tx = TransactionBuilder::new(f.notary.party().owning_key)
            .add_output(first)
            .add_output(f.issued())
            .add_command(Command::Create, keys)
            .build();
        assert_eq!(
            violations(&tx),
            vec![Violation::OutputCount {
                expected: 1,
                found: 2
            }]
        );
    }

    #[test]
    fn create_signed_by_one_party_names_signer_rule() {
        let f = Fixture::new();
        let record = f.issued();
        let tx = TransactionBuilder::new(f.notary.party().owning_key)
            .add_output(record.clone())
            .add_command(Command::Create, [f.a.party().owning_key])
            .build();
        assert_eq!(
            violations(&tx),
            vec![Violation::Signers {
                expected: record.participant_keys(),
                found: BTreeSet::from([f.a.party().owning_key]),
            }]
        );
    }

    #[test]
    fn create_with_extra_signer_is_rejected() {
        let f = Fixture::new();
        let record = f.issued();
        let mut keys = record.participant_keys();
        keys.insert(f.notary.party().owning_key);
        let tx = TransactionBuilder::new(f.notary.party().owning_key)
            .add_output(record)
            .add_command(Command::Create, keys)
            .build();
        assert!(matches!(
            violations(&tx).as_slice(),
            [Violation::Signers { .. }]
        ));
    }

    #[test]
    fn create_reports_every_violation_at_once() {
        let f = Fixture::new();
        let mut record = f.issued();
        record.product_name = "Widgets".to_string();
        record.status = ProductStatus::Received;
        let tx = TransactionBuilder::new(f.notary.party().owning_key)
            .add_output(record)
            .add_command(Command::Create, [f.b.party().owning_key])
            .build();
        let found = violations(&tx);
        assert_eq!(found.len(), 3, "{found:?}");
        assert!(matches!(found[0], Violation::ProductName { .. }));
        assert!(matches!(found[1], Violation::InitialStatus { .. }));
        assert!(matches!(found[2], Violation::Signers { .. }));
    }

    #[test]
    fn create_without_output_skips_field_rules() {
        let f = Fixture::new();
        let tx = TransactionBuilder::new(f.notary.party().owning_key)
            .add_command(Command::Create, [f.a.party().owning_key])
            .build();
        assert_eq!(
            violations(&tx),
            vec![Violation::OutputCount {
                expected: 1,
                found: 0
            }]
        );
    }

    #[test]
    fn create_between_same_party_is_rejected() {
        let f = Fixture::new();
        let record = ProductRecord::issue(
            f.a.party().clone(),
            f.a.party().clone(),
            ProductColor::Red,
        );
        let found = violations(&f.create(record));
        assert_eq!(found, vec![Violation::DuplicateParticipant]);
    }

    // ── UpdateStatus ────────────────────────────────────────────────────────

    #[test]
    fn update_to_received_is_accepted() {
        let f = Fixture::new();
        let input = f.committed_input();
        let output = f.received(&input);
        assert_eq!(verify(&f.update(input, output)), Ok(()));
    }

    #[test]
    fn update_changing_color_reports_immutable_field() {
        let f = Fixture::new();
        let input = f.committed_input();
        let mut output = f.received(&input);
        output.product_color = ProductColor::Red;
        assert_eq!(
            violations(&f.update(input, output)),
            vec![Violation::ImmutableFieldChanged {
                field: "product_color".to_string(),
                from: "Green".to_string(),
                to: "Red".to_string(),
            }]
        );
    }

    #[test]
    fn update_changing_name_reports_immutable_field() {
        let f = Fixture::new();
        let input = f.committed_input();
        let mut output = f.received(&input);
        output.product_name = "Gizmos".to_string();
        let found = violations(&f.update(input, output));
        assert!(matches!(
            found.as_slice(),
            [Violation::ImmutableFieldChanged { field, .. }] if field == "product_name"
        ));
    }

    #[test]
    fn update_staying_pending_reports_both_status_rules() {
        let f = Fixture::new();
        let input = f.committed_input();
        let mut output = f.received(&input);
        output.status = ProductStatus::Pending;
        assert_eq!(
            violations(&f.update(input, output)),
            vec![
                Violation::TerminalStatus {
                    found: ProductStatus::Pending
                },
                Violation::StatusUnchanged {
                    status: ProductStatus::Pending
                },
            ]
        );
    }

    #[test]
    fn update_from_received_is_not_a_transition() {
        let f = Fixture::new();
        let mut input = f.committed_input();
        input.record.status = ProductStatus::Received;
        let output = f.received(&input);
        assert_eq!(
            violations(&f.update(input, output)),
            vec![Violation::StatusUnchanged {
                status: ProductStatus::Received
            }]
        );
    }

    #[test]
    fn update_without_input_requires_one() {
        let f = Fixture::new();
        let input = f.committed_input();
        let output = f.received(&input);
        let keys = output.participant_keys();
        let tx = TransactionBuilder::new(f.notary.party().owning_key)
            .add_output(output)
            .add_command(Command::UpdateStatus, keys)
            .build();
        assert_eq!(
            violations(&tx),
            vec![Violation::InputCount {
                expected: 1,
                found: 0
            }]
        );
    }

    #[test]
    fn update_consuming_two_inputs_is_rejected() {
        let f = Fixture::new();
        let input = f.committed_input();
        let output = f.received(&input);
        let keys = output.participant_keys();
        let tx = TransactionBuilder::new(f.notary.party().owning_key)
            .add_input(input)
            .add_input(f.committed_input())
            .add_output(output)
            .add_command(Command::UpdateStatus, keys)
            .build();
        assert_eq!(
            violations(&tx),
            vec![Violation::InputCount {
                expected: 1,
                found: 2
            }]
        );
    }

    #[test]
    fn update_switching_record_id_is_rejected() {
        let f = Fixture::new();
        let input = f.committed_input();
        let mut output = f.received(&input);
        output.record_id = crate::RecordId::new();
        assert_eq!(
            violations(&f.update(input, output)),
            vec![Violation::RecordIdChanged]
        );
    }

    #[test]
    fn update_signers_follow_output_participants() {
        let f = Fixture::new();
        let c = LocalIdentity::generate("C");
        let input = f.committed_input();
        let output = input.record.next_version(
            f.a.party().clone(),
            c.party().clone(),
            ProductStatus::Received,
        );
        // Signed by the input's participants, not the output's.
        let tx = TransactionBuilder::new(f.notary.party().owning_key)
            .add_input(input.clone())
            .add_output(output.clone())
            .add_command(Command::UpdateStatus, input.record.participant_keys())
            .build();
        assert!(matches!(
            violations(&tx).as_slice(),
            [Violation::Signers { .. }]
        ));

        // Participants may change across the update when both new ones sign.
        assert_eq!(verify(&f.update(input, output)), Ok(()));
    }

    #[test]
    fn transaction_without_command_is_rejected() {
        let f = Fixture::new();
        let mut tx = f.create(f.issued());
        tx.commands.clear();
        assert_eq!(verify(&tx), Err(ContractError::CommandCount { found: 0 }));
    }
}
