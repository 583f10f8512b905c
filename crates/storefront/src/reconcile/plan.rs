//! Sync-back diff.
//!
//! Compares the local cart (`current`) with the resolved remote cart
//! (`previous`) by line identity and produces the minimal set of remote
//! calls that make the remote cart equal to the local one:
//!
//! | `current` | `previous` | call |
//! |---|---|---|
//! | present | absent | create with `current` quantity |
//! | absent | present | delete `previous` server line |
//! | present, qty differs | present | update `previous` server line to `current` qty |
//! | present, qty equal | present | none |
//!
//! A `current` line with quantity zero counts as absent. When the remote
//! cart holds several lines with one identity, the first is treated as the
//! line for that identity and the rest are deleted.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, warn};

use cartwheel_core::{CartLine, LineIdentity, ResolvedLine, ServerLineId};

use super::report::Operation;

/// Errors that prevent a plan from being computed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    /// Two local lines share an identity.
    #[error("duplicate line {identity} in local cart")]
    DuplicateIdentity { identity: LineIdentity },
}

/// One remote call of a sync-back pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedOp {
    Create {
        identity: LineIdentity,
        quantity: u32,
    },
    Update {
        identity: LineIdentity,
        server_line_id: ServerLineId,
        from: u32,
        to: u32,
    },
    Delete {
        identity: LineIdentity,
        server_line_id: ServerLineId,
    },
}

impl PlannedOp {
    /// The line this call applies to.
    #[must_use]
    pub const fn identity(&self) -> &LineIdentity {
        match self {
            Self::Create { identity, .. }
            | Self::Update { identity, .. }
            | Self::Delete { identity, .. } => identity,
        }
    }

    /// The kind of call.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Create { .. } => Operation::Create,
            Self::Update { .. } => Operation::Update,
            Self::Delete { .. } => Operation::Delete,
        }
    }
}

/// The calls needed to make the remote cart match the local cart.
///
/// Creates and updates follow local cart order; deletes follow remote order.
/// The calls have no ordering dependency on each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    ops: Vec<PlannedOp>,
}

impl SyncPlan {
    /// Diff `current` against `previous`.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::DuplicateIdentity` if `current` contains two lines
    /// with the same identity; no partial plan is produced.
    pub fn compute(current: &[CartLine], previous: &[ResolvedLine]) -> Result<Self, PlanError> {
        let mut remote: HashMap<&LineIdentity, &ResolvedLine> =
            HashMap::with_capacity(previous.len());
        let mut extras: HashSet<ServerLineId> = HashSet::new();
        for line in previous {
            if remote.contains_key(&line.identity) {
                warn!(
                    identity = %line.identity,
                    server_line_id = %line.server_line_id,
                    "Remote cart holds a duplicate line"
                );
                extras.insert(line.server_line_id);
            } else {
                remote.insert(&line.identity, line);
            }
        }

        let mut local: HashMap<&LineIdentity, &CartLine> = HashMap::with_capacity(current.len());
        let mut ops = Vec::new();
        let mut updates = Vec::new();

        for line in current.iter().filter(|line| line.quantity() > 0) {
            let identity = line.identity();
            if local.insert(identity, line).is_some() {
                return Err(PlanError::DuplicateIdentity {
                    identity: identity.clone(),
                });
            }

            match remote.get(identity) {
                None => ops.push(PlannedOp::Create {
                    identity: identity.clone(),
                    quantity: line.quantity(),
                }),
                Some(prev) if prev.quantity != line.quantity() => {
                    if line
                        .server_line_id()
                        .is_some_and(|id| id != prev.server_line_id)
                    {
                        debug!(%identity, "Local server linkage is stale");
                    }
                    updates.push(PlannedOp::Update {
                        identity: identity.clone(),
                        server_line_id: prev.server_line_id,
                        from: prev.quantity,
                        to: line.quantity(),
                    });
                }
                Some(_) => {}
            }
        }

        ops.extend(updates);
        ops.extend(
            previous
                .iter()
                .filter(|prev| {
                    extras.contains(&prev.server_line_id) || !local.contains_key(&prev.identity)
                })
                .map(|prev| PlannedOp::Delete {
                    identity: prev.identity.clone(),
                    server_line_id: prev.server_line_id,
                }),
        );

        Ok(Self { ops })
    }

    /// All planned calls.
    #[must_use]
    pub fn ops(&self) -> &[PlannedOp] {
        &self.ops
    }

    /// Consume the plan.
    #[must_use]
    pub fn into_ops(self) -> Vec<PlannedOp> {
        self.ops
    }

    /// Whether the carts already match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of planned calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Number of planned calls of one kind.
    #[must_use]
    pub fn count(&self, operation: Operation) -> usize {
        self.ops.iter().filter(|op| op.operation() == operation).count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwheel_core::{ProductId, VariantKey};

    use super::*;

    fn identity(product: &str) -> LineIdentity {
        LineIdentity::new(ProductId::parse(product).unwrap(), VariantKey::new(Some("1"), "M"))
    }

    fn local(product: &str, quantity: u32) -> CartLine {
        CartLine::new(identity(product), quantity)
    }

    fn remote(product: &str, id: i32, quantity: u32) -> ResolvedLine {
        ResolvedLine {
            server_line_id: ServerLineId::new(id),
            identity: identity(product),
            quantity,
        }
    }

    #[test]
    fn test_create_and_delete_without_touching_unchanged() {
        let previous = [remote("A", 10, 2), remote("B", 11, 1)];
        let current = [local("A", 2), local("C", 5)];

        let plan = SyncPlan::compute(&current, &previous).unwrap();

        assert_eq!(
            plan.ops(),
            &[
                PlannedOp::Create {
                    identity: identity("C"),
                    quantity: 5,
                },
                PlannedOp::Delete {
                    identity: identity("B"),
                    server_line_id: ServerLineId::new(11),
                },
            ]
        );
        assert_eq!(plan.count(Operation::Update), 0);
    }

    #[test]
    fn test_update_detection() {
        let previous = [remote("A", 10, 2), remote("B", 11, 1)];
        let current = [local("A", 4), local("B", 1)];

        let plan = SyncPlan::compute(&current, &previous).unwrap();

        assert_eq!(
            plan.ops(),
            &[PlannedOp::Update {
                identity: identity("A"),
                server_line_id: ServerLineId::new(10),
                from: 2,
                to: 4,
            }]
        );
    }

    #[test]
    fn test_zero_quantity_counts_as_absent() {
        let previous = [remote("A", 10, 2)];
        let current = [local("A", 0), local("B", 0)];

        let plan = SyncPlan::compute(&current, &previous).unwrap();

        assert_eq!(
            plan.ops(),
            &[PlannedOp::Delete {
                identity: identity("A"),
                server_line_id: ServerLineId::new(10),
            }]
        );
    }

    #[test]
    fn test_identical_carts_need_no_calls() {
        let previous = [remote("A", 10, 2), remote("B", 11, 1)];
        let current = [local("B", 1), local("A", 2)];

        assert!(SyncPlan::compute(&current, &previous).unwrap().is_empty());
    }

    #[test]
    fn test_empty_local_cart_deletes_everything() {
        let previous = [remote("A", 10, 2), remote("B", 11, 1)];
        let plan = SyncPlan::compute(&[], &previous).unwrap();
        assert_eq!(plan.count(Operation::Delete), 2);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_comparison_is_by_value_not_server_id() {
        // The local line is linked to a different server id; identity decides.
        let previous = [remote("A", 10, 2)];
        let current = [local("A", 3).with_server_line_id(Some(ServerLineId::new(99)))];

        let plan = SyncPlan::compute(&current, &previous).unwrap();
        assert_eq!(
            plan.ops(),
            &[PlannedOp::Update {
                identity: identity("A"),
                server_line_id: ServerLineId::new(10),
                from: 2,
                to: 3,
            }]
        );
    }

    #[test]
    fn test_duplicate_local_identities_are_rejected() {
        let err = SyncPlan::compute(&[local("A", 1), local("A", 2)], &[]).unwrap_err();
        assert_eq!(
            err,
            PlanError::DuplicateIdentity {
                identity: identity("A"),
            }
        );
    }

    #[test]
    fn test_duplicate_remote_lines_collapse_to_the_first() {
        let previous = [remote("A", 10, 2), remote("B", 11, 1), remote("A", 12, 2)];

        // Kept line updated to the local quantity, extra deleted
        let plan = SyncPlan::compute(&[local("A", 9), local("B", 1)], &previous).unwrap();
        assert_eq!(
            plan.ops(),
            &[
                PlannedOp::Update {
                    identity: identity("A"),
                    server_line_id: ServerLineId::new(10),
                    from: 2,
                    to: 9,
                },
                PlannedOp::Delete {
                    identity: identity("A"),
                    server_line_id: ServerLineId::new(12),
                },
            ]
        );

        // Equal quantity: only the extra goes
        let plan = SyncPlan::compute(&[local("A", 2), local("B", 1)], &previous).unwrap();
        assert_eq!(
            plan.ops(),
            &[PlannedOp::Delete {
                identity: identity("A"),
                server_line_id: ServerLineId::new(12),
            }]
        );

        // Absent locally: every copy goes
        let plan = SyncPlan::compute(&[local("B", 1)], &previous).unwrap();
        assert_eq!(plan.count(Operation::Delete), 2);
        assert_eq!(plan.len(), 2);
    }
}
