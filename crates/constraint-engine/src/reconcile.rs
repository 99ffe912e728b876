use constraint_core::{ConstraintError, ConstraintPosition, ConstraintSource};
use tracing::{debug, warn};

use crate::aggregator::{aggregate, ReconcileInputs};

/// Fetch and aggregate a user's constraint positions.
pub async fn reconcile<S>(source: &S, user_id: &str) -> Result<Vec<ConstraintPosition>, ConstraintError>
where
    S: ConstraintSource + ?Sized,
{
    let inputs = fetch_inputs(source, user_id).await?;
    let entries = aggregate(&inputs);

    debug!(
        user_id,
        constraints = inputs.constraints.len(),
        groups = inputs.constraint_groups.len(),
        entries = entries.len(),
        "Reconciled constraint positions"
    );

    Ok(entries)
}

/// Issue the four reads concurrently. A failed positions read degrades to an
/// empty position set; any other failure fails the whole fetch with every
/// failing read listed.
pub async fn fetch_inputs<S>(source: &S, user_id: &str) -> Result<ReconcileInputs, ConstraintError>
where
    S: ConstraintSource + ?Sized,
{
    let (constraints, constraint_groups, stock_groups, positions) = tokio::join!(
        source.list_constraints(user_id),
        source.list_constraint_groups(user_id),
        source.list_stock_groups(user_id),
        source.get_positions(user_id),
    );

    let positions = positions.unwrap_or_else(|e| {
        warn!(user_id, error = %e, "Position fetch failed, reconciling without positions");
        Vec::new()
    });

    let mut failures = Vec::new();
    let constraints = collect("constraints", constraints, &mut failures);
    let constraint_groups = collect("constraint groups", constraint_groups, &mut failures);
    let stock_groups = collect("stock groups", stock_groups, &mut failures);

    if !failures.is_empty() {
        return Err(ConstraintError::Upstream(failures));
    }

    Ok(ReconcileInputs {
        constraints,
        constraint_groups,
        stock_groups,
        positions,
    })
}

fn collect<T>(
    label: &str,
    result: Result<Vec<T>, ConstraintError>,
    failures: &mut Vec<String>,
) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(e) => {
            failures.push(format!("{label}: {e}"));
            Vec::new()
        }
    }
}
