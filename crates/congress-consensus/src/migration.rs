// PHASE 4: FORK BALANCE MIGRATION
//
// SAFETY INVARIANTS:
// 1. Value is conserved: every source balance is moved in full to its
//    destination, nothing is minted or burned
// 2. Every source ends at zero, unless crediting its destination would
//    overflow; such an entry is left untouched
// 3. The migration runs at the exact fork height only, and at most once per
//    chain: completion is recorded in the marker account's storage

use congress_core::{ChainConfig, MigrationEntry, StateView, SystemRegistry, H256, U256};
use log::{info, warn};

/// Storage slot of the marker account that records a completed migration.
pub const MIGRATION_DONE_SLOT: H256 = H256([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1,
]);

/// Moves each source balance to its destination, in order. An entry whose
/// destination cannot absorb the amount is skipped and left in place.
///
/// Unguarded: callers decide whether the migration is due.
pub fn apply_migration(state: &mut dyn StateView, entries: &[MigrationEntry]) {
    for entry in entries {
        let amount = state.balance(&entry.source);
        if let Err(e) = state.add_balance(&entry.destination, amount) {
            warn!("Skipping migration of {:?}: {}", entry.source, e);
            continue;
        }
        state.set_balance(&entry.source, U256::zero());
        info!(
            "Migrated {} from {:?} to {:?}",
            amount, entry.source, entry.destination
        );
    }
}

pub fn is_migration_applied(state: &dyn StateView, registry: &SystemRegistry) -> bool {
    !state
        .get_state(&registry.migration_marker, &MIGRATION_DONE_SLOT)
        .is_zero()
}

/// Applies the migration if `number` is the fork height and it has not run
/// on this chain yet. Returns whether it ran.
pub fn apply_migration_if_due(config: &ChainConfig, number: u64, state: &mut dyn StateView) -> bool {
    if !config.is_misard(number) {
        return false;
    }
    if is_migration_applied(state, &config.registry) {
        info!("Balance migration already recorded, skipping at block {}", number);
        return false;
    }
    apply_migration(state, &config.registry.migration_entries);
    state.set_state(
        &config.registry.migration_marker,
        MIGRATION_DONE_SLOT,
        H256::from_low_u64_be(number.max(1)),
    );
    info!(
        "Applied balance migration ({} entries) at block {}",
        config.registry.migration_entries.len(),
        number
    );
    true
}
