// System address registry.
//
// One immutable value per chain, owned by `ChainConfig` and handed to every
// component by reference. Nothing here is global or mutable after load.

use crate::error::ConfigError;
use crate::state::StateReader;
use crate::types::{address_to_word, keccak256, parse_address, u256_to_word, Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Protocol contracts deployed at fixed addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemContract {
    Validators,
    Punish,
    Proposal,
}

impl SystemContract {
    pub const ALL: [SystemContract; 3] = [
        SystemContract::Validators,
        SystemContract::Punish,
        SystemContract::Proposal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SystemContract::Validators => "validators",
            SystemContract::Punish => "punish",
            SystemContract::Proposal => "proposal",
        }
    }

    /// Position in which upgrades activating at the same height are applied.
    /// A contract is upgraded before any contract that calls into it: the
    /// validators contract calls the punishment contract, so punish goes first.
    pub fn upgrade_rank(&self) -> u8 {
        match self {
            SystemContract::Punish => 0,
            SystemContract::Proposal => 1,
            SystemContract::Validators => 2,
        }
    }
}

impl fmt::Display for SystemContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One balance move applied by the legacy-account migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationEntry {
    pub source: Address,
    pub destination: Address,
}

/// A state-resident policy: an on/off switch slot plus a `mapping(address => bool)`
/// at `mapping_slot`, both stored in `contract` with Solidity's storage layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePolicy {
    pub contract: Address,
    pub switch_slot: H256,
    pub mapping_slot: u64,
}

impl StoragePolicy {
    pub fn is_enabled(&self, state: &dyn StateReader) -> bool {
        !state.get_state(&self.contract, &self.switch_slot).is_zero()
    }

    /// Storage key of `mapping[addr]`: keccak256(pad32(addr) ++ pad32(slot)).
    pub fn mapping_key(&self, addr: &Address) -> H256 {
        let mut preimage = [0u8; 64];
        preimage[..32].copy_from_slice(address_to_word(addr).as_bytes());
        preimage[32..].copy_from_slice(u256_to_word(U256::from(self.mapping_slot)).as_bytes());
        keccak256(preimage)
    }

    pub fn is_listed(&self, state: &dyn StateReader, addr: &Address) -> bool {
        !state.get_state(&self.contract, &self.mapping_key(addr)).is_zero()
    }
}

/// Well-known addresses and per-chain system tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemRegistry {
    pub validators_contract: Address,
    pub punish_contract: Address,
    pub proposal_contract: Address,
    /// Account that accumulates transaction fees until the block is finalized.
    pub fee_recorder: Address,
    /// Account whose storage records completed one-shot migrations.
    pub migration_marker: Address,
    /// Legacy balance moves, applied in this order at the migration fork.
    #[serde(default)]
    pub migration_entries: Vec<MigrationEntry>,
    /// Contract-creation allow list, enforced once the dev-verify fork is active.
    pub developer_allowlist: StoragePolicy,
    /// Senders barred from transacting, enforced once the dev-verify fork is active.
    pub deny_list: StoragePolicy,
}

fn addr(hex: &str) -> Address {
    parse_address(hex).unwrap_or_default()
}

fn slot(n: u64) -> H256 {
    H256::from_low_u64_be(n)
}

impl SystemRegistry {
    pub fn address_of(&self, contract: SystemContract) -> Address {
        match contract {
            SystemContract::Validators => self.validators_contract,
            SystemContract::Punish => self.punish_contract,
            SystemContract::Proposal => self.proposal_contract,
        }
    }

    pub fn contract_at(&self, address: &Address) -> Option<SystemContract> {
        SystemContract::ALL
            .into_iter()
            .find(|c| self.address_of(*c) == *address)
    }

    pub fn is_system_contract(&self, address: &Address) -> bool {
        self.contract_at(address).is_some()
    }

    /// Checks that the migration table is a set of disjoint one-hop moves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut sources = BTreeSet::new();
        for entry in &self.migration_entries {
            if !sources.insert(entry.source) {
                return Err(ConfigError::DuplicateMigrationSource(entry.source));
            }
        }
        for entry in &self.migration_entries {
            if sources.contains(&entry.destination) {
                return Err(ConfigError::ChainedMigration(entry.destination));
            }
        }
        Ok(())
    }

    /// Production registry.
    pub fn mainnet() -> Self {
        let proposal = addr("0x000000000000000000000000000000000000f300");
        SystemRegistry {
            validators_contract: addr("0x000000000000000000000000000000000000f100"),
            punish_contract: addr("0x000000000000000000000000000000000000f200"),
            proposal_contract: proposal,
            fee_recorder: addr("0xffffffffffffffffffffffffffffffffffffffff"),
            migration_marker: addr("0x000000000000000000000000000000000000fe00"),
            migration_entries: vec![
                MigrationEntry {
                    source: addr("0x53FF57B949324F976B5a3D933Fa53D13B009c2Db"),
                    destination: addr("0x57d6970aec438C3189F6B8979DbaFb1575461333"),
                },
                MigrationEntry {
                    source: addr("0xF2d1531d171655b9342017b62a00f070B8421c67"),
                    destination: addr("0x1b50bce4f1795df512a1007c30128a944c550f29"),
                },
                MigrationEntry {
                    source: addr("0x712D0d5BE6c1185F529b4792F9e71055adE9F906"),
                    destination: addr("0x5750d430dabebd1a04db1a3698da7abe7b64e745"),
                },
                MigrationEntry {
                    source: addr("0x8A95EbE76944De758c672f405f870378085B9b82"),
                    destination: addr("0x50c4cd040cb15322fb9195b98e89be1a888420e4"),
                },
                MigrationEntry {
                    source: addr("0x96782C3375307fd7a7A17DA6Bf993D80814eDc19"),
                    destination: addr("0xa47748ed1132563e67abec7c51ecb1e6f4f7b41a"),
                },
                MigrationEntry {
                    source: addr("0x99C4F986a8A01Ee7C240B7FDFec0E0A85637F01B"),
                    destination: addr("0xa736293d70bf0a1718e2bdbe9ab0252c349f8257"),
                },
            ],
            developer_allowlist: StoragePolicy {
                contract: proposal,
                switch_slot: slot(10),
                mapping_slot: 11,
            },
            deny_list: StoragePolicy {
                contract: proposal,
                switch_slot: slot(12),
                mapping_slot: 13,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_registry_is_valid() {
        let registry = SystemRegistry::mainnet();
        registry.validate().unwrap();
        assert_eq!(registry.migration_entries.len(), 6);
        assert_eq!(
            registry.punish_contract,
            Address::from_low_u64_be(0xf200)
        );
        assert_eq!(
            registry.contract_at(&Address::from_low_u64_be(0xf100)),
            Some(SystemContract::Validators)
        );
        assert!(!registry.is_system_contract(&registry.fee_recorder));
        for entry in &registry.migration_entries {
            assert!(!entry.source.is_zero());
            assert!(!entry.destination.is_zero());
        }
    }

    #[test]
    fn test_mainnet_migration_pairs() {
        let pairs: Vec<(Address, Address)> = SystemRegistry::mainnet()
            .migration_entries
            .iter()
            .map(|e| (e.source, e.destination))
            .collect();
        let expected = [
            (
                "0x53FF57B949324F976B5a3D933Fa53D13B009c2Db",
                "0x57d6970aec438C3189F6B8979DbaFb1575461333",
            ),
            (
                "0xF2d1531d171655b9342017b62a00f070B8421c67",
                "0x1b50bce4f1795df512a1007c30128a944c550f29",
            ),
            (
                "0x712D0d5BE6c1185F529b4792F9e71055adE9F906",
                "0x5750d430dabebd1a04db1a3698da7abe7b64e745",
            ),
            (
                "0x8A95EbE76944De758c672f405f870378085B9b82",
                "0x50c4cd040cb15322fb9195b98e89be1a888420e4",
            ),
            (
                "0x96782C3375307fd7a7A17DA6Bf993D80814eDc19",
                "0xa47748ed1132563e67abec7c51ecb1e6f4f7b41a",
            ),
            (
                "0x99C4F986a8A01Ee7C240B7FDFec0E0A85637F01B",
                "0xa736293d70bf0a1718e2bdbe9ab0252c349f8257",
            ),
        ]
        .map(|(from, to)| (addr(from), addr(to)));
        assert_eq!(pairs, expected.to_vec());

        // The old founder account is never drained, and the old company
        // account pays the new founder rather than the new company.
        let old_founder = addr("0xF4eab9b6fc2AF55c9a4847A49ED7f8c5da6a8FCC");
        let new_company = addr("0x0cfaa1e0a1c656414e3eaaf013299bd403d4dc28");
        assert!(pairs.iter().all(|(from, to)| *from != old_founder && *to != new_company));
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let mut registry = SystemRegistry::mainnet();
        let first = registry.migration_entries[0];
        registry.migration_entries.push(MigrationEntry {
            source: first.source,
            destination: Address::from_low_u64_be(77),
        });
        assert!(matches!(
            registry.validate(),
            Err(ConfigError::DuplicateMigrationSource(a)) if a == first.source
        ));
    }

    #[test]
    fn test_chained_migration_rejected() {
        let mut registry = SystemRegistry::mainnet();
        let first = registry.migration_entries[0];
        registry.migration_entries.push(MigrationEntry {
            source: first.destination,
            destination: Address::from_low_u64_be(78),
        });
        assert!(matches!(
            registry.validate(),
            Err(ConfigError::ChainedMigration(_))
        ));
    }

    #[test]
    fn test_upgrade_rank_puts_punish_first() {
        let mut contracts = SystemContract::ALL.to_vec();
        contracts.sort_by_key(SystemContract::upgrade_rank);
        assert_eq!(contracts[0], SystemContract::Punish);
        assert_eq!(contracts[2], SystemContract::Validators);
    }

    #[test]
    fn test_mapping_key_matches_solidity_layout() {
        let policy = SystemRegistry::mainnet().developer_allowlist;
        let who = Address::from_low_u64_be(0xabc);
        let mut preimage = Vec::new();
        preimage.extend_from_slice(&[0u8; 12]);
        preimage.extend_from_slice(who.as_bytes());
        let mut slot_word = [0u8; 32];
        slot_word[31] = 11;
        preimage.extend_from_slice(&slot_word);
        assert_eq!(policy.mapping_key(&who), keccak256(preimage));
    }
}
