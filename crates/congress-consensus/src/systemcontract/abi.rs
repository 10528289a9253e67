// Method tables of the system contracts the engine calls into.

use congress_core::SystemContract;
use congress_vm::{AbiError, ContractAbi};
use once_cell::sync::Lazy;

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_INITIALIZED: &str = "initialized";
pub const METHOD_PUNISH: &str = "punish";
pub const METHOD_DISTRIBUTE_BLOCK_REWARD: &str = "distributeBlockReward";
pub const METHOD_GET_ACTIVE_VALIDATORS: &str = "getActiveValidators";

const VALIDATORS_INTERACTIVE_ABI: &str = r#"[
    {"type":"function","name":"initialize","stateMutability":"nonpayable",
     "inputs":[{"name":"vals","type":"address[]"}],"outputs":[]},
    {"type":"function","name":"distributeBlockReward","stateMutability":"payable",
     "inputs":[],"outputs":[]},
    {"type":"function","name":"getActiveValidators","stateMutability":"view",
     "inputs":[],"outputs":[{"name":"","type":"address[]"}]}
]"#;

const PUNISH_INTERACTIVE_ABI: &str = r#"[
    {"type":"function","name":"initialize","stateMutability":"nonpayable",
     "inputs":[],"outputs":[]},
    {"type":"function","name":"initialized","stateMutability":"view",
     "inputs":[],"outputs":[{"name":"","type":"bool"}]},
    {"type":"function","name":"punish","stateMutability":"nonpayable",
     "inputs":[{"name":"val","type":"address"}],"outputs":[]}
]"#;

const PROPOSAL_INTERACTIVE_ABI: &str = r#"[
    {"type":"function","name":"initialize","stateMutability":"nonpayable",
     "inputs":[{"name":"vals","type":"address[]"}],"outputs":[]}
]"#;

type LazyAbi = Lazy<Result<ContractAbi, AbiError>>;

static VALIDATORS_ABI: LazyAbi = Lazy::new(|| {
    ContractAbi::from_json(SystemContract::Validators.name(), VALIDATORS_INTERACTIVE_ABI)
});

static PUNISH_ABI: LazyAbi =
    Lazy::new(|| ContractAbi::from_json(SystemContract::Punish.name(), PUNISH_INTERACTIVE_ABI));

static PROPOSAL_ABI: LazyAbi = Lazy::new(|| {
    ContractAbi::from_json(SystemContract::Proposal.name(), PROPOSAL_INTERACTIVE_ABI)
});

/// The interactive ABI of `contract`, parsed once and shared read-only.
pub fn interactive_abi(contract: SystemContract) -> Result<&'static ContractAbi, AbiError> {
    let abi: &'static LazyAbi = match contract {
        SystemContract::Validators => &VALIDATORS_ABI,
        SystemContract::Punish => &PUNISH_ABI,
        SystemContract::Proposal => &PROPOSAL_ABI,
    };
    match Lazy::force(abi) {
        Ok(abi) => Ok(abi),
        Err(e) => Err(e.clone()),
    }
}
