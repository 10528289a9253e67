// Compiled system contract bytecode, keyed by (contract, version).
//
// Blobs are hex files under `assets/`, embedded at build time and checked
// against a pinned keccak256 code hash the first time they are decoded. The
// decoded code is cached for the life of the process.

use congress_core::{keccak256, ConfigError, SystemContract, H256};
use log::debug;
use once_cell::sync::OnceCell;

pub struct BytecodeAsset {
    pub contract: SystemContract,
    pub version: u32,
    hex: &'static str,
    code_hash: &'static str,
    code: OnceCell<Vec<u8>>,
}

impl BytecodeAsset {
    const fn new(
        contract: SystemContract,
        version: u32,
        hex: &'static str,
        code_hash: &'static str,
    ) -> Self {
        BytecodeAsset {
            contract,
            version,
            hex,
            code_hash,
            code: OnceCell::new(),
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::MalformedAsset {
            contract: self.contract,
            version: self.version,
            reason: reason.into(),
        }
    }

    pub fn expected_code_hash(&self) -> Result<H256, ConfigError> {
        let bytes = hex::decode(self.code_hash).map_err(|e| self.malformed(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(self.malformed("pinned code hash is not 32 bytes"));
        }
        Ok(H256::from_slice(&bytes))
    }

    /// Decoded bytecode, verified against the pinned hash.
    pub fn bytecode(&self) -> Result<&[u8], ConfigError> {
        self.code
            .get_or_try_init(|| {
                let trimmed = self.hex.trim();
                let code = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
                    .map_err(|e| self.malformed(e.to_string()))?;
                if code.is_empty() {
                    return Err(self.malformed("empty bytecode"));
                }
                let expected = self.expected_code_hash()?;
                let actual = keccak256(&code);
                if actual != expected {
                    return Err(ConfigError::AssetHashMismatch {
                        contract: self.contract,
                        version: self.version,
                        expected,
                        actual,
                    });
                }
                debug!(
                    "Loaded bytecode asset {} v{} ({} bytes)",
                    self.contract,
                    self.version,
                    code.len()
                );
                Ok(code)
            })
            .map(Vec::as_slice)
    }
}

static ASSETS: [BytecodeAsset; 1] = [BytecodeAsset::new(
    SystemContract::Punish,
    2,
    include_str!("../../assets/punish_v2.hex"),
    "a4f43a9ec709b37469e5088f1d6656edd86ec9e89b662380ff12957267164dc0",
)];

pub fn lookup(contract: SystemContract, version: u32) -> Result<&'static BytecodeAsset, ConfigError> {
    ASSETS
        .iter()
        .find(|a| a.contract == contract && a.version == version)
        .ok_or(ConfigError::MissingAsset { contract, version })
}

pub fn all() -> &'static [BytecodeAsset] {
    &ASSETS
}
