// Contract method tables and revert payloads, encoded with ethabi.
//
// Interfaces are loaded from their JSON ABI descriptions. Packing checks
// arity and argument kinds up front so callers get a precise error instead
// of a generic encoding failure.

use crate::errors::AbiError;
use congress_core::keccak256;
use ethabi::{Contract, Function};

pub use ethabi::{ParamType, Token};

/// Selector of `Error(string)`, the standard revert payload.
pub const REVERT_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// First four bytes of keccak256 of a canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash.as_bytes()[..4]);
    out
}

/// Method table of one contract interface.
#[derive(Debug, Clone)]
pub struct ContractAbi {
    name: String,
    contract: Contract,
}

impl ContractAbi {
    /// Parses a JSON ABI description.
    pub fn from_json(name: &str, json: &str) -> Result<Self, AbiError> {
        let contract = Contract::load(json.as_bytes()).map_err(|e| AbiError::InvalidAbi {
            contract: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(ContractAbi {
            name: name.to_string(),
            contract,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self, method: &str) -> Result<&Function, AbiError> {
        self.contract
            .function(method)
            .map_err(|_| AbiError::UnknownMethod {
                contract: self.name.clone(),
                method: method.to_string(),
            })
    }

    /// Selector followed by the encoded arguments.
    pub fn pack(&self, method: &str, args: &[Token]) -> Result<Vec<u8>, AbiError> {
        let function = self.function(method)?;
        if args.len() != function.inputs.len() {
            return Err(AbiError::ArgumentCount {
                method: method.to_string(),
                expected: function.inputs.len(),
                got: args.len(),
            });
        }
        if let Some(index) = args
            .iter()
            .zip(&function.inputs)
            .position(|(arg, param)| !arg.type_check(&param.kind))
        {
            return Err(AbiError::ArgumentType {
                method: method.to_string(),
                index,
            });
        }
        function
            .encode_input(args)
            .map_err(|e| AbiError::InvalidData(e.to_string()))
    }

    /// Decodes the return data of `method`.
    pub fn unpack(&self, method: &str, data: &[u8]) -> Result<Vec<Token>, AbiError> {
        self.function(method)?
            .decode_output(data)
            .map_err(|e| AbiError::InvalidData(e.to_string()))
    }
}

/// Extracts the message from an `Error(string)` revert payload.
pub fn decode_revert_reason(output: &[u8]) -> Option<String> {
    let body = output.strip_prefix(&REVERT_SELECTOR[..])?;
    ethabi::decode(&[ParamType::String], body)
        .ok()?
        .into_iter()
        .next()?
        .into_string()
}

/// Builds an `Error(string)` revert payload.
pub fn encode_revert_reason(reason: &str) -> Vec<u8> {
    let mut out = REVERT_SELECTOR.to_vec();
    out.extend(ethabi::encode(&[Token::String(reason.to_string())]));
    out
}
