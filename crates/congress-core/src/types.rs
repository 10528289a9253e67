// Chain primitives shared by every Congress crate.
//
// Hashes are keccak256 over a fixed, length-prefixed field encoding so that
// every node derives identical header, transaction and block hashes.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

pub use primitive_types::{H160, H256, U256};

/// 20-byte account address.
pub type Address = H160;

/// keccak256 of the empty byte string; the code hash of an account without code.
pub const EMPTY_CODE_HASH: H256 = H256([
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
]);

/// Uncles hash of a block without uncles.
pub const EMPTY_UNCLES_HASH: H256 = H256([
    0x1d, 0xcc, 0x4d, 0xe8, 0xde, 0xc7, 0x5d, 0x7a, 0xab, 0x85, 0xb5, 0x67, 0xb6, 0xcc, 0xd4, 0x1a,
    0xd3, 0x12, 0x45, 0x1b, 0x94, 0x8a, 0x74, 0x13, 0xf0, 0xa1, 0x42, 0xfd, 0x40, 0xd4, 0x93, 0x47,
]);

pub fn keccak256(data: impl AsRef<[u8]>) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data.as_ref());
    H256::from_slice(&hasher.finalize())
}

/// Parses a `0x`-prefixed (or bare) 40-digit hex address.
pub fn parse_address(s: &str) -> Option<Address> {
    let bytes = hex::decode(s.trim_start_matches("0x")).ok()?;
    (bytes.len() == 20).then(|| Address::from_slice(&bytes))
}

/// Left-pads an address into a 32-byte word (ABI and storage-key layout).
pub fn address_to_word(addr: &Address) -> H256 {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr.as_bytes());
    H256(word)
}

pub fn u256_to_word(value: U256) -> H256 {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    H256(word)
}

pub fn word_to_u256(word: &H256) -> U256 {
    U256::from_big_endian(word.as_bytes())
}

/// Incremental field encoder used for hashing.
#[derive(Default)]
struct HashInput {
    buf: Vec<u8>,
}

impl HashInput {
    fn fixed(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    fn u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn u256(&mut self, value: U256) -> &mut Self {
        let mut word = [0u8; 32];
        value.to_big_endian(&mut word);
        self.buf.extend_from_slice(&word);
        self
    }

    fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(bytes);
        self
    }

    fn finish(&self) -> H256 {
        keccak256(&self.buf)
    }
}

/// Block header.
///
/// `extra` carries the checkpoint validator list (concatenated 20-byte
/// addresses) on epoch blocks and is empty otherwise. `seal` carries the
/// producer's signature over [`Header::seal_hash`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub parent_hash: H256,
    pub uncles_hash: H256,
    pub coinbase: Address,
    pub state_root: H256,
    pub transactions_root: H256,
    pub receipts_root: H256,
    pub difficulty: U256,
    pub number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub time: u64,
    pub extra: Vec<u8>,
    pub seal: Vec<u8>,
}

impl Default for Header {
    fn default() -> Self {
        Header {
            parent_hash: H256::zero(),
            uncles_hash: EMPTY_UNCLES_HASH,
            coinbase: Address::zero(),
            state_root: H256::zero(),
            transactions_root: H256::zero(),
            receipts_root: H256::zero(),
            difficulty: U256::zero(),
            number: 0,
            gas_limit: 0,
            gas_used: 0,
            time: 0,
            extra: Vec::new(),
            seal: Vec::new(),
        }
    }
}

impl Header {
    fn encode_unsealed(&self) -> HashInput {
        let mut input = HashInput::default();
        input
            .fixed(self.parent_hash.as_bytes())
            .fixed(self.uncles_hash.as_bytes())
            .fixed(self.coinbase.as_bytes())
            .fixed(self.state_root.as_bytes())
            .fixed(self.transactions_root.as_bytes())
            .fixed(self.receipts_root.as_bytes())
            .u256(self.difficulty)
            .u64(self.number)
            .u64(self.gas_limit)
            .u64(self.gas_used)
            .u64(self.time)
            .bytes(&self.extra);
        input
    }

    /// Hash of the fully sealed header.
    pub fn hash(&self) -> H256 {
        let mut input = self.encode_unsealed();
        input.bytes(&self.seal);
        input.finish()
    }

    /// Hash of the header with the seal excluded; this is what the producer signs.
    pub fn seal_hash(&self) -> H256 {
        self.encode_unsealed().finish()
    }

    /// Validators listed in `extra`, or `None` if it is not a whole number of addresses.
    pub fn checkpoint_validators(&self) -> Option<Vec<Address>> {
        if self.extra.len() % 20 != 0 {
            return None;
        }
        Some(self.extra.chunks(20).map(Address::from_slice).collect())
    }
}

/// Encodes a validator list the way it is stored in an epoch header's `extra`.
pub fn encode_validators(validators: &[Address]) -> Vec<u8> {
    validators
        .iter()
        .flat_map(|v| v.as_bytes().iter().copied())
        .collect()
}

/// Signed transaction. Signature recovery is performed by the caller; the
/// engine receives the recovered sender alongside the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Transaction {
    pub fn hash(&self) -> H256 {
        let mut input = HashInput::default();
        input
            .u64(self.nonce)
            .u256(self.gas_price)
            .u64(self.gas_limit)
            .bytes(self.to.as_ref().map(|a| a.as_bytes()).unwrap_or(&[]))
            .u256(self.value)
            .bytes(&self.data)
            .bytes(&self.signature);
        input.finish()
    }

    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }
}

/// Event emitted during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: H256,
    pub success: bool,
    pub gas_used: u64,
    pub logs: Vec<Log>,
}

impl Receipt {
    fn hash(&self) -> H256 {
        let mut input = HashInput::default();
        input
            .fixed(self.tx_hash.as_bytes())
            .fixed(&[self.success as u8])
            .u64(self.gas_used);
        for log in &self.logs {
            input.fixed(log.address.as_bytes()).bytes(&log.data);
            for topic in &log.topics {
                input.fixed(topic.as_bytes());
            }
        }
        input.finish()
    }
}

/// Ordered commitment over a list of hashes.
fn list_root(hashes: impl Iterator<Item = H256>) -> H256 {
    let mut input = HashInput::default();
    for h in hashes {
        input.fixed(h.as_bytes());
    }
    input.finish()
}

pub fn transactions_root(txs: &[Transaction]) -> H256 {
    list_root(txs.iter().map(Transaction::hash))
}

pub fn receipts_root(receipts: &[Receipt]) -> H256 {
    list_root(receipts.iter().map(Receipt::hash))
}

pub fn uncles_hash(uncles: &[Header]) -> H256 {
    if uncles.is_empty() {
        return EMPTY_UNCLES_HASH;
    }
    list_root(uncles.iter().map(Header::hash))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
    pub uncles: Vec<Header>,
}

impl Block {
    /// Assembles a block, deriving the header's list commitments from its contents.
    pub fn new(
        mut header: Header,
        transactions: Vec<Transaction>,
        uncles: Vec<Header>,
        receipts: &[Receipt],
    ) -> Self {
        header.transactions_root = transactions_root(&transactions);
        header.receipts_root = receipts_root(receipts);
        header.uncles_hash = uncles_hash(&uncles);
        Block {
            header,
            transactions,
            uncles,
        }
    }

    pub fn hash(&self) -> H256 {
        self.header.hash()
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Replaces the header (e.g. with its sealed version), keeping the body.
    pub fn with_seal(&self, header: Header) -> Self {
        Block {
            header,
            transactions: self.transactions.clone(),
            uncles: self.uncles.clone(),
        }
    }
}
