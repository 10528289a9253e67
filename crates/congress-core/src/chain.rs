// Chain access used during header verification and system calls.

use crate::config::ChainConfig;
use crate::types::{Block, Header, H256};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// The small collection of methods needed to access the local chain during
/// header verification.
pub trait ChainHeaderReader: Send + Sync {
    fn config(&self) -> &ChainConfig;
    fn current_header(&self) -> Option<Header>;
    fn header(&self, hash: &H256, number: u64) -> Option<Header>;
    fn header_by_number(&self, number: u64) -> Option<Header>;
    fn header_by_hash(&self, hash: &H256) -> Option<Header>;
}

/// Header access plus full blocks, for uncle verification.
pub trait ChainReader: ChainHeaderReader {
    fn block(&self, hash: &H256, number: u64) -> Option<Block>;
}

#[derive(Default)]
struct ChainIndex {
    blocks: HashMap<H256, Block>,
    canonical: BTreeMap<u64, H256>,
    head: Option<H256>,
}

/// Thread-safe in-memory chain. Verification workers read it concurrently.
pub struct MemoryChain {
    config: ChainConfig,
    index: RwLock<ChainIndex>,
}

impl MemoryChain {
    pub fn new(config: ChainConfig, genesis: Block) -> Self {
        let chain = MemoryChain {
            config,
            index: RwLock::new(ChainIndex::default()),
        };
        chain.insert_block(genesis);
        chain
    }

    /// Inserts a block and makes it canonical at its height. The head moves
    /// forward only.
    pub fn insert_block(&self, block: Block) {
        let hash = block.hash();
        let number = block.number();
        let mut index = self.index.write();
        let advance = match index.head.and_then(|h| index.blocks.get(&h)) {
            Some(head) => number >= head.number(),
            None => true,
        };
        index.canonical.insert(number, hash);
        index.blocks.insert(hash, block);
        if advance {
            index.head = Some(hash);
        }
    }

    pub fn insert_header(&self, header: Header) {
        self.insert_block(Block {
            header,
            transactions: Vec::new(),
            uncles: Vec::new(),
        });
    }

    pub fn len(&self) -> usize {
        self.index.read().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChainHeaderReader for MemoryChain {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn current_header(&self) -> Option<Header> {
        let index = self.index.read();
        index
            .head
            .and_then(|h| index.blocks.get(&h))
            .map(|b| b.header.clone())
    }

    fn header(&self, hash: &H256, number: u64) -> Option<Header> {
        self.index
            .read()
            .blocks
            .get(hash)
            .filter(|b| b.number() == number)
            .map(|b| b.header.clone())
    }

    fn header_by_number(&self, number: u64) -> Option<Header> {
        let index = self.index.read();
        index
            .canonical
            .get(&number)
            .and_then(|h| index.blocks.get(h))
            .map(|b| b.header.clone())
    }

    fn header_by_hash(&self, hash: &H256) -> Option<Header> {
        self.index.read().blocks.get(hash).map(|b| b.header.clone())
    }
}

impl ChainReader for MemoryChain {
    fn block(&self, hash: &H256, number: u64) -> Option<Block> {
        self.index
            .read()
            .blocks
            .get(hash)
            .filter(|b| b.number() == number)
            .cloned()
    }
}
