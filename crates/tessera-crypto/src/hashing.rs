use sha2::{Digest, Sha256};
use tessera_core::{ChannelId, ClaimableId, OutPoint, Transaction, Txid};

/// 32-byte digest.
pub type Hash = [u8; 32];

const CHANNEL_ID_DOMAIN: &[u8] = b"tessera/channel";
const CLAIMABLE_ID_DOMAIN: &[u8] = b"tessera/claimable";

/// Single-round SHA-256, the ledger's standard digest.
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Double SHA-256.
pub fn sha256d(data: &[u8]) -> Hash {
    sha256(&sha256(data))
}

/// Transaction id: double SHA-256 of the witness-free encoding.
pub fn txid(tx: &Transaction) -> Txid {
    Txid::from_bytes(sha256d(&tx.canonical_bytes()))
}

fn outpoint_digest(domain: &[u8], outpoint: &OutPoint) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(outpoint.to_bytes());
    hasher.finalize().into()
}

/// Derive the id of the channel funded by `outpoint`.
pub fn channel_id(outpoint: &OutPoint) -> ChannelId {
    ChannelId::from_bytes(outpoint_digest(CHANNEL_ID_DOMAIN, outpoint))
}

/// Derive the id of the claimable balance funded by `outpoint`.
pub fn claimable_id(outpoint: &OutPoint) -> ClaimableId {
    ClaimableId::from_bytes(outpoint_digest(CLAIMABLE_ID_DOMAIN, outpoint))
}

/// BLAKE3 hash, used for settlement state commitments.
pub fn blake3_hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

const MERKLE_LEAF_TAG: u8 = 0x00;
const MERKLE_NODE_TAG: u8 = 0x01;

/// Compute the BLAKE3 Merkle root of a list of hashes.
///
/// Leaves and interior nodes are hashed under distinct tag bytes. An unpaired
/// node is carried up to the next level unchanged. Returns a zero hash for
/// empty input.
pub fn merkle_root(hashes: &[Hash]) -> Hash {
    if hashes.is_empty() {
        return [0u8; 32];
    }

    let mut current_level: Vec<Hash> = hashes.iter().map(merkle_leaf).collect();

    while current_level.len() > 1 {
        let mut next_level = Vec::with_capacity((current_level.len() + 1) / 2);
        for chunk in current_level.chunks(2) {
            match chunk {
                [left, right] => next_level.push(merkle_node(left, right)),
                [single] => next_level.push(*single),
                _ => {}
            }
        }
        current_level = next_level;
    }

    current_level[0]
}

fn merkle_leaf(hash: &Hash) -> Hash {
    let mut tagged = [0u8; 33];
    tagged[0] = MERKLE_LEAF_TAG;
    tagged[1..].copy_from_slice(hash);
    blake3_hash(&tagged)
}

fn merkle_node(left: &Hash, right: &Hash) -> Hash {
    let mut tagged = [0u8; 65];
    tagged[0] = MERKLE_NODE_TAG;
    tagged[1..33].copy_from_slice(left);
    tagged[33..].copy_from_slice(right);
    blake3_hash(&tagged)
}
