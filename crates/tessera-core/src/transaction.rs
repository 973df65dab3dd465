use serde::{Deserialize, Serialize};

use crate::types::{Amount, OutPoint};

/// Transaction input spending a previous output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    /// The output being spent.
    pub previous_output: OutPoint,
    /// Unlocking script.
    #[serde(default, with = "hex::serde")]
    pub script_sig: Vec<u8>,
    /// Witness stack. Settlement operations carried by an input place their
    /// tag as a single-byte first item.
    #[serde(default, with = "hex_stack")]
    pub witness: Vec<Vec<u8>>,
    /// Sequence number.
    #[serde(default = "default_sequence")]
    pub sequence: u32,
}

/// Transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    /// Value locked by this output.
    pub value: Amount,
    /// Locking script. Settlement operations carried by an output place their
    /// tag as the first script byte.
    #[serde(with = "hex::serde")]
    pub script_pubkey: Vec<u8>,
}

/// A ledger transaction as seen by the settlement layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    #[serde(default)]
    pub lock_time: u32,
}

fn default_sequence() -> u32 {
    u32::MAX
}

impl TxIn {
    /// Input spending `previous_output` with the given witness stack.
    pub fn new(previous_output: OutPoint, witness: Vec<Vec<u8>>) -> Self {
        Self {
            previous_output,
            script_sig: Vec::new(),
            witness,
            sequence: default_sequence(),
        }
    }
}

impl TxOut {
    pub fn new(value: Amount, script_pubkey: Vec<u8>) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }
}

impl Transaction {
    pub fn new(inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        Self {
            version: 2,
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    /// Canonical byte encoding used for transaction id computation.
    ///
    /// Witness data is excluded so that the id of a transaction does not
    /// change when its witness is re-signed.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.inputs.len() * 48 + self.outputs.len() * 40);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            out.extend_from_slice(&input.previous_output.to_bytes());
            out.extend_from_slice(&(input.script_sig.len() as u32).to_le_bytes());
            out.extend_from_slice(&input.script_sig);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }
        out.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            out.extend_from_slice(&(output.script_pubkey.len() as u32).to_le_bytes());
            out.extend_from_slice(&output.script_pubkey);
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    /// Sum of all output values, or `None` on overflow.
    pub fn total_output_value(&self) -> Option<Amount> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }
}

mod hex_stack {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(items.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        let items = Vec::<String>::deserialize(deserializer)?;
        items
            .into_iter()
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}
