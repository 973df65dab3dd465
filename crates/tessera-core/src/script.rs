//! Standard output scripts recognized by the settlement layer.

use crate::types::PartyKey;

/// Push of the next 32 bytes.
pub const OP_PUSHBYTES_32: u8 = 0x20;
/// Signature check against the pushed key.
pub const OP_CHECKSIG: u8 = 0xac;

/// Length of a pay-to-key script.
pub const PAY_TO_KEY_LEN: usize = 34;

/// Build a pay-to-key locking script: `<key> OP_CHECKSIG`.
pub fn pay_to_key(key: &PartyKey) -> Vec<u8> {
    let mut script = Vec::with_capacity(PAY_TO_KEY_LEN);
    script.push(OP_PUSHBYTES_32);
    script.extend_from_slice(key.as_bytes());
    script.push(OP_CHECKSIG);
    script
}

/// Return the destination key if `script` is a pay-to-key script.
pub fn parse_pay_to_key(script: &[u8]) -> Option<PartyKey> {
    if script.len() != PAY_TO_KEY_LEN
        || script[0] != OP_PUSHBYTES_32
        || script[PAY_TO_KEY_LEN - 1] != OP_CHECKSIG
    {
        return None;
    }
    PartyKey::from_slice(&script[1..33]).ok()
}
