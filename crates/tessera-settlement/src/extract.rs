//! Operation parameter extraction from scripts and witnesses.
//!
//! The ledger's script engine owns the real encoding; the overlay only
//! consumes it through [`ParamExtractor`]. [`WireExtractor`] implements the
//! reference byte layout together with the matching encoders.

use tessera_core::{ChannelId, ClaimableId, OperationTag, PartyKey};
use tessera_crypto::Signature;

use crate::error::SettlementError;
use crate::predicate::Predicate;
use crate::types::{
    ChannelCloseParams, ChannelOpenParams, ChannelUpdate, ClaimableClaimParams,
    ClaimableCreateParams, Claimant,
};

/// Length of a channel-open output script.
pub const CHANNEL_OPEN_SCRIPT_LEN: usize = 1 + 32 + 32 + 8 + 8;

/// Decodes operation parameters from transaction data.
///
/// Output operations receive the tagged output's script and an empty
/// witness; input operations receive the tagged input's witness stack,
/// whose first item is the tag.
pub trait ParamExtractor {
    fn channel_open(
        &self,
        script: &[u8],
        witness: &[Vec<u8>],
    ) -> Result<ChannelOpenParams, SettlementError>;

    fn channel_update(&self, witness: &[Vec<u8>]) -> Result<ChannelUpdate, SettlementError>;

    fn channel_close(&self, witness: &[Vec<u8>]) -> Result<ChannelCloseParams, SettlementError>;

    fn claimable_create(
        &self,
        script: &[u8],
        witness: &[Vec<u8>],
    ) -> Result<ClaimableCreateParams, SettlementError>;

    fn claimable_claim(&self, witness: &[Vec<u8>])
        -> Result<ClaimableClaimParams, SettlementError>;
}

/// Reference extractor for the little-endian wire layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireExtractor;

impl WireExtractor {
    /// `0xc0 | party_a | party_b | amount | expiry`
    pub fn channel_open_script(params: &ChannelOpenParams) -> Vec<u8> {
        let mut script = Vec::with_capacity(CHANNEL_OPEN_SCRIPT_LEN);
        script.push(OperationTag::ChannelOpen.as_byte());
        script.extend_from_slice(params.party_a.as_bytes());
        script.extend_from_slice(params.party_b.as_bytes());
        script.extend_from_slice(&params.amount.to_le_bytes());
        script.extend_from_slice(&params.expiry_height.to_le_bytes());
        script
    }

    pub fn channel_update_witness(update: &ChannelUpdate) -> Vec<Vec<u8>> {
        let mut balances = Vec::with_capacity(16);
        balances.extend_from_slice(&update.balances[0].to_le_bytes());
        balances.extend_from_slice(&update.balances[1].to_le_bytes());
        vec![
            vec![OperationTag::ChannelUpdate.as_byte()],
            update.channel_id.as_bytes().to_vec(),
            balances,
            update.nonce.to_le_bytes().to_vec(),
            update.signatures[0].to_bytes().to_vec(),
            update.signatures[1].to_bytes().to_vec(),
        ]
    }

    pub fn channel_close_witness(channel_id: &ChannelId) -> Vec<Vec<u8>> {
        vec![
            vec![OperationTag::ChannelClose.as_byte()],
            channel_id.as_bytes().to_vec(),
        ]
    }

    /// `0xc3 | amount | count | (destination | predicate)*`
    pub fn claimable_create_script(params: &ClaimableCreateParams) -> Result<Vec<u8>, SettlementError> {
        let count = u8::try_from(params.claimants.len()).map_err(|_| {
            SettlementError::Malformed(format!("{} claimants do not fit", params.claimants.len()))
        })?;
        let mut script = vec![OperationTag::ClaimableCreate.as_byte()];
        script.extend_from_slice(&params.amount.to_le_bytes());
        script.push(count);
        for claimant in &params.claimants {
            script.extend_from_slice(claimant.destination.as_bytes());
            claimant.predicate.encode(&mut script);
        }
        Ok(script)
    }

    pub fn claimable_claim_witness(params: &ClaimableClaimParams) -> Vec<Vec<u8>> {
        let mut witness = vec![
            vec![OperationTag::ClaimableClaim.as_byte()],
            params.claimable_id.as_bytes().to_vec(),
            params.claimer.as_bytes().to_vec(),
        ];
        if let Some(proof) = &params.proof {
            witness.push(proof.clone());
        }
        witness
    }
}

impl ParamExtractor for WireExtractor {
    fn channel_open(
        &self,
        script: &[u8],
        _witness: &[Vec<u8>],
    ) -> Result<ChannelOpenParams, SettlementError> {
        let mut reader = Reader::new(script, "channel-open script");
        reader.expect_tag(OperationTag::ChannelOpen)?;
        let party_a = PartyKey::from_bytes(reader.array()?);
        let party_b = PartyKey::from_bytes(reader.array()?);
        let amount = reader.u64()?;
        let expiry_height = reader.u64()?;
        reader.finish()?;
        Ok(ChannelOpenParams {
            party_a,
            party_b,
            amount,
            expiry_height,
        })
    }

    fn channel_update(&self, witness: &[Vec<u8>]) -> Result<ChannelUpdate, SettlementError> {
        let items = witness_items(witness, OperationTag::ChannelUpdate, 6, 6)?;
        let channel_id = ChannelId::from_bytes(fixed(&items[0], "channel id")?);
        let raw: [u8; 16] = fixed(&items[1], "balances")?;
        let mut b0 = [0u8; 8];
        let mut b1 = [0u8; 8];
        b0.copy_from_slice(&raw[..8]);
        b1.copy_from_slice(&raw[8..]);
        let nonce = u64::from_le_bytes(fixed(&items[2], "nonce")?);
        let sig_a = signature(&items[3])?;
        let sig_b = signature(&items[4])?;
        Ok(ChannelUpdate {
            channel_id,
            balances: [u64::from_le_bytes(b0), u64::from_le_bytes(b1)],
            nonce,
            signatures: [sig_a, sig_b],
        })
    }

    fn channel_close(&self, witness: &[Vec<u8>]) -> Result<ChannelCloseParams, SettlementError> {
        let items = witness_items(witness, OperationTag::ChannelClose, 2, 2)?;
        Ok(ChannelCloseParams {
            channel_id: ChannelId::from_bytes(fixed(&items[0], "channel id")?),
        })
    }

    fn claimable_create(
        &self,
        script: &[u8],
        _witness: &[Vec<u8>],
    ) -> Result<ClaimableCreateParams, SettlementError> {
        let mut reader = Reader::new(script, "claimable-create script");
        reader.expect_tag(OperationTag::ClaimableCreate)?;
        let amount = reader.u64()?;
        let count = reader.u8()?;
        let mut claimants = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let destination = PartyKey::from_bytes(reader.array()?);
            let predicate = reader.predicate()?;
            claimants.push(Claimant::new(destination, predicate));
        }
        reader.finish()?;
        Ok(ClaimableCreateParams { amount, claimants })
    }

    fn claimable_claim(
        &self,
        witness: &[Vec<u8>],
    ) -> Result<ClaimableClaimParams, SettlementError> {
        let items = witness_items(witness, OperationTag::ClaimableClaim, 3, 4)?;
        Ok(ClaimableClaimParams {
            claimable_id: ClaimableId::from_bytes(fixed(&items[0], "claimable id")?),
            claimer: PartyKey::from_bytes(fixed(&items[1], "claimer key")?),
            proof: items.get(2).cloned(),
        })
    }
}

/// Check the tag item and item count, returning the items after the tag.
fn witness_items(
    witness: &[Vec<u8>],
    tag: OperationTag,
    min: usize,
    max: usize,
) -> Result<&[Vec<u8>], SettlementError> {
    match witness.first() {
        Some(first) if first.as_slice() == [tag.as_byte()] => {}
        _ => {
            return Err(SettlementError::Malformed(format!(
                "witness does not start with tag {:#04x}",
                tag.as_byte()
            )))
        }
    }
    if witness.len() < min || witness.len() > max {
        return Err(SettlementError::Malformed(format!(
            "expected {}..={} witness items, got {}",
            min,
            max,
            witness.len()
        )));
    }
    Ok(&witness[1..])
}

fn fixed<const N: usize>(item: &[u8], what: &str) -> Result<[u8; N], SettlementError> {
    item.try_into().map_err(|_| {
        SettlementError::Malformed(format!("{} must be {} bytes, got {}", what, N, item.len()))
    })
}

fn signature(item: &[u8]) -> Result<Signature, SettlementError> {
    Signature::from_bytes(item).map_err(|e| SettlementError::Malformed(e.to_string()))
}

/// Forward-only cursor over a script.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], what: &'static str) -> Self {
        Self { bytes, pos: 0, what }
    }

    fn truncated(&self) -> SettlementError {
        SettlementError::Malformed(format!("truncated {} at byte {}", self.what, self.pos))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], SettlementError> {
        let end = self.pos.checked_add(len).ok_or_else(|| self.truncated())?;
        let slice = self.bytes.get(self.pos..end).ok_or_else(|| self.truncated())?;
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], SettlementError> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, SettlementError> {
        Ok(self.take(1)?[0])
    }

    fn u64(&mut self) -> Result<u64, SettlementError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn expect_tag(&mut self, tag: OperationTag) -> Result<(), SettlementError> {
        let byte = self.u8()?;
        if byte != tag.as_byte() {
            return Err(SettlementError::Malformed(format!(
                "{} starts with {:#04x}, expected {:#04x}",
                self.what,
                byte,
                tag.as_byte()
            )));
        }
        Ok(())
    }

    fn predicate(&mut self) -> Result<Predicate, SettlementError> {
        let (predicate, used) = Predicate::decode(&self.bytes[self.pos..])?;
        self.pos += used;
        Ok(predicate)
    }

    fn finish(&self) -> Result<(), SettlementError> {
        if self.pos != self.bytes.len() {
            return Err(SettlementError::Malformed(format!(
                "{} has {} trailing bytes",
                self.what,
                self.bytes.len() - self.pos
            )));
        }
        Ok(())
    }
}
