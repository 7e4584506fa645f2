
extern crate bitcoin as cbitcoin;

mod bitcoin;
pub use bitcoin::TransactionExt;

pub mod fee;
pub mod serde;


use cbitcoin::{Amount, Sequence};


/// Type representing a block height in the bitcoin blockchain.
pub type BlockHeight = u32;

pub const P2PKH_DUST_VB: u64 = 182;
/// 546 satoshis
pub const P2PKH_DUST_SAT: u64 = P2PKH_DUST_VB * 3;
pub const P2PKH_DUST: Amount = Amount::from_sat(P2PKH_DUST_SAT);

/// Sequence number of an input that can no longer be replaced.
pub const SEQUENCE_FINAL: Sequence = Sequence::MAX;

/// Raw locktime value used by a closing transaction.
///
/// This is the maximum consensus value, not a "no locktime" marker.
pub const LOCKTIME_FINAL: u32 = u32::MAX;
