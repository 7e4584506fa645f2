
use std::borrow::Borrow;

use cbitcoin::{Amount, Transaction};
use cbitcoin::consensus::encode;


/// Extension trait for [Transaction].
pub trait TransactionExt: Borrow<Transaction> {
	/// Returns total output value of the transaction.
	fn output_value(&self) -> Amount {
		self.borrow().output.iter().map(|o| o.value).sum()
	}

	/// Size in bytes of the legacy (non-witness) serialization.
	fn byte_size(&self) -> usize {
		encode::serialize(self.borrow()).len()
	}

	/// The locktime as its raw consensus value.
	fn raw_lock_time(&self) -> u32 {
		self.borrow().lock_time.to_consensus_u32()
	}

	/// Serialize the transaction to lowercase hex.
	fn serialize_hex(&self) -> String {
		encode::serialize_hex(self.borrow())
	}
}
impl TransactionExt for Transaction {}
