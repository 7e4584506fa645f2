//! Fee computation for pool transactions.
//!
//! Fee rates are expressed as a decimal number of satoshis per 1000 bytes of
//! serialized transaction.

use cbitcoin::Amount;


/// The smallest fee any pool transaction pays.
pub const MIN_FEE: Amount = Amount::from_sat(1);

/// The highest accepted fee rate, all bitcoin for every 1000 bytes.
// Equal to `Amount::MAX_MONEY.to_sat()`, which is not a const fn in this bitcoin version.
pub const MAX_FEE_RATE: f64 = (21_000_000u64 * 100_000_000) as f64;

/// Whether the given fee rate can be used to compute fees.
pub fn is_valid_fee_rate(fee_rate: f64) -> bool {
	fee_rate.is_finite() && fee_rate >= 0.0 && fee_rate <= MAX_FEE_RATE
}

/// The fee for a transaction of `size` bytes, rounded down.
///
/// Never returns less than [MIN_FEE].
pub fn fee_for_size(size: usize, fee_rate: f64) -> Amount {
	let fee = (size as f64 / 1000.0 * fee_rate) as u64;
	Amount::from_sat(fee).max(MIN_FEE)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn minimum_fee() {
		assert_eq!(fee_for_size(238, 0.5), MIN_FEE);
		assert_eq!(fee_for_size(268, 0.5), MIN_FEE);
		assert_eq!(fee_for_size(0, 10.0), MIN_FEE);
		assert_eq!(fee_for_size(1_000, 0.0), MIN_FEE);
	}

	#[test]
	fn fee_rounds_down() {
		assert_eq!(fee_for_size(1_000, 1.0), Amount::from_sat(1));
		assert_eq!(fee_for_size(2_999, 1.0), Amount::from_sat(2));
		assert_eq!(fee_for_size(1_000, 250.0), Amount::from_sat(250));
		assert_eq!(fee_for_size(238, 50.0), Amount::from_sat(11));
		assert_eq!(fee_for_size(1_000, MAX_FEE_RATE), Amount::MAX_MONEY);
	}

	#[test]
	fn fee_rate_validity() {
		assert!(is_valid_fee_rate(0.0));
		assert!(is_valid_fee_rate(0.5));
		assert!(!is_valid_fee_rate(-0.1));
		assert!(!is_valid_fee_rate(f64::NAN));
		assert!(!is_valid_fee_rate(f64::INFINITY));
		assert!(is_valid_fee_rate(MAX_FEE_RATE));
		assert!(!is_valid_fee_rate(MAX_FEE_RATE * 2.0));
		assert!(!is_valid_fee_rate(1e30));
	}
}
