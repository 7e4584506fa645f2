//!
//! Affine point arithmetic over secp256k1.
//!
//! The point at infinity is represented as `None`, so every operation works on
//! `Option<AffinePoint>`.
//!

use bitcoin::secp256k1::{constants, PublicKey};
use num_bigint::BigUint;
use num_traits::Zero;

use crate::util::to_bytes32;


lazy_static! {
	/// The prime of the base field.
	pub static ref P: BigUint = BigUint::from_bytes_be(&constants::FIELD_SIZE);

	/// The order of the group.
	pub static ref N: BigUint = BigUint::from_bytes_be(&constants::CURVE_ORDER);

	/// Half of the group order, the largest canonical `s` value.
	pub static ref HALF_N: BigUint = &*N >> 1usize;

	/// The generator point.
	pub static ref G: AffinePoint = AffinePoint {
		x: BigUint::from_bytes_be(&constants::GENERATOR_X),
		y: BigUint::from_bytes_be(&constants::GENERATOR_Y),
	};
}

/// A point on the curve other than the point at infinity.
///
/// Coordinates are always reduced modulo [P].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AffinePoint {
	x: BigUint,
	y: BigUint,
}

/// A curve point, `None` being the point at infinity.
pub type Point = Option<AffinePoint>;

impl AffinePoint {
	/// The point with the given coordinates, if it lies on the curve.
	pub fn new(x: BigUint, y: BigUint) -> Option<AffinePoint> {
		let ret = AffinePoint { x, y };
		if ret.is_on_curve() {
			Some(ret)
		} else {
			None
		}
	}

	pub fn x(&self) -> &BigUint {
		&self.x
	}

	pub fn y(&self) -> &BigUint {
		&self.y
	}

	/// The 33-byte compressed encoding.
	pub fn serialize(&self) -> [u8; 33] {
		let mut ret = [0u8; 33];
		ret[0] = if self.y.bit(0) { 0x03 } else { 0x02 };
		ret[1..].copy_from_slice(&to_bytes32(&self.x));
		ret
	}

	pub fn from_public_key(pk: &PublicKey) -> AffinePoint {
		let ser = pk.serialize_uncompressed();
		AffinePoint {
			x: BigUint::from_bytes_be(&ser[1..33]),
			y: BigUint::from_bytes_be(&ser[33..65]),
		}
	}

	pub fn to_public_key(&self) -> PublicKey {
		PublicKey::from_slice(&self.serialize()).expect("points from curve arithmetic are valid")
	}

	/// Whether the point satisfies y² = x³ + 7.
	pub fn is_on_curve(&self) -> bool {
		let p = &*P;
		if self.x >= *p || self.y >= *p {
			return false;
		}
		let lhs = &self.y * &self.y % p;
		let rhs = (&self.x * &self.x % p * &self.x + 7u32) % p;
		lhs == rhs
	}
}

/// `(a - b) mod m` for values that may exceed `m`.
fn sub_mod(a: &BigUint, b: &BigUint, m: &BigUint) -> BigUint {
	((a % m) + m - (b % m)) % m
}

/// The multiplicative inverse of `a` modulo `m`.
///
/// Returns `None` when `a` is not invertible, for example when it is zero.
pub fn inv_mod(a: &BigUint, m: &BigUint) -> Option<BigUint> {
	(a % m).modinv(m)
}

fn field_inv(a: &BigUint) -> BigUint {
	inv_mod(a, &P).expect("nonzero elements of a prime field are invertible")
}

fn double_affine(a: &AffinePoint) -> Point {
	if a.y.is_zero() {
		return None;
	}
	let p = &*P;
	let num = BigUint::from(3u32) * &a.x * &a.x % p;
	let lambda = num * field_inv(&(BigUint::from(2u32) * &a.y)) % p;
	let x = sub_mod(&(&lambda * &lambda), &(BigUint::from(2u32) * &a.x), p);
	let y = sub_mod(&(&lambda * sub_mod(&a.x, &x, p)), &a.y, p);
	Some(AffinePoint { x, y })
}

/// Point doubling.
pub fn double(a: &Point) -> Point {
	a.as_ref().and_then(double_affine)
}

/// Point addition.
pub fn add(a: &Point, b: &Point) -> Point {
	let (a, b) = match (a, b) {
		(None, other) | (other, None) => return other.clone(),
		(Some(a), Some(b)) => (a, b),
	};

	if a.x == b.x {
		if a.y == b.y {
			return double_affine(a);
		}
		// b is the negation of a
		return None;
	}

	let p = &*P;
	let lambda = sub_mod(&b.y, &a.y, p) * field_inv(&sub_mod(&b.x, &a.x, p)) % p;
	let x = sub_mod(&sub_mod(&(&lambda * &lambda), &a.x, p), &b.x, p);
	let y = sub_mod(&(&lambda * sub_mod(&a.x, &x, p)), &a.y, p);
	Some(AffinePoint { x, y })
}

/// Scalar multiplication with double-and-add.
pub fn mul(k: &BigUint, point: &Point) -> Point {
	let mut ret = None;
	let mut addend = point.clone();
	for i in 0..k.bits() {
		if k.bit(i) {
			ret = add(&ret, &addend);
		}
		addend = double(&addend);
	}
	ret
}

/// Multiply the generator by `k`.
pub fn mul_base(k: &BigUint) -> Point {
	mul(k, &Some(G.clone()))
}
