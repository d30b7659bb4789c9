//! Short Weierstrass curve arithmetic over secp256k1
//!
//! Affine-coordinate group law in the form the on-chain verifier expects:
//! y² = x³ + a·x + b (mod p), with a = 0 and b = 7 for secp256k1.
//!
//! Inputs are assumed to be valid curve points. Validation happens once, at
//! ingestion (see `Curve::validate`), not on every operation.

use std::sync::OnceLock;

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::error::{Result, StealthError};

/// secp256k1 field prime p = 2^256 - 2^32 - 977
const SECP256K1_P: &str = "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFC2F";
/// secp256k1 group order n
const SECP256K1_N: &str = "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141";
const SECP256K1_GX: &str = "79BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798";
const SECP256K1_GY: &str = "483ADA7726A3C4655DA4FBFC0E1108A8FD17B448A68554199C47D08FFB10D4B8";

/// A curve point: either the point at infinity or an affine (x, y) pair
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Point {
    Infinity,
    Affine { x: BigUint, y: BigUint },
}

impl Point {
    pub fn affine(x: BigUint, y: BigUint) -> Self {
        Point::Affine { x, y }
    }

    pub fn is_infinity(&self) -> bool {
        matches!(self, Point::Infinity)
    }

    pub fn x(&self) -> Option<&BigUint> {
        match self {
            Point::Affine { x, .. } => Some(x),
            Point::Infinity => None,
        }
    }

    pub fn y(&self) -> Option<&BigUint> {
        match self {
            Point::Affine { y, .. } => Some(y),
            Point::Infinity => None,
        }
    }

    /// Uncompressed x || y encoding, 32 bytes each, big-endian
    pub fn to_bytes(&self) -> Option<[u8; 64]> {
        match self {
            Point::Affine { x, y } => {
                let mut out = [0u8; 64];
                out[..32].copy_from_slice(&to_be32(x));
                out[32..].copy_from_slice(&to_be32(y));
                Some(out)
            }
            Point::Infinity => None,
        }
    }
}

/// Domain parameters of a short Weierstrass curve
#[derive(Clone, Debug)]
pub struct Curve {
    /// Field prime
    pub p: BigUint,
    pub a: BigUint,
    pub b: BigUint,
    /// Order of the generator
    pub n: BigUint,
    g: Point,
    /// Iteration count for scalar multiplication (bit length of n)
    bits: u64,
}

/// The secp256k1 parameters, built once
pub fn secp256k1() -> &'static Curve {
    static CURVE: OnceLock<Curve> = OnceLock::new();
    CURVE.get_or_init(|| {
        let hex = |s: &str| BigUint::parse_bytes(s.as_bytes(), 16).unwrap_or_default();
        Curve::new(
            hex(SECP256K1_P),
            BigUint::zero(),
            BigUint::from(7u32),
            hex(SECP256K1_N),
            Point::affine(hex(SECP256K1_GX), hex(SECP256K1_GY)),
        )
    })
}

impl Curve {
    pub fn new(p: BigUint, a: BigUint, b: BigUint, n: BigUint, g: Point) -> Self {
        let bits = n.bits();
        Self { p, a, b, n, g, bits }
    }

    pub fn generator(&self) -> &Point {
        &self.g
    }

    /// Check y² ≡ x³ + a·x + b (mod p) with coordinates in range
    pub fn is_on_curve(&self, point: &Point) -> bool {
        match point {
            Point::Infinity => false,
            Point::Affine { x, y } => {
                if x >= &self.p || y >= &self.p {
                    return false;
                }
                let lhs = (y * y) % &self.p;
                let rhs = (x * x * x + &self.a * x + &self.b) % &self.p;
                lhs == rhs
            }
        }
    }

    /// Validate externally supplied coordinates
    pub fn validate(&self, x: BigUint, y: BigUint) -> Result<Point> {
        let point = Point::affine(x, y);
        if self.is_on_curve(&point) {
            Ok(point)
        } else {
            Err(StealthError::InvalidPoint)
        }
    }

    pub fn negate(&self, point: &Point) -> Point {
        match point {
            Point::Infinity => Point::Infinity,
            Point::Affine { x, y } => Point::affine(x.clone(), self.sub_mod(&BigUint::zero(), y)),
        }
    }

    /// Group addition; infinity is the identity for either operand
    pub fn add(&self, p1: &Point, p2: &Point) -> Result<Point> {
        let (x1, y1, x2, y2) = match (p1, p2) {
            (Point::Infinity, q) | (q, Point::Infinity) => return Ok(q.clone()),
            (Point::Affine { x: x1, y: y1 }, Point::Affine { x: x2, y: y2 }) => (x1, y1, x2, y2),
        };

        if x1 == x2 {
            if y1 != y2 {
                return Ok(Point::Infinity);
            }
            return self.double(p1);
        }

        let numerator = self.sub_mod(y2, y1);
        let denominator = self.sub_mod(x2, x1);
        let slope = (numerator * mod_inverse(&denominator, &self.p)?) % &self.p;
        Ok(self.chord(&slope, x1, y1, x2))
    }

    /// Point doubling with slope (3x² + a)·(2y)⁻¹
    pub fn double(&self, point: &Point) -> Result<Point> {
        let (x, y) = match point {
            Point::Infinity => return Ok(Point::Infinity),
            Point::Affine { x, y } => (x, y),
        };
        if y.is_zero() {
            return Ok(Point::Infinity);
        }

        let numerator = (BigUint::from(3u32) * x * x + &self.a) % &self.p;
        let denominator = (BigUint::from(2u32) * y) % &self.p;
        let slope = (numerator * mod_inverse(&denominator, &self.p)?) % &self.p;
        Ok(self.chord(&slope, x, y, x))
    }

    /// Double-and-add over the full bit width of the group order.
    ///
    /// The loop always runs `bits` iterations regardless of the scalar's
    /// magnitude. The scalar is reduced mod n first.
    pub fn scalar_mul(&self, k: &BigUint, point: &Point) -> Result<Point> {
        let k = k % &self.n;
        let mut result = Point::Infinity;
        let mut addend = point.clone();

        for i in 0..self.bits {
            if k.bit(i) {
                result = self.add(&result, &addend)?;
            }
            addend = self.double(&addend)?;
        }

        Ok(result)
    }

    /// k·G
    pub fn mul_generator(&self, k: &BigUint) -> Result<Point> {
        self.scalar_mul(k, &self.g)
    }

    // x3 = m² - x1 - x2, y3 = m·(x1 - x3) - y1
    fn chord(&self, slope: &BigUint, x1: &BigUint, y1: &BigUint, x2: &BigUint) -> Point {
        let m2 = (slope * slope) % &self.p;
        let x3 = self.sub_mod(&self.sub_mod(&m2, x1), x2);
        let y3 = self.sub_mod(&((slope * self.sub_mod(x1, &x3)) % &self.p), y1);
        Point::affine(x3, y3)
    }

    fn sub_mod(&self, a: &BigUint, b: &BigUint) -> BigUint {
        let b = b % &self.p;
        ((a % &self.p) + &self.p - b) % &self.p
    }
}

/// Modular inverse via the extended Euclidean algorithm.
///
/// Fails only when gcd(a, m) ≠ 1, which cannot happen for a prime modulus
/// and nonzero a.
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Result<BigUint> {
    let modulus = BigInt::from(m.clone());
    let value = BigInt::from(a % m);
    let egcd = value.extended_gcd(&modulus);

    if !egcd.gcd.is_one() {
        return Err(StealthError::InvalidCurveInput(format!("{:#x}", a)));
    }

    egcd.x
        .mod_floor(&modulus)
        .to_biguint()
        .ok_or_else(|| StealthError::InvalidCurveInput(format!("{:#x}", a)))
}

/// Big-endian encode into a fixed 32-byte width (value must be < 2^256)
pub(crate) fn to_be32(value: &BigUint) -> [u8; 32] {
    let bytes = value.to_bytes_be();
    let mut out = [0u8; 32];
    let start = 32usize.saturating_sub(bytes.len());
    let skip = bytes.len().saturating_sub(32);
    out[start..].copy_from_slice(&bytes[skip..]);
    out
}
