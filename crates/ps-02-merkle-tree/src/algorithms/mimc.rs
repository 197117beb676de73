//! # MiMC Sponge
//!
//! MiMC Feistel permutation over the BN254 scalar field with exponent 5 and
//! 220 rounds, used as a sponge with rate 1 and capacity 1.
//!
//! Round constants come from a keccak-256 chain seeded with `"mimcsponge"`;
//! the first and last constants are zero.

use ethers::utils::keccak256;
use lazy_static::lazy_static;
use primitive_types::U512;
use shared_types::U256;

/// BN254 scalar field modulus.
pub const FIELD_MODULUS: U256 = U256([
    0x43e1_f593_f000_0001,
    0x2833_e848_79b9_7091,
    0xb850_45b6_8181_585d,
    0x3064_4e72_e131_a029,
]);

/// Feistel rounds per permutation.
pub const ROUNDS: usize = 220;

const CONSTANTS_SEED: &[u8] = b"mimcsponge";
const ZERO_SEED: &[u8] = b"tornado";

lazy_static! {
    /// Per-round additive constants.
    pub static ref ROUND_CONSTANTS: Vec<U256> = round_constants();
}

fn round_constants() -> Vec<U256> {
    let mut constants = vec![U256::zero(); ROUNDS];
    let mut chain = keccak256(CONSTANTS_SEED);
    for constant in constants.iter_mut().take(ROUNDS - 1).skip(1) {
        chain = keccak256(&chain);
        *constant = U256::from_big_endian(&chain) % FIELD_MODULUS;
    }
    constants
}

/// Reduce an arbitrary 256-bit value into the field.
pub fn reduce(value: U256) -> U256 {
    value % FIELD_MODULUS
}

/// Whether `value` is a canonical field element.
pub fn is_field_element(value: &U256) -> bool {
    *value < FIELD_MODULUS
}

/// `(a + b) mod p` for reduced operands.
pub fn add_mod(a: U256, b: U256) -> U256 {
    // p < 2^254, so the sum of two reduced values cannot overflow.
    let sum = a + b;
    if sum >= FIELD_MODULUS {
        sum - FIELD_MODULUS
    } else {
        sum
    }
}

/// `(a * b) mod p`.
pub fn mul_mod(a: U256, b: U256) -> U256 {
    let product = a.full_mul(b) % U512::from(FIELD_MODULUS);
    U256([product.0[0], product.0[1], product.0[2], product.0[3]])
}

fn pow5(x: U256) -> U256 {
    let x2 = mul_mod(x, x);
    let x4 = mul_mod(x2, x2);
    mul_mod(x4, x)
}

/// One MiMC Feistel permutation of `(xl, xr)` keyed by `k`.
pub fn feistel(mut xl: U256, mut xr: U256, k: U256) -> (U256, U256) {
    for (round, constant) in ROUND_CONSTANTS.iter().enumerate() {
        let t = add_mod(add_mod(xl, k), *constant);
        let t5 = pow5(t);
        if round < ROUNDS - 1 {
            let next_xl = add_mod(xr, t5);
            xr = xl;
            xl = next_xl;
        } else {
            xr = add_mod(xr, t5);
        }
    }
    (xl, xr)
}

/// Absorb `inputs` one element at a time and squeeze a single output.
pub fn multi_hash(inputs: &[U256]) -> U256 {
    let (mut r, mut c) = (U256::zero(), U256::zero());
    for input in inputs {
        r = add_mod(r, reduce(*input));
        (r, c) = feistel(r, c, U256::zero());
    }
    r
}

/// The empty-leaf value: `keccak256("tornado") mod p`.
pub fn zero_value() -> U256 {
    reduce(U256::from_big_endian(&keccak256(ZERO_SEED)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_value_constant() {
        let expected = U256::from_str_radix(
            "2fe54c60d3acabf3343a35b6eba15db4821b340f76e741e2249685ed4899af6c",
            16,
        )
        .unwrap();
        assert_eq!(zero_value(), expected);
    }

    #[test]
    fn test_outer_round_constants_are_zero() {
        assert_eq!(ROUND_CONSTANTS.len(), ROUNDS);
        assert!(ROUND_CONSTANTS[0].is_zero());
        assert!(ROUND_CONSTANTS[ROUNDS - 1].is_zero());
        assert!(ROUND_CONSTANTS[1..ROUNDS - 1]
            .iter()
            .all(|c| !c.is_zero() && is_field_element(c)));
    }

    #[test]
    fn test_modular_arithmetic() {
        let minus_one = FIELD_MODULUS - U256::one();
        assert_eq!(add_mod(minus_one, U256::from(2)), U256::one());
        // (-1)^2 = 1
        assert_eq!(mul_mod(minus_one, minus_one), U256::one());
        assert_eq!(pow5(U256::from(2)), U256::from(32));
    }

    #[test]
    fn test_multi_hash_is_order_sensitive() {
        let a = U256::from(1);
        let b = U256::from(2);
        let ab = multi_hash(&[a, b]);
        assert_ne!(ab, multi_hash(&[b, a]));
        assert_eq!(ab, multi_hash(&[a, b]));
        assert!(is_field_element(&ab));
    }
}
