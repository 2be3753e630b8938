//! MiMC-5 over the Pallas base field, native and in-circuit.
//!
//! `E_k(x)` runs [`ROUNDS`] rounds of `x <- (x + k + c_r)^5` and adds `k`
//! at the end. Messages are absorbed with the Miyaguchi-Preneel
//! compression `h <- E_h(m) + h + m`, starting from a tag-derived IV and
//! closing with the message length.

use std::sync::OnceLock;

use ff::Field;

use crate::field::{self, Fr};
use crate::r1cs::{ConstraintSystem, LinearCombination, Variable};

/// `ceil(255 / log2(5))` rounds.
pub const ROUNDS: usize = 110;

const CONSTANTS_DOMAIN: &[u8] = b"seatbind.mimc5.pallas.rc";
const IV_DOMAIN: &[u8] = b"seatbind.mimc5.pallas.iv";

fn round_constants() -> &'static [Fr; ROUNDS] {
    static CONSTANTS: OnceLock<[Fr; ROUNDS]> = OnceLock::new();
    CONSTANTS.get_or_init(|| {
        std::array::from_fn(|i| field::hash_to_field(CONSTANTS_DOMAIN, &(i as u64).to_le_bytes()))
    })
}

fn iv(tag: &[u8]) -> Fr {
    field::hash_to_field(IV_DOMAIN, tag)
}

fn pow5(x: Fr) -> Fr {
    let x2 = x.square();
    x2.square() * x
}

/// Keyed permutation `E_k(x)`.
#[must_use]
pub fn encrypt(key: Fr, x: Fr) -> Fr {
    round_constants()
        .iter()
        .fold(x, |acc, c| pow5(acc + key + *c))
        + key
}

/// `E_h(m) + h + m`
#[must_use]
pub fn compress(h: Fr, m: Fr) -> Fr {
    encrypt(h, m) + h + m
}

/// Domain-separated hash of a sequence of field elements.
#[must_use]
pub fn hash(tag: &[u8], inputs: &[Fr]) -> Fr {
    let h = inputs.iter().fold(iv(tag), |h, m| compress(h, *m));
    compress(h, Fr::from(inputs.len() as u64))
}

/// In-circuit `E_k(x)`, three constraints per round.
pub fn encrypt_gadget(
    cs: &mut ConstraintSystem,
    key: &LinearCombination,
    x: LinearCombination,
) -> LinearCombination {
    let mut state = x;
    for c in round_constants() {
        let t = state.add_scaled(Fr::ONE, key).add_constant(*c);
        let t_value = cs.eval(&t);
        let t2 = cs.alloc(t_value.square());
        cs.enforce("mimc_round", t.clone(), t.clone(), t2.into());
        let t4 = cs.alloc(t_value.square().square());
        cs.enforce("mimc_round", t2.into(), t2.into(), t4.into());
        let t5 = cs.alloc(pow5(t_value));
        cs.enforce("mimc_round", t4.into(), t, t5.into());
        state = t5.into();
    }
    state.add_scaled(Fr::ONE, key)
}

/// In-circuit [`compress`]. The chaining value is materialized so that
/// linear combinations do not grow along the chain.
pub fn compress_gadget(
    cs: &mut ConstraintSystem,
    h: &LinearCombination,
    m: &LinearCombination,
) -> Variable {
    let out = encrypt_gadget(cs, h, m.clone())
        .add_scaled(Fr::ONE, h)
        .add_scaled(Fr::ONE, m);
    cs.alloc_lc("mimc_chain", out)
}

/// In-circuit [`hash`].
pub fn hash_gadget(cs: &mut ConstraintSystem, tag: &[u8], inputs: &[LinearCombination]) -> Variable {
    let mut h = LinearCombination::constant(iv(tag));
    for m in inputs {
        h = compress_gadget(cs, &h, m).into();
    }
    let len = LinearCombination::constant(Fr::from(inputs.len() as u64));
    compress_gadget(cs, &h, &len)
}
