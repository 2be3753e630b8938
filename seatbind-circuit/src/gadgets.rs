//! Core gadgets over the constraint system: booleanity, range checks, set
//! membership, non-zero and equality tests, selection, byte packing.
//!
//! Every gadget allocates the same variables and records the same
//! constraints whatever the witness values are.

use ff::Field;

use crate::field::{self, Fr};
use crate::r1cs::{ConstraintSystem, LinearCombination, Variable};

/// Bytes packed into one field element (keeps packed values below the modulus).
pub const BYTES_PER_ELEMENT: usize = 31;

fn one() -> LinearCombination {
    LinearCombination::constant(Fr::ONE)
}

/// Constrains `b` to be boolean: `b * (b - 1) = 0`.
pub fn boolean(cs: &mut ConstraintSystem, label: &'static str, b: Variable) {
    cs.enforce(
        label,
        b.into(),
        LinearCombination::from(b).add_constant(-Fr::ONE),
        LinearCombination::zero(),
    );
}

/// Decomposes `x` into `bits` boolean variables (LSB first) and enforces the
/// recomposition. Unsatisfiable when `x >= 2^bits`.
pub fn range_check(
    cs: &mut ConstraintSystem,
    label: &'static str,
    x: Variable,
    bits: usize,
) -> Vec<Variable> {
    let value = cs.value(x);
    let mut recomposed = LinearCombination::zero();
    let mut weight = Fr::ONE;
    let mut out = Vec::with_capacity(bits);
    for bit in field::low_bits(&value, bits) {
        let b = cs.alloc(if bit { Fr::ONE } else { Fr::ZERO });
        boolean(cs, label, b);
        recomposed = recomposed.add(weight, b);
        weight = weight.double();
        out.push(b);
    }
    cs.enforce_equal(label, recomposed, x.into());
    out
}

/// Constrains `x` to take one of `allowed` values via a running product of
/// `(x - allowed_i)` that must vanish.
pub fn assert_in_set(cs: &mut ConstraintSystem, label: &'static str, x: Variable, allowed: &[u64]) {
    let factor = |k: u64| LinearCombination::from(x).add_constant(-Fr::from(k));
    let Some((last, rest)) = allowed.split_last() else {
        // empty set: nothing is allowed
        cs.enforce_equal(label, one(), LinearCombination::zero());
        return;
    };
    let mut acc = one();
    for k in rest {
        let product = cs.eval(&acc) * cs.eval(&factor(*k));
        let p = cs.alloc(product);
        cs.enforce(label, acc, factor(*k), p.into());
        acc = p.into();
    }
    cs.enforce(label, acc, factor(*last), LinearCombination::zero());
}

/// Constrains `x != 0` by exhibiting its inverse.
pub fn assert_nonzero(cs: &mut ConstraintSystem, label: &'static str, x: LinearCombination) {
    let value = cs.eval(&x);
    let inv = Option::<Fr>::from(value.invert()).unwrap_or(Fr::ZERO);
    let inv = cs.alloc(inv);
    cs.enforce(label, x, inv.into(), one());
}

/// Constrains `a != b`.
pub fn assert_not_equal(cs: &mut ConstraintSystem, label: &'static str, a: Variable, b: Variable) {
    assert_nonzero(cs, label, LinearCombination::from(a).sub_var(b));
}

/// Returns a boolean variable equal to `x == k`.
pub fn is_equal_const(cs: &mut ConstraintSystem, label: &'static str, x: Variable, k: u64) -> Variable {
    let diff = LinearCombination::from(x).add_constant(-Fr::from(k));
    let diff_value = cs.eval(&diff);
    let inv = Option::<Fr>::from(diff_value.invert()).unwrap_or(Fr::ZERO);
    let eq_value = if diff_value.is_zero_vartime() { Fr::ONE } else { Fr::ZERO };

    let inv = cs.alloc(inv);
    let eq = cs.alloc(eq_value);
    // diff * inv = 1 - eq
    cs.enforce(label, diff.clone(), inv.into(), one().sub_var(eq));
    // diff * eq = 0
    cs.enforce(label, diff, eq.into(), LinearCombination::zero());
    eq
}

/// Returns `cond ? a : b` for a boolean `cond`: `cond * (a - b) = out - b`.
pub fn select(
    cs: &mut ConstraintSystem,
    label: &'static str,
    cond: Variable,
    a: Variable,
    b: Variable,
) -> Variable {
    let value = if cs.value(cond) == Fr::ONE { cs.value(a) } else { cs.value(b) };
    let out = cs.alloc(value);
    cs.enforce(
        label,
        cond.into(),
        LinearCombination::from(a).sub_var(b),
        LinearCombination::from(out).sub_var(b),
    );
    out
}

/// Allocates `bytes` as witnesses.
pub fn alloc_bytes(cs: &mut ConstraintSystem, bytes: &[u8]) -> Vec<Variable> {
    bytes.iter().map(|b| cs.alloc(Fr::from(u64::from(*b)))).collect()
}

/// Packs byte variables little-endian, `BYTES_PER_ELEMENT` per element.
/// Purely linear: no constraints are recorded.
pub fn pack_bytes(bytes: &[Variable]) -> Vec<LinearCombination> {
    let base = Fr::from(256u64);
    bytes
        .chunks(BYTES_PER_ELEMENT)
        .map(|chunk| {
            let mut weight = Fr::ONE;
            chunk.iter().fold(LinearCombination::zero(), |lc, b| {
                let lc = lc.add(weight, *b);
                weight *= base;
                lc
            })
        })
        .collect()
}

/// Native counterpart of [`pack_bytes`].
pub fn pack_bytes_native(bytes: &[u8]) -> Vec<Fr> {
    let base = Fr::from(256u64);
    bytes
        .chunks(BYTES_PER_ELEMENT)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .fold(Fr::ZERO, |acc, b| acc * base + Fr::from(u64::from(*b)))
        })
        .collect()
}
