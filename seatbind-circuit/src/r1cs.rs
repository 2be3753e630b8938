//! Rank-1 constraint system recorder.
//!
//! Circuits are synthesized in prover mode: every allocation carries its
//! value, and each constraint `<A, x> * <B, x> = <C, x>` is recorded with a
//! static label. The recorded structure (variables, coefficients, labels) is
//! independent of the witness, so it can be digested and compared against a
//! reference shape by the verifier.

use ff::Field;
use sha2::{Digest, Sha256};

use crate::field::{self, Fr};

/// Index of a variable. Index 0 is the constant one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Variable(usize);

impl Variable {
    /// The constant-one variable.
    pub const ONE: Variable = Variable(0);

    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

/// `sum_i coeff_i * var_i`; constants are terms on [`Variable::ONE`].
#[derive(Clone, Debug, Default)]
pub struct LinearCombination {
    terms: Vec<(Variable, Fr)>,
}

impl LinearCombination {
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn constant(value: Fr) -> Self {
        Self { terms: vec![(Variable::ONE, value)] }
    }

    /// `self + coeff * var`
    #[must_use]
    pub fn add(mut self, coeff: Fr, var: Variable) -> Self {
        self.terms.push((var, coeff));
        self
    }

    /// `self - var`
    #[must_use]
    pub fn sub_var(self, var: Variable) -> Self {
        self.add(-Fr::ONE, var)
    }

    /// `self + coeff * other`
    #[must_use]
    pub fn add_scaled(mut self, coeff: Fr, other: &LinearCombination) -> Self {
        self.terms
            .extend(other.terms.iter().map(|(v, c)| (*v, *c * coeff)));
        self
    }

    /// `self + value`
    #[must_use]
    pub fn add_constant(self, value: Fr) -> Self {
        self.add(value, Variable::ONE)
    }

    pub fn terms(&self) -> &[(Variable, Fr)] {
        &self.terms
    }
}

impl From<Variable> for LinearCombination {
    fn from(var: Variable) -> Self {
        Self { terms: vec![(var, Fr::ONE)] }
    }
}

/// One recorded constraint.
#[derive(Clone, Debug)]
pub struct Constraint {
    pub label: &'static str,
    pub a: LinearCombination,
    pub b: LinearCombination,
    pub c: LinearCombination,
}

/// Prover-side constraint system.
#[derive(Clone, Debug)]
pub struct ConstraintSystem {
    values: Vec<Fr>,
    public: Vec<Variable>,
    constraints: Vec<Constraint>,
}

impl Default for ConstraintSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintSystem {
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: vec![Fr::ONE],
            public: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Allocates a private witness variable.
    pub fn alloc(&mut self, value: Fr) -> Variable {
        self.values.push(value);
        Variable(self.values.len() - 1)
    }

    /// Marks a variable as the next public input.
    pub fn expose(&mut self, var: Variable) {
        self.public.push(var);
    }

    /// Allocates a witness equal to `lc` (one constraint).
    pub fn alloc_lc(&mut self, label: &'static str, lc: LinearCombination) -> Variable {
        let value = self.eval(&lc);
        let var = self.alloc(value);
        self.enforce_equal(label, lc, var.into());
        var
    }

    pub fn value(&self, var: Variable) -> Fr {
        self.values.get(var.0).copied().unwrap_or(Fr::ZERO)
    }

    pub fn eval(&self, lc: &LinearCombination) -> Fr {
        lc.terms
            .iter()
            .fold(Fr::ZERO, |acc, (var, coeff)| acc + self.value(*var) * *coeff)
    }

    /// Records `a * b = c`.
    pub fn enforce(
        &mut self,
        label: &'static str,
        a: LinearCombination,
        b: LinearCombination,
        c: LinearCombination,
    ) {
        self.constraints.push(Constraint { label, a, b, c });
    }

    /// Records `a * 1 = b`.
    pub fn enforce_equal(&mut self, label: &'static str, a: LinearCombination, b: LinearCombination) {
        self.enforce(label, a, LinearCombination::constant(Fr::ONE), b);
    }

    /// Public input values in exposure order.
    pub fn public_inputs(&self) -> Vec<Fr> {
        self.public.iter().map(|v| self.value(*v)).collect()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn num_variables(&self) -> usize {
        self.values.len()
    }

    /// Returns the label of the first unsatisfied constraint.
    pub fn first_unsatisfied(&self) -> Option<&'static str> {
        self.constraints
            .iter()
            .find(|c| self.eval(&c.a) * self.eval(&c.b) != self.eval(&c.c))
            .map(|c| c.label)
    }

    /// Digest of the circuit shape. Excludes every witness value.
    pub fn structure_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"seatbind.r1cs.v1");
        hasher.update((self.values.len() as u64).to_le_bytes());
        hasher.update((self.public.len() as u64).to_le_bytes());
        for var in &self.public {
            hasher.update((var.0 as u64).to_le_bytes());
        }
        hasher.update((self.constraints.len() as u64).to_le_bytes());
        for constraint in &self.constraints {
            hasher.update(constraint.label.as_bytes());
            for lc in [&constraint.a, &constraint.b, &constraint.c] {
                hasher.update((lc.terms.len() as u64).to_le_bytes());
                for (var, coeff) in &lc.terms {
                    hasher.update((var.0 as u64).to_le_bytes());
                    hasher.update(field::to_bytes(coeff));
                }
            }
        }
        hasher.finalize().into()
    }

    /// Hiding commitment to the full assignment.
    pub fn witness_commitment(&self, blinding: &[u8; 32]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"seatbind.witness.v1");
        hasher.update(blinding);
        for value in &self.values {
            hasher.update(field::to_bytes(value));
        }
        hasher.finalize().into()
    }
}
