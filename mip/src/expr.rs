use std::collections::BTreeMap;

use crate::{Flt, Var};

/// A linear expression `constant + sum(coefficient * var)`.
///
/// Terms are kept in insertion order; the same variable may appear several times until the
/// expression is handed to a back-end, which works on [`LinearExpression::collapsed`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpression {
    terms: Vec<(Flt, Var)>,
    constant: Flt,
}

impl LinearExpression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_term(coefficient: Flt, var: Var) -> Self {
        let mut expr = Self::new();
        expr.add_term(coefficient, var);
        expr
    }

    pub fn add_term(&mut self, coefficient: Flt, var: Var) -> &mut Self {
        self.terms.push((coefficient, var));
        self
    }

    pub fn add_constant(&mut self, value: Flt) -> &mut Self {
        self.constant += value;
        self
    }

    /// Adds `multiplier * other` to this expression.
    pub fn multi_add(&mut self, multiplier: Flt, other: &LinearExpression) -> &mut Self {
        self.terms.extend(
            other
                .terms
                .iter()
                .map(|&(coefficient, var)| (multiplier * coefficient, var)),
        );
        self.constant += multiplier * other.constant;
        self
    }

    pub fn clear(&mut self) {
        self.terms.clear();
        self.constant = 0.0;
    }

    pub fn terms(&self) -> &[(Flt, Var)] {
        &self.terms
    }

    pub fn constant(&self) -> Flt {
        self.constant
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Merges duplicate variables and drops zero coefficients. Sorted by variable.
    pub fn collapsed(&self) -> Vec<(Var, Flt)> {
        let mut merged: BTreeMap<Var, Flt> = BTreeMap::new();
        for &(coefficient, var) in &self.terms {
            *merged.entry(var).or_insert(0.0) += coefficient;
        }
        merged
            .into_iter()
            .filter(|&(_, coefficient)| coefficient != 0.0)
            .collect()
    }

    pub fn evaluate(&self, value_of: impl Fn(Var) -> Flt) -> Flt {
        self.constant
            + self
                .terms
                .iter()
                .map(|&(coefficient, var)| coefficient * value_of(var))
                .sum::<Flt>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_and_multi_add() {
        let (x, y) = (Var(0), Var(1));
        let mut expr = LinearExpression::new();
        expr.add_term(2.0, x).add_term(1.0, y).add_constant(3.0);

        let mut other = LinearExpression::from_term(-1.0, y);
        other.add_constant(1.0);
        expr.multi_add(1.0, &other);

        assert_eq!(expr.collapsed(), vec![(x, 2.0)]);
        assert_eq!(expr.constant(), 4.0);
        assert_eq!(expr.evaluate(|var| if var == x { 5.0 } else { 7.0 }), 14.0);

        expr.clear();
        assert!(expr.is_empty());
        assert_eq!(expr.constant(), 0.0);
    }
}
