//! Dense two-phase primal simplex with Bland's rule.
//!
//! Variables may have arbitrary (also infinite) bounds. They are mapped onto non-negative
//! columns before the tableau is built, finite upper bounds become explicit rows.

use crate::{ConstraintSense, Flt};

const PIVOT_EPS: Flt = 1e-9;
const COST_EPS: Flt = 1e-9;
const ZERO_EPS: Flt = 1e-12;
const MAX_PIVOTS: usize = 500_000;

pub(crate) struct LpRow<'a> {
    pub coefficients: &'a [(usize, Flt)],
    pub sense: ConstraintSense,
    pub rhs: Flt,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LpOutcome {
    Optimal { x: Vec<Flt>, objective: Flt },
    Infeasible,
    Unbounded,
    IterationLimit,
}

enum Column {
    Fixed(Flt),
    /// `x = offset + y`
    Shifted { col: usize, offset: Flt },
    /// `x = offset - y`
    Mirrored { col: usize, offset: Flt },
    /// `x = y_pos - y_neg`
    Split { pos: usize, neg: usize },
}

struct Tableau {
    a: Vec<Vec<Flt>>,
    b: Vec<Flt>,
    basis: Vec<usize>,
    width: usize,
}

impl Tableau {
    fn pivot(&mut self, r: usize, e: usize, d: &mut [Flt], z: &mut Flt) {
        let p = self.a[r][e];
        for v in self.a[r].iter_mut() {
            *v /= p;
        }
        self.b[r] /= p;
        let pivot_row = self.a[r].clone();
        let pivot_b = self.b[r];

        for i in 0..self.a.len() {
            if i == r {
                continue;
            }
            let factor = self.a[i][e];
            if factor.abs() < ZERO_EPS {
                continue;
            }
            for (v, pv) in self.a[i].iter_mut().zip(pivot_row.iter()) {
                *v -= factor * pv;
                if v.abs() < ZERO_EPS {
                    *v = 0.0;
                }
            }
            self.b[i] -= factor * pivot_b;
            if self.b[i].abs() < ZERO_EPS || (self.b[i] < 0.0 && self.b[i] > -PIVOT_EPS) {
                self.b[i] = 0.0;
            }
        }

        let factor = d[e];
        if factor != 0.0 {
            for (v, pv) in d.iter_mut().zip(pivot_row.iter()) {
                *v -= factor * pv;
            }
            *z += factor * pivot_b;
        }
        self.basis[r] = e;
    }

    /// Computes the reduced costs and the objective value of the current basis.
    fn reduced_costs(&self, costs: &[Flt]) -> (Vec<Flt>, Flt) {
        let mut d = costs.to_vec();
        let mut z = 0.0;
        for (i, &basic) in self.basis.iter().enumerate() {
            let cost = costs[basic];
            if cost == 0.0 {
                continue;
            }
            for (v, a) in d.iter_mut().zip(self.a[i].iter()) {
                *v -= cost * a;
            }
            z += cost * self.b[i];
        }
        (d, z)
    }

    fn run(
        &mut self,
        d: &mut [Flt],
        z: &mut Flt,
        allowed: impl Fn(usize) -> bool,
    ) -> Result<(), LpOutcome> {
        for _ in 0..MAX_PIVOTS {
            let Some(entering) = (0..self.width).find(|&j| allowed(j) && d[j] < -COST_EPS) else {
                return Ok(());
            };

            let mut leaving: Option<(usize, Flt)> = None;
            for i in 0..self.a.len() {
                let coefficient = self.a[i][entering];
                if coefficient <= PIVOT_EPS {
                    continue;
                }
                let ratio = self.b[i] / coefficient;
                leaving = match leaving {
                    None => Some((i, ratio)),
                    Some((r, best)) => {
                        if ratio < best - ZERO_EPS
                            || (ratio <= best + ZERO_EPS && self.basis[i] < self.basis[r])
                        {
                            Some((i, ratio))
                        } else {
                            Some((r, best))
                        }
                    }
                };
            }
            let Some((r, _)) = leaving else {
                return Err(LpOutcome::Unbounded);
            };
            self.pivot(r, entering, d, z);
        }
        Err(LpOutcome::IterationLimit)
    }
}

/// Minimizes `costs * x` subject to the rows and `lower <= x <= upper`.
pub(crate) fn solve_lp(costs: &[Flt], rows: &[LpRow], lower: &[Flt], upper: &[Flt]) -> LpOutcome {
    let n = costs.len();

    let mut columns = Vec::with_capacity(n);
    let mut num_cols = 0;
    let mut bound_rows: Vec<(usize, Flt)> = Vec::new();
    for j in 0..n {
        let (l, u) = (lower[j], upper[j]);
        if l > u + PIVOT_EPS {
            return LpOutcome::Infeasible;
        }
        let column = if l.is_finite() && u.is_finite() && (u - l).abs() <= PIVOT_EPS {
            Column::Fixed(l)
        } else if l.is_finite() {
            let col = num_cols;
            num_cols += 1;
            if u.is_finite() {
                bound_rows.push((col, u - l));
            }
            Column::Shifted { col, offset: l }
        } else if u.is_finite() {
            let col = num_cols;
            num_cols += 1;
            Column::Mirrored { col, offset: u }
        } else {
            let pos = num_cols;
            num_cols += 2;
            Column::Split { pos, neg: pos + 1 }
        };
        columns.push(column);
    }

    // Rows over the non-negative columns, rhs made non-negative.
    let mut dense_rows: Vec<(Vec<Flt>, ConstraintSense, Flt)> = Vec::new();
    for row in rows {
        let mut dense = vec![0.0; num_cols];
        let mut rhs = row.rhs;
        for &(j, coefficient) in row.coefficients {
            match columns[j] {
                Column::Fixed(value) => rhs -= coefficient * value,
                Column::Shifted { col, offset } => {
                    dense[col] += coefficient;
                    rhs -= coefficient * offset;
                }
                Column::Mirrored { col, offset } => {
                    dense[col] -= coefficient;
                    rhs -= coefficient * offset;
                }
                Column::Split { pos, neg } => {
                    dense[pos] += coefficient;
                    dense[neg] -= coefficient;
                }
            }
        }
        if dense.iter().all(|v| v.abs() < ZERO_EPS) {
            let satisfied = match row.sense {
                ConstraintSense::LessEqual => 0.0 <= rhs + 1e-7,
                ConstraintSense::Equal => rhs.abs() <= 1e-7,
                ConstraintSense::GreaterEqual => 0.0 >= rhs - 1e-7,
            };
            if !satisfied {
                return LpOutcome::Infeasible;
            }
            continue;
        }
        dense_rows.push((dense, row.sense, rhs));
    }
    for (col, bound) in bound_rows {
        let mut dense = vec![0.0; num_cols];
        dense[col] = 1.0;
        dense_rows.push((dense, ConstraintSense::LessEqual, bound));
    }
    for (dense, sense, rhs) in dense_rows.iter_mut() {
        if *rhs < 0.0 {
            dense.iter_mut().for_each(|v| *v = -*v);
            *rhs = -*rhs;
            *sense = match sense {
                ConstraintSense::LessEqual => ConstraintSense::GreaterEqual,
                ConstraintSense::Equal => ConstraintSense::Equal,
                ConstraintSense::GreaterEqual => ConstraintSense::LessEqual,
            };
        }
    }

    let m = dense_rows.len();
    let num_slacks = dense_rows
        .iter()
        .filter(|(_, sense, _)| *sense != ConstraintSense::Equal)
        .count();
    let num_artificials = dense_rows
        .iter()
        .filter(|(_, sense, _)| *sense != ConstraintSense::LessEqual)
        .count();
    let slack_start = num_cols;
    let art_start = num_cols + num_slacks;
    let width = art_start + num_artificials;

    let mut tableau = Tableau {
        a: Vec::with_capacity(m),
        b: Vec::with_capacity(m),
        basis: Vec::with_capacity(m),
        width,
    };
    let (mut next_slack, mut next_art) = (slack_start, art_start);
    for (dense, sense, rhs) in dense_rows {
        let mut row = dense;
        row.resize(width, 0.0);
        match sense {
            ConstraintSense::LessEqual => {
                row[next_slack] = 1.0;
                tableau.basis.push(next_slack);
                next_slack += 1;
            }
            ConstraintSense::GreaterEqual => {
                row[next_slack] = -1.0;
                next_slack += 1;
                row[next_art] = 1.0;
                tableau.basis.push(next_art);
                next_art += 1;
            }
            ConstraintSense::Equal => {
                row[next_art] = 1.0;
                tableau.basis.push(next_art);
                next_art += 1;
            }
        }
        tableau.a.push(row);
        tableau.b.push(rhs);
    }

    // Phase 1: minimize the sum of artificials.
    if num_artificials > 0 {
        let mut phase_one_costs = vec![0.0; width];
        phase_one_costs[art_start..].iter_mut().for_each(|c| *c = 1.0);
        let (mut d, mut z) = tableau.reduced_costs(&phase_one_costs);
        if let Err(outcome) = tableau.run(&mut d, &mut z, |_| true) {
            // Phase 1 is bounded below by zero.
            return match outcome {
                LpOutcome::Unbounded => LpOutcome::Infeasible,
                other => other,
            };
        }
        let scale = tableau.b.iter().fold(1.0 as Flt, |acc, v| acc.max(v.abs()));
        if z > 1e-7 * scale {
            return LpOutcome::Infeasible;
        }
        // Drive remaining artificials out of the basis where possible.
        let mut dummy_d = vec![0.0; width];
        let mut dummy_z = 0.0;
        for i in 0..m {
            if tableau.basis[i] < art_start {
                continue;
            }
            if let Some(j) = (0..art_start).find(|&j| tableau.a[i][j].abs() > PIVOT_EPS) {
                tableau.pivot(i, j, &mut dummy_d, &mut dummy_z);
            }
        }
    }

    // Phase 2
    let mut phase_two_costs = vec![0.0; width];
    for (j, column) in columns.iter().enumerate() {
        match *column {
            Column::Fixed(_) => {}
            Column::Shifted { col, .. } => phase_two_costs[col] = costs[j],
            Column::Mirrored { col, .. } => phase_two_costs[col] = -costs[j],
            Column::Split { pos, neg } => {
                phase_two_costs[pos] = costs[j];
                phase_two_costs[neg] = -costs[j];
            }
        }
    }
    let (mut d, mut z) = tableau.reduced_costs(&phase_two_costs);
    if let Err(outcome) = tableau.run(&mut d, &mut z, |j| j < art_start) {
        return outcome;
    }

    let mut values = vec![0.0; width];
    for (i, &basic) in tableau.basis.iter().enumerate() {
        values[basic] = tableau.b[i];
    }
    let x: Vec<Flt> = columns
        .iter()
        .map(|column| match *column {
            Column::Fixed(value) => value,
            Column::Shifted { col, offset } => offset + values[col],
            Column::Mirrored { col, offset } => offset - values[col],
            Column::Split { pos, neg } => values[pos] - values[neg],
        })
        .collect();
    let objective = costs.iter().zip(x.iter()).map(|(c, v)| c * v).sum();
    LpOutcome::Optimal { x, objective }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(coefficients: &[(usize, Flt)], sense: ConstraintSense, rhs: Flt) -> LpRow<'_> {
        LpRow {
            coefficients,
            sense,
            rhs,
        }
    }

    #[test]
    fn test_bounded_maximization() {
        // max x + y  s.t.  x + 2y <= 4, 3x + y <= 6, x, y >= 0
        let c1 = [(0, 1.0), (1, 2.0)];
        let c2 = [(0, 3.0), (1, 1.0)];
        let rows = [
            row(&c1, ConstraintSense::LessEqual, 4.0),
            row(&c2, ConstraintSense::LessEqual, 6.0),
        ];
        let LpOutcome::Optimal { x, objective } =
            solve_lp(&[-1.0, -1.0], &rows, &[0.0, 0.0], &[f64::INFINITY; 2])
        else {
            panic!("LP should be optimal");
        };
        assert!((objective + 2.8).abs() < 1e-7);
        assert!((x[0] - 1.6).abs() < 1e-7);
        assert!((x[1] - 1.2).abs() < 1e-7);
    }

    #[test]
    fn test_equality_and_free_variable() {
        // min x  s.t.  x - y = -3, y in [1, 2], x free
        let c = [(0, 1.0), (1, -1.0)];
        let rows = [row(&c, ConstraintSense::Equal, -3.0)];
        let LpOutcome::Optimal { x, .. } = solve_lp(
            &[1.0, 0.0],
            &rows,
            &[f64::NEG_INFINITY, 1.0],
            &[f64::INFINITY, 2.0],
        ) else {
            panic!("LP should be optimal");
        };
        assert!((x[0] + 2.0).abs() < 1e-7);
        assert!((x[1] - 1.0).abs() < 1e-7);
    }

    #[test]
    fn test_infeasible_and_unbounded() {
        let c = [(0, 1.0)];
        let rows = [row(&c, ConstraintSense::GreaterEqual, 5.0)];
        assert_eq!(
            solve_lp(&[1.0], &rows, &[0.0], &[4.0]),
            LpOutcome::Infeasible
        );
        assert_eq!(
            solve_lp(&[-1.0], &rows, &[0.0], &[f64::INFINITY]),
            LpOutcome::Unbounded
        );
    }
}
