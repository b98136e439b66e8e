//! Built-in back-end: depth-first branch-and-bound over the LP relaxation.
//!
//! Meant for small and medium models and for running the test suite without a commercial
//! solver. It is single-threaded, `Threads` is accepted and ignored.

mod lp_file;
mod simplex;

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, info};
use num_traits::ToPrimitive;

use crate::{
    ConstraintSense, Constr, DoubleAttribute, DoubleParam, Flt, IntAttribute, IntParam,
    LinearExpression, Model, OptimizationSense, SolverError, SolverKind, Status, Var,
    VariableType,
};

use simplex::{LpOutcome, LpRow, solve_lp};

const INTEGRALITY_EPS: Flt = 1e-6;
const FEASIBILITY_EPS: Flt = 1e-6;

#[derive(Debug, Clone)]
pub(crate) struct Variable {
    pub name: String,
    pub lower: Flt,
    pub upper: Flt,
    pub var_type: VariableType,
    pub objective: Flt,
    pub start: Option<Flt>,
}

impl Variable {
    fn is_integral(&self) -> bool {
        self.var_type != VariableType::Continuous
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Constraint {
    pub name: String,
    pub coefficients: Vec<(usize, Flt)>,
    pub sense: ConstraintSense,
    pub rhs: Flt,
}

#[derive(Debug, Clone)]
struct Params {
    time_limit: Option<Duration>,
    mip_gap: Flt,
    output_level: i64,
    threads: i64,
}

struct Solution {
    values: Vec<Flt>,
    objective: Flt,
}

struct BranchNode {
    lower: Vec<Flt>,
    upper: Vec<Flt>,
    bound: Flt,
}

struct SearchResult {
    incumbent: Option<Solution>,
    num_solutions: usize,
    exhausted: bool,
    best_bound: Flt,
}

pub struct NativeModel {
    name: String,
    variables: Vec<Variable>,
    variable_by_name: HashMap<String, Var>,
    constraints: Vec<Constraint>,
    objective_constant: Flt,
    sense: OptimizationSense,
    params: Params,

    status: Status,
    solution: Option<Solution>,
    num_solutions: usize,
    runtime: Duration,
    mip_gap: Flt,
}

impl NativeModel {
    pub fn new(name: &str) -> Self {
        NativeModel {
            name: name.into(),
            variables: Vec::new(),
            variable_by_name: HashMap::new(),
            constraints: Vec::new(),
            objective_constant: 0.0,
            sense: OptimizationSense::Minimize,
            params: Params {
                time_limit: None,
                mip_gap: 0.0,
                output_level: 0,
                threads: 0,
            },
            status: Status::NoSolution,
            solution: None,
            num_solutions: 0,
            runtime: Duration::ZERO,
            mip_gap: 0.0,
        }
    }

    fn check_var(&self, var: Var) -> Result<&Variable, SolverError> {
        self.variables
            .get(var.0)
            .ok_or_else(|| SolverError::UnknownVariable(format!("{:?}", var)))
    }

    /// Objective coefficients of the equivalent minimization problem.
    fn min_costs(&self) -> Vec<Flt> {
        let factor = match self.sense {
            OptimizationSense::Minimize => 1.0,
            OptimizationSense::Maximize => -1.0,
        };
        self.variables.iter().map(|v| factor * v.objective).collect()
    }

    fn root_bounds(&self) -> (Vec<Flt>, Vec<Flt>) {
        self.variables
            .iter()
            .map(|v| match v.var_type {
                VariableType::Continuous => (v.lower, v.upper),
                VariableType::Integer => (
                    (v.lower - INTEGRALITY_EPS).ceil(),
                    (v.upper + INTEGRALITY_EPS).floor(),
                ),
                VariableType::Binary => (
                    v.lower.max(0.0).ceil(),
                    v.upper.min(1.0).floor(),
                ),
            })
            .unzip()
    }

    fn solve_relaxation(
        &self,
        costs: &[Flt],
        active: &[bool],
        lower: &[Flt],
        upper: &[Flt],
    ) -> Result<LpOutcome, SolverError> {
        let rows: Vec<LpRow> = self
            .constraints
            .iter()
            .zip(active.iter())
            .filter(|(_, &is_active)| is_active)
            .map(|(c, _)| LpRow {
                coefficients: &c.coefficients,
                sense: c.sense,
                rhs: c.rhs,
            })
            .collect();
        match solve_lp(costs, &rows, lower, upper) {
            LpOutcome::IterationLimit => Err(SolverError::Backend(format!(
                "Simplex iteration limit reached in model {}.",
                self.name
            ))),
            outcome => Ok(outcome),
        }
    }

    fn most_fractional(&self, x: &[Flt]) -> Option<usize> {
        self.variables
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_integral())
            .map(|(j, _)| (j, (x[j] - x[j].round()).abs()))
            .filter(|&(_, frac)| frac > INTEGRALITY_EPS)
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(j, _)| j)
    }

    /// Tries to turn the start values into an incumbent by fixing all integral variables.
    fn start_solution(&self, costs: &[Flt], active: &[bool]) -> Result<Option<Solution>, SolverError> {
        if !self
            .variables
            .iter()
            .filter(|v| v.is_integral())
            .all(|v| v.start.is_some())
        {
            return Ok(None);
        }
        let (mut lower, mut upper) = self.root_bounds();
        for (j, variable) in self.variables.iter().enumerate() {
            if let (true, Some(start)) = (variable.is_integral(), variable.start) {
                let value = start.round();
                if value < lower[j] - FEASIBILITY_EPS || value > upper[j] + FEASIBILITY_EPS {
                    return Ok(None);
                }
                lower[j] = value;
                upper[j] = value;
            }
        }
        Ok(match self.solve_relaxation(costs, active, &lower, &upper)? {
            LpOutcome::Optimal { x, objective } => Some(Solution {
                values: x,
                objective,
            }),
            _ => None,
        })
    }

    fn branch_and_bound(
        &self,
        costs: &[Flt],
        active: &[bool],
        initial: Option<Solution>,
        stop_at_first: bool,
        started: Instant,
    ) -> Result<SearchResult, SolverError> {
        let (lower, upper) = self.root_bounds();
        let mut num_solutions = usize::from(initial.is_some());
        let mut incumbent = initial;
        let mut stack = vec![BranchNode {
            lower,
            upper,
            bound: Flt::NEG_INFINITY,
        }];
        let mut explored = 0usize;

        while let Some(node) = stack.pop() {
            if let Some(limit) = self.params.time_limit {
                if started.elapsed() >= limit {
                    stack.push(node);
                    break;
                }
            }
            if let Some(best) = &incumbent {
                if node.bound >= best.objective - self.prune_tolerance(best.objective) {
                    continue;
                }
            }
            explored += 1;

            let (x, objective) =
                match self.solve_relaxation(costs, active, &node.lower, &node.upper)? {
                    LpOutcome::Optimal { x, objective } => (x, objective),
                    LpOutcome::Infeasible => continue,
                    LpOutcome::Unbounded if incumbent.is_none() && explored == 1 => {
                        return Err(SolverError::Unbounded(self.name.clone()));
                    }
                    _ => continue,
                };
            if let Some(best) = &incumbent {
                if objective >= best.objective - self.prune_tolerance(best.objective) {
                    continue;
                }
            }

            let Some(j) = self.most_fractional(&x) else {
                if self.params.output_level > 0 {
                    info!(
                        "{}: new incumbent {} after {} nodes",
                        self.name, objective, explored
                    );
                }
                incumbent = Some(Solution {
                    values: x,
                    objective,
                });
                num_solutions += 1;
                if stop_at_first {
                    break;
                }
                continue;
            };

            let value = x[j];
            let mut down = BranchNode {
                lower: node.lower.clone(),
                upper: node.upper.clone(),
                bound: objective,
            };
            down.upper[j] = value.floor();
            let mut up = BranchNode {
                lower: node.lower,
                upper: node.upper,
                bound: objective,
            };
            up.lower[j] = value.ceil();

            // The branch closer to the relaxation value is explored first.
            if value - value.floor() < 0.5 {
                stack.push(up);
                stack.push(down);
            } else {
                stack.push(down);
                stack.push(up);
            }
        }

        debug!("{}: explored {} branch-and-bound nodes", self.name, explored);
        let best_bound = stack
            .iter()
            .map(|node| node.bound)
            .fold(Flt::INFINITY, Flt::min);
        Ok(SearchResult {
            exhausted: stack.is_empty(),
            incumbent,
            num_solutions,
            best_bound,
        })
    }

    fn prune_tolerance(&self, objective: Flt) -> Flt {
        FEASIBILITY_EPS.max(self.params.mip_gap * objective.abs())
    }
}

impl Model for NativeModel {
    fn kind(&self) -> SolverKind {
        SolverKind::Native
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn add_variable(
        &mut self,
        lower: Flt,
        upper: Flt,
        var_type: VariableType,
        objective: Flt,
        name: &str,
    ) -> Result<Var, SolverError> {
        let var = Var(self.variables.len());
        let name = if name.is_empty() {
            format!("x{}", var.0)
        } else {
            name.to_string()
        };
        self.variable_by_name.insert(name.clone(), var);
        self.variables.push(Variable {
            name,
            lower,
            upper,
            var_type,
            objective,
            start: None,
        });
        Ok(var)
    }

    fn variable_by_name(&self, name: &str) -> Option<Var> {
        self.variable_by_name.get(name).copied()
    }

    fn set_start(&mut self, var: Var, value: Flt) -> Result<(), SolverError> {
        self.check_var(var)?;
        self.variables[var.0].start = Some(value);
        Ok(())
    }

    fn value(&self, var: Var) -> Result<Flt, SolverError> {
        self.check_var(var)?;
        let Some(solution) = &self.solution else {
            return Err(SolverError::Backend(format!(
                "No solution available for model {}.",
                self.name
            )));
        };
        Ok(solution.values[var.0])
    }

    fn add_constraint(
        &mut self,
        expr: &LinearExpression,
        sense: ConstraintSense,
        rhs: Flt,
        name: &str,
    ) -> Result<Constr, SolverError> {
        let mut coefficients = Vec::with_capacity(expr.terms().len());
        for (var, coefficient) in expr.collapsed() {
            self.check_var(var)?;
            coefficients.push((var.0, coefficient));
        }
        let constr = Constr(self.constraints.len());
        self.constraints.push(Constraint {
            name: if name.is_empty() {
                format!("c{}", constr.0)
            } else {
                name.to_string()
            },
            coefficients,
            sense,
            rhs: rhs - expr.constant(),
        });
        Ok(constr)
    }

    fn set_objective(&mut self, expr: &LinearExpression) -> Result<(), SolverError> {
        for variable in self.variables.iter_mut() {
            variable.objective = 0.0;
        }
        for (var, coefficient) in expr.collapsed() {
            self.check_var(var)?;
            self.variables[var.0].objective = coefficient;
        }
        self.objective_constant = expr.constant();
        Ok(())
    }

    fn set_sense(&mut self, sense: OptimizationSense) -> Result<(), SolverError> {
        self.sense = sense;
        Ok(())
    }

    fn solve(&mut self) -> Result<(), SolverError> {
        let started = Instant::now();
        let costs = self.min_costs();
        let active = vec![true; self.constraints.len()];

        let initial = self.start_solution(&costs, &active)?;
        if initial.is_some() {
            debug!("{}: start values form a feasible solution", self.name);
        }
        let result = self.branch_and_bound(&costs, &active, initial, false, started)?;

        self.runtime = started.elapsed();
        self.num_solutions = result.num_solutions;
        self.status = match (result.exhausted, result.incumbent.is_some()) {
            (true, true) => Status::Optimal,
            (true, false) => Status::Infeasible,
            (false, true) => Status::Feasible,
            (false, false) => Status::NoSolution,
        };
        self.mip_gap = match (&result.incumbent, result.exhausted) {
            (Some(_), true) => 0.0,
            (Some(best), false) => {
                (best.objective - result.best_bound).max(0.0) / best.objective.abs().max(1e-10)
            }
            (None, _) => Flt::INFINITY,
        };
        let sign = match self.sense {
            OptimizationSense::Minimize => 1.0,
            OptimizationSense::Maximize => -1.0,
        };
        self.solution = result.incumbent.map(|best| Solution {
            objective: sign * best.objective + self.objective_constant,
            values: best.values,
        });
        if self.params.output_level > 0 {
            info!(
                "{}: status {:?} after {:.2}s",
                self.name,
                self.status,
                self.runtime.as_secs_f64()
            );
        }
        Ok(())
    }

    fn write(&self, path: &Path) -> Result<(), SolverError> {
        let content = lp_file::render(
            &self.name,
            self.sense,
            &self.variables,
            self.objective_constant,
            &self.constraints,
            |_| true,
        );
        std::fs::write(path, content).map_err(|e| {
            SolverError::Backend(format!("Could not write {}: {}", path.display(), e))
        })
    }

    fn compute_iis(&mut self, path: &Path) -> Result<(), SolverError> {
        let costs = vec![0.0; self.variables.len()];
        let mut active = vec![true; self.constraints.len()];
        let feasible = |model: &Self, active: &[bool]| -> Result<bool, SolverError> {
            let result = model.branch_and_bound(&costs, active, None, true, Instant::now())?;
            Ok(result.incumbent.is_some())
        };
        if feasible(self, &active)? {
            return Err(SolverError::Backend(format!(
                "Model {} is feasible, there is no IIS.",
                self.name
            )));
        }
        // Deletion filter: drop every constraint whose removal keeps the system infeasible.
        for index in 0..active.len() {
            active[index] = false;
            if feasible(self, &active)? {
                active[index] = true;
            }
        }
        let content = lp_file::render(
            &format!("{} (IIS)", self.name),
            self.sense,
            &self.variables,
            self.objective_constant,
            &self.constraints,
            |index| active[index],
        );
        std::fs::write(path, content).map_err(|e| {
            SolverError::Backend(format!("Could not write {}: {}", path.display(), e))
        })
    }

    fn int_attribute(&self, attribute: IntAttribute) -> Result<i64, SolverError> {
        let count = |f: &dyn Fn(&Variable) -> bool| self.variables.iter().filter(|v| f(v)).count();
        Ok(match attribute {
            IntAttribute::NumVars => self.variables.len() as i64,
            IntAttribute::NumConstraints => self.constraints.len() as i64,
            IntAttribute::NumIntVars => count(&|v| v.is_integral()) as i64,
            IntAttribute::NumBinVars => count(&|v| v.var_type == VariableType::Binary) as i64,
            IntAttribute::Status => self.status.to_i64().unwrap_or_default(),
            IntAttribute::Runtime => self.runtime.as_secs() as i64,
            IntAttribute::SolutionCount => self.num_solutions as i64,
        })
    }

    fn double_attribute(&self, attribute: DoubleAttribute) -> Result<Flt, SolverError> {
        match attribute {
            DoubleAttribute::ObjVal => self
                .solution
                .as_ref()
                .map(|s| s.objective)
                .ok_or_else(|| {
                    SolverError::Backend(format!("No objective value for model {}.", self.name))
                }),
            DoubleAttribute::MipGap => Ok(self.mip_gap),
        }
    }

    fn set_int_param(&mut self, param: IntParam, value: i64) -> Result<(), SolverError> {
        match param {
            IntParam::Timelimit => {
                self.params.time_limit = (value > 0).then(|| Duration::from_secs(value as u64))
            }
            IntParam::OutputLevel => self.params.output_level = value,
            IntParam::Threads => {
                self.params.threads = value;
                debug!("{}: ignoring thread limit {}", self.name, value);
            }
        }
        Ok(())
    }

    fn set_double_param(&mut self, param: DoubleParam, value: Flt) -> Result<(), SolverError> {
        match param {
            DoubleParam::MipGap => self.params.mip_gap = value.max(0.0),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knapsack() {
        // max 5a + 4b + 3c  s.t.  2a + 3b + c <= 5, 4a + b + 2c <= 11, 3a + 4b + 2c <= 8
        let mut model = NativeModel::new("knapsack");
        let a = model.add_variable(0.0, 10.0, VariableType::Integer, 5.0, "a").unwrap();
        let b = model.add_variable(0.0, 10.0, VariableType::Integer, 4.0, "b").unwrap();
        let c = model.add_variable(0.0, 10.0, VariableType::Integer, 3.0, "c").unwrap();
        for (coefficients, rhs) in [([2.0, 3.0, 1.0], 5.0), ([4.0, 1.0, 2.0], 11.0), ([3.0, 4.0, 2.0], 8.0)] {
            let mut expr = LinearExpression::new();
            expr.add_term(coefficients[0], a)
                .add_term(coefficients[1], b)
                .add_term(coefficients[2], c);
            model
                .add_constraint(&expr, ConstraintSense::LessEqual, rhs, "")
                .unwrap();
        }
        model.set_sense(OptimizationSense::Maximize).unwrap();
        model.solve().unwrap();

        assert_eq!(model.status().unwrap(), Status::Optimal);
        assert!((model.double_attribute(DoubleAttribute::ObjVal).unwrap() - 13.0).abs() < 1e-6);
        assert!((model.value(a).unwrap() - 2.0).abs() < 1e-6);
        assert!((model.value(b).unwrap()).abs() < 1e-6);
        assert!((model.value(c).unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(model.int_attribute(IntAttribute::NumIntVars).unwrap(), 3);
        assert_eq!(model.variable_by_name("b"), Some(b));
    }

    #[test]
    fn test_free_integer_modulo() {
        // min x  s.t.  x - 10 z = 3, x in [0, 100], z free integer
        let mut model = NativeModel::new("modulo");
        let x = model.add_variable(0.0, 100.0, VariableType::Integer, 1.0, "x").unwrap();
        let z = model
            .add_variable(f64::NEG_INFINITY, f64::INFINITY, VariableType::Integer, 0.0, "z")
            .unwrap();
        let mut expr = LinearExpression::new();
        expr.add_term(1.0, x).add_term(-10.0, z);
        model.add_constraint(&expr, ConstraintSense::Equal, 3.0, "").unwrap();
        model.set_start(x, 53.0).unwrap();
        model.set_start(z, 5.0).unwrap();
        model.solve().unwrap();

        assert_eq!(model.status().unwrap(), Status::Optimal);
        assert!((model.value(x).unwrap() - 3.0).abs() < 1e-6);
        assert!(model.value(z).unwrap().abs() < 1e-6);
        assert!(model.num_solutions().unwrap() >= 2);
    }

    #[test]
    fn test_infeasible_writes_iis() {
        let mut model = NativeModel::new("infeasible");
        let x = model.add_variable(0.0, 10.0, VariableType::Binary, 1.0, "x").unwrap();
        let y = model.add_variable(0.0, 10.0, VariableType::Continuous, 1.0, "y").unwrap();
        model
            .add_constraint(&LinearExpression::from_term(1.0, y), ConstraintSense::LessEqual, 4.0, "y_small")
            .unwrap();
        let mut expr = LinearExpression::new();
        expr.add_term(1.0, x).add_term(1.0, y);
        model
            .add_constraint(&expr, ConstraintSense::GreaterEqual, 6.0, "sum_large")
            .unwrap();
        model
            .add_constraint(&LinearExpression::from_term(1.0, x), ConstraintSense::GreaterEqual, 0.0, "redundant")
            .unwrap();
        model.solve().unwrap();
        assert_eq!(model.status().unwrap(), Status::Infeasible);
        assert!(model.value(x).is_err());

        let path = std::env::temp_dir().join("mip-native-test.ilp");
        model.compute_iis(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("y_small"));
        assert!(content.contains("sum_large"));
        assert!(!content.contains("redundant:"));
    }
}
