use std::fmt::Debug;
use std::path::Path;

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use crate::{Flt, LinearExpression, SolverError, SolverKind};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(pub(crate) usize);

impl Var {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Debug for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("v#{}", self.0))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Constr(pub(crate) usize);

impl Constr {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Debug for Constr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("c#{}", self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    Continuous,
    Integer,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSense {
    LessEqual,
    Equal,
    GreaterEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationSense {
    Minimize,
    Maximize,
}

/// Outcome of the last call to [`Model::solve`].
///
/// `Feasible` means a solution exists but optimality was not proven, e.g. because the time
/// limit was hit. `NoSolution` means the solver stopped without any feasible solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum Status {
    Optimal = 1,
    Feasible = 2,
    Infeasible = 3,
    NoSolution = 4,
}

impl Status {
    pub fn has_solution(&self) -> bool {
        matches!(self, Status::Optimal | Status::Feasible)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntAttribute {
    NumVars,
    NumConstraints,
    NumIntVars,
    NumBinVars,
    /// The numeric code of [`Status`].
    Status,
    /// Wall clock seconds spent in the last solve.
    Runtime,
    SolutionCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleAttribute {
    ObjVal,
    MipGap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntParam {
    /// Time limit in seconds.
    Timelimit,
    OutputLevel,
    Threads,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleParam {
    MipGap,
}

/// A mixed-integer program held by one solver back-end.
pub trait Model {
    fn kind(&self) -> SolverKind;

    fn name(&self) -> &str;

    // VARIABLES

    fn add_variable(
        &mut self,
        lower: Flt,
        upper: Flt,
        var_type: VariableType,
        objective: Flt,
        name: &str,
    ) -> Result<Var, SolverError>;

    fn variable_by_name(&self, name: &str) -> Option<Var>;

    /// Supplies a start value for the next solve.
    fn set_start(&mut self, var: Var, value: Flt) -> Result<(), SolverError>;

    fn value(&self, var: Var) -> Result<Flt, SolverError>;

    // CONSTRAINTS

    fn add_constraint(
        &mut self,
        expr: &LinearExpression,
        sense: ConstraintSense,
        rhs: Flt,
        name: &str,
    ) -> Result<Constr, SolverError>;

    // OBJECTIVE

    /// Replaces the objective coefficients of all variables by the given expression.
    fn set_objective(&mut self, expr: &LinearExpression) -> Result<(), SolverError>;

    fn set_sense(&mut self, sense: OptimizationSense) -> Result<(), SolverError>;

    // SOLVING

    fn solve(&mut self) -> Result<(), SolverError>;

    fn write(&self, path: &Path) -> Result<(), SolverError>;

    /// Computes an irreducible infeasible subsystem and writes it to `path`.
    fn compute_iis(&mut self, path: &Path) -> Result<(), SolverError>;

    fn int_attribute(&self, attribute: IntAttribute) -> Result<i64, SolverError>;

    fn double_attribute(&self, attribute: DoubleAttribute) -> Result<Flt, SolverError>;

    fn set_int_param(&mut self, param: IntParam, value: i64) -> Result<(), SolverError>;

    fn set_double_param(&mut self, param: DoubleParam, value: Flt) -> Result<(), SolverError>;

    fn status(&self) -> Result<Status, SolverError> {
        let code = self.int_attribute(IntAttribute::Status)?;
        Status::from_i64(code)
            .ok_or_else(|| SolverError::Backend(format!("Unknown status code {}.", code)))
    }

    fn num_solutions(&self) -> Result<i64, SolverError> {
        self.int_attribute(IntAttribute::SolutionCount)
    }
}
