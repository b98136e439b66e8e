pub mod expr;
pub mod model;
pub mod native;

#[cfg(feature = "gurobi")]
pub mod gurobi;

use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

pub use expr::LinearExpression;
pub use model::{
    ConstraintSense, Constr, DoubleAttribute, DoubleParam, IntAttribute, IntParam, Model,
    OptimizationSense, Status, Var, VariableType,
};

pub type Flt = f64;

/// The value used for unbounded variable bounds.
pub const INFINITY: Flt = f64::INFINITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverKind {
    Gurobi,
    Cplex,
    Xpress,
    Glpk,
    Native,
}

impl Display for SolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SolverKind::Gurobi => "GUROBI",
            SolverKind::Cplex => "CPLEX",
            SolverKind::Xpress => "XPRESS",
            SolverKind::Glpk => "GLPK",
            SolverKind::Native => "NATIVE",
        })
    }
}

impl FromStr for SolverKind {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GUROBI" => Ok(SolverKind::Gurobi),
            "CPLEX" => Ok(SolverKind::Cplex),
            "XPRESS" => Ok(SolverKind::Xpress),
            "GLPK" => Ok(SolverKind::Glpk),
            "NATIVE" => Ok(SolverKind::Native),
            other => Err(SolverError::UnknownSolver(other.into())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("S1: attribute {attribute} is not implemented for solver {solver}")]
    AttributeNotImplemented {
        solver: SolverKind,
        attribute: String,
    },

    #[error("S2: parameter {param} is not implemented for solver {solver}")]
    ParamNotImplemented { solver: SolverKind, param: String },

    #[error("S3: solver {0} is not available in this build")]
    SolverNotAvailable(SolverKind),

    #[error("S3: unknown solver {0}")]
    UnknownSolver(String),

    #[error("S4: solver back-end failure: {0}")]
    Backend(String),

    #[error("S5: unknown variable {0}")]
    UnknownVariable(String),

    #[error("S6: model {0} is unbounded")]
    Unbounded(String),
}

/// Creates an empty model for the given solver kind.
pub fn create_model(kind: SolverKind, name: &str) -> Result<Box<dyn Model>, SolverError> {
    match kind {
        SolverKind::Native => Ok(Box::new(native::NativeModel::new(name))),
        #[cfg(feature = "gurobi")]
        SolverKind::Gurobi => Ok(Box::new(gurobi::GurobiModel::new(name)?)),
        other => Err(SolverError::SolverNotAvailable(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_solver_kind() {
        assert_eq!("xpress".parse::<SolverKind>(), Ok(SolverKind::Xpress));
        assert_eq!(" GUROBI ".parse::<SolverKind>(), Ok(SolverKind::Gurobi));
        assert!("SCIP".parse::<SolverKind>().is_err());
        assert_eq!(SolverKind::Cplex.to_string(), "CPLEX");
    }

    #[test]
    fn test_factory() {
        let model = create_model(SolverKind::Native, "m").unwrap();
        assert_eq!(model.kind(), SolverKind::Native);
        assert!(matches!(
            create_model(SolverKind::Glpk, "m"),
            Err(SolverError::SolverNotAvailable(SolverKind::Glpk))
        ));
    }
}
