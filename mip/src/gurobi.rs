use std::collections::HashMap;
use std::path::Path;

use gurobi::{
    attr::{DoubleAttr, IntAttr},
    param, Env, LinExpr,
};

use crate::{
    ConstraintSense, Constr, DoubleAttribute, DoubleParam, Flt, IntAttribute, IntParam,
    LinearExpression, Model, OptimizationSense, SolverError, SolverKind, Status, Var,
    VariableType,
};

fn backend(error: gurobi::Error) -> SolverError {
    SolverError::Backend(format!("{:?}", error))
}

impl From<ConstraintSense> for gurobi::ConstrSense {
    fn from(sense: ConstraintSense) -> Self {
        match sense {
            ConstraintSense::Equal => gurobi::ConstrSense::Equal,
            ConstraintSense::LessEqual => gurobi::ConstrSense::Less,
            ConstraintSense::GreaterEqual => gurobi::ConstrSense::Greater,
        }
    }
}

impl From<VariableType> for gurobi::VarType {
    fn from(var_type: VariableType) -> Self {
        match var_type {
            VariableType::Continuous => gurobi::VarType::Continuous,
            VariableType::Integer => gurobi::VarType::Integer,
            VariableType::Binary => gurobi::VarType::Binary,
        }
    }
}

thread_local! {
    static ENV: Result<Env, String> = Env::new("gurobi.log").map_err(|e| format!("{:?}", e));
}

pub struct GurobiModel {
    name: String,
    model: gurobi::Model,
    vars: Vec<gurobi::Var>,
    var_by_name: HashMap<String, Var>,
    num_constraints: usize,
    sense: OptimizationSense,
}

impl GurobiModel {
    pub fn new(name: &str) -> Result<Self, SolverError> {
        let model = ENV.with(|env| match env {
            Ok(env) => gurobi::Model::new(name, env).map_err(backend),
            Err(e) => Err(SolverError::Backend(e.clone())),
        })?;
        Ok(GurobiModel {
            name: name.into(),
            model,
            vars: Vec::new(),
            var_by_name: HashMap::new(),
            num_constraints: 0,
            sense: OptimizationSense::Minimize,
        })
    }

    fn var(&self, var: Var) -> Result<&gurobi::Var, SolverError> {
        self.vars
            .get(var.0)
            .ok_or_else(|| SolverError::UnknownVariable(format!("{:?}", var)))
    }

    fn lin_expr(&self, expr: &LinearExpression) -> Result<LinExpr, SolverError> {
        let mut lin_expr = LinExpr::new();
        for (var, coefficient) in expr.collapsed() {
            lin_expr = lin_expr.add_term(coefficient, self.var(var)?.clone());
        }
        Ok(lin_expr.add_constant(expr.constant()))
    }
}

impl Model for GurobiModel {
    fn kind(&self) -> SolverKind {
        SolverKind::Gurobi
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
        let gurobi_var = self
            .model
            .add_var(name, var_type.into(), objective, lower, upper, &[], &[])
            .map_err(backend)?;
        let var = Var(self.vars.len());
        self.vars.push(gurobi_var);
        if !name.is_empty() {
            self.var_by_name.insert(name.into(), var);
        }
        Ok(var)
    }

    fn variable_by_name(&self, name: &str) -> Option<Var> {
        self.var_by_name.get(name).copied()
    }

    fn set_start(&mut self, var: Var, value: Flt) -> Result<(), SolverError> {
        let gurobi_var = self.var(var)?.clone();
        gurobi_var
            .set(&mut self.model, DoubleAttr::Start, value)
            .map_err(backend)
    }

    fn value(&self, var: Var) -> Result<Flt, SolverError> {
        self.var(var)?.get(&self.model, DoubleAttr::X).map_err(backend)
    }

    fn add_constraint(
        &mut self,
        expr: &LinearExpression,
        sense: ConstraintSense,
        rhs: Flt,
        name: &str,
    ) -> Result<Constr, SolverError> {
        let lin_expr = self.lin_expr(expr)?;
        self.model
            .add_constr(name, lin_expr, sense.into(), rhs)
            .map_err(backend)?;
        self.num_constraints += 1;
        Ok(Constr(self.num_constraints - 1))
    }

    fn set_objective(&mut self, expr: &LinearExpression) -> Result<(), SolverError> {
        let lin_expr = self.lin_expr(expr)?;
        self.model.update().map_err(backend)?;
        let sense = match self.sense {
            OptimizationSense::Minimize => gurobi::ModelSense::Minimize,
            OptimizationSense::Maximize => gurobi::ModelSense::Maximize,
        };
        self.model.set_objective(lin_expr, sense).map_err(backend)
    }

    fn set_sense(&mut self, sense: OptimizationSense) -> Result<(), SolverError> {
        self.sense = sense;
        let model_sense = match sense {
            OptimizationSense::Minimize => gurobi::ModelSense::Minimize,
            OptimizationSense::Maximize => gurobi::ModelSense::Maximize,
        };
        self.model
            .set(IntAttr::ModelSense, model_sense.into())
            .map_err(backend)
    }

    fn solve(&mut self) -> Result<(), SolverError> {
        self.model.optimize().map_err(backend)
    }

    fn write(&self, path: &Path) -> Result<(), SolverError> {
        self.model
            .write(&path.to_string_lossy())
            .map_err(backend)
    }

    fn compute_iis(&mut self, path: &Path) -> Result<(), SolverError> {
        self.model.compute_iis().map_err(backend)?;
        self.model
            .write(&path.to_string_lossy())
            .map_err(backend)
    }

    fn int_attribute(&self, attribute: IntAttribute) -> Result<i64, SolverError> {
        let attr = match attribute {
            IntAttribute::NumVars => IntAttr::NumVars,
            IntAttribute::NumConstraints => IntAttr::NumConstrs,
            IntAttribute::NumIntVars => IntAttr::NumIntVars,
            IntAttribute::NumBinVars => IntAttr::NumBinVars,
            IntAttribute::SolutionCount => IntAttr::SolCount,
            IntAttribute::Runtime => {
                return self
                    .model
                    .get(DoubleAttr::Runtime)
                    .map(|seconds| seconds as i64)
                    .map_err(backend)
            }
            IntAttribute::Status => {
                let solutions = self.model.get(IntAttr::SolCount).map_err(backend)?;
                let status = match self.model.status().map_err(backend)? {
                    gurobi::Status::Optimal => Status::Optimal,
                    gurobi::Status::Infeasible | gurobi::Status::InfOrUnbd => Status::Infeasible,
                    _ if solutions > 0 => Status::Feasible,
                    _ => Status::NoSolution,
                };
                return Ok(status as i64);
            }
        };
        self.model.get(attr).map(|v| v as i64).map_err(backend)
    }

    fn double_attribute(&self, attribute: DoubleAttribute) -> Result<Flt, SolverError> {
        let attr = match attribute {
            DoubleAttribute::ObjVal => DoubleAttr::ObjVal,
            DoubleAttribute::MipGap => DoubleAttr::MIPGap,
        };
        self.model.get(attr).map_err(backend)
    }

    fn set_int_param(&mut self, parameter: IntParam, value: i64) -> Result<(), SolverError> {
        let env = self.model.get_env_mut();
        match parameter {
            IntParam::Timelimit => env.set(param::DoubleParam::TimeLimit, value as f64),
            IntParam::OutputLevel => env.set(param::IntParam::OutputFlag, value as i32),
            IntParam::Threads => env.set(param::IntParam::Threads, value as i32),
        }
        .map_err(backend)
    }

    fn set_double_param(&mut self, parameter: DoubleParam, value: Flt) -> Result<(), SolverError> {
        let env = self.model.get_env_mut();
        match parameter {
            DoubleParam::MipGap => env.set(param::DoubleParam::MIPGap, value),
        }
        .map_err(backend)
    }
}
