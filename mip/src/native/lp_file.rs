use std::fmt::Write;

use crate::{ConstraintSense, Flt, OptimizationSense, VariableType};

use super::{Constraint, Variable};

fn format_term(out: &mut String, first: bool, coefficient: Flt, name: &str) {
    if coefficient < 0.0 {
        let _ = write!(out, " - {} {}", -coefficient, name);
    } else if first {
        let _ = write!(out, " {} {}", coefficient, name);
    } else {
        let _ = write!(out, " + {} {}", coefficient, name);
    }
}

/// Renders a model in CPLEX LP format. Only the constraints selected by `keep` are written.
pub(crate) fn render(
    name: &str,
    sense: OptimizationSense,
    variables: &[Variable],
    objective_constant: Flt,
    constraints: &[Constraint],
    keep: impl Fn(usize) -> bool,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\\ Model {}", name);
    out.push_str(match sense {
        OptimizationSense::Minimize => "Minimize\n",
        OptimizationSense::Maximize => "Maximize\n",
    });
    out.push_str(" obj:");
    let mut first = true;
    for variable in variables.iter().filter(|v| v.objective != 0.0) {
        format_term(&mut out, first, variable.objective, &variable.name);
        first = false;
    }
    if objective_constant != 0.0 || first {
        format_term(&mut out, first, objective_constant, "");
    }
    out.push('\n');

    out.push_str("Subject To\n");
    for (index, constraint) in constraints.iter().enumerate() {
        if !keep(index) {
            continue;
        }
        let _ = write!(out, " {}:", constraint.name);
        let mut first = true;
        for &(j, coefficient) in &constraint.coefficients {
            format_term(&mut out, first, coefficient, &variables[j].name);
            first = false;
        }
        if first {
            out.push_str(" 0 ");
            out.push_str(&variables.first().map(|v| v.name.clone()).unwrap_or_default());
        }
        let _ = writeln!(
            out,
            " {} {}",
            match constraint.sense {
                ConstraintSense::LessEqual => "<=",
                ConstraintSense::Equal => "=",
                ConstraintSense::GreaterEqual => ">=",
            },
            constraint.rhs
        );
    }

    out.push_str("Bounds\n");
    for variable in variables {
        match (variable.lower.is_finite(), variable.upper.is_finite()) {
            (true, true) => {
                let _ = writeln!(
                    out,
                    " {} <= {} <= {}",
                    variable.lower, variable.name, variable.upper
                );
            }
            (true, false) => {
                let _ = writeln!(out, " {} >= {}", variable.name, variable.lower);
            }
            (false, true) => {
                let _ = writeln!(out, " -inf <= {} <= {}", variable.name, variable.upper);
            }
            (false, false) => {
                let _ = writeln!(out, " {} free", variable.name);
            }
        }
    }

    let generals: Vec<&str> = variables
        .iter()
        .filter(|v| v.var_type == VariableType::Integer)
        .map(|v| v.name.as_str())
        .collect();
    if !generals.is_empty() {
        let _ = writeln!(out, "Generals\n {}", generals.join(" "));
    }
    let binaries: Vec<&str> = variables
        .iter()
        .filter(|v| v.var_type == VariableType::Binary)
        .map(|v| v.name.as_str())
        .collect();
    if !binaries.is_empty() {
        let _ = writeln!(out, "Binaries\n {}", binaries.join(" "));
    }
    out.push_str("End\n");
    out
}
