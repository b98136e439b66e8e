//! Periodic timetabling on the cycle base of the EAN.
//!
//! Variables are the activity tensions `x_a` in `[lower, upper]` and one free integer `z_c` per
//! fundamental cycle with `sum(sign * x) = period * z_c`.

use log::{debug, info};
use mip::{
    ConstraintSense, DoubleAttribute, LinearExpression, Model, Status, Var, VariableType, INFINITY,
};

use crate::col::{map_new, HashMap};
use crate::config::Config;
use crate::cycle_base::{remove_light_activities, CycleBase};
use crate::ean::Ean;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::solver::SolverParameters;

#[derive(Debug, Clone, PartialEq)]
pub struct PespParameters {
    pub period: i64,
    pub use_old_solution: bool,
    /// Activities spanning at least `period - 1` with at most this many passengers are dropped.
    pub light_passenger_cut: Option<f64>,
    pub solver: SolverParameters,
    pub model_name: String,
}

impl PespParameters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(PespParameters {
            period: config.period_length()?,
            use_old_solution: config
                .get_optional("tim_pesp_use_old_solution", Config::get_boolean)?
                .unwrap_or(false),
            light_passenger_cut: config
                .get_optional("tim_pesp_light_edge_passenger_cut", Config::get_double)?,
            solver: SolverParameters::from_config(config, "tim_pesp_")?,
            model_name: "pesp-cycle-base".into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PespSolution {
    pub status: Status,
    pub objective: f64,
    pub times: HashMap<i64, i64>,
    /// Tensions that got a start value from the stored timetable.
    pub started_tensions: usize,
}

/// Solves the cycle base formulation and writes the event times into `ean`.
pub fn solve_pesp_cycle_base(ean: &mut Ean, parameters: &PespParameters) -> Result<PespSolution> {
    let period = parameters.period;
    let mut network = ean.clone();
    if let Some(cut) = parameters.light_passenger_cut {
        remove_light_activities(&mut network, period, cut);
    }
    let base = CycleBase::compute(&network);
    info!(
        "Cycle base with {} tree activities and {} cycles",
        base.tree_activities().len(),
        base.cycles().len()
    );

    let mut model = parameters.solver.create_model(&parameters.model_name)?;
    let mut tension: HashMap<i64, Var> = map_new();
    for activity in network.edge_slice() {
        let var = model.add_variable(
            activity.lower_bound as f64,
            activity.upper_bound as f64,
            VariableType::Integer,
            activity.passengers,
            &format!("x_{}", activity.id),
        )?;
        tension.insert(activity.id, var);
    }
    let mut modulo = Vec::with_capacity(base.cycles().len());
    for cycle in base.cycles() {
        let z = model.add_variable(
            -INFINITY,
            INFINITY,
            VariableType::Integer,
            0.0,
            &format!("z_{}", cycle.non_tree_activity),
        )?;
        let mut expr = LinearExpression::new();
        for &(activity, sign) in &cycle.entries {
            expr.add_term(sign as f64, tension[&activity]);
        }
        expr.add_term(-(period as f64), z);
        model.add_constraint(
            &expr,
            ConstraintSense::Equal,
            0.0,
            &format!("cycle_{}", cycle.non_tree_activity),
        )?;
        modulo.push(z);
    }

    let started_tensions = if parameters.use_old_solution {
        set_start_from_times(model.as_mut(), ean, &network, &base, &tension, &modulo, period)?
    } else {
        0
    };

    parameters.solver.write_lp_file(model.as_ref())?;
    let status = parameters.solver.solve(model.as_mut())?;
    let objective = model.double_attribute(DoubleAttribute::ObjVal)?;

    let mut values: HashMap<i64, i64> = map_new();
    for (&activity, &var) in &tension {
        values.insert(activity, model.value(var)?.round() as i64);
    }
    let times = CycleBase::decode_times(&network, base.tree_activities(), &values, period)?;
    for event in ean.nodes_mut() {
        if let Some(&time) = times.get(&event.id) {
            event.time = time;
        }
    }
    Ok(PespSolution {
        status,
        objective,
        times,
        started_tensions,
    })
}

/// Start values from the times stored in the events. Tensions that cannot be shifted into their
/// bounds are left without start value, and so are the cycles containing them. Returns the
/// number of tensions with a start value.
fn set_start_from_times(
    model: &mut dyn Model,
    ean: &Ean,
    network: &Ean,
    base: &CycleBase,
    tension: &HashMap<i64, Var>,
    modulo: &[Var],
    period: i64,
) -> Result<usize> {
    let time_of = |event: i64| {
        ean.node(event)
            .map(|e| e.time)
            .ok_or(Error::DataIndexNotFound { kind: "event", index: event })
    };
    let mut start: HashMap<i64, i64> = map_new();
    for activity in network.edge_slice() {
        let duration = activity.duration(time_of(activity.left)?, time_of(activity.right)?, period);
        if activity.allows(duration) {
            model.set_start(tension[&activity.id], duration as f64)?;
            start.insert(activity.id, duration);
        }
    }
    for (cycle, &z) in base.cycles().iter().zip(modulo) {
        if cycle.entries.iter().all(|(activity, _)| start.contains_key(activity)) {
            let sum = cycle.signed_sum(|activity| start[&activity]);
            model.set_start(z, (sum / period) as f64)?;
        }
    }
    debug!(
        "Start values for {} of {} tensions",
        start.len(),
        network.num_edges()
    );
    Ok(start.len())
}
