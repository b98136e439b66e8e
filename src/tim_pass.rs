//! Integrated line planning, timetabling and passenger routing.
//!
//! Every pool line gets binaries `y_{l,f}` for the divisors `f` of a common frequency. The EAN is
//! built with every line at the common frequency; an event of repetition `r` exists in the plan
//! iff `sum_{f >= r} y_{l,f} = 1`. Event times are integers in `[0, period)`, tensions follow the
//! PESP relation and their bounds are switched off for inactive repetitions. Each active od
//! pair is routed by a binary unit flow through the active part of the EAN.

use std::collections::BTreeSet;

use log::{debug, info};
use mip::{ConstraintSense, DoubleAttribute, LinearExpression, Model, Status, Var, VariableType};

use crate::col::{map_new, HashMap};
use crate::config::Config;
use crate::ean::{ActivityType, Ean, EventType};
use crate::ean_builder::{build_periodic_ean, EanParameters};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::io::limits::StationLimit;
use crate::line::LinePool;
use crate::od::OdPair;
use crate::ptn::Ptn;
use crate::solver::SolverParameters;

#[derive(Debug, Clone, PartialEq)]
pub struct TimPassParameters {
    pub ean: EanParameters,
    /// Every chosen frequency divides this one.
    pub common_frequency_divisor: i64,
    pub factor_drive_time: f64,
    pub factor_wait_time: f64,
    pub factor_transfer_time: f64,
    /// Added per passenger and change.
    pub transfer_penalty: f64,
    pub factor_line_length: f64,
    pub factor_line_cost: f64,
    pub solver: SolverParameters,
    pub model_name: String,
}

impl TimPassParameters {
    pub fn from_config(config: &Config) -> Result<Self> {
        let factor = |name: &str, default: f64| -> Result<f64> {
            Ok(config
                .get_optional(&format!("tim_pass_factor_{}", name), Config::get_double)?
                .unwrap_or(default))
        };
        Ok(TimPassParameters {
            ean: EanParameters::from_config(config)?,
            common_frequency_divisor: config
                .get_optional("tim_pass_common_frequency_divisor", Config::get_integer)?
                .unwrap_or(1),
            factor_drive_time: factor("drive_time", 1.0)?,
            factor_wait_time: factor("wait_time", 1.0)?,
            factor_transfer_time: factor("transfer_time", 1.0)?,
            transfer_penalty: factor("transfer_penalty", 0.0)?,
            factor_line_length: factor("line_length", 0.0)?,
            factor_line_cost: factor("line_cost", 1.0)?,
            solver: SolverParameters::from_config(config, "tim_pass_")?,
            model_name: "tim-pass".into(),
        })
    }

    fn frequencies(&self) -> Result<Vec<i64>> {
        let common = self.common_frequency_divisor;
        if common < 1 || self.ean.period % common != 0 {
            return Err(Error::AlgorithmInfeasibleParameterSettings {
                parameter: "tim_pass_common_frequency_divisor".into(),
                value: common.to_string(),
            });
        }
        Ok((1..=common).filter(|f| common % f == 0).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimPassSolution {
    pub status: Status,
    pub objective: f64,
    /// Chosen frequency per pool line, `0` for unused lines.
    pub frequencies: HashMap<i64, i64>,
    /// Number of routed passengers changing at least once.
    pub passengers_with_transfer: f64,
}

/// Start or end of an od flow, or an event of the EAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FlowNode {
    Source,
    Target,
    Event(i64),
}

/// An arc an od pair may use. `activity` is `None` for the virtual arcs.
#[derive(Debug, Clone, Copy)]
struct FlowArc {
    from: FlowNode,
    to: FlowNode,
    activity: Option<i64>,
}

fn carries_passengers(activity_type: ActivityType) -> bool {
    matches!(
        activity_type,
        ActivityType::Drive | ActivityType::Wait | ActivityType::Change
    )
}

/// Builds and solves the model. Sets the frequencies of `pool` and returns the EAN of the
/// chosen line concept with event times and routed passengers.
pub fn solve_tim_pass(
    ptn: &Ptn,
    pool: &mut LinePool,
    od_pairs: &[OdPair],
    limits: &HashMap<i64, StationLimit>,
    parameters: &TimPassParameters,
) -> Result<(Ean, TimPassSolution)> {
    let period = parameters.ean.period;
    let frequencies = parameters.frequencies()?;
    let common = parameters.common_frequency_divisor;

    let full_lines: Vec<_> = pool
        .lines()
        .iter()
        .map(|line| {
            let mut line = line.clone();
            line.frequency = common;
            line
        })
        .collect();
    let mut ean = build_periodic_ean(ptn, &full_lines, limits, &parameters.ean)?;
    info!(
        "Tim+Pass on {} lines, EAN with {} events and {} activities",
        full_lines.len(),
        ean.num_nodes(),
        ean.num_edges()
    );

    let mut model = parameters.solver.create_model(&parameters.model_name)?;

    // Frequencies.
    let mut choice: HashMap<(i64, i64), Var> = map_new();
    for line in pool.lines() {
        let mut at_most_one = LinearExpression::new();
        for &f in &frequencies {
            let cost = parameters.factor_line_cost * line.cost * f as f64
                + parameters.factor_line_length * line.length * f as f64;
            let y = model.add_variable(0.0, 1.0, VariableType::Binary, cost, &format!("y_{}_{}", line.id, f))?;
            at_most_one.add_term(1.0, y);
            choice.insert((line.id, f), y);
        }
        model.add_constraint(&at_most_one, ConstraintSense::LessEqual, 1.0, &format!("frequency_{}", line.id))?;
    }
    let mut lines_on_link: HashMap<i64, Vec<i64>> = map_new();
    for line in pool.lines() {
        for link in line.link_ids() {
            lines_on_link.entry(link.abs()).or_default().push(line.id);
        }
    }
    for link in ptn.links() {
        let mut served = LinearExpression::new();
        for line in lines_on_link.get(&link.id).map(Vec::as_slice).unwrap_or(&[]) {
            for &f in &frequencies {
                served.add_term(f as f64, choice[&(*line, f)]);
            }
        }
        model.add_constraint(
            &served,
            ConstraintSense::GreaterEqual,
            link.lower_frequency as f64,
            &format!("lower_frequency_{}", link.id),
        )?;
        if link.upper_frequency < i64::MAX {
            model.add_constraint(
                &served,
                ConstraintSense::LessEqual,
                link.upper_frequency as f64,
                &format!("upper_frequency_{}", link.id),
            )?;
        }
    }
    let activation = |line: i64, repetition: i64| {
        let mut expr = LinearExpression::new();
        for &f in frequencies.iter().filter(|&&f| f >= repetition) {
            expr.add_term(1.0, choice[&(line, f)]);
        }
        expr
    };

    // Timetable.
    let mut time: HashMap<i64, Var> = map_new();
    for event in ean.node_slice() {
        let pi = model.add_variable(
            0.0,
            (period - 1) as f64,
            VariableType::Integer,
            0.0,
            &format!("pi_{}", event.id),
        )?;
        time.insert(event.id, pi);
    }
    let mut tension: HashMap<i64, Var> = map_new();
    let mut tension_bound: HashMap<i64, i64> = map_new();
    for activity in ean.edge_slice() {
        let bound = activity.upper_bound.max(period - 1);
        let x = model.add_variable(0.0, bound as f64, VariableType::Integer, 0.0, &format!("x_{}", activity.id))?;
        let p = model.add_variable(
            0.0,
            ((bound + period - 1) / period) as f64,
            VariableType::Integer,
            0.0,
            &format!("p_{}", activity.id),
        )?;
        let mut expr = LinearExpression::new();
        expr.add_term(1.0, x)
            .add_term(-1.0, time[&activity.right])
            .add_term(1.0, time[&activity.left])
            .add_term(-(period as f64), p);
        model.add_constraint(&expr, ConstraintSense::Equal, 0.0, &format!("tension_{}", activity.id))?;

        let left = ean.node(activity.left).ok_or(Error::DataIndexNotFound {
            kind: "event",
            index: activity.left,
        })?;
        let right = ean.node(activity.right).ok_or(Error::DataIndexNotFound {
            kind: "event",
            index: activity.right,
        })?;
        if activity.activity_type == ActivityType::Sync {
            for &f in frequencies.iter().filter(|&&f| f >= right.repetition) {
                let distance = (period / f) as f64;
                let y = choice[&(right.line_id, f)];
                let mut lower = LinearExpression::new();
                lower.add_term(1.0, x).add_term(-distance, y);
                model.add_constraint(&lower, ConstraintSense::GreaterEqual, 0.0, &format!("sync_lower_{}_{}", activity.id, f))?;
                let mut upper = LinearExpression::new();
                upper.add_term(1.0, x).add_term(bound as f64 - distance, y);
                model.add_constraint(&upper, ConstraintSense::LessEqual, bound as f64, &format!("sync_upper_{}_{}", activity.id, f))?;
            }
        } else {
            let runs: BTreeSet<(i64, i64)> = [left, right]
                .iter()
                .map(|e| (e.line_id, e.repetition))
                .collect();
            let count = runs.len() as f64;
            let mut active = LinearExpression::new();
            for &(line, repetition) in &runs {
                active.multi_add(1.0, &activation(line, repetition));
            }
            let big_lower = activity.lower_bound as f64;
            let mut lower = LinearExpression::new();
            lower.add_term(1.0, x).multi_add(-big_lower, &active);
            model.add_constraint(
                &lower,
                ConstraintSense::GreaterEqual,
                big_lower - big_lower * count,
                &format!("lower_{}", activity.id),
            )?;
            if activity.upper_bound < bound {
                let big_upper = (bound - activity.upper_bound) as f64;
                let mut upper = LinearExpression::new();
                upper.add_term(1.0, x).multi_add(big_upper, &active);
                model.add_constraint(
                    &upper,
                    ConstraintSense::LessEqual,
                    activity.upper_bound as f64 + big_upper * count,
                    &format!("upper_{}", activity.id),
                )?;
            }
        }
        tension.insert(activity.id, x);
        tension_bound.insert(activity.id, bound);
    }

    // Passenger flows.
    let mut departures_at: HashMap<i64, Vec<i64>> = map_new();
    let mut arrivals_at: HashMap<i64, Vec<i64>> = map_new();
    for event in ean.node_slice() {
        match event.event_type {
            EventType::Departure => departures_at.entry(event.stop_id).or_default().push(event.id),
            EventType::Arrival => arrivals_at.entry(event.stop_id).or_default().push(event.id),
            _ => {}
        }
    }
    let routable: Vec<_> = ean
        .edge_slice()
        .iter()
        .filter(|a| carries_passengers(a.activity_type))
        .collect();
    let active_pairs: Vec<&OdPair> = od_pairs
        .iter()
        .filter(|p| p.active && p.total_passengers() > 0.0)
        .collect();
    let mut flows: Vec<Vec<(FlowArc, Var)>> = Vec::with_capacity(active_pairs.len());
    for (k, pair) in active_pairs.iter().enumerate() {
        let weight = pair.total_passengers();
        let mut arcs: Vec<FlowArc> = Vec::new();
        for &departure in departures_at.get(&pair.origin).map(Vec::as_slice).unwrap_or(&[]) {
            arcs.push(FlowArc {
                from: FlowNode::Source,
                to: FlowNode::Event(departure),
                activity: None,
            });
        }
        for &arrival in arrivals_at.get(&pair.destination).map(Vec::as_slice).unwrap_or(&[]) {
            arcs.push(FlowArc {
                from: FlowNode::Event(arrival),
                to: FlowNode::Target,
                activity: None,
            });
        }
        for activity in &routable {
            arcs.push(FlowArc {
                from: FlowNode::Event(activity.left),
                to: FlowNode::Event(activity.right),
                activity: Some(activity.id),
            });
        }

        let mut balance: HashMap<FlowNode, LinearExpression> = map_new();
        let mut pair_flows = Vec::with_capacity(arcs.len());
        for (index, arc) in arcs.iter().enumerate() {
            let penalty = match arc.activity.and_then(|id| ean.edge(id)) {
                Some(a) if a.activity_type == ActivityType::Change => parameters.transfer_penalty * weight,
                _ => 0.0,
            };
            let flow = model.add_variable(0.0, 1.0, VariableType::Binary, penalty, &format!("f_{}_{}", k, index))?;
            balance.entry(arc.from).or_default().add_term(1.0, flow);
            balance.entry(arc.to).or_default().add_term(-1.0, flow);

            // Flow only through events of active repetitions.
            if let FlowNode::Event(id) = arc.to {
                if let Some(event) = ean.node(id) {
                    let mut usable = LinearExpression::from_term(1.0, flow);
                    usable.multi_add(-1.0, &activation(event.line_id, event.repetition));
                    model.add_constraint(&usable, ConstraintSense::LessEqual, 0.0, &format!("usable_{}_{}", k, index))?;
                }
            }

            if let Some(activity) = arc.activity.and_then(|id| ean.edge(id)) {
                let factor = match activity.activity_type {
                    ActivityType::Drive => parameters.factor_drive_time,
                    ActivityType::Wait => parameters.factor_wait_time,
                    _ => parameters.factor_transfer_time,
                };
                let bound = tension_bound[&activity.id] as f64;
                let travel = model.add_variable(
                    0.0,
                    bound,
                    VariableType::Continuous,
                    factor * weight,
                    &format!("t_{}_{}", k, activity.id),
                )?;
                let mut coupling = LinearExpression::new();
                coupling
                    .add_term(1.0, travel)
                    .add_term(-1.0, tension[&activity.id])
                    .add_term(-bound, flow);
                model.add_constraint(&coupling, ConstraintSense::GreaterEqual, -bound, &format!("travel_{}_{}", k, activity.id))?;
            }
            pair_flows.push((*arc, flow));
        }
        for (node, expr) in &balance {
            let (rhs, name) = match node {
                FlowNode::Source => (1.0, format!("source_{}", k)),
                FlowNode::Target => (-1.0, format!("target_{}", k)),
                FlowNode::Event(id) => (0.0, format!("balance_{}_{}", k, id)),
            };
            model.add_constraint(expr, ConstraintSense::Equal, rhs, &name)?;
        }
        flows.push(pair_flows);
    }
    debug!("Routing {} active od pairs", active_pairs.len());

    parameters.solver.write_lp_file(model.as_ref())?;
    let status = parameters.solver.solve(model.as_mut())?;
    let objective = model.double_attribute(DoubleAttribute::ObjVal)?;

    let mut chosen: HashMap<i64, i64> = map_new();
    for line in pool.lines() {
        let mut frequency = 0;
        for &f in &frequencies {
            if model.value(choice[&(line.id, f)])? > 0.5 {
                frequency = f;
            }
        }
        chosen.insert(line.id, frequency);
    }
    for (&line, &frequency) in &chosen {
        pool.line_mut(line)?.frequency = frequency;
    }

    for event in ean.nodes_mut() {
        event.time = model.value(time[&event.id])?.round() as i64;
        event.passengers = 0.0;
    }
    for activity in ean.edges_mut() {
        activity.passengers = 0.0;
    }
    let mut passengers_with_transfer = 0.0;
    for (pair, pair_flows) in active_pairs.iter().zip(&flows) {
        let weight = pair.total_passengers();
        let mut changes = false;
        for (arc, flow) in pair_flows {
            if model.value(*flow)? < 0.5 {
                continue;
            }
            if let Some(activity) = arc.activity.and_then(|id| ean.edge_mut(id)) {
                activity.passengers += weight;
                changes |= activity.activity_type == ActivityType::Change;
            }
            if let FlowNode::Event(id) = arc.to {
                if let Some(event) = ean.node_mut(id) {
                    event.passengers += weight;
                }
            }
        }
        if changes {
            passengers_with_transfer += weight;
        }
    }

    let inactive: Vec<i64> = ean
        .node_slice()
        .iter()
        .filter(|e| e.repetition > chosen.get(&e.line_id).copied().unwrap_or(0))
        .map(|e| e.id)
        .collect();
    for id in inactive {
        ean.remove_node(id);
    }
    let line_of: HashMap<i64, i64> = ean.node_slice().iter().map(|e| (e.id, e.line_id)).collect();
    for activity in ean.edges_mut() {
        if activity.activity_type != ActivityType::Sync {
            continue;
        }
        if let Some(&f) = line_of.get(&activity.left).and_then(|line| chosen.get(line)) {
            activity.lower_bound = period / f;
            activity.upper_bound = period / f;
        }
    }
    ean.order_nodes(&mut |a, b| a.id.cmp(&b.id));
    ean.order_edges(&mut |a, b| a.id.cmp(&b.id));
    info!(
        "Tim+Pass chose {} lines, {} passengers change",
        chosen.values().filter(|&&f| f > 0).count(),
        passengers_with_transfer
    );

    Ok((
        ean,
        TimPassSolution {
            status,
            objective,
            frequencies: chosen,
            passengers_with_transfer,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::Line;
    use crate::ptn::{Link, Stop};

    /// Directed chain `1 -> 2 -> 3`, line 1 serves both links, line 2 only `2 -> 3`.
    fn instance() -> (Ptn, LinePool, Vec<OdPair>) {
        let mut ptn = Ptn::new();
        for (id, x) in [(1, 0.0), (2, 1.0), (3, 2.0)] {
            ptn.add_stop(Stop::new(id, "", "", x, 0.0)).unwrap();
        }
        ptn.add_link(Link::new(1, 1, 2, 2.0, 2, 4, true)).unwrap();
        ptn.add_link(Link::new(2, 2, 3, 3.0, 3, 5, true)).unwrap();
        ptn.set_load(1, 5.0, 1, i64::MAX).unwrap();
        ptn.set_load(2, 7.0, 1, i64::MAX).unwrap();

        let mut pool = LinePool::new();
        let mut long = Line::with_links(1, true, [ptn.link(1).unwrap(), ptn.link(2).unwrap()]).unwrap();
        long.cost = 10.0;
        let mut short = Line::with_links(2, true, [ptn.link(2).unwrap()]).unwrap();
        short.cost = 3.0;
        pool.add_line(long).unwrap();
        pool.add_line(short).unwrap();

        let mut pairs = vec![OdPair::new(1, 3, 5.0), OdPair::new(2, 3, 2.0)];
        for pair in &mut pairs {
            pair.active = true;
        }
        (ptn, pool, pairs)
    }

    fn parameters(min_wait: i64, max_wait: i64) -> TimPassParameters {
        TimPassParameters {
            ean: EanParameters {
                period: 10,
                time_units_per_minute: 1,
                min_wait,
                max_wait,
                min_change: 2,
                change_buffer: 0,
                use_turnarounds: false,
                turnover_time: 0,
                headway: 0,
            },
            common_frequency_divisor: 1,
            factor_drive_time: 1.0,
            factor_wait_time: 1.0,
            factor_transfer_time: 1.0,
            transfer_penalty: 0.0,
            factor_line_length: 0.0,
            factor_line_cost: 1.0,
            solver: SolverParameters {
                output_directory: std::env::temp_dir(),
                ..SolverParameters::default()
            },
            model_name: "tim-pass-test".into(),
        }
    }

    fn durations(ean: &Ean, activity_type: ActivityType) -> Vec<i64> {
        ean.edge_slice()
            .iter()
            .filter(|a| a.activity_type == activity_type)
            .map(|a| {
                a.duration(
                    ean.node(a.left).unwrap().time,
                    ean.node(a.right).unwrap().time,
                    10,
                )
            })
            .collect()
    }

    #[test]
    fn test_short_wait_keeps_one_line() {
        let (ptn, mut pool, pairs) = instance();
        let (ean, solution) =
            solve_tim_pass(&ptn, &mut pool, &pairs, &map_new(), &parameters(1, 3)).unwrap();
        assert_eq!(solution.status, Status::Optimal);
        // Line cost 10, 5 * (2 + 1 + 3) and 2 * 3.
        assert!((solution.objective - 46.0).abs() < 1e-6);
        assert_eq!(solution.frequencies[&1], 1);
        assert_eq!(solution.frequencies[&2], 0);
        assert_eq!(pool.line(1).unwrap().frequency, 1);
        assert_eq!(pool.line(2).unwrap().frequency, 0);
        assert_eq!(solution.passengers_with_transfer, 0.0);

        assert_eq!(ean.num_nodes(), 4);
        assert_eq!(ean.num_edges(), 3);
        assert!(ean.node_slice().iter().all(|e| e.line_id == 1));
        assert_eq!(durations(&ean, ActivityType::Drive), vec![2, 3]);
        assert_eq!(durations(&ean, ActivityType::Wait), vec![1]);
        let drive_passengers: Vec<f64> = ean
            .edge_slice()
            .iter()
            .filter(|a| a.activity_type == ActivityType::Drive)
            .map(|a| a.passengers)
            .collect();
        assert_eq!(drive_passengers, vec![5.0, 7.0]);
    }

    #[test]
    fn test_long_wait_opens_second_line() {
        let (ptn, mut pool, pairs) = instance();
        let (ean, solution) =
            solve_tim_pass(&ptn, &mut pool, &pairs, &map_new(), &parameters(6, 8)).unwrap();
        // Line costs 13, 5 * (2 + 2 + 3) and 2 * 3.
        assert!((solution.objective - 54.0).abs() < 1e-6);
        assert_eq!(solution.frequencies[&2], 1);
        assert_eq!(solution.passengers_with_transfer, 5.0);
        assert_eq!(ean.num_nodes(), 6);
        assert_eq!(durations(&ean, ActivityType::Change), vec![2]);
        let change = ean
            .edge_slice()
            .iter()
            .find(|a| a.activity_type == ActivityType::Change)
            .unwrap();
        assert_eq!(change.passengers, 5.0);
        for activity in ean.edge_slice() {
            let duration = activity.duration(
                ean.node(activity.left).unwrap().time,
                ean.node(activity.right).unwrap().time,
                10,
            );
            assert!(activity.allows(duration));
        }
    }

    #[test]
    fn test_common_frequency_must_divide_period() {
        let (ptn, mut pool, pairs) = instance();
        let parameters = TimPassParameters {
            common_frequency_divisor: 3,
            ..parameters(1, 3)
        };
        assert!(matches!(
            solve_tim_pass(&ptn, &mut pool, &pairs, &map_new(), &parameters),
            Err(Error::AlgorithmInfeasibleParameterSettings { .. })
        ));
    }
}
