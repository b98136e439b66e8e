//! Periodic timetabling together with a periodic vehicle schedule.
//!
//! A trip is one repetition of one line direction. Every trip is followed by exactly one trip
//! (possibly itself) of the same vehicle, connected by a turnaround that lasts at least the
//! turnaround time between the end stop and the next start stop. The vehicles needed are the
//! total duration of all trips and turnarounds divided by the period.

pub mod turnaround;

use log::{debug, info};
use mip::{
    ConstraintSense, DoubleAttribute, LinearExpression, Model, Status, Var, VariableType, INFINITY,
};

use crate::col::{map_new, set_new, HashMap, HashSet};
use crate::config::Config;
use crate::ean::{ActivityType, Ean, LineDirection};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::line::LinePool;
use crate::ptn::Ptn;
use crate::solver::SolverParameters;

pub use turnaround::Turnarounds;

#[derive(Debug, Clone, PartialEq)]
pub struct TimVehParameters {
    pub period: i64,
    pub time_units_per_minute: i64,
    pub vehicle_cost: f64,
    pub factor_drive_time: f64,
    pub factor_line_length: f64,
    pub factor_turnaround_time: f64,
    pub factor_turnaround_distance: f64,
    /// Weight of the passenger travel time on the activities.
    pub factor_passenger_time: f64,
    /// Whether a vehicle may drive empty from the end of one trip to the start of another.
    pub allow_empty_trips: bool,
    pub turnover_time: i64,
    pub depot: Option<i64>,
    pub solver: SolverParameters,
    pub model_name: String,
}

impl TimVehParameters {
    pub fn from_config(config: &Config) -> Result<Self> {
        let factor = |name: &str, default: f64| -> Result<f64> {
            Ok(config
                .get_optional(&format!("tim_veh_factor_{}", name), Config::get_double)?
                .unwrap_or(default))
        };
        let units = config.time_units_per_minute()?;
        let depot = config
            .get_optional("vs_depot_index", Config::get_integer)?
            .filter(|&depot| depot > 0);
        Ok(TimVehParameters {
            period: config.period_length()?,
            time_units_per_minute: units,
            vehicle_cost: config
                .get_optional("tim_veh_vehicle_cost", Config::get_double)?
                .unwrap_or(1.0),
            factor_drive_time: factor("drive_time", 1.0)?,
            factor_line_length: factor("line_length", 0.0)?,
            factor_turnaround_time: factor("turnaround_time", 1.0)?,
            factor_turnaround_distance: factor("turnaround_distance", 0.0)?,
            factor_passenger_time: factor("passenger_time", 0.0)?,
            allow_empty_trips: config
                .get_optional("tim_veh_allow_empty_trips", Config::get_boolean)?
                .unwrap_or(true),
            turnover_time: config
                .get_optional("vs_turn_over_time", Config::get_integer)?
                .unwrap_or(0)
                * units,
            depot,
            solver: SolverParameters::from_config(config, "tim_veh_")?,
            model_name: "tim-veh".into(),
        })
    }
}

/// The events of one line repetition in one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    pub line: i64,
    pub direction: LineDirection,
    pub repetition: i64,
    pub start_event: i64,
    pub end_event: i64,
    pub start_stop: i64,
    pub end_stop: i64,
    /// Drive and wait activities between the start and the end event.
    pub activities: Vec<i64>,
}

/// Collects the trips of `ean` in the order of their first event. The events of a trip are
/// expected to be numbered in travel order, as the EAN construction does.
pub fn trips(ean: &Ean) -> Vec<Trip> {
    let mut index: HashMap<(i64, LineDirection, i64), usize> = map_new();
    let mut trips: Vec<Trip> = Vec::new();
    let mut events = ean.node_slice().iter().collect::<Vec<_>>();
    events.sort_by_key(|e| e.id);
    for event in events {
        if event.line_id <= 0 {
            continue;
        }
        let key = (event.line_id, event.direction, event.repetition);
        match index.get(&key) {
            Some(&i) => {
                trips[i].end_event = event.id;
                trips[i].end_stop = event.stop_id;
            }
            None => {
                index.insert(key, trips.len());
                trips.push(Trip {
                    line: event.line_id,
                    direction: event.direction,
                    repetition: event.repetition,
                    start_event: event.id,
                    end_event: event.id,
                    start_stop: event.stop_id,
                    end_stop: event.stop_id,
                    activities: Vec::new(),
                });
            }
        }
    }
    let trip_of: HashMap<i64, usize> = ean
        .node_slice()
        .iter()
        .filter_map(|e| {
            index
                .get(&(e.line_id, e.direction, e.repetition))
                .map(|&i| (e.id, i))
        })
        .collect();
    for activity in ean.edge_slice() {
        if !matches!(activity.activity_type, ActivityType::Drive | ActivityType::Wait) {
            continue;
        }
        if let (Some(&left), Some(&right)) = (trip_of.get(&activity.left), trip_of.get(&activity.right)) {
            if left == right {
                trips[left].activities.push(activity.id);
            }
        }
    }
    trips
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimVehSolution {
    pub status: Status,
    pub objective: f64,
    pub vehicles: i64,
    pub trips: Vec<Trip>,
    /// `(p, q)`: the vehicle serving trip `p` serves trip `q` next, indices into `trips`.
    pub connections: Vec<(usize, usize)>,
    pub turnaround_time: i64,
    pub turnaround_distance: f64,
}

/// A possible turnaround between the end of trip `from` and the start of trip `to`.
#[derive(Debug, Clone, Copy)]
struct Connection {
    from: usize,
    to: usize,
    time: i64,
    distance: f64,
}

/// Solves the model and writes the event times into `ean`. `pool` supplies the line lengths.
pub fn solve_tim_veh(
    ptn: &Ptn,
    pool: &LinePool,
    ean: &mut Ean,
    parameters: &TimVehParameters,
) -> Result<TimVehSolution> {
    let period = parameters.period;
    let turnarounds = Turnarounds::compute(
        ptn,
        parameters.turnover_time,
        parameters.time_units_per_minute,
        parameters.depot,
    )?;
    let trips = trips(ean);
    if trips.is_empty() {
        return Err(Error::AlgorithmInfeasibleModel(format!(
            "{}: no trips in the EAN",
            parameters.model_name
        )));
    }

    let mut connections = Vec::new();
    for (p, from) in trips.iter().enumerate() {
        for (q, to) in trips.iter().enumerate() {
            if !parameters.allow_empty_trips && from.end_stop != to.start_stop {
                continue;
            }
            if let (Some(time), Some(distance)) = (
                turnarounds.time(from.end_stop, to.start_stop),
                turnarounds.distance(from.end_stop, to.start_stop),
            ) {
                connections.push(Connection {
                    from: p,
                    to: q,
                    time,
                    distance,
                });
            }
        }
    }
    info!(
        "Tim+Veh with {} trips and {} possible turnarounds",
        trips.len(),
        connections.len()
    );

    let mut model = parameters.solver.create_model(&parameters.model_name)?;
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
    let mut in_trip: HashSet<i64> = set_new();
    in_trip.extend(trips.iter().flat_map(|t| t.activities.iter().copied()));
    let mut tension: HashMap<i64, Var> = map_new();
    for activity in ean.edge_slice() {
        let mut cost = parameters.factor_passenger_time * activity.passengers;
        if in_trip.contains(&activity.id) {
            cost += parameters.factor_drive_time;
        }
        let x = model.add_variable(
            activity.lower_bound as f64,
            activity.upper_bound as f64,
            VariableType::Integer,
            cost,
            &format!("x_{}", activity.id),
        )?;
        let p = model.add_variable(
            (activity.lower_bound - period + 1).div_euclid(period) as f64,
            ((activity.upper_bound + period - 1) / period) as f64,
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
        tension.insert(activity.id, x);
    }

    let vehicles = model.add_variable(0.0, INFINITY, VariableType::Integer, parameters.vehicle_cost, "vehicles")?;
    let mut circulation = LinearExpression::from_term(period as f64, vehicles);
    for trip in &trips {
        for activity in &trip.activities {
            circulation.add_term(-1.0, tension[activity]);
        }
    }

    let mut successors: Vec<LinearExpression> = vec![LinearExpression::new(); trips.len()];
    let mut predecessors: Vec<LinearExpression> = vec![LinearExpression::new(); trips.len()];
    let mut used: Vec<Var> = Vec::with_capacity(connections.len());
    for (c, connection) in connections.iter().enumerate() {
        let from = &trips[connection.from];
        let to = &trips[connection.to];
        let rounds = connection.time / period + 1;
        let big = (period - 1 + period * rounds + connection.time) as f64;
        let u = model.add_variable(
            0.0,
            1.0,
            VariableType::Binary,
            parameters.factor_turnaround_distance * connection.distance,
            &format!("u_{}_{}", connection.from, connection.to),
        )?;
        let k = model.add_variable(0.0, rounds as f64, VariableType::Integer, 0.0, &format!("k_{}", c))?;
        let h = model.add_variable(
            0.0,
            big,
            VariableType::Continuous,
            parameters.factor_turnaround_time,
            &format!("h_{}", c),
        )?;
        let mut gap = LinearExpression::new();
        gap.add_term(1.0, time[&to.start_event])
            .add_term(-1.0, time[&from.end_event])
            .add_term(period as f64, k);
        let mut minimum = gap.clone();
        minimum.add_term(-big, u);
        model.add_constraint(
            &minimum,
            ConstraintSense::GreaterEqual,
            connection.time as f64 - big,
            &format!("turnaround_{}", c),
        )?;
        let mut duration = LinearExpression::from_term(1.0, h);
        duration.multi_add(-1.0, &gap).add_term(-big, u);
        model.add_constraint(&duration, ConstraintSense::GreaterEqual, -big, &format!("duration_{}", c))?;

        circulation.add_term(-1.0, h);
        successors[connection.from].add_term(1.0, u);
        predecessors[connection.to].add_term(1.0, u);
        used.push(u);
    }
    model.add_constraint(&circulation, ConstraintSense::GreaterEqual, 0.0, "circulation")?;
    for (i, (successor, predecessor)) in successors.iter().zip(&predecessors).enumerate() {
        model.add_constraint(successor, ConstraintSense::Equal, 1.0, &format!("successor_{}", i))?;
        model.add_constraint(predecessor, ConstraintSense::Equal, 1.0, &format!("predecessor_{}", i))?;
    }

    let mut line_length = 0.0;
    for trip in &trips {
        line_length += pool.line_repetition(trip.line, trip.repetition)?.length;
    }
    debug!("Driven line length {}", line_length);

    parameters.solver.write_lp_file(model.as_ref())?;
    let status = parameters.solver.solve(model.as_mut())?;
    let objective =
        model.double_attribute(DoubleAttribute::ObjVal)? + parameters.factor_line_length * line_length;

    for event in ean.nodes_mut() {
        event.time = model.value(time[&event.id])?.round() as i64;
    }
    let mut chosen = Vec::new();
    let mut turnaround_time = 0;
    let mut turnaround_distance = 0.0;
    for (connection, &u) in connections.iter().zip(&used) {
        if model.value(u)? > 0.5 {
            chosen.push((connection.from, connection.to));
            let end = ean.node(trips[connection.from].end_event).map_or(0, |e| e.time);
            let start = ean.node(trips[connection.to].start_event).map_or(0, |e| e.time);
            let mut wait = (start - end).rem_euclid(period);
            while wait < connection.time {
                wait += period;
            }
            turnaround_time += wait;
            turnaround_distance += connection.distance;
        }
    }
    let vehicles = model.value(vehicles)?.round() as i64;
    info!(
        "Tim+Veh needs {} vehicles, turnarounds take {} time units and {} length units",
        vehicles, turnaround_time, turnaround_distance
    );

    Ok(TimVehSolution {
        status,
        objective,
        vehicles,
        trips,
        connections: chosen,
        turnaround_time,
        turnaround_distance,
    })
}
