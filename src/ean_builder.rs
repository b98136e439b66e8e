use log::{debug, info};

use crate::col::{map_new, HashMap};
use crate::config::Config;
use crate::ean::{
    ActivityType, BufferedActivity, Ean, EventType, LineDirection, PeriodicActivity, PeriodicEvent,
};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::io::limits::StationLimit;
use crate::line::Line;
use crate::ptn::Ptn;

/// Settings for [`build_periodic_ean`]. All durations in time units.
#[derive(Debug, Clone, PartialEq)]
pub struct EanParameters {
    pub period: i64,
    pub time_units_per_minute: i64,
    pub min_wait: i64,
    pub max_wait: i64,
    pub min_change: i64,
    pub change_buffer: i64,
    pub use_turnarounds: bool,
    pub turnover_time: i64,
    pub headway: i64,
}

impl EanParameters {
    pub fn from_config(config: &Config) -> Result<Self> {
        let units = config.time_units_per_minute()?;
        let minutes = |key: &str| -> Result<i64> { Ok(config.get_integer(key)? * units) };
        let optional_minutes = |key: &str| -> Result<i64> {
            Ok(config.get_optional(key, Config::get_integer)?.unwrap_or(0) * units)
        };
        Ok(EanParameters {
            period: config.period_length()?,
            time_units_per_minute: units,
            min_wait: minutes("ean_default_minimal_waiting_time")?,
            max_wait: minutes("ean_default_maximal_waiting_time")?,
            min_change: minutes("ean_default_minimal_change_time")?,
            change_buffer: optional_minutes("ean_change_buffer")?,
            use_turnarounds: config
                .get_optional("ean_use_turnarounds", Config::get_boolean)?
                .unwrap_or(false),
            turnover_time: optional_minutes("ean_turnover_time")?,
            headway: optional_minutes("ean_headway_value")?,
        })
    }
}

/// The events of one line run: `(departure, arrival, link)` per driven link in travel order.
struct Run {
    line: i64,
    direction: LineDirection,
    repetition: i64,
    legs: Vec<(i64, i64, i64)>,
}

impl Run {
    fn first_departure(&self) -> Option<i64> {
        self.legs.first().map(|leg| leg.0)
    }

    fn last_arrival(&self) -> Option<i64> {
        self.legs.last().map(|leg| leg.1)
    }
}

struct Builder<'a> {
    ean: Ean,
    ptn: &'a Ptn,
    limits: &'a HashMap<i64, StationLimit>,
    parameters: &'a EanParameters,
    next_activity: i64,
}

impl<'a> Builder<'a> {
    fn add_activity(
        &mut self,
        activity_type: ActivityType,
        left: i64,
        right: i64,
        lower_bound: i64,
        upper_bound: i64,
    ) -> Result<()> {
        let activity = PeriodicActivity::new(
            self.next_activity,
            activity_type,
            left,
            right,
            lower_bound,
            upper_bound,
            0.0,
        )?;
        self.next_activity += 1;
        self.ean.add_edge(activity)?;
        Ok(())
    }

    fn add_run(&mut self, line: &Line, direction: LineDirection, repetition: i64) -> Result<Run> {
        let (stops, links): (Vec<i64>, Vec<i64>) = match direction {
            LineDirection::Forward => (line.stops().to_vec(), line.link_ids().collect()),
            LineDirection::Backward => (
                line.stops().iter().rev().copied().collect(),
                line.link_ids().collect::<Vec<_>>().into_iter().rev().collect(),
            ),
        };
        let mut legs = Vec::with_capacity(links.len());
        for (i, &link) in links.iter().enumerate() {
            let departure = self.ean.num_nodes() as i64 + 1;
            self.ean.add_node(PeriodicEvent::new(
                departure,
                EventType::Departure,
                stops[i],
                line.id,
                direction,
                repetition,
            ))?;
            self.ean.add_node(PeriodicEvent::new(
                departure + 1,
                EventType::Arrival,
                stops[i + 1],
                line.id,
                direction,
                repetition,
            ))?;
            legs.push((departure, departure + 1, link));
        }
        Ok(Run {
            line: line.id,
            direction,
            repetition,
            legs,
        })
    }

    fn add_drive_and_wait(&mut self, run: &Run) -> Result<()> {
        let units = self.parameters.time_units_per_minute;
        for (i, &(departure, arrival, link)) in run.legs.iter().enumerate() {
            let link = self.ptn.link(link)?;
            let (lower, upper) = (link.lower_bound * units, link.upper_bound * units);
            self.add_activity(ActivityType::Drive, departure, arrival, lower, upper)?;
            if let Some(&(next_departure, _, _)) = run.legs.get(i + 1) {
                let stop = self.stop_of(arrival)?;
                let (min_wait, max_wait) = match self.limits.get(&stop) {
                    Some(limit) => (limit.min_wait * units, limit.max_wait * units),
                    None => (self.parameters.min_wait, self.parameters.max_wait),
                };
                self.add_activity(ActivityType::Wait, arrival, next_departure, min_wait, max_wait)?;
            }
        }
        Ok(())
    }

    fn stop_of(&self, event: i64) -> Result<i64> {
        self.ean
            .node(event)
            .map(|e| e.stop_id)
            .ok_or(Error::DataIndexNotFound { kind: "event", index: event })
    }

    fn add_changes(&mut self) -> Result<()> {
        let period = self.parameters.period;
        let mut departures_at: HashMap<i64, Vec<(i64, i64)>> = map_new();
        for event in self.ean.node_slice() {
            if event.event_type == EventType::Departure {
                departures_at
                    .entry(event.stop_id)
                    .or_default()
                    .push((event.id, event.line_id));
            }
        }
        let arrivals: Vec<(i64, i64, i64)> = self
            .ean
            .node_slice()
            .iter()
            .filter(|e| e.event_type == EventType::Arrival)
            .map(|e| (e.id, e.stop_id, e.line_id))
            .collect();
        for (arrival, stop, line) in arrivals {
            let (min_change, max_change) = match self.limits.get(&stop) {
                Some(limit) => {
                    let units = self.parameters.time_units_per_minute;
                    (limit.min_change * units, limit.max_change * units)
                }
                None => (self.parameters.min_change, i64::MAX),
            };
            let upper = max_change.min(min_change + period - 1);
            for &(departure, other_line) in departures_at.get(&stop).map(Vec::as_slice).unwrap_or(&[]) {
                if other_line == line {
                    continue;
                }
                let mut change = BufferedActivity::new(PeriodicActivity::new(
                    self.next_activity,
                    ActivityType::Change,
                    arrival,
                    departure,
                    min_change,
                    upper,
                    0.0,
                )?);
                change.set_buffer(self.parameters.change_buffer)?;
                self.next_activity += 1;
                self.ean.add_edge(change.to_activity())?;
            }
        }
        Ok(())
    }

    fn add_syncs(&mut self, runs: &[&Run], frequency: i64) -> Result<()> {
        let period = self.parameters.period;
        if period % frequency != 0 {
            return Err(Error::AlgorithmInfeasibleParameterSettings {
                parameter: "period_length".into(),
                value: format!("{} is not divisible by frequency {}", period, frequency),
            });
        }
        let distance = period / frequency;
        for pair in runs.windows(2) {
            if let (Some(first), Some(second)) = (pair[0].first_departure(), pair[1].first_departure()) {
                self.add_activity(ActivityType::Sync, first, second, distance, distance)?;
            }
        }
        Ok(())
    }

    fn add_turnarounds(&mut self, runs: &[Run]) -> Result<()> {
        let period = self.parameters.period;
        let turnover = self.parameters.turnover_time;
        let forward = runs.iter().filter(|r| r.direction == LineDirection::Forward);
        for run in forward {
            let Some(backward) = runs.iter().find(|r| {
                r.direction == LineDirection::Backward && r.repetition == run.repetition
            }) else {
                continue;
            };
            for (from, to) in [(run, backward), (backward, run)] {
                if let (Some(arrival), Some(departure)) = (from.last_arrival(), to.first_departure()) {
                    self.add_activity(
                        ActivityType::Turnaround,
                        arrival,
                        departure,
                        turnover,
                        turnover + period - 1,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn add_headways(&mut self, runs: &[Run]) -> Result<()> {
        let period = self.parameters.period;
        let headway = self.parameters.headway;
        if 2 * headway > period {
            return Err(Error::AlgorithmInfeasibleParameterSettings {
                parameter: "ean_headway_value".into(),
                value: headway.to_string(),
            });
        }
        let mut departures_on: HashMap<(i64, i64), Vec<(i64, i64)>> = map_new();
        for run in runs {
            for &(departure, _, link) in &run.legs {
                let stop = self.stop_of(departure)?;
                departures_on
                    .entry((link.abs(), stop))
                    .or_default()
                    .push((departure, run.line));
            }
        }
        let mut keys: Vec<(i64, i64)> = departures_on.keys().copied().collect();
        keys.sort_unstable();
        for key in keys {
            let departures = departures_on[&key].clone();
            for (i, &(first, first_line)) in departures.iter().enumerate() {
                for &(second, second_line) in &departures[i + 1..] {
                    if first_line != second_line {
                        self.add_activity(ActivityType::Headway, first, second, headway, period - headway)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Builds the periodic EAN of the lines with positive frequency.
///
/// Events are created run by run, a run being one repetition of one line direction. Drive and
/// wait activities follow the runs, then syncs, turnarounds, changes and headways.
pub fn build_periodic_ean<'a>(
    ptn: &Ptn,
    lines: impl IntoIterator<Item = &'a Line>,
    limits: &HashMap<i64, StationLimit>,
    parameters: &EanParameters,
) -> Result<Ean> {
    let mut builder = Builder {
        ean: Ean::new(),
        ptn,
        limits,
        parameters,
        next_activity: 1,
    };
    let mut runs_by_line = Vec::new();
    for line in lines.into_iter().filter(|l| l.frequency > 0) {
        let mut runs = Vec::new();
        for repetition in 1..=line.frequency {
            runs.push(builder.add_run(line, LineDirection::Forward, repetition)?);
            if !line.directed {
                runs.push(builder.add_run(line, LineDirection::Backward, repetition)?);
            }
        }
        runs_by_line.push((line.frequency, runs));
    }
    for (_, runs) in &runs_by_line {
        for run in runs {
            builder.add_drive_and_wait(run)?;
        }
    }
    for (frequency, runs) in &runs_by_line {
        for direction in [LineDirection::Forward, LineDirection::Backward] {
            let directed: Vec<&Run> = runs.iter().filter(|r| r.direction == direction).collect();
            builder.add_syncs(&directed, *frequency)?;
        }
    }
    if parameters.use_turnarounds {
        for (_, runs) in &runs_by_line {
            builder.add_turnarounds(runs)?;
        }
    }
    builder.add_changes()?;
    if parameters.headway > 0 {
        let all: Vec<Run> = runs_by_line
            .into_iter()
            .flat_map(|(_, runs)| runs)
            .collect();
        builder.add_headways(&all)?;
    }
    let ean = builder.ean;
    info!(
        "Built EAN with {} events and {} activities",
        ean.num_nodes(),
        ean.num_edges()
    );
    debug!(
        "{} change activities",
        ean.edge_slice()
            .iter()
            .filter(|a| a.activity_type == ActivityType::Change)
            .count()
    );
    Ok(ean)
}
