use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::graph::{Edge, IdKeyedGraph, Node};
use crate::io::unquote;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Arrival,
    Departure,
    Fix,
    /// Source or target of a passenger path, never written to files.
    Virtual,
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match unquote(s.trim()).to_ascii_lowercase().as_str() {
            "arrival" => Ok(EventType::Arrival),
            "departure" => Ok(EventType::Departure),
            "fix" => Ok(EventType::Fix),
            "virtual" => Ok(EventType::Virtual),
            _ => Err(Error::DataIllegalEventType(s.into())),
        }
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EventType::Arrival => "\"arrival\"",
            EventType::Departure => "\"departure\"",
            EventType::Fix => "\"fix\"",
            EventType::Virtual => "\"virtual\"",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineDirection {
    Forward,
    Backward,
}

impl FromStr for LineDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match unquote(s.trim()) {
            ">" => Ok(LineDirection::Forward),
            "<" => Ok(LineDirection::Backward),
            _ => Err(Error::DataIllegalLineDirection(s.into())),
        }
    }
}

impl Display for LineDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LineDirection::Forward => ">",
            LineDirection::Backward => "<",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityType {
    Drive,
    Wait,
    Change,
    Turnaround,
    Headway,
    Sync,
    Virtual,
}

impl FromStr for ActivityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match unquote(s.trim()).to_ascii_lowercase().as_str() {
            "drive" => Ok(ActivityType::Drive),
            "wait" => Ok(ActivityType::Wait),
            "change" => Ok(ActivityType::Change),
            "turnaround" => Ok(ActivityType::Turnaround),
            "headway" => Ok(ActivityType::Headway),
            "sync" => Ok(ActivityType::Sync),
            "virtual" => Ok(ActivityType::Virtual),
            _ => Err(Error::DataIllegalActivityType(s.into())),
        }
    }
}

impl Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ActivityType::Drive => "\"drive\"",
            ActivityType::Wait => "\"wait\"",
            ActivityType::Change => "\"change\"",
            ActivityType::Turnaround => "\"turnaround\"",
            ActivityType::Headway => "\"headway\"",
            ActivityType::Sync => "\"sync\"",
            ActivityType::Virtual => "\"virtual\"",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicEvent {
    pub id: i64,
    pub event_type: EventType,
    pub stop_id: i64,
    pub line_id: i64,
    pub direction: LineDirection,
    pub repetition: i64,
    pub passengers: f64,
    pub time: i64,
}

impl PeriodicEvent {
    pub fn new(
        id: i64,
        event_type: EventType,
        stop_id: i64,
        line_id: i64,
        direction: LineDirection,
        repetition: i64,
    ) -> Self {
        PeriodicEvent {
            id,
            event_type,
            stop_id,
            line_id,
            direction,
            repetition,
            passengers: 0.0,
            time: 0,
        }
    }

    pub fn virtual_event(id: i64, stop_id: i64) -> Self {
        PeriodicEvent::new(id, EventType::Virtual, stop_id, 0, LineDirection::Forward, 1)
    }
}

impl Node for PeriodicEvent {
    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicActivity {
    pub id: i64,
    pub activity_type: ActivityType,
    pub left: i64,
    pub right: i64,
    pub lower_bound: i64,
    pub upper_bound: i64,
    pub passengers: f64,
}

impl PeriodicActivity {
    /// Fails unless `0 <= lower_bound <= upper_bound`.
    pub fn new(
        id: i64,
        activity_type: ActivityType,
        left: i64,
        right: i64,
        lower_bound: i64,
        upper_bound: i64,
        passengers: f64,
    ) -> Result<Self> {
        if lower_bound < 0 || lower_bound > upper_bound {
            return Err(Error::DataIllegalValue {
                field: format!("bounds of activity {}", id),
                value: format!("[{}, {}]", lower_bound, upper_bound),
            });
        }
        Ok(PeriodicActivity {
            id,
            activity_type,
            left,
            right,
            lower_bound,
            upper_bound,
            passengers,
        })
    }

    pub fn span(&self) -> i64 {
        self.upper_bound - self.lower_bound
    }

    /// Whether `duration` lies within the bounds.
    pub fn allows(&self, duration: i64) -> bool {
        self.lower_bound <= duration && duration <= self.upper_bound
    }

    /// The smallest duration `>= lower_bound` that realizes the given times modulo `period`.
    pub fn duration(&self, left_time: i64, right_time: i64, period: i64) -> i64 {
        let difference = (right_time - left_time).rem_euclid(period);
        let missing = (self.lower_bound - difference).max(0);
        difference + (missing + period - 1) / period * period
    }
}

impl Edge for PeriodicActivity {
    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn left_node(&self) -> i64 {
        self.left
    }

    fn right_node(&self) -> i64 {
        self.right
    }

    fn set_nodes(&mut self, left: i64, right: i64) {
        self.left = left;
        self.right = right;
    }

    fn is_directed(&self) -> bool {
        true
    }
}

/// An activity whose effective lower bound includes a buffer time.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedActivity {
    activity: PeriodicActivity,
    buffer: i64,
}

impl BufferedActivity {
    pub fn new(activity: PeriodicActivity) -> Self {
        BufferedActivity {
            activity,
            buffer: 0,
        }
    }

    /// Fails if the buffered lower bound would exceed the upper bound.
    pub fn set_buffer(&mut self, buffer: i64) -> Result<()> {
        if buffer < 0 || self.activity.lower_bound + buffer > self.activity.upper_bound {
            return Err(Error::DataIllegalValue {
                field: format!("buffer of activity {}", self.activity.id),
                value: buffer.to_string(),
            });
        }
        self.buffer = buffer;
        Ok(())
    }

    pub fn buffer(&self) -> i64 {
        self.buffer
    }

    pub fn lower_bound(&self) -> i64 {
        self.activity.lower_bound + self.buffer
    }

    pub fn upper_bound(&self) -> i64 {
        self.activity.upper_bound
    }

    pub fn activity(&self) -> &PeriodicActivity {
        &self.activity
    }

    /// The activity with the buffer folded into its lower bound.
    pub fn to_activity(&self) -> PeriodicActivity {
        PeriodicActivity {
            lower_bound: self.lower_bound(),
            ..self.activity.clone()
        }
    }
}

pub type Ean = IdKeyedGraph<PeriodicEvent, PeriodicActivity>;

/// Event times modulo the period, in `time_units_per_minute` resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicTimetable {
    period: i64,
    time_units_per_minute: i64,
    times: BTreeMap<i64, i64>,
}

impl PeriodicTimetable {
    pub fn new(period: i64, time_units_per_minute: i64) -> Self {
        PeriodicTimetable {
            period,
            time_units_per_minute,
            times: BTreeMap::new(),
        }
    }

    pub fn from_ean(ean: &Ean, period: i64, time_units_per_minute: i64) -> Self {
        let mut timetable = PeriodicTimetable::new(period, time_units_per_minute);
        for event in ean.node_slice() {
            timetable.set(event.id, event.time);
        }
        timetable
    }

    pub fn period(&self) -> i64 {
        self.period
    }

    pub fn time_units_per_minute(&self) -> i64 {
        self.time_units_per_minute
    }

    pub fn set(&mut self, event: i64, time: i64) {
        self.times.insert(event, time.rem_euclid(self.period));
    }

    pub fn get(&self, event: i64) -> Option<i64> {
        self.times.get(&event).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.times.iter().map(|(&e, &t)| (e, t))
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Changes the resolution, e.g. from seconds to minutes, rounding with `round`.
    pub fn rescale(&self, time_units_per_minute: i64, round: impl Fn(f64) -> f64) -> Self {
        let factor = time_units_per_minute as f64 / self.time_units_per_minute as f64;
        let period = round(self.period as f64 * factor) as i64;
        let mut rescaled = PeriodicTimetable::new(period, time_units_per_minute);
        for (&event, &time) in &self.times {
            rescaled.set(event, round(time as f64 * factor) as i64);
        }
        rescaled
    }

    /// Copies the times onto the events of `ean`. Fails for events without a time.
    pub fn apply_to(&self, ean: &mut Ean) -> Result<()> {
        for event in ean.nodes_mut() {
            event.time = self.get(event.id).ok_or(Error::DataIndexNotFound {
                kind: "timetable entry",
                index: event.id,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_types_parse_and_print() {
        assert_eq!("\"departure\"".parse::<EventType>().unwrap(), EventType::Departure);
        assert_eq!("arrival".parse::<EventType>().unwrap(), EventType::Arrival);
        assert_eq!(EventType::Departure.to_string(), "\"departure\"");
        assert_eq!(
            "\"boarding\"".parse::<EventType>().unwrap_err(),
            Error::DataIllegalEventType("\"boarding\"".into())
        );
        assert_eq!("\"sync\"".parse::<ActivityType>().unwrap(), ActivityType::Sync);
        assert!(matches!(
            "\"walk\"".parse::<ActivityType>(),
            Err(Error::DataIllegalActivityType(_))
        ));
        assert_eq!("<".parse::<LineDirection>().unwrap(), LineDirection::Backward);
        assert!(matches!(
            "^".parse::<LineDirection>(),
            Err(Error::DataIllegalLineDirection(_))
        ));
    }

    #[test]
    fn test_activity_bounds() {
        let activity = PeriodicActivity::new(1, ActivityType::Change, 1, 2, 3, 12, 5.0).unwrap();
        assert_eq!(activity.span(), 9);
        assert!(PeriodicActivity::new(2, ActivityType::Wait, 1, 2, 4, 3, 0.0).is_err());
        assert!(PeriodicActivity::new(3, ActivityType::Wait, 1, 2, -1, 3, 0.0).is_err());
        // times 8 and 1 in period 10 give 3, and 13 is needed for a lower bound of 12
        assert_eq!(activity.duration(8, 1, 10), 3);
        let long = PeriodicActivity::new(4, ActivityType::Drive, 1, 2, 12, 14, 0.0).unwrap();
        assert_eq!(long.duration(8, 1, 10), 13);
        assert!(long.allows(13));
    }

    #[test]
    fn test_buffered_activity() {
        let activity = PeriodicActivity::new(1, ActivityType::Drive, 1, 2, 3, 5, 0.0).unwrap();
        let mut buffered = BufferedActivity::new(activity);
        buffered.set_buffer(2).unwrap();
        assert_eq!(buffered.lower_bound(), 5);
        assert!(buffered.set_buffer(3).is_err());
        assert_eq!(buffered.buffer(), 2);
        assert_eq!(buffered.to_activity().lower_bound, 5);
        assert_eq!(buffered.activity().lower_bound, 3);
    }

    #[test]
    fn test_timetable_rescale() {
        let mut timetable = PeriodicTimetable::new(600, 10);
        timetable.set(1, 15);
        timetable.set(2, 605);
        assert_eq!(timetable.get(2), Some(5));
        let minutes = timetable.rescale(1, f64::ceil);
        assert_eq!(minutes.period(), 60);
        assert_eq!(minutes.get(1), Some(2));
        assert_eq!(minutes.get(2), Some(1));
        let floored = timetable.rescale(1, f64::floor);
        assert_eq!(floored.get(1), Some(1));
    }
}
