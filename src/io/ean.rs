use std::path::Path;

use crate::ean::{
    ActivityType, Ean, EventType, LineDirection, PeriodicActivity, PeriodicEvent,
    PeriodicTimetable,
};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::io::{read_rows, write_lines};

/// Reads events (`id; type; stop; line; passengers; direction; repetition`) and activities
/// (`id; type; from; to; lower bound; upper bound; passengers`).
pub fn read_ean(event_file: &Path, activity_file: &Path) -> Result<Ean> {
    let mut ean = Ean::new();
    for row in read_rows(event_file)? {
        row.expect_columns(7)?;
        let event_type: EventType = row.field(1).parse()?;
        let direction: LineDirection = row.field(5).parse()?;
        let mut event = PeriodicEvent::new(
            row.parse(0, "event id")?,
            event_type,
            row.parse(2, "stop id")?,
            row.parse(3, "line id")?,
            direction,
            row.parse(6, "repetition")?,
        );
        event.passengers = row.parse(4, "passengers")?;
        let id = event.id;
        if !ean.add_node(event)? {
            return Err(Error::GraphNodeIdMultiplyAssigned(id));
        }
    }
    for row in read_rows(activity_file)? {
        row.expect_columns(7)?;
        let activity_type: ActivityType = row.field(1).parse()?;
        let activity = PeriodicActivity::new(
            row.parse(0, "activity id")?,
            activity_type,
            row.parse(2, "from event")?,
            row.parse(3, "to event")?,
            row.parse::<f64>(4, "lower bound")?.round() as i64,
            row.parse::<f64>(5, "upper bound")?.round() as i64,
            row.parse(6, "passengers")?,
        )?;
        let id = activity.id;
        if !ean.add_edge(activity)? {
            return Err(Error::GraphEdgeIdMultiplyAssigned(id));
        }
    }
    Ok(ean)
}

/// Reads `event; time` lines.
pub fn read_timetable(path: &Path, period: i64, time_units_per_minute: i64) -> Result<PeriodicTimetable> {
    let mut timetable = PeriodicTimetable::new(period, time_units_per_minute);
    for row in read_rows(path)? {
        row.expect_columns(2)?;
        let (event, time): (i64, i64) = row.deserialize()?;
        timetable.set(event, time);
    }
    Ok(timetable)
}

pub fn write_events(path: &Path, ean: &Ean) -> Result<()> {
    write_lines(
        path,
        "event-id; type; stop-id; line-id; passengers; line-direction; line-freq-repetition",
        ean.node_slice()
            .iter()
            .filter(|e| e.event_type != EventType::Virtual)
            .map(|e| {
                format!(
                    "{}; {}; {}; {}; {}; {}; {}",
                    e.id, e.event_type, e.stop_id, e.line_id, e.passengers, e.direction, e.repetition
                )
            }),
    )
}

pub fn write_activities(path: &Path, ean: &Ean) -> Result<()> {
    write_lines(
        path,
        "activity-index; type; from-event; to-event; lower-bound; upper-bound; passengers",
        ean.edge_slice()
            .iter()
            .filter(|a| a.activity_type != ActivityType::Virtual)
            .map(|a| {
                format!(
                    "{}; {}; {}; {}; {}; {}; {}",
                    a.id, a.activity_type, a.left, a.right, a.lower_bound, a.upper_bound, a.passengers
                )
            }),
    )
}

pub fn write_timetable(path: &Path, timetable: &PeriodicTimetable) -> Result<()> {
    write_lines(
        path,
        "event-index; time",
        timetable.iter().map(|(event, time)| format!("{}; {}", event, time)),
    )
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_write_and_read_ean() {
        let dir = std::env::temp_dir().join("lintim_io_ean");
        let mut ean = Ean::new();
        ean.add_node(PeriodicEvent::new(1, EventType::Departure, 1, 1, LineDirection::Forward, 1))
            .unwrap();
        let mut arrival = PeriodicEvent::new(2, EventType::Arrival, 2, 1, LineDirection::Backward, 1);
        arrival.passengers = 2.5;
        ean.add_node(arrival).unwrap();
        ean.add_edge(PeriodicActivity::new(1, ActivityType::Drive, 1, 2, 3, 5, 2.5).unwrap())
            .unwrap();
        write_events(&dir.join("Events-periodic.giv"), &ean).unwrap();
        write_activities(&dir.join("Activities-periodic.giv"), &ean).unwrap();

        let text = fs::read_to_string(dir.join("Events-periodic.giv")).unwrap();
        assert!(text.contains("1; \"departure\"; 1; 1; 0; >; 1"));

        let read = read_ean(
            &dir.join("Events-periodic.giv"),
            &dir.join("Activities-periodic.giv"),
        )
        .unwrap();
        assert_eq!(read.node_slice(), ean.node_slice());
        assert_eq!(read.edge_slice(), ean.edge_slice());
    }

    #[test]
    fn test_illegal_types() {
        let dir = std::env::temp_dir().join("lintim_io_ean_illegal");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Events.giv"), "1; \"board\"; 1; 1; 0; >; 1\n").unwrap();
        fs::write(dir.join("Activities.giv"), "").unwrap();
        assert!(matches!(
            read_ean(&dir.join("Events.giv"), &dir.join("Activities.giv")),
            Err(Error::DataIllegalEventType(_))
        ));
        fs::write(dir.join("Events.giv"), "1; \"arrival\"; 1; 1; 0; ^; 1\n").unwrap();
        assert!(matches!(
            read_ean(&dir.join("Events.giv"), &dir.join("Activities.giv")),
            Err(Error::DataIllegalLineDirection(_))
        ));
    }

    #[test]
    fn test_timetable_round_trip() {
        let path = std::env::temp_dir().join("lintim_io_timetable.tim");
        let mut timetable = PeriodicTimetable::new(60, 1);
        timetable.set(1, 5);
        timetable.set(2, 61);
        write_timetable(&path, &timetable).unwrap();
        assert_eq!(read_timetable(&path, 60, 1).unwrap(), timetable);
    }
}
