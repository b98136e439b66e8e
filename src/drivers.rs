//! Planning steps run by the binary, one per subcommand.
//!
//! A step reads a dataset configuration (usually `basis/Config.cnf`), reads its inputs from the
//! files named by `default_*_file` keys, and writes its results and key figures back. File names
//! are resolved against the dataset directory, the parent of the directory holding the config.

use std::path::{Path, PathBuf};

use log::info;

use crate::activation::OdActivator;
use crate::col::{map_new, HashMap};
use crate::config::Config;
use crate::ean::{Ean, PeriodicTimetable};
use crate::ean_builder::{build_periodic_ean, EanParameters};
use crate::error::Result;
use crate::graph::Graph;
use crate::io::ean::{read_ean, read_timetable, write_activities, write_events, write_timetable};
use crate::io::limits::{read_station_limits, StationLimit};
use crate::io::line::{read_line_costs, read_lines, write_line_concept};
use crate::io::od::read_od;
use crate::io::ptn::{read_loads, read_ptn};
use crate::line::LinePool;
use crate::od::Od;
use crate::pesp::{solve_pesp_cycle_base, PespParameters};
use crate::ptn::Ptn;
use crate::routing::route_passengers;
use crate::statistic::Statistic;
use crate::tim_pass::{solve_tim_pass, TimPassParameters};
use crate::tim_veh::{solve_tim_veh, TimVehParameters};
use crate::timer::Timer;

pub struct Dataset {
    root: PathBuf,
    config: Config,
}

impl Dataset {
    /// Reads the config and applies its log level.
    pub fn open(config_path: &Path) -> Result<Self> {
        let config = Config::from_file(config_path)?;
        config.apply_log_level()?;
        let root = config_path
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Config::set_default(config.clone());
        Ok(Dataset { root, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn file(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(self.config.get_string(key)?))
    }

    fn ptn(&self) -> Result<Ptn> {
        let undirected = self
            .config
            .get_optional("ptn_is_undirected", Config::get_boolean)?
            .unwrap_or(true);
        read_ptn(
            &self.file("default_stops_file")?,
            &self.file("default_edges_file")?,
            !undirected,
        )
    }

    fn lines(&self, ptn: &Ptn, key: &str, with_frequencies: bool) -> Result<LinePool> {
        read_lines(&self.file(key)?, ptn, ptn.is_directed(), with_frequencies)
    }

    fn station_limits(&self) -> Result<HashMap<i64, StationLimit>> {
        if self.config.contains("default_station_limit_file") {
            read_station_limits(&self.file("default_station_limit_file")?)
        } else {
            Ok(map_new())
        }
    }

    fn ean(&self) -> Result<Ean> {
        read_ean(
            &self.file("default_events_periodic_file")?,
            &self.file("default_activities_periodic_file")?,
        )
    }

    fn write_ean(&self, ean: &Ean) -> Result<()> {
        write_events(&self.file("default_events_periodic_file")?, ean)?;
        write_activities(&self.file("default_activities_periodic_file")?, ean)
    }

    fn write_timetable(&self, ean: &Ean) -> Result<()> {
        let timetable = PeriodicTimetable::from_ean(
            ean,
            self.config.period_length()?,
            self.config.time_units_per_minute()?,
        );
        write_timetable(&self.file("default_timetable_periodic_file")?, &timetable)
    }

    /// Writes the default statistic into `default_statistic_file`, keeping other entries.
    fn write_statistic(&self) -> Result<()> {
        if self.config.contains("default_statistic_file") {
            Statistic::default_statistic().write(&self.file("default_statistic_file")?, true)?;
        }
        Ok(())
    }
}

fn finish(dataset: &Dataset, step: &str, timer: &Timer) -> Result<()> {
    let seconds = timer.elapsed().as_secs_f64();
    info!("{} finished after {:.3}s", step, seconds);
    Statistic::put_default(&format!("{}_running_time", step.replace('-', "_")), seconds);
    dataset.write_statistic()
}

/// Builds the periodic EAN of the line concept.
pub fn make_ean(config_path: &Path) -> Result<()> {
    let timer = Timer::started();
    let dataset = Dataset::open(config_path)?;
    let ptn = dataset.ptn()?;
    let concept = dataset.lines(&ptn, "default_lines_file", true)?;
    let parameters = EanParameters::from_config(dataset.config())?;
    let mut ean = build_periodic_ean(&ptn, concept.line_concept(), &dataset.station_limits()?, &parameters)?;
    let route = dataset
        .config()
        .get_optional("ean_route_passengers", Config::get_boolean)?
        .unwrap_or(false);
    if route {
        let od = read_od(&dataset.file("default_od_file")?)?;
        let change_penalty = dataset
            .config()
            .get_optional("ean_change_penalty", Config::get_double)?
            .unwrap_or(0.0);
        route_passengers(&mut ean, &od, change_penalty)?;
        info!("Routed {} passengers", od.number_of_passengers());
    }
    dataset.write_ean(&ean)?;
    info!("EAN with {} events and {} activities", ean.num_nodes(), ean.num_edges());
    Statistic::put_default("ean_events", ean.num_nodes());
    Statistic::put_default("ean_activities", ean.num_edges());
    finish(&dataset, "make-ean", &timer)
}

/// Periodic timetabling with the cycle base formulation.
pub fn tim_pesp_cycle_base(config_path: &Path) -> Result<()> {
    let timer = Timer::started();
    let dataset = Dataset::open(config_path)?;
    let mut parameters = PespParameters::from_config(dataset.config())?;
    parameters.solver.output_directory = dataset.root.clone();
    let mut ean = dataset.ean()?;
    if parameters.use_old_solution {
        read_timetable(
            &dataset.file("default_timetable_periodic_file")?,
            parameters.period,
            dataset.config().time_units_per_minute()?,
        )?
        .apply_to(&mut ean)?;
    }
    let solution = solve_pesp_cycle_base(&mut ean, &parameters)?;
    dataset.write_timetable(&ean)?;
    Statistic::put_default("tim_pesp_objective", solution.objective);
    finish(&dataset, "tim-pesp-cycle-base", &timer)
}

/// Line planning, timetabling and routing in one model.
pub fn tim_pass(config_path: &Path) -> Result<()> {
    let timer = Timer::started();
    let dataset = Dataset::open(config_path)?;
    let config = dataset.config();
    let mut ptn = dataset.ptn()?;
    read_loads(&dataset.file("default_loads_file")?, &mut ptn)?;
    let mut pool = dataset.lines(&ptn, "default_pool_file", false)?;
    read_line_costs(&dataset.file("default_pool_cost_file")?, &mut pool)?;
    let mut od_pairs = read_od(&dataset.file("default_od_file")?)?.od_pairs();
    let limits = dataset.station_limits()?;
    let mut parameters = TimPassParameters::from_config(config)?;
    parameters.solver.output_directory = dataset.root.clone();

    let activator = OdActivator::from_config(config)?;
    if activator.kind.needs_routes() {
        let mut every_line = pool.clone();
        for id in pool.lines().iter().map(|l| l.id) {
            every_line.line_mut(id)?.frequency = 1;
        }
        let ean = build_periodic_ean(&ptn, every_line.lines(), &limits, &parameters.ean)?;
        activator.activate(&mut od_pairs, &ptn, Some(&ean))?;
    } else {
        activator.activate(&mut od_pairs, &ptn, None)?;
    }

    let (ean, solution) = solve_tim_pass(&ptn, &mut pool, &od_pairs, &limits, &parameters)?;
    write_line_concept(&dataset.file("default_lines_file")?, &pool)?;
    dataset.write_ean(&ean)?;
    dataset.write_timetable(&ean)?;
    Statistic::put_default("tim_pass_objective", solution.objective);
    Statistic::put_default("tim_pass_passengers_with_transfer", solution.passengers_with_transfer);
    Statistic::put_default("lc_lines", pool.line_concept().len());
    finish(&dataset, "tim-pass", &timer)
}

/// Timetabling together with the vehicle schedule of the line concept.
pub fn tim_veh(config_path: &Path) -> Result<()> {
    let timer = Timer::started();
    let dataset = Dataset::open(config_path)?;
    let ptn = dataset.ptn()?;
    let concept = dataset.lines(&ptn, "default_lines_file", true)?;
    let mut ean = dataset.ean()?;
    let mut parameters = TimVehParameters::from_config(dataset.config())?;
    parameters.solver.output_directory = dataset.root.clone();
    let solution = solve_tim_veh(&ptn, &concept, &mut ean, &parameters)?;
    dataset.write_timetable(&ean)?;
    Statistic::put_default("tim_veh_objective", solution.objective);
    Statistic::put_default("vs_number_of_vehicles", solution.vehicles);
    Statistic::put_default("vs_empty_time", solution.turnaround_time);
    Statistic::put_default("vs_empty_distance", solution.turnaround_distance);
    finish(&dataset, "tim-veh", &timer)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::ean::ActivityType;
    use crate::test::sample::grid25_dir;

    fn copy_dataset(name: &str) -> PathBuf {
        let target = std::env::temp_dir().join(name);
        for dir in ["basis", "line-planning"] {
            fs::create_dir_all(target.join(dir)).unwrap();
            for entry in fs::read_dir(grid25_dir().join(dir)).unwrap() {
                let entry = entry.unwrap();
                fs::copy(entry.path(), target.join(dir).join(entry.file_name())).unwrap();
            }
        }
        target
    }

    #[test]
    fn test_make_ean_on_grid() {
        let root = copy_dataset("lintim_driver_make_ean");
        make_ean(&root.join("basis").join("Config.cnf")).unwrap();

        let ean = read_ean(
            &root.join("timetabling").join("Events-periodic.giv"),
            &root.join("timetabling").join("Activities-periodic.giv"),
        )
        .unwrap();
        // Ten undirected lines with four links each.
        assert_eq!(ean.num_nodes(), 160);
        let drives = ean
            .edge_slice()
            .iter()
            .filter(|a| a.activity_type == ActivityType::Drive)
            .count();
        assert_eq!(drives, 80);
        assert!(ean.edge_slice().iter().any(|a| a.passengers > 0.0));

        let statistic = Statistic::from_file(root.join("statistic").join("statistic.sta")).unwrap();
        assert_eq!(statistic.get_integer("ean_events").unwrap(), 160);
        assert!(statistic.contains("make_ean_running_time"));
    }

    #[test]
    fn test_missing_config() {
        let missing = std::env::temp_dir().join("lintim_no_dataset").join("basis").join("Config.cnf");
        assert!(make_ean(&missing).is_err());
    }
}
