use std::path::PathBuf;

use log::{debug, error, info, warn};
use mip::{DoubleAttribute, DoubleParam, IntParam, Model, SolverKind, Status};

use crate::config::{Config, LogLevel};
use crate::error::{Error, Result};

/// Solver settings shared by the planning models, read from keys with a common prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverParameters {
    /// Seconds, `0` for no limit.
    pub time_limit: i64,
    pub mip_gap: f64,
    /// `0` for all threads.
    pub thread_limit: i64,
    pub write_lp_file: bool,
    pub output_messages: bool,
    pub solver_kind: SolverKind,
    /// Where LP and IIS files are written.
    pub output_directory: PathBuf,
}

impl Default for SolverParameters {
    fn default() -> Self {
        SolverParameters {
            time_limit: 0,
            mip_gap: 0.0,
            thread_limit: 0,
            write_lp_file: false,
            output_messages: false,
            solver_kind: SolverKind::Native,
            output_directory: PathBuf::from("."),
        }
    }
}

impl SolverParameters {
    pub fn from_config(config: &Config, prefix: &str) -> Result<Self> {
        let key = |name: &str| format!("{}{}", prefix, name);
        let defaults = SolverParameters::default();
        let output_messages = config
            .get_optional("console_log_level", Config::get_log_level)?
            .is_some_and(|level| level == LogLevel::Debug);
        Ok(SolverParameters {
            time_limit: config
                .get_optional(&key("timelimit"), Config::get_integer)?
                .unwrap_or(defaults.time_limit),
            mip_gap: config
                .get_optional(&key("mip_gap"), Config::get_double)?
                .unwrap_or(defaults.mip_gap),
            thread_limit: config
                .get_optional(&key("threads"), Config::get_integer)?
                .unwrap_or(defaults.thread_limit),
            write_lp_file: config
                .get_optional(&key("write_lp_file"), Config::get_boolean)?
                .unwrap_or(defaults.write_lp_file),
            output_messages,
            solver_kind: config
                .get_optional(&key("solver"), Config::get_solver_kind)?
                .unwrap_or(defaults.solver_kind),
            output_directory: defaults.output_directory,
        })
    }

    pub fn create_model(&self, name: &str) -> Result<Box<dyn Model>> {
        let mut model = mip::create_model(self.solver_kind, name)?;
        self.apply(model.as_mut())?;
        Ok(model)
    }

    pub fn apply(&self, model: &mut dyn Model) -> Result<()> {
        if self.time_limit > 0 {
            model.set_int_param(IntParam::Timelimit, self.time_limit)?;
        }
        if self.thread_limit > 0 {
            model.set_int_param(IntParam::Threads, self.thread_limit)?;
        }
        model.set_double_param(DoubleParam::MipGap, self.mip_gap)?;
        model.set_int_param(IntParam::OutputLevel, i64::from(self.output_messages))?;
        debug!("Solver parameters for {}: {:?}", model.name(), self);
        Ok(())
    }

    /// Writes the model as `<name>.lp` if requested.
    pub fn write_lp_file(&self, model: &dyn Model) -> Result<()> {
        if self.write_lp_file {
            let path = self.output_directory.join(format!("{}.lp", model.name()));
            info!("Writing {}", path.display());
            model.write(&path)?;
        }
        Ok(())
    }

    /// Solves `model` and checks that a solution is available. An infeasible model gets its
    /// IIS written to `<name>.ilp` before failing.
    pub fn solve(&self, model: &mut dyn Model) -> Result<Status> {
        model.solve()?;
        let status = model.status()?;
        match status {
            Status::Optimal => {
                info!(
                    "{}: optimal, objective {}",
                    model.name(),
                    model.double_attribute(DoubleAttribute::ObjVal)?
                );
            }
            Status::Feasible => {
                warn!(
                    "{}: feasible but not proven optimal, objective {}, gap {}",
                    model.name(),
                    model.double_attribute(DoubleAttribute::ObjVal)?,
                    model.double_attribute(DoubleAttribute::MipGap)?
                );
            }
            Status::Infeasible => {
                let path = self.output_directory.join(format!("{}.ilp", model.name()));
                error!("{}: infeasible, writing IIS to {}", model.name(), path.display());
                model.compute_iis(&path)?;
                return Err(Error::AlgorithmInfeasibleModel(model.name().to_string()));
            }
            Status::NoSolution => {
                return Err(Error::AlgorithmStoppingCriterion {
                    algorithm: model.name().to_string(),
                    reason: "no feasible solution found".into(),
                });
            }
        }
        Ok(status)
    }
}
