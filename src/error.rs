use std::path::PathBuf;

use mip::SolverError;
use thiserror::Error;

/// All failures of the planning core. The message of every variant starts with its stable code.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ALGORITHM
    #[error("A1: algorithm {algorithm} terminated without reaching its stopping criterion: {reason}")]
    AlgorithmStoppingCriterion { algorithm: String, reason: String },

    #[error("A2: infeasible parameter setting {parameter} = {value}")]
    AlgorithmInfeasibleParameterSettings { parameter: String, value: String },

    #[error("A3: Dijkstra found edge {edge} with negative length {length}")]
    AlgorithmDijkstraNegativeEdgeLength { edge: i64, length: f64 },

    #[error("A4: Dijkstra was queried for node {0} before a shortest path to it was computed")]
    AlgorithmDijkstraQueryBeforeComputation(i64),

    #[error("A5: Dijkstra does not know node {0}")]
    AlgorithmDijkstraUnknownNode(i64),

    #[error("A6: Dijkstra found no path from node {source_node} to node {target}")]
    AlgorithmDijkstraNetworkNotConnected { source_node: i64, target: i64 },

    #[error("A7: model {0} is infeasible")]
    AlgorithmInfeasibleModel(String),

    // CONFIG
    #[error("C1: included config file {0} does not exist")]
    ConfigIncludeNotFound(PathBuf),

    #[error("C2: config key {0} is missing")]
    ConfigKeyMissing(String),

    #[error("C3: config value {value} of key {key} is no {expected}")]
    ConfigTypeMismatch {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("C4: no config file name given")]
    ConfigNoFileName,

    // DATA
    #[error("D1: {kind} with index {index} not found")]
    DataIndexNotFound { kind: &'static str, index: i64 },

    #[error("D2: illegal event type {0}")]
    DataIllegalEventType(String),

    #[error("D3: illegal activity type {0}")]
    DataIllegalActivityType(String),

    #[error("D4: illegal line direction {0}")]
    DataIllegalLineDirection(String),

    #[error("D5: line pool has {pool} lines but line cost file has {costs} entries")]
    DataLinePoolCostInconsistency { pool: usize, costs: usize },

    #[error("D6: illegal value {value} for {field}")]
    DataIllegalValue { field: String, value: String },

    #[error("D7: timetable is inconsistent at {0}")]
    DataInconsistentTimetable(String),

    // GRAPH
    #[error("G1: node id {0} is assigned multiple times")]
    GraphNodeIdMultiplyAssigned(i64),

    #[error("G2: edge id {0} is assigned multiple times")]
    GraphEdgeIdMultiplyAssigned(i64),

    #[error("G3: incident node {node} of edge {edge} not found")]
    GraphIncidentNodeNotFound { edge: i64, node: i64 },

    // INPUT
    #[error("I1: input file {0} not found")]
    InputFileNotFound(PathBuf),

    #[error("I2: file {file} line {line} has {found} columns, expected {expected}")]
    InputWrongColumnCount {
        file: String,
        line: u64,
        found: usize,
        expected: usize,
    },

    #[error("I3: file {file} line {line}: {message}")]
    InputTypeInconsistency {
        file: String,
        line: u64,
        message: String,
    },

    // LINE
    #[error("L1: link {link} can not be added to line {line}")]
    LineLinkNotAddable { line: i64, link: i64 },

    #[error("L2: line {0} is not a path")]
    LineNotAPath(i64),

    // OUTPUT
    #[error("O1: output file {file} is not writable: {message}")]
    OutputFileNotWritable { file: PathBuf, message: String },

    // SOLVER
    #[error(transparent)]
    Solver(#[from] SolverError),

    // STATISTIC
    #[error("ST1: statistic key {0} is missing")]
    StatisticKeyMissing(String),

    #[error("ST2: statistic value {value} of key {key} is no {expected}")]
    StatisticTypeMismatch {
        key: String,
        value: String,
        expected: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
