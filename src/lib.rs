//! Optimization core of an integrated public transport planning toolkit: public transport
//! networks, line pools, periodic event-activity networks and the mixed-integer programs for
//! periodic timetabling, integrated line planning and vehicle scheduling.

pub mod activation;
pub mod col;
pub mod config;
pub mod cycle_base;
pub mod drivers;
pub mod ean;
pub mod ean_builder;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod io;
pub mod line;
pub mod od;
pub mod pesp;
pub mod ptn;
pub mod routing;
pub mod shortest_path;
pub mod shuffle;
pub mod solver;
pub mod statistic;
pub mod tim_pass;
pub mod tim_veh;
pub mod timer;
