//! End-to-end and property-based coverage over the simulator's public
//! surface. Each concrete scenario hand-builds wire-format scene content
//! and drives a unit's `clock_rise`/`clock_fall` pair directly, the way a
//! full `Simulator` run would, but scoped to the one or two units under
//! test.

mod cache_serialization;
mod crossbar_fairness;
mod destination_stack;
mod determinism;
mod empty_scene;
mod round_trip;
mod two_treelet;
mod write_combining;
