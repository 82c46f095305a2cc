//! The `Unit` trait: every simulated component implements the same
//! two-phase clocking contract.

/// Identifies which dependency group a [`Unit`] belongs to.
///
/// Groups exist so the DRAM↔cache feedback loop resolves in a fixed order;
/// within a group, rise/fall order is registration order (see
/// [`crate::sim::simulator::Simulator`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u32);

/// A single simulated hardware component.
///
/// Every unit participates in two invocations per cycle: [`Unit::clock_rise`]
/// samples inputs into local shadow state and issues reads; [`Unit::clock_fall`]
/// commits outputs to crossbars and cascades. No unit may observe another
/// unit's same-cycle writes; every unit's rise phase only ever sees state
/// committed by some unit's fall phase on the *prior* cycle.
pub trait Unit {
    /// Rising-edge behavior: sample inputs, issue requests, advance internal
    /// pipelines that only read state.
    fn clock_rise(&mut self, cycle: u64);

    /// Falling-edge behavior: commit outputs, advance state that other units
    /// will observe next cycle.
    fn clock_fall(&mut self, cycle: u64);

    /// Dependency group this unit belongs to.
    fn group(&self) -> GroupId {
        GroupId(0)
    }

    /// A short name used in diagnostics and trace events.
    fn name(&self) -> &str;
}
