//! Property coverage for round-robin arbitration: over any window of
//! cycles, every port that requests every cycle is granted close to its
//! fair share, and a port is never granted while it isn't requesting.

use arches_core::interconnect::Arbiter;
use proptest::prelude::*;

proptest! {
    #[test]
    fn every_grant_goes_to_a_requesting_port(
        num_ports in 1usize..=8,
        masks in proptest::collection::vec(proptest::collection::vec(any::<bool>(), 1..=8), 1..=60),
    ) {
        let mut arb = Arbiter::new(num_ports);
        for mask in masks {
            let requesting: Vec<bool> = (0..num_ports).map(|i| *mask.get(i).unwrap_or(&false)).collect();
            if let Some(granted) = arb.grant(&requesting) {
                prop_assert!(requesting[granted], "granted port {granted} was not requesting");
            } else {
                prop_assert!(requesting.iter().all(|&r| !r), "a requesting port was starved entirely");
            }
        }
    }

    #[test]
    fn constant_full_contention_gives_every_port_its_floor_share(num_ports in 1usize..=6, windows in 1u32..=10) {
        let mut arb = Arbiter::new(num_ports);
        let all = vec![true; num_ports];
        let cycles = windows * num_ports as u32;
        let mut counts = vec![0u32; num_ports];
        for _ in 0..cycles {
            let granted = arb.grant(&all).expect("every port requests every cycle");
            counts[granted] += 1;
        }
        let floor = cycles / num_ports as u32;
        for count in counts {
            prop_assert!(count + 1 >= floor, "port starved below its fair share: {count} < {floor} - 1");
        }
    }
}
