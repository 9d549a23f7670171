//! `gridsim placement` — print PMU coordinates and collector assignment.
//!
//! Exercises the deterministic placement contract: running twice with the
//! same `pmu_placement_seed` prints identical coordinates and assignments.

use std::collections::BTreeMap;

use gridsim_core::Topology;

use super::load_world;

/// Run the placement command.
pub fn run(settings_path: &str, topology_path: &str) {
    let (settings, topology_config) = load_world(settings_path, topology_path);
    let topology = Topology::build(&settings, &topology_config).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    println!(
        "placement seed {} — {} PMUs on {}m x {}m",
        topology.placement_seed(),
        topology.pmus().len(),
        settings.width,
        settings.length
    );

    let mut per_gnb: BTreeMap<String, usize> = BTreeMap::new();
    for &pmu in topology.pmus() {
        let node = topology.node(pmu);
        let gnb = topology.closest_gnb(pmu).unwrap_or_else(|| {
            eprintln!("Error: {} has no assignable GNB", node.name);
            std::process::exit(1);
        });
        let gnb_node = topology.node(gnb);
        let distance = topology.distance(pmu, gnb);
        println!(
            "  {:<10} ({:>8.1}, {:>8.1})  -> {} ({distance:.1}m)",
            node.name, node.location.x, node.location.y, gnb_node.name
        );
        *per_gnb.entry(gnb_node.name.clone()).or_default() += 1;
    }

    println!("per-GNB fleet share:");
    for (gnb, count) in per_gnb {
        println!("  {gnb}: {count}");
    }
}
