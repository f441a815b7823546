use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::core::config::{normalize_key, NetworkSnapshot, PriceSheet, ResourceAllocation};
use crate::core::models::cost::{MemberCost, ServiceCost, Summary};

/// Monthly cost of one service instance under a regional price sheet.
/// Zero nodes means zero cost, not an error.
pub fn instance_cost(res: &ResourceAllocation, price: &PriceSheet) -> f64 {
    if res.nodes == 0 {
        return 0.0;
    }
    let per_node = res.cores * price.per_core
        + res.memory_gb * price.per_gb_memory
        + res.disk_gb * price.per_gb_disk
        + res.bandwidth_gb * price.per_gb_bandwidth;
    per_node * f64::from(res.nodes)
}

/// Build a fresh cost summary from a point-in-time network view.
///
/// A misconfigured member/service pair is skipped with a warning — it must
/// never block billing for everyone else. Members whose total comes out zero
/// are dropped from the snapshot.
pub fn build_summary(network: &NetworkSnapshot, now: DateTime<Utc>) -> Summary {
    let mut members: BTreeMap<String, MemberCost> = BTreeMap::new();
    let mut services: BTreeMap<String, ServiceCost> = BTreeMap::new();

    // case-insensitive indices
    let svc_by_name: BTreeMap<String, (&String, &crate::core::config::ServiceConfig)> = network
        .services
        .iter()
        .map(|(name, svc)| (normalize_key(name), (name, svc)))
        .collect();
    let price_by_region: BTreeMap<String, &PriceSheet> = network
        .pricing
        .iter()
        .map(|(region, sheet)| (normalize_key(region), sheet))
        .collect();

    for (member_id, member) in &network.members {
        if !member.active {
            debug!(member = %member_id, "skipping inactive member");
            continue;
        }

        let Some(price) = price_by_region.get(&normalize_key(&member.region)) else {
            warn!(
                member = %member_id,
                region = %member.region,
                "region has no pricing entry, member skipped"
            );
            continue;
        };

        let mut member_cost = MemberCost {
            member: member_id.clone(),
            service_costs: BTreeMap::new(),
            total: 0.0,
        };

        for names in member.assignments.values() {
            for raw_name in names {
                let Some((svc_name, svc)) = svc_by_name.get(&normalize_key(raw_name)) else {
                    warn!(
                        member = %member_id,
                        service = %raw_name,
                        "unknown service assigned, skipped"
                    );
                    continue;
                };

                if !svc.active {
                    debug!(member = %member_id, service = %svc_name, "skipping inactive service");
                    continue;
                }

                // contributions are additive: the same service can arrive
                // through multiple assignment groups
                let cost = instance_cost(&svc.resources, price);
                *member_cost
                    .service_costs
                    .entry((*svc_name).clone())
                    .or_insert(0.0) += cost;
                member_cost.total += cost;

                let sc = services
                    .entry((*svc_name).clone())
                    .or_insert_with(|| ServiceCost {
                        service: (*svc_name).clone(),
                        member_costs: BTreeMap::new(),
                        total: 0.0,
                    });
                *sc.member_costs.entry(member_id.clone()).or_insert(0.0) += cost;
                sc.total += cost;
            }
        }

        if member_cost.total > 0.0 {
            members.insert(member_id.clone(), member_cost);
        }
    }

    Summary {
        members,
        services,
        refreshed_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{MemberConfig, ServiceConfig};

    fn price() -> PriceSheet {
        PriceSheet {
            per_core: 10.0,
            per_gb_memory: 1.0,
            per_gb_disk: 0.1,
            per_gb_bandwidth: 0.01,
        }
    }

    fn res(nodes: u32) -> ResourceAllocation {
        ResourceAllocation {
            nodes,
            cores: 4.0,
            memory_gb: 16.0,
            disk_gb: 100.0,
            bandwidth_gb: 1000.0,
        }
    }

    fn network() -> NetworkSnapshot {
        let mut net = NetworkSnapshot::default();
        net.pricing.insert("europe".into(), price());
        net.services.insert(
            "chain-rpc".into(),
            ServiceConfig {
                active: true,
                level: 3,
                domains: vec!["rpc.example.net".into()],
                resources: res(2),
            },
        );
        net.members.insert(
            "metanodes".into(),
            MemberConfig {
                region: "Europe".into(),
                active: true,
                assignments: BTreeMap::from([("rpc".into(), vec!["chain-rpc".into()])]),
            },
        );
        net
    }

    // per node: 4*10 + 16*1 + 100*0.1 + 1000*0.01 = 76.0
    const PER_NODE: f64 = 76.0;

    #[test]
    fn instance_cost_basic() {
        let cost = instance_cost(&res(2), &price());
        assert!((cost - 2.0 * PER_NODE).abs() < 1e-9);
    }

    #[test]
    fn zero_nodes_zero_cost() {
        assert_eq!(instance_cost(&res(0), &price()), 0.0);
    }

    #[test]
    fn member_and_service_totals_agree() {
        let mut net = network();
        net.members.insert(
            "polkadotters".into(),
            MemberConfig {
                region: "europe".into(),
                active: true,
                assignments: BTreeMap::from([("rpc".into(), vec!["chain-rpc".into()])]),
            },
        );
        let summary = build_summary(&net, Utc::now());

        let member_sum: f64 = summary.members.values().map(|m| m.total).sum();
        let service_sum: f64 = summary.services.values().map(|s| s.total).sum();
        let pair_sum: f64 = summary
            .members
            .values()
            .flat_map(|m| m.service_costs.values())
            .sum();

        assert!((member_sum - service_sum).abs() < 1e-9);
        assert!((member_sum - pair_sum).abs() < 1e-9);
        assert!((member_sum - 4.0 * PER_NODE).abs() < 1e-9);
    }

    #[test]
    fn unknown_region_skips_member_only() {
        let mut net = network();
        net.members.insert(
            "lostnodes".into(),
            MemberConfig {
                region: "atlantis".into(),
                active: true,
                assignments: BTreeMap::from([("rpc".into(), vec!["chain-rpc".into()])]),
            },
        );
        let summary = build_summary(&net, Utc::now());
        assert!(summary.members.contains_key("metanodes"));
        assert!(!summary.members.contains_key("lostnodes"));
    }

    #[test]
    fn unknown_service_skipped_member_kept() {
        let mut net = network();
        net.members
            .get_mut("metanodes")
            .unwrap()
            .assignments
            .insert("bogus".into(), vec!["no-such".into()]);
        let summary = build_summary(&net, Utc::now());
        let mc = &summary.members["metanodes"];
        assert_eq!(mc.service_costs.len(), 1);
        assert!((mc.total - 2.0 * PER_NODE).abs() < 1e-9);
    }

    #[test]
    fn member_with_only_skipped_services_is_dropped() {
        let mut net = network();
        net.members.insert(
            "emptynodes".into(),
            MemberConfig {
                region: "europe".into(),
                active: true,
                assignments: BTreeMap::from([("x".into(), vec!["no-such".into()])]),
            },
        );
        let summary = build_summary(&net, Utc::now());
        assert!(!summary.members.contains_key("emptynodes"));
    }

    #[test]
    fn inactive_service_not_billed() {
        let mut net = network();
        net.services.get_mut("chain-rpc").unwrap().active = false;
        let summary = build_summary(&net, Utc::now());
        assert!(summary.members.is_empty());
        assert!(summary.services.is_empty());
    }

    #[test]
    fn duplicate_assignment_groups_sum() {
        let mut net = network();
        net.members
            .get_mut("metanodes")
            .unwrap()
            .assignments
            .insert("backup".into(), vec!["Chain-RPC".into()]);
        let summary = build_summary(&net, Utc::now());
        let mc = &summary.members["metanodes"];
        assert!((mc.service_costs["chain-rpc"] - 4.0 * PER_NODE).abs() < 1e-9);
        assert!((mc.total - 4.0 * PER_NODE).abs() < 1e-9);
        assert!((summary.services["chain-rpc"].total - 4.0 * PER_NODE).abs() < 1e-9);
    }

    #[test]
    fn service_lookup_is_case_insensitive() {
        let mut net = network();
        net.members.get_mut("metanodes").unwrap().assignments =
            BTreeMap::from([("rpc".into(), vec![" CHAIN-rpc ".into()])]);
        let summary = build_summary(&net, Utc::now());
        assert!(summary.members["metanodes"].service_costs.contains_key("chain-rpc"));
    }
}
