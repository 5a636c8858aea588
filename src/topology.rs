/// Topology planning: turns a run configuration into a named, ordered list
/// of instance descriptors, plus the CIDR, flavor, and availability-zone
/// assignment rules that ride along with it.
///
/// The naming scheme is the single source of truth for instance ordering —
/// both the planner and the control plane parse it the same way, so the
/// formatter and parser below are kept next to each other and round-trip
/// tested.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::{Config, NetworkMode};
use crate::error::{CpError, CpResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum Role {
    Master,
    Server,
    Client,
}

impl Role {
    pub fn letter(self) -> char {
        match self {
            Role::Master => 'm',
            Role::Server => 's',
            Role::Client => 'c',
        }
    }

    fn from_letter(c: char) -> Option<Role> {
        match c {
            's' => Some(Role::Server),
            'c' => Some(Role::Client),
            _ => None,
        }
    }
}

/// One instance's position in the topology plus the resources it is bound
/// to once staged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    pub name: String,
    pub role: Role,
    pub router_index: u32,
    pub network_index: u32,
    pub instance_index: u32,
    pub flavor: Option<String>,
    pub availability_zone: Option<String>,
    pub boot_volume_size: Option<u32>,
}

/// A parsed instance name: `None` router/network index when the naming
/// scheme for this mode doesn't carry that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedName {
    pub role: Role,
    pub router_index: u32,
    pub network_index: u32,
    pub instance_index: u32,
}

/// The master's hostname: a literal three-segment name, structurally
/// distinct from every other instance so it is never mistaken for one
/// during pairing or recovery.
pub fn master_name(cp_id: &str) -> String {
    format!("cloudpunch-{cp_id}-master")
}

pub fn is_master_name(cp_id: &str, name: &str) -> bool {
    name == master_name(cp_id)
}

/// Format an instance name from its plan position, per the three naming
/// schemes (one per `network_mode`).
pub fn format_name(cp_id: &str, mode: &NetworkMode, desc: &InstanceDescriptor) -> String {
    let role = desc.role.letter();
    match mode {
        NetworkMode::Full => format!(
            "cloudpunch-{cp_id}-{role}-r{}-n{}-{role}{}",
            desc.router_index, desc.network_index, desc.instance_index
        ),
        NetworkMode::SingleRouter => format!(
            "cloudpunch-{cp_id}-{role}-master-n{}-{role}{}",
            desc.network_index, desc.instance_index
        ),
        NetworkMode::SingleNetwork => {
            format!("cloudpunch-{cp_id}-{role}{}", desc.instance_index)
        }
    }
}

/// Parse an instance name back into role/router/network/instance indices.
/// Returns `None` for the master's name or anything that doesn't match one
/// of the three schemes.
pub fn parse_name(cp_id: &str, mode: &NetworkMode, name: &str) -> Option<ParsedName> {
    let prefix = format!("cloudpunch-{cp_id}-");
    let rest = name.strip_prefix(&prefix)?;
    if rest == "master" {
        return None;
    }
    let segments: Vec<&str> = rest.split('-').collect();

    match mode {
        NetworkMode::Full => {
            // [role, r<R>, n<N>, role<I>]
            if segments.len() != 4 {
                return None;
            }
            let role = Role::from_letter(segments[0].chars().next()?)?;
            let router_index = segments[1].strip_prefix('r')?.parse().ok()?;
            let network_index = segments[2].strip_prefix('n')?.parse().ok()?;
            let instance_index = segments[3][1..].parse().ok()?;
            Some(ParsedName {
                role,
                router_index,
                network_index,
                instance_index,
            })
        }
        NetworkMode::SingleRouter => {
            // [role, "master", n<N>, role<I>]
            if segments.len() != 4 || segments[1] != "master" {
                return None;
            }
            let role = Role::from_letter(segments[0].chars().next()?)?;
            let network_index = segments[2].strip_prefix('n')?.parse().ok()?;
            let instance_index = segments[3][1..].parse().ok()?;
            Some(ParsedName {
                role,
                router_index: 0,
                network_index,
                instance_index,
            })
        }
        NetworkMode::SingleNetwork => {
            // [role<I>]
            if segments.len() != 1 {
                return None;
            }
            let role = Role::from_letter(segments[0].chars().next()?)?;
            let instance_index = segments[0][1..].parse().ok()?;
            Some(ParsedName {
                role,
                router_index: 0,
                network_index: 0,
                instance_index,
            })
        }
    }
}

/// The CIDR formulas: client routers/networks are offset by +127
/// to avoid clashing with server address space.
pub fn cidr_for(mode: &NetworkMode, role: Role, router_index: u32, network_index: u32) -> String {
    match mode {
        NetworkMode::Full => {
            let r = if role == Role::Client {
                router_index + 127
            } else {
                router_index
            };
            format!("10.{r}.{network_index}.0/24")
        }
        NetworkMode::SingleRouter => {
            let n = if role == Role::Client {
                network_index + 127
            } else {
                network_index
            };
            format!("10.{n}.0.0/16")
        }
        NetworkMode::SingleNetwork => "10.0.0.0/16".to_string(),
    }
}

/// Roles the planner stages, in canonical order. `server_client_mode` adds a
/// parallel client fleet; otherwise every worker is a plain server.
fn roles_for(config: &Config) -> Vec<Role> {
    if config.server_client_mode {
        vec![Role::Server, Role::Client]
    } else {
        vec![Role::Server]
    }
}

/// Build the ordered list of instance descriptors for one environment.
/// Flavor and availability-zone assignment (if configured) happen in a
/// second pass so they stay testable independent of staging.
pub fn plan(config: &Config) -> Vec<InstanceDescriptor> {
    let mut descriptors = Vec::new();

    for role in roles_for(config) {
        match config.network_mode {
            NetworkMode::Full => {
                for r in 1..=config.number_routers {
                    for n in 1..=config.networks_per_router {
                        for i in 1..=config.instances_per_network {
                            descriptors.push(InstanceDescriptor {
                                name: String::new(),
                                role,
                                router_index: r,
                                network_index: n,
                                instance_index: i,
                                flavor: None,
                                availability_zone: None,
                                boot_volume_size: None,
                            });
                        }
                    }
                }
            }
            NetworkMode::SingleRouter => {
                for n in 1..=config.networks_per_router {
                    for i in 1..=config.instances_per_network {
                        descriptors.push(InstanceDescriptor {
                            name: String::new(),
                            role,
                            router_index: 0,
                            network_index: n,
                            instance_index: i,
                            flavor: None,
                            availability_zone: None,
                            boot_volume_size: None,
                        });
                    }
                }
            }
            NetworkMode::SingleNetwork => {
                for i in 1..=config.instances_per_network {
                    descriptors.push(InstanceDescriptor {
                        name: String::new(),
                        role,
                        router_index: 0,
                        network_index: 0,
                        instance_index: i,
                        flavor: None,
                        availability_zone: None,
                        boot_volume_size: None,
                    });
                }
            }
        }
    }

    descriptors
}

/// Strip zero-weight flavors and check the total lands in [99, 100]%, per
/// The flavor-file rule.
pub fn validate_flavor_weights(weights: &[(String, f64)]) -> CpResult<Vec<(String, f64)>> {
    let nonzero: Vec<(String, f64)> = weights.iter().filter(|(_, w)| *w > 0.0).cloned().collect();
    let total: f64 = nonzero.iter().map(|(_, w)| w).sum();
    if !(99.0..=100.0).contains(&total) {
        return Err(CpError::Configuration(format!(
            "flavor_file weights must sum to between 99 and 100 percent, got {total}"
        )));
    }
    Ok(nonzero)
}

/// Assign a flavor to each of the `n` instances of one role by walking the
/// cumulative-percentage table: the k-th instance gets the first flavor
/// whose cumulative weight is >= k/n*100.
pub fn assign_flavors(n: u32, weights: &[(String, f64)]) -> Vec<String> {
    if weights.is_empty() || n == 0 {
        return Vec::new();
    }
    let mut cumulative = Vec::with_capacity(weights.len());
    let mut running = 0.0;
    for (_, w) in weights {
        running += w;
        cumulative.push(running);
    }

    let mut idx = 0;
    (1..=n)
        .map(|k| {
            let percent = (k as f64 / n as f64) * 100.0;
            while idx < cumulative.len() - 1 && percent > cumulative[idx] {
                idx += 1;
            }
            weights[idx].0.clone()
        })
        .collect()
}

/// A host-map row: the availability zone pair `(server_az, client_az)`
/// resolved through the tag table.
pub fn resolve_availability_zone(
    instance_index: u32,
    hostmap: &[String],
    tags: &HashMap<String, String>,
    role: Role,
) -> Option<String> {
    if hostmap.is_empty() {
        return None;
    }
    let len = hostmap.len() as u32;
    let mut line = instance_index % len;
    if line == 0 {
        line = len;
    }
    let row = &hostmap[(line - 1) as usize];
    let parts: Vec<&str> = row.split(',').collect();
    let raw = if role == Role::Client {
        parts.get(1).copied().unwrap_or(parts[0])
    } else {
        parts[0]
    };
    Some(tags.get(raw).cloned().unwrap_or_else(|| raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> Config {
        let mut c = Config::default();
        c.network_mode = NetworkMode::Full;
        c.number_routers = 2;
        c.networks_per_router = 2;
        c.instances_per_network = 2;
        c.server_client_mode = true;
        c.test = vec!["ping".into()];
        c
    }

    #[test]
    fn full_mode_name_round_trips() {
        let config = full_config();
        let plan_list = plan(&config);
        for desc in &plan_list {
            let name = format_name("123", &config.network_mode, desc);
            let parsed = parse_name("123", &config.network_mode, &name).unwrap();
            assert_eq!(parsed.role, desc.role);
            assert_eq!(parsed.router_index, desc.router_index);
            assert_eq!(parsed.network_index, desc.network_index);
            assert_eq!(parsed.instance_index, desc.instance_index);
        }
    }

    #[test]
    fn s1_trivial_full_mode_pair() {
        let mut config = Config::default();
        config.network_mode = NetworkMode::Full;
        config.number_routers = 1;
        config.networks_per_router = 1;
        config.instances_per_network = 1;
        config.server_client_mode = true;
        config.test = vec!["ping".into()];

        let descriptors = plan(&config);
        assert_eq!(descriptors.len(), 2);

        let server = &descriptors[0];
        let client = &descriptors[1];
        assert_eq!(
            format_name("1", &config.network_mode, server),
            "cloudpunch-1-s-r1-n1-s1"
        );
        assert_eq!(
            format_name("1", &config.network_mode, client),
            "cloudpunch-1-c-r1-n1-c1"
        );
        assert_eq!(
            cidr_for(&config.network_mode, Role::Server, 1, 1),
            "10.1.1.0/24"
        );
        assert_eq!(
            cidr_for(&config.network_mode, Role::Client, 1, 1),
            "10.128.1.0/24"
        );
    }

    #[test]
    fn s2_single_network_no_pairing() {
        let mut config = Config::default();
        config.network_mode = NetworkMode::SingleNetwork;
        config.instances_per_network = 3;
        config.server_client_mode = false;
        config.test = vec!["ping".into()];

        let descriptors = plan(&config);
        let names: Vec<String> = descriptors
            .iter()
            .map(|d| format_name("7", &config.network_mode, d))
            .collect();
        assert_eq!(
            names,
            vec!["cloudpunch-7-s1", "cloudpunch-7-s2", "cloudpunch-7-s3"]
        );
        assert_eq!(cidr_for(&config.network_mode, Role::Server, 0, 0), "10.0.0.0/16");
    }

    #[test]
    fn s3_flavor_file_split() {
        let weights = validate_flavor_weights(&[("small".into(), 50.0), ("large".into(), 50.0)]).unwrap();
        let flavors = assign_flavors(4, &weights);
        assert_eq!(flavors, vec!["small", "small", "large", "large"]);
    }

    #[test]
    fn flavor_file_bad_total_rejected() {
        let result = validate_flavor_weights(&[("small".into(), 30.0), ("large".into(), 30.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn hostmap_wraps_and_resolves_tags() {
        let hostmap = vec!["az1,az2".to_string(), "az3,az4".to_string()];
        let mut tags = HashMap::new();
        tags.insert("az1".to_string(), "nova:az1".to_string());

        assert_eq!(
            resolve_availability_zone(1, &hostmap, &tags, Role::Server).as_deref(),
            Some("nova:az1")
        );
        // instance 2 % 2 == 0 -> last entry
        assert_eq!(
            resolve_availability_zone(2, &hostmap, &tags, Role::Client).as_deref(),
            Some("az4")
        );
        // instance 3 % 2 == 1 -> first entry again
        assert_eq!(
            resolve_availability_zone(3, &hostmap, &tags, Role::Server).as_deref(),
            Some("nova:az1")
        );
    }

    #[test]
    fn master_name_is_not_parsed_as_instance() {
        let name = master_name("9");
        assert_eq!(name, "cloudpunch-9-master");
        assert!(is_master_name("9", &name));
        assert!(parse_name("9", &NetworkMode::Full, &name).is_none());
    }
}
