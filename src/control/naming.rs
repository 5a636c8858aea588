/// Hostname parsing, re-exported unchanged from the Planner so the parser
/// and the name formatter stay adjacent. The Control Plane is the other
/// consumer of this single source of truth for ordering.
pub use crate::topology::{is_master_name, master_name, parse_name, ParsedName};
