pub mod fixtures;
pub mod maintenance_flows;
pub mod snapshot_flows;
