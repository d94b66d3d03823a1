#[path = "harness/backend_contract.rs"]
mod backend_contract;
#[path = "harness/end_to_end.rs"]
mod end_to_end;
#[path = "harness/state_properties.rs"]
mod state_properties;
