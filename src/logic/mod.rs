pub mod decision;
pub mod fuzzy;
pub mod rules;
pub mod service;
pub mod validation;

pub use decision::{DecisionPolicy, NoRuleFiredPolicy};
pub use rules::build_control_system;
pub use service::{DecisionService, ServiceOptions};
