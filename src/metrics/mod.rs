pub mod baseline;
pub mod crt;
pub mod events;
pub mod giri;
pub mod tsi;
pub mod window;

pub use baseline::{estimate_baselines, BaselineSet};
pub use crt::cognitive_reset_time;
pub use events::{CriticalEvent, EventCategory, EventClassifier, EventWeights};
pub use giri::goal_impact_response_index;
pub use tsi::team_support_index;
