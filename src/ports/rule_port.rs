//! Rule configuration port trait.

use crate::domain::error::TradefuseError;
use crate::domain::rationale::{Profile, WeightedRule};

pub trait RulePort: Send + Sync {
    /// The profile's (rule name, weight) pairs in authoring order.
    fn get_weights(&self, profile: Profile) -> Result<Vec<WeightedRule>, TradefuseError>;
}
