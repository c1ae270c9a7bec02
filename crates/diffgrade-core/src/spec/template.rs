//! Reusable spec defaults.

use serde::{Deserialize, Serialize};

use crate::env::StdinFixture;
use crate::error::UnpreparedTestConfiguration;

/// Defaults shared by a family of specs.
///
/// Each use gets its own seed: the template seed plus the number of specs
/// registered so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecTemplate {
    pub name: String,
    pub class_name: String,
    pub max_score: f64,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub stdin: Option<StdinFixture>,
    #[serde(default = "default_order_matters")]
    pub order_matters: bool,
}

fn default_order_matters() -> bool {
    true
}

impl SpecTemplate {
    pub fn new(name: impl Into<String>, class_name: impl Into<String>, max_score: f64) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            max_score,
            hint: None,
            seed: None,
            stdin: None,
            order_matters: true,
        }
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn stdin(mut self, fixture: StdinFixture) -> Self {
        self.stdin = Some(fixture);
        self
    }

    pub fn order_insensitive(mut self) -> Self {
        self.order_matters = false;
        self
    }

    /// Seed for the use made after `registered` specs exist.
    pub fn seed_for(&self, registered: u64) -> Option<u64> {
        self.seed.map(|s| s.wrapping_add(registered))
    }

    /// Check the template has what every derived spec needs.
    pub fn validate(&self) -> Result<(), UnpreparedTestConfiguration> {
        let mut missing = Vec::new();
        if self.name.is_empty() {
            missing.push("name");
        }
        if self.class_name.is_empty() {
            missing.push("class_name");
        }
        if self.max_score <= 0.0 {
            missing.push("max_score");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(UnpreparedTestConfiguration::new(
                self.name.clone(),
                format!(
                    "template fields must be set before it is used; missing: [{}]",
                    missing.join(", ")
                ),
            ))
        }
    }
}
