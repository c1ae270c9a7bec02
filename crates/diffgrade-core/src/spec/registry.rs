//! Numbered store of finalized specs.

use crate::obs;
use crate::spec::TestSpec;

/// Specs in registration order. Numbers start at 1 and never repeat.
#[derive(Debug, Default)]
pub struct SpecRegistry {
    specs: Vec<TestSpec>,
    next: u64,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number `spec` and store it. Returns the assigned number.
    pub fn register(&mut self, mut spec: TestSpec) -> u64 {
        self.next += 1;
        spec.number = self.next;
        obs::emit_spec_registered(spec.number, &spec.name, spec.kind.label());
        self.specs.push(spec);
        self.next
    }

    /// Specs registered so far, including any already drained.
    pub fn registered(&self) -> u64 {
        self.next
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn get(&self, number: u64) -> Option<&TestSpec> {
        self.specs.iter().find(|s| s.number == number)
    }

    /// Take every pending spec in sequence order.
    pub fn drain(&mut self) -> Vec<TestSpec> {
        std::mem::take(&mut self.specs)
    }
}
