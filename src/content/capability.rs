use std::collections::BTreeMap;

/// Answers whether content of one kind could hold a reference to another kind.
/// Must over-approximate: returning `false` lets the rewriter skip files.
pub trait ReferenceCapability {
    fn can_reference(&self, holder_kind: &str, target_kind: &str) -> bool;
}

/// Table-driven [`ReferenceCapability`]. Kinds without an entry may reference
/// anything.
#[derive(Debug, Clone, Default)]
pub struct ReferenceRules {
    rules: BTreeMap<String, Vec<String>>,
}

impl ReferenceRules {
    pub fn new(rules: BTreeMap<String, Vec<String>>) -> Self {
        Self { rules }
    }
}

impl ReferenceCapability for ReferenceRules {
    fn can_reference(&self, holder_kind: &str, target_kind: &str) -> bool {
        match self.rules.get(holder_kind) {
            Some(targets) => targets.iter().any(|t| t == target_kind),
            None => true,
        }
    }
}
