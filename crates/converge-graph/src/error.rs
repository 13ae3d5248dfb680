//! Error types for dependency graphs

/// The graph has no consistent topological order
///
/// Each entry of `cycles` is one strongly connected component that blocks
/// ordering, with its members sorted. A node that depends on itself forms a
/// component of one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circular dependency between {}", describe(.cycles))]
pub struct CycleError {
    /// Members of every cycle found
    pub cycles: Vec<Vec<String>>,
}

impl CycleError {
    /// Create cycle error from the offending components
    #[must_use]
    pub fn new(cycles: Vec<Vec<String>>) -> Self {
        Self { cycles }
    }

    /// Check whether a node (by display name) takes part in a cycle
    #[must_use]
    pub fn involves(&self, name: &str) -> bool {
        self.cycles.iter().flatten().any(|member| member == name)
    }
}

fn describe(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|members| format!("{{{}}}", members.join(", ")))
        .collect::<Vec<_>>()
        .join(" and ")
}
