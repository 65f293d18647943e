//! Path-encoded node positions used for event routing.

use core::fmt;

/// Deterministic identifier of a tree location: `0` for the root, with `_N`
/// appended for the Nth (1-based) child at each level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionId(Vec<u8>);

impl PositionId {
    pub fn root() -> Self {
        Self(b"0".to_vec())
    }

    pub fn child(&self, index: usize) -> Self {
        let mut out = Vec::with_capacity(self.0.len() + 4);
        out.extend_from_slice(&self.0);
        out.push(b'_');
        out.extend_from_slice(index.to_string().as_bytes());
        Self(out)
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of path segments; the root has depth 1.
    pub fn depth(&self) -> usize {
        self.0.iter().filter(|byte| **byte == b'_').count() + 1
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}
