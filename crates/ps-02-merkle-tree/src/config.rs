//! # Merkle Tree Configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::DEFAULT_LEVELS;

/// Tree construction and persistence settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TreeConfig {
    /// Tree depth; must match the pool contract.
    pub levels: usize,

    /// Directory holding persisted trees.
    pub tree_dir: PathBuf,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LEVELS,
            tree_dir: PathBuf::from("data/trees"),
        }
    }
}

impl TreeConfig {
    /// Shallow tree for tests.
    pub fn for_testing() -> Self {
        Self {
            levels: 4,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TreeConfig = serde_json::from_str(r#"{"treeDir":"/tmp/trees"}"#).unwrap();
        assert_eq!(config.levels, DEFAULT_LEVELS);
        assert_eq!(config.tree_dir, PathBuf::from("/tmp/trees"));
    }
}
