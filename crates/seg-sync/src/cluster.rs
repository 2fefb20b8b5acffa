/// Source of cluster membership for acknowledgement writes.
pub trait ClusterMembership: Send + Sync {
    /// Id of this node.
    fn local_node(&self) -> String;

    /// Ids of every live node, including this one.
    fn nodes(&self) -> Vec<String>;

    /// Live nodes other than this one.
    fn peers(&self) -> Vec<String> {
        let local = self.local_node();
        self.nodes()
            .into_iter()
            .filter(|n| !n.eq_ignore_ascii_case(&local))
            .collect()
    }
}

/// Fixed membership, typically from settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticCluster {
    local: String,
    nodes: Vec<String>,
}

impl StaticCluster {
    pub fn new(local: impl Into<String>, nodes: Vec<String>) -> Self {
        Self {
            local: local.into(),
            nodes,
        }
    }

    /// A node that knows of no peers.
    pub fn single(local: impl Into<String>) -> Self {
        Self::new(local, Vec::new())
    }
}

impl ClusterMembership for StaticCluster {
    fn local_node(&self) -> String {
        self.local.clone()
    }

    fn nodes(&self) -> Vec<String> {
        self.nodes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peers_exclude_local_node() {
        let c = StaticCluster::new("Alpha", vec!["alpha".into(), "beta".into(), "gamma".into()]);
        assert_eq!(c.peers(), vec!["beta".to_string(), "gamma".to_string()]);
    }

    #[test]
    fn single_node_has_no_peers() {
        let c = StaticCluster::single("alpha");
        assert_eq!(c.local_node(), "alpha");
        assert!(c.nodes().is_empty());
        assert!(c.peers().is_empty());
    }
}
