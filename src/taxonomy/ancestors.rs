use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

/// A strictly-more-general ancestor of a taxonomy record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ancestor {
    pub uri: String,
    pub label: String,
}

/// Inverts the `narrowers` (parent→children) relation into a child→parents
/// "broader" map.
pub fn broader_map<'a>(
    records: impl Iterator<Item = (&'a str, &'a [String])>,
) -> HashMap<String, Vec<String>> {
    let mut broader: HashMap<String, Vec<String>> = HashMap::new();
    for (uri, narrowers) in records {
        for child in narrowers {
            broader.entry(child.clone()).or_default().push(uri.to_string());
        }
    }
    broader
}

/// Walks the broader relation transitively from `uri`, one or more hops,
/// returning every reachable ancestor uri, excluding `uri` itself.
///
/// The walk is BFS with a visited set, so it terminates even if the source
/// graph contains cycles. Acyclicity is not assumed.
pub fn walk_broader(broader: &HashMap<String, Vec<String>>, uri: &str) -> Vec<String> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    let mut ancestors = Vec::new();

    visited.insert(uri);
    queue.push_back(uri);

    while let Some(current) = queue.pop_front() {
        if let Some(parents) = broader.get(current) {
            for parent in parents {
                if visited.insert(parent) {
                    ancestors.push(parent.clone());
                    queue.push_back(parent);
                }
            }
        }
    }
    ancestors
}
