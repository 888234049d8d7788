use crate::error::{self, Result};
use snafu::ensure;
use std::collections::{HashMap, HashSet};

/// Resolves the transitive include-closure for every bundle named in `includes_map`
/// (each bundle is a member of its own closure), memoizing shared sub-closures within
/// one call since multiple bundles commonly `include` the same dependency bundle.
///
/// Fails with [`error::Error::IncludeCycle`] if `Header.includes` forms a cycle.
pub fn compute_all(includes_map: &HashMap<String, Vec<String>>) -> Result<HashMap<String, Vec<String>>> {
    let mut memo = HashMap::new();
    let mut names: Vec<&String> = includes_map.keys().collect();
    names.sort();
    for name in names {
        let mut stack = Vec::new();
        resolve(name, includes_map, &mut memo, &mut stack)?;
    }
    Ok(memo)
}

fn resolve(
    name: &str,
    map: &HashMap<String, Vec<String>>,
    memo: &mut HashMap<String, Vec<String>>,
    stack: &mut Vec<String>,
) -> Result<Vec<String>> {
    if let Some(cached) = memo.get(name) {
        return Ok(cached.clone());
    }
    ensure!(
        !stack.iter().any(|s| s == name),
        error::IncludeCycleSnafu {
            name,
            path: {
                let mut p = stack.clone();
                p.push(name.to_string());
                p
            },
        }
    );

    stack.push(name.to_string());
    let mut closure = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    closure.push(name.to_string());
    seen.insert(name.to_string());

    if let Some(children) = map.get(name) {
        for child in children {
            let child_closure = resolve(child, map, memo, stack)?;
            for entry in child_closure {
                if seen.insert(entry.clone()) {
                    closure.push(entry);
                }
            }
        }
    }

    stack.pop();
    memo.insert(name.to_string(), closure.clone());
    Ok(closure)
}
