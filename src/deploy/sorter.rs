// ABOUTME: Dependency-respecting insertion of a deployer into its stage's list.
// ABOUTME: Keeps existing order unless input/output declarations force a move.

use std::collections::BTreeSet;

use super::DeployerHandle;

/// The deployers declare an input/output cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleDetected;

/// Insert `deployer` into an already ordered `list`.
///
/// Producers of the newcomer's inputs stay ahead of it and consumers of its
/// outputs stay behind it. When the existing order leaves room, the newcomer
/// goes as late as allowed and nothing else moves. Otherwise the whole list
/// is re-sorted, breaking ties by previous position.
pub fn insert(
    list: &[DeployerHandle],
    deployer: DeployerHandle,
) -> Result<Vec<DeployerHandle>, CycleDetected> {
    let lower = list
        .iter()
        .rposition(|d| d.feeds(&deployer))
        .map(|i| i + 1)
        .unwrap_or(0);
    let upper = list
        .iter()
        .position(|d| deployer.feeds(d))
        .unwrap_or(list.len());

    if lower <= upper {
        let mut sorted = list.to_vec();
        sorted.insert(upper, deployer);
        return Ok(sorted);
    }

    let mut all = list.to_vec();
    all.push(deployer);
    topological(&all)
}

/// Stable topological sort: among ready deployers, the earliest listed wins.
fn topological(all: &[DeployerHandle]) -> Result<Vec<DeployerHandle>, CycleDetected> {
    let n = all.len();
    let mut edges = vec![Vec::new(); n];
    let mut incoming = vec![0usize; n];
    for (i, from) in all.iter().enumerate() {
        for (j, to) in all.iter().enumerate() {
            if i != j && from.feeds(to) {
                edges[i].push(j);
                incoming[j] += 1;
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| incoming[i] == 0).collect();
    let mut sorted = Vec::with_capacity(n);
    while let Some(i) = ready.pop_first() {
        sorted.push(all[i].clone());
        for &j in &edges[i] {
            incoming[j] -= 1;
            if incoming[j] == 0 {
                ready.insert(j);
            }
        }
    }

    if sorted.len() == n {
        Ok(sorted)
    } else {
        Err(CycleDetected)
    }
}
