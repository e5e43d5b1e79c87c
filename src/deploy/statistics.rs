// ABOUTME: Optional per-deployer timing statistics.
// ABOUTME: Accumulates elapsed time per deployer and unit for diagnostic listings.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

/// Elapsed deploy time per deployer, per unit.
#[derive(Debug, Default)]
pub struct DeployerStatistics {
    times: Mutex<HashMap<String, HashMap<String, Duration>>>,
    slow_threshold: Option<Duration>,
}

impl DeployerStatistics {
    pub fn new(slow_threshold: Option<Duration>) -> Self {
        Self {
            times: Mutex::new(HashMap::new()),
            slow_threshold,
        }
    }

    /// Add `elapsed` to the time `deployer` has spent on `unit`.
    pub fn record(&self, deployer: &str, unit: &str, elapsed: Duration) {
        if let Some(threshold) = self.slow_threshold
            && elapsed > threshold
        {
            tracing::warn!(
                "Deployer {} took {:?} on {} (threshold {:?})",
                deployer,
                elapsed,
                unit,
                threshold
            );
        }

        let mut times = self.times.lock();
        *times
            .entry(deployer.to_string())
            .or_default()
            .entry(unit.to_string())
            .or_default() += elapsed;
    }

    /// Total time per deployer, slowest first.
    pub fn totals(&self) -> Vec<(String, Duration)> {
        let times = self.times.lock();
        let mut totals: Vec<(String, Duration)> = times
            .iter()
            .map(|(name, units)| (name.clone(), units.values().sum()))
            .collect();
        totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        totals
    }

    /// Time spent by `deployer` on each unit, slowest first.
    pub fn units(&self, deployer: &str) -> Vec<(String, Duration)> {
        let times = self.times.lock();
        let mut units: Vec<(String, Duration)> = times
            .get(deployer)
            .map(|u| u.iter().map(|(n, d)| (n.clone(), *d)).collect())
            .unwrap_or_default();
        units.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        units
    }

    /// Render the statistics as a table, optionally with per-unit rows.
    pub fn render(&self, details: bool) -> String {
        let mut out = String::from("<table><tr><th>Deployer</th><th>Time</th></tr>");
        for (deployer, total) in self.totals() {
            out.push_str(&format!(
                "<tr><td>{}</td><td>{}ms</td></tr>",
                deployer,
                total.as_millis()
            ));
            if details {
                for (unit, elapsed) in self.units(&deployer) {
                    out.push_str(&format!(
                        "<tr><td>&nbsp;&nbsp;{}</td><td>{}ms</td></tr>",
                        unit,
                        elapsed.as_millis()
                    ));
                }
            }
        }
        out.push_str("</table>");
        out
    }
}
