//! Report ordering and rendering

use crate::proxy::models::ProxyResult;
use crate::Result;

/// Sort results for display: by state in declaration order, then by proxy.
pub fn sort_results(results: &mut [ProxyResult]) {
    results.sort_by(|a, b| a.state.cmp(&b.state).then_with(|| a.proxy.cmp(&b.proxy)));
}

/// One line per result, in the given order.
pub fn render_lines(results: &[ProxyResult]) -> Vec<String> {
    results.iter().map(ToString::to_string).collect()
}

/// One JSON object per result, in the given order.
pub fn render_json_lines(results: &[ProxyResult]) -> Result<Vec<String>> {
    results
        .iter()
        .map(|r| serde_json::to_string(r).map_err(Into::into))
        .collect()
}
