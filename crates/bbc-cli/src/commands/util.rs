use anyhow::{Context, Result};
use rayon::ThreadPoolBuilder;

/// Resolve a thread spec and size the global rayon pool to match.
pub fn configure_threads(spec: &str) -> Result<usize> {
    let count = if spec.eq_ignore_ascii_case("auto") {
        num_cpus::get()
    } else {
        spec.parse::<usize>()
            .with_context(|| format!("invalid thread count '{}', expected \"auto\" or a number", spec))?
            .max(1)
    };
    let _ = ThreadPoolBuilder::new().num_threads(count).build_global();
    Ok(count)
}

/// Parse a comma separated list of indices.
pub fn parse_indices(spec: &str) -> Result<Vec<usize>> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .with_context(|| format!("invalid index '{}'", s))
        })
        .collect()
}
