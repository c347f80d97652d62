//! Deferred overview building over already written chunk files.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::codec::{OverviewBuilder, OverviewRequest};
use crate::error::{BuildError, MosaicError, Result};

/// Outcome of one overview phase.
#[derive(Debug, Default)]
pub struct OverviewReport {
    /// Files that received overviews, with the number of levels added
    pub built: Vec<(PathBuf, usize)>,
    pub failed: Vec<(PathBuf, BuildError)>,
}

impl OverviewReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Build overviews for every file, once all of them have been written.
///
/// Per-file failures are recorded and do not stop the other files.
///
/// # Errors
/// Returns [`MosaicError::InvalidParameter`] when the step or the level count
/// is zero; no file is touched in that case.
pub fn build_overviews<B: OverviewBuilder, P: AsRef<Path> + Sync>(
    files: &[P],
    request: &OverviewRequest,
    builder: &B,
) -> Result<OverviewReport> {
    if request.downsample_step == 0 {
        return Err(MosaicError::InvalidParameter(
            "downsample_step must be positive".to_string(),
        ));
    }
    if request.num_steps == 0 {
        return Err(MosaicError::InvalidParameter("num_steps must be positive".to_string()));
    }

    info!(
        files = files.len(),
        step = request.downsample_step,
        levels = request.num_steps,
        "Building overviews"
    );

    let results: Vec<_> = files
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            (path.to_path_buf(), builder.build(path, request))
        })
        .collect();

    let mut report = OverviewReport::default();
    for (path, result) in results {
        match result {
            Ok(levels) => report.built.push((path, levels)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Overview build failed");
                report.failed.push((path, e));
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::DecodeError;

    #[derive(Default)]
    struct CountingBuilder {
        calls: AtomicUsize,
    }

    impl OverviewBuilder for CountingBuilder {
        fn build(&self, path: &Path, request: &OverviewRequest) -> std::result::Result<usize, BuildError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if path.ends_with("bad.tif") {
                return Err(BuildError::Decode(DecodeError::MissingGeoreference {
                    path: path.to_path_buf(),
                }));
            }
            Ok(request.num_steps as usize)
        }
    }

    #[test]
    fn test_zero_parameters_abort_phase() {
        let builder = CountingBuilder::default();
        let files = [PathBuf::from("m_0.tif")];
        for (step, steps) in [(0, 4), (2, 0)] {
            let request = OverviewRequest {
                downsample_step: step,
                num_steps: steps,
                ..OverviewRequest::default()
            };
            assert!(matches!(
                build_overviews(&files, &request, &builder),
                Err(MosaicError::InvalidParameter(_))
            ));
        }
        assert_eq!(builder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failures_are_recorded() {
        let builder = CountingBuilder::default();
        let files = [PathBuf::from("m_0.tif"), PathBuf::from("bad.tif"), PathBuf::from("m_1.tif")];
        let report = build_overviews(&files, &OverviewRequest::default(), &builder).unwrap();
        assert_eq!(report.built.len(), 2);
        assert_eq!(report.built[0], (PathBuf::from("m_0.tif"), 4));
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_complete());
        assert_eq!(builder.calls.load(Ordering::SeqCst), 3);
    }
}
