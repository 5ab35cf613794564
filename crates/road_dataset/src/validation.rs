//! Dataset presence checks run before training starts.

use crate::kitti::{list_pngs, testing_images_dir, training_root, IMAGE_SUBDIR, LABEL_SUBDIR};
use crate::types::{DatasetError, DatasetResult, LayoutSummary};
use std::path::Path;

/// File counts of the published KITTI road release.
pub const KITTI_COUNTS: LayoutSummary = LayoutSummary {
    training_images: 289,
    training_labels: 289,
    testing_images: 290,
};

fn count_non_empty(dir: &Path) -> DatasetResult<usize> {
    let count = list_pngs(dir)?.len();
    if count == 0 {
        return Err(DatasetError::EmptyDirectory {
            path: dir.to_path_buf(),
        });
    }
    Ok(count)
}

/// Verify the training/testing directories exist and hold images.
///
/// Counts that differ from the KITTI release are logged, not rejected, so
/// subsets and synthetic trees still pass.
pub fn check_kitti_layout(data_dir: &Path) -> DatasetResult<LayoutSummary> {
    let train = training_root(data_dir);
    let training_images = count_non_empty(&train.join(IMAGE_SUBDIR))?;
    let training_labels = list_pngs(&train.join(LABEL_SUBDIR))?
        .iter()
        .filter(|p| {
            p.file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|n| n.contains("_road_"))
        })
        .count();
    if training_labels == 0 {
        return Err(DatasetError::EmptyDirectory {
            path: train.join(LABEL_SUBDIR),
        });
    }
    let testing_images = count_non_empty(&testing_images_dir(data_dir))?;

    let summary = LayoutSummary {
        training_images,
        training_labels,
        testing_images,
    };
    if summary != KITTI_COUNTS {
        tracing::warn!(
            ?summary,
            expected = ?KITTI_COUNTS,
            "dataset counts differ from the KITTI road release"
        );
    } else {
        tracing::info!(?summary, "KITTI road dataset found");
    }
    Ok(summary)
}
