use anyhow::{anyhow, Context};
use models::bundle::{MANIFEST_FILE, VARIABLES_FILE};
use std::fs;
use std::io;
use std::path::Path;

/// Fallback for the bundle base URL when the run config leaves it unset.
pub const VGG_URL_ENV: &str = "FCN_ROAD_VGG_URL";

const BUNDLE_FILES: [&str; 2] = [MANIFEST_FILE, VARIABLES_FILE];

pub fn bundle_present(vgg_dir: &Path) -> bool {
    BUNDLE_FILES.iter().all(|f| vgg_dir.join(f).exists())
}

/// Make sure `vgg_dir` holds a backbone bundle, fetching missing files from
/// `base_url` (or `$FCN_ROAD_VGG_URL`).
pub fn ensure_pretrained_vgg(vgg_dir: &Path, base_url: Option<&str>) -> anyhow::Result<()> {
    if bundle_present(vgg_dir) {
        tracing::debug!(dir = %vgg_dir.display(), "pretrained bundle present");
        return Ok(());
    }
    let base = base_url
        .map(str::to_string)
        .or_else(|| std::env::var(VGG_URL_ENV).ok())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            anyhow!(
                "no pretrained bundle in {} and no download URL; set vgg_url or {VGG_URL_ENV}, \
                 or write one with the vgg_bundle binary",
                vgg_dir.display()
            )
        })?;

    tracing::info!(dir = %vgg_dir.display(), "downloading pretrained vgg model...");
    fs::create_dir_all(vgg_dir)
        .with_context(|| format!("failed to create {}", vgg_dir.display()))?;
    for file in BUNDLE_FILES {
        let dest_path = vgg_dir.join(file);
        if dest_path.exists() {
            continue;
        }
        let url = format!("{}/{file}", base.trim_end_matches('/'));
        tracing::info!(%url, "fetching");
        let resp = ureq::get(&url)
            .call()
            .with_context(|| format!("failed to download {url}"))?;
        let partial = dest_path.with_extension("part");
        let mut dest = fs::File::create(&partial)
            .with_context(|| format!("failed to create {}", partial.display()))?;
        let mut reader = resp.into_body().into_reader();
        io::copy(&mut reader, &mut dest).with_context(|| format!("failed to write {file}"))?;
        fs::rename(&partial, &dest_path)
            .with_context(|| format!("failed to move {} into place", dest_path.display()))?;
    }
    tracing::info!("download complete");
    Ok(())
}
