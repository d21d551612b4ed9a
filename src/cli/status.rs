use std::path::Path;

use anyhow::Result;

use crate::{
    daemon::{persist::PlaytimeFile, PLAYTIME_FILE},
    utils::time::format_duration,
};

/// Prints accumulated totals, longest first. Reads the persisted file rather
/// than anything in-process: the atomic rename on the daemon side means we
/// see a complete file that is at worst one poll interval stale.
pub fn show_status(app_dir: &Path) -> Result<()> {
    let totals = PlaytimeFile::new(app_dir.join(PLAYTIME_FILE)).load()?;

    if totals.is_empty() {
        println!("No playtime recorded yet.");
        return Ok(());
    }

    let mut entries = totals.into_iter().collect::<Vec<_>>();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (name, seconds) in entries {
        println!("{name}: {}", format_duration(seconds));
    }
    Ok(())
}
