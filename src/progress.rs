//! Progress indicators for long-running commands.

use indicatif::{ProgressBar, ProgressStyle};

/// A bar counting `len` items, hidden when output is quiet
pub fn bar(len: u64, prefix: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(
        "{prefix:.bold} {spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("=>-"));
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb
}
