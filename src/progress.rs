use indicatif::{ProgressBar, ProgressStyle};

use crate::callback::TransferCallback;

/// Creates a progress bar or spinner for a transfer.
///
/// # Arguments
/// * `total_size` - The transfer size in bytes, zero when unknown.
/// * `offset` - An optional offset to start the progress bar from.
/// * `name` - The name of the file being moved.
///
/// # Returns
/// A `ProgressBar` instance.
pub(crate) fn setup_progress_log(total_size: u64, offset: Option<u64>, name: &str) -> ProgressBar {
    if total_size == 0 {
        spinner()
    } else {
        progress_bar(total_size, offset, name)
    }
}

/// Bridge an indicatif bar into the callback shape the transfer engine
/// reports through.
pub(crate) fn progress_callback(pb: ProgressBar) -> TransferCallback {
    TransferCallback::wrap(move |done, total| {
        if pb.length() != Some(total) {
            pb.set_length(total);
        }
        pb.set_position(done);
    })
}

fn progress_bar(total_size: u64, offset: Option<u64>, name: &str) -> ProgressBar {
    let pb = ProgressBar::new(total_size);

    if let Some(offset) = offset {
        pb.inc(offset);
    }

    pb.set_style(ProgressStyle::default_bar()
        .template(&(name.to_owned() + " {bar:40.cyan} {percent:.cyan}% | {bytes}/{total_bytes} ({eta})\n"))
        .expect("Could not set progress bar style")
        .progress_chars("=>-"));

    pb
}

/// Spinner for transfers with an unknown size.
fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();

    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} Transferred {bytes}")
            .expect("Error setting progress style")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠏"),
    );

    pb
}
