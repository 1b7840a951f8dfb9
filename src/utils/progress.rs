use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const TEMPLATE: &str =
    "{msg} ({pos}/{len})\n[{bar:40.cyan/blue}] {percent}% • {elapsed_precise} (ETA: {eta})";

/// Progress bar for a loop of `len` steps; drawn only when `visible`.
pub fn create_progress_bar(len: u64, title: impl Into<String>, visible: bool) -> ProgressBar {
    let bar = ProgressBar::new(len).with_message(title.into());

    if !visible {
        bar.set_draw_target(ProgressDrawTarget::hidden());
        return bar;
    }

    match ProgressStyle::default_bar().template(TEMPLATE) {
        Ok(style) => bar.with_style(style.progress_chars("=>-")),
        Err(_) => bar,
    }
}
