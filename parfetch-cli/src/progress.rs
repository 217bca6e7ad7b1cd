use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(100);
const BAR_TEMPLATE: &str = "{prefix} {bar:40.cyan/blue} {bytes}/{total_bytes} ({percent:>3}%) [{elapsed_precise}] ({eta}) {bytes_per_sec}{msg}";
const SPINNER_TEMPLATE: &str =
    "{prefix} {spinner} {bytes} downloaded [{elapsed_precise}] ({bytes_per_sec}){msg}";

/// Terminal progress for one download attempt.
///
/// Starts as a spinner and turns into a bar the first time the engine
/// reports a total.
#[derive(Clone)]
pub struct TransferBar {
    bar: ProgressBar,
    sized: Arc<AtomicBool>,
}

impl TransferBar {
    pub fn new(label: &str, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            bar.enable_steady_tick(TICK);
            bar
        };
        bar.set_prefix(format_label(label));
        bar.set_style(spinner_style());
        Self {
            bar,
            sized: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn update(&self, downloaded: u64, total: Option<u64>) {
        if let Some(total) = total {
            if !self.sized.swap(true, Ordering::SeqCst) {
                self.bar.set_length(total);
                self.bar.set_style(bar_style());
            }
        }
        self.bar.set_position(downloaded);
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.bar.set_message(message.into());
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_and_clear();
        if !message.is_empty() {
            println!("{message}");
        }
    }

    pub fn abandon(&self) {
        self.bar.finish_and_clear();
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["-", "\\", "|", "/", "-"])
}

fn format_label(label: &str) -> String {
    const MAX: usize = 25;
    if label.chars().count() <= MAX {
        return label.to_string();
    }
    let tail: Vec<char> = label.chars().rev().take(MAX - 3).collect();
    format!("...{}", tail.into_iter().rev().collect::<String>())
}

pub fn connection_message(chunks: usize) -> String {
    if chunks > 1 {
        format!(" [{} connections]", chunks)
    } else {
        String::new()
    }
}
