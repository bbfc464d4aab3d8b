use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::future::Future;
use std::time::Duration;

/// Page & group progress bars for an acquisition run.
pub(crate) struct Progress {
    pub(crate) multi: Option<MultiProgress>,
    pub(crate) pages: ProgressBar,
    pub(crate) groups: ProgressBar,
}

impl Progress {
    pub(crate) fn hidden() -> Self {
        Self {
            multi: None,
            pages: ProgressBar::hidden(),
            groups: ProgressBar::hidden(),
        }
    }

    pub(crate) fn finish(&self) {
        self.groups.finish_and_clear();
        self.pages.finish();
    }
}

pub(crate) fn multi_progress(pages: u64, groups: u64) -> anyhow::Result<Progress> {
    let multi = MultiProgress::new();

    // screener pages; the length grows once the first page reports its count
    let page_bar = multi.add(
        ProgressBar::new(pages).with_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.magenta}\n \
                        {msg:>9.white} |{bar:57.white/grey}| {pos:<2} / {human_len} \
                        ({percent_precise}%) [Time: {elapsed}, ETA: {eta}]",
                )?
                .progress_chars("## "),
        ),
    );
    page_bar.set_message("pages");
    page_bar.enable_steady_tick(Duration::from_millis(100));

    // metric groups of the current page
    let group_bar = multi.insert_after(
        &page_bar,
        ProgressBar::new(groups).with_style(
            ProgressStyle::default_bar()
                .template(" {msg:>9.green} |{bar:57.green}| {pos:<2.green} / {len}")?
                .progress_chars("## "),
        ),
    );
    group_bar.set_message("groups");

    Ok(Progress {
        multi: Some(multi),
        pages: page_bar,
        groups: group_bar,
    })
}

pub(crate) fn multi_progress_spinner(multi: Option<&MultiProgress>, msg: String) -> ProgressBar {
    match multi {
        Some(m) => {
            let style = ProgressStyle::default_spinner()
                .template("\t   > {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            m.add(ProgressBar::new_spinner().with_message(msg).with_style(style))
        }
        None => ProgressBar::hidden(),
    }
}

/// Await `task` under `spinner`, clearing the spinner however the task ends.
pub(crate) async fn with_spinner<F: Future>(spinner: ProgressBar, task: F) -> F::Output {
    let output = task.await;
    spinner.finish_and_clear();
    output
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spinner_is_cleared_when_the_task_fails() {
        let spinner = ProgressBar::hidden();
        let result: Result<(), &str> = with_spinner(spinner.clone(), async { Err("429") }).await;

        assert!(result.is_err());
        assert!(spinner.is_finished());
    }

    #[test]
    fn hidden_progress_finishes_both_bars() {
        let progress = Progress::hidden();
        progress.finish();

        assert!(progress.pages.is_finished());
        assert!(progress.groups.is_finished());
    }
}
