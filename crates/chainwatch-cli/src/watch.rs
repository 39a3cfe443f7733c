//! Watch mode: keep a view on screen and refresh it
//!
//! Every line typed on stdin counts as user activity, so an idle terminal
//! stops hitting the backend after the configured threshold. Single-letter
//! commands page through lists and switch the refresh cadence.

use crate::commands::App;
use crate::render::pagination_footer;
use anyhow::Result;
use chainwatch_client::{Listing, PageFetcher};
use chainwatch_core::{PageRequest, PagedResult};
use chainwatch_poll::{
    ActivityTracker, ListKey, PollingRefresher, RefreshInterval, RefreshState, RefresherConfig, Refreshable,
};
use comfy_table::Table;
use std::fmt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Next => f.write_str("next"),
            Direction::Previous => f.write_str("previous"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchCommand {
    Page(Direction),
    Interval(RefreshInterval),
    Refresh,
    Help,
    Quit,
    /// Empty line: only marks the user as active
    Touch,
}

impl WatchCommand {
    pub fn parse(line: &str) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "" => WatchCommand::Touch,
            "n" | "next" => WatchCommand::Page(Direction::Next),
            "p" | "prev" | "previous" => WatchCommand::Page(Direction::Previous),
            "s" | "short" => WatchCommand::Interval(RefreshInterval::Short),
            "l" | "long" => WatchCommand::Interval(RefreshInterval::Long),
            "r" | "refresh" => WatchCommand::Refresh,
            "q" | "quit" | "exit" => WatchCommand::Quit,
            _ => WatchCommand::Help,
        }
    }
}

const HELP: &str = "[n]ext [p]rev page, [s]hort/[l]ong interval, [r]efresh, [q]uit. Press Enter to stay active.";

/// Lines typed on stdin, read on a plain thread
///
/// The reader thread is detached so a pending read never holds up shutdown.
pub fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// What a redraw depends on
#[derive(Debug, PartialEq)]
struct Mark {
    refreshed: Option<Instant>,
    error: Option<String>,
    stale: bool,
    has_current: bool,
    interval: RefreshInterval,
}

impl Mark {
    fn of<K: PartialEq, T>(state: &RefreshState<K, T>) -> Self {
        Self {
            refreshed: state.last_refreshed,
            error: state.last_error.clone(),
            stale: state.stale,
            has_current: state.current().is_some(),
            interval: state.interval,
        }
    }
}

fn placeholder<K, T>(state: &RefreshState<K, T>) -> &'static str {
    if state.last_error.is_some() {
        "No data yet."
    } else {
        "Loading..."
    }
}

fn frame<K, T>(title: &str, state: &RefreshState<K, T>, config: &RefresherConfig, body: &str) -> String {
    let mut out = format!(
        "== {} | every {}s ({}) | {} ==\n",
        title,
        state.interval.duration(config).as_secs(),
        state.interval,
        chrono::Local::now().format("%H:%M:%S"),
    );
    if state.stale {
        out.push_str(&format!(
            "!! Data might be stale: refreshing paused after {} minutes without input. Press Enter to resume.\n",
            config.stale_after.as_secs() / 60
        ));
    }
    if let Some(error) = &state.last_error {
        out.push_str(&format!("!! Refresh failed: {} (showing last data)\n", error));
    }
    out.push_str(body);
    out
}

/// Key for the last page when the shown page lies past it
///
/// Lists shrink under a running view, e.g. after pairs are archived.
fn clamped_key<T>(key: &ListKey, page: &PagedResult<T>) -> Option<ListKey> {
    let last = page.clamped_request()?;
    Some(key.with_page(last.page))
}

pub async fn watch_list<L: Listing>(
    app: &App,
    resource_id: String,
    page: PageRequest,
    interval: RefreshInterval,
    noun: &'static str,
    render: fn(&[L::Item]) -> Table,
) -> Result<()> {
    let config = app.config.refresher_config();
    let activity = ActivityTracker::new(config.stale_after);
    let refresher = PollingRefresher::start(
        PageFetcher::<L>::new(app.client.clone()),
        ListKey::new(Some(resource_id.clone()), page),
        interval,
        activity,
        config.clone(),
    );

    let title = format!("{} of {}", noun, resource_id);
    run(
        refresher,
        &title,
        &config,
        |state| match state.current() {
            Some(page) if page.is_empty() => {
                format!("No {} found.\n{}", noun, pagination_footer(page))
            }
            Some(page) => format!("{}\n{}", render(&page.items), pagination_footer(page)),
            None => placeholder(state).to_string(),
        },
        |state, direction| {
            let page = state.current()?;
            let request = match direction {
                Direction::Next => page.next_page(),
                Direction::Previous => page.previous_page(),
            }?;
            Some(state.key.with_page(request.page))
        },
        |state| clamped_key(&state.key, state.current()?),
    )
    .await
}

pub async fn watch_detail<S>(
    app: &App,
    source: S,
    id: String,
    interval: RefreshInterval,
    noun: &'static str,
    render: fn(&S::Output) -> String,
) -> Result<()>
where
    S: Refreshable<Key = String>,
{
    let config = app.config.refresher_config();
    let activity = ActivityTracker::new(config.stale_after);
    let title = format!("{} {}", noun, id);
    let refresher = PollingRefresher::start(source, id, interval, activity, config.clone());

    run(
        refresher,
        &title,
        &config,
        |state| match state.current() {
            Some(output) => render(output),
            None => placeholder(state).to_string(),
        },
        |_, _| None,
        |_| None,
    )
    .await
}

async fn run<S, D, N, C>(
    mut refresher: PollingRefresher<S>,
    title: &str,
    config: &RefresherConfig,
    draw: D,
    navigate: N,
    clamp: C,
) -> Result<()>
where
    S: Refreshable,
    D: Fn(&RefreshState<S::Key, S::Output>) -> String,
    N: Fn(&RefreshState<S::Key, S::Output>, Direction) -> Option<S::Key>,
    C: Fn(&RefreshState<S::Key, S::Output>) -> Option<S::Key>,
{
    let mut rx = refresher.subscribe();
    let mut lines = stdin_lines();
    let mut last_mark = None;
    println!("{}", HELP);

    loop {
        let state = rx.borrow_and_update().clone();
        if let Some(key) = clamp(&state) {
            debug!(?key, "Page out of range, moving to last page");
            refresher.set_key(key);
            continue;
        }
        let mark = Mark::of(&state);
        if last_mark.as_ref() != Some(&mark) {
            println!("{}\n", frame(title, &state, config, &draw(&state)));
            last_mark = Some(mark);
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            line = lines.recv() => {
                let Some(line) = line else { break };
                refresher.activity().record();

                match WatchCommand::parse(&line) {
                    WatchCommand::Quit => break,
                    WatchCommand::Touch => {}
                    WatchCommand::Help => println!("{}", HELP),
                    WatchCommand::Refresh => {
                        println!("Refreshing...");
                        refresher.refresh_now();
                    }
                    WatchCommand::Interval(interval) => {
                        refresher.set_interval(interval);
                        println!("Refreshing every {}s", interval.duration(config).as_secs());
                    }
                    WatchCommand::Page(direction) => match navigate(&refresher.snapshot(), direction) {
                        Some(key) => {
                            debug!(?key, "Changing page");
                            refresher.set_key(key);
                        }
                        None => println!("No {} page.", direction),
                    },
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    refresher.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_key_moves_to_last_page() {
        let key = ListKey::new(Some("batch-1".to_string()), PageRequest::new(5, 20));
        let shrunk: PagedResult<u32> = PagedResult::new(vec![], 45, PageRequest::new(5, 20));
        assert_eq!(
            clamped_key(&key, &shrunk),
            Some(ListKey::new(Some("batch-1".to_string()), PageRequest::new(3, 20)))
        );

        let in_range: PagedResult<u32> = PagedResult::new(vec![1], 45, PageRequest::new(3, 20));
        assert_eq!(clamped_key(&key.with_page(3), &in_range), None);

        let empty: PagedResult<u32> = PagedResult::new(vec![], 0, PageRequest::new(5, 20));
        assert_eq!(clamped_key(&key, &empty), None);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(WatchCommand::parse(""), WatchCommand::Touch);
        assert_eq!(WatchCommand::parse("  "), WatchCommand::Touch);
        assert_eq!(WatchCommand::parse("n"), WatchCommand::Page(Direction::Next));
        assert_eq!(WatchCommand::parse("Prev"), WatchCommand::Page(Direction::Previous));
        assert_eq!(WatchCommand::parse("l"), WatchCommand::Interval(RefreshInterval::Long));
        assert_eq!(WatchCommand::parse("s"), WatchCommand::Interval(RefreshInterval::Short));
        assert_eq!(WatchCommand::parse("r"), WatchCommand::Refresh);
        assert_eq!(WatchCommand::parse("q"), WatchCommand::Quit);
        assert_eq!(WatchCommand::parse("what"), WatchCommand::Help);
    }
}
