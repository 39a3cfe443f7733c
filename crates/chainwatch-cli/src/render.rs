//! Terminal rendering of backend data

use chainwatch_core::models::{
    EvalJob, EvalMetric, OverallMetrics, QaBatch, QaPair, RepoFile, format_percent, metric_display_name,
};
use chainwatch_core::status::Tone;
use chainwatch_core::PagedResult;
use chrono::{DateTime, NaiveDateTime};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};

/// Repositories offered by `ingest --list-popular`
pub const POPULAR_REPOS: [(&str, &str); 6] = [
    ("browserable/browserable", "https://github.com/browserable/browserable"),
    ("facebook/react", "https://github.com/facebook/react"),
    ("vercel/next.js", "https://github.com/vercel/next.js"),
    ("microsoft/vscode", "https://github.com/microsoft/vscode"),
    ("nodejs/node", "https://github.com/nodejs/node"),
    ("kubernetes/kubernetes", "https://github.com/kubernetes/kubernetes"),
];

pub fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Neutral => Color::DarkGrey,
        Tone::Info => Color::Blue,
        Tone::Warning => Color::Yellow,
        Tone::Success => Color::Green,
        Tone::Danger => Color::Red,
    }
}

fn badge(label: &str, tone: Tone) -> Cell {
    Cell::new(label).fg(tone_color(tone))
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(headers.iter().map(|h| Cell::new(h).fg(Color::White)).collect::<Vec<_>>());
    table
}

/// Backend timestamps as `YYYY-MM-DD HH:MM`; unparseable values are shown as-is
pub fn format_timestamp(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    raw.to_string()
}

/// Shorten to `max` characters, marking the cut with `...`
pub fn truncate(text: &str, max: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max {
        return single_line;
    }
    let kept: String = single_line.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

pub fn progress(processed: u64, total: u64) -> String {
    format!("{}/{}", processed, total)
}

/// Page position plus the navigation keys that currently apply
pub fn pagination_footer<T>(page: &PagedResult<T>) -> String {
    let pages = page.total_pages();
    let mut footer = if pages == 0 {
        format!("No results ({} total)", page.total_count)
    } else {
        format!("Page {} of {} ({} total)", page.page, pages, page.total_count)
    };

    let mut keys = Vec::new();
    if page.has_previous() {
        keys.push("[p]rev");
    }
    if page.has_next() {
        keys.push("[n]ext");
    }
    if !keys.is_empty() {
        footer.push_str("  ");
        footer.push_str(&keys.join(" "));
    }
    footer
}

pub fn files_table(files: &[RepoFile]) -> Table {
    let mut table = new_table(&["ID", "Path", "Summary", "Chunks", "Added"]);
    for file in files {
        table.add_row(vec![
            Cell::new(&file.id).fg(Color::DarkGrey),
            Cell::new(&file.path).fg(Color::Cyan),
            badge(file.summary_status.label(), file.summary_status.tone()),
            badge(file.chunks_status.label(), file.chunks_status.tone()),
            Cell::new(format_timestamp(&file.added_at)),
        ]);
    }
    table
}

pub fn file_detail(file: &RepoFile) -> String {
    let mut table = new_table(&["Field", "Value"]);
    table.add_row(vec![Cell::new("ID"), Cell::new(&file.id)]);
    table.add_row(vec![Cell::new("Path"), Cell::new(&file.path).fg(Color::Cyan)]);
    table.add_row(vec![
        Cell::new("Summary status"),
        badge(file.summary_status.label(), file.summary_status.tone()),
    ]);
    table.add_row(vec![
        Cell::new("Chunks status"),
        badge(file.chunks_status.label(), file.chunks_status.tone()),
    ]);
    table.add_row(vec![Cell::new("Added"), Cell::new(format_timestamp(&file.added_at))]);

    let mut out = table.to_string();
    out.push_str("\n\nSummary\n");
    out.push_str(file.summary.as_deref().unwrap_or("(not generated yet)"));
    out.push_str("\n\nContent\n");
    out.push_str(file.raw_content.as_deref().unwrap_or("(not available)"));
    out
}

pub fn batches_table(batches: &[QaBatch]) -> Table {
    let mut table = new_table(&["Batch", "Status", "Files", "Added", "Evaluable"]);
    for batch in batches {
        table.add_row(vec![
            Cell::new(&batch.id).fg(Color::Cyan),
            badge(batch.status.label(), batch.status.tone()),
            Cell::new(progress(batch.processed_files, batch.total_files)),
            Cell::new(format_timestamp(&batch.added_at)),
            Cell::new(if batch.is_eval_candidate() { "yes" } else { "-" }),
        ]);
    }
    table
}

pub fn pairs_table(pairs: &[QaPair]) -> Table {
    let mut table = new_table(&["ID", "Question", "Answer", "Strategy", "Q score", "Chunk score"]);
    for pair in pairs {
        let score = |s: Option<f64>| s.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&pair.id).fg(Color::DarkGrey),
            Cell::new(truncate(&pair.question, 80)),
            Cell::new(truncate(&pair.answer, 80)),
            Cell::new(pair.evolution_strategy.as_deref().unwrap_or("-")),
            Cell::new(score(pair.question_score)),
            Cell::new(score(pair.chunk_score)),
        ]);
    }
    table
}

pub fn jobs_table(jobs: &[EvalJob]) -> Table {
    let mut table = new_table(&["Eval job", "Batch", "Status", "Pairs", "Created", "Completed"]);
    for job in jobs {
        table.add_row(vec![
            Cell::new(&job.id).fg(Color::Cyan),
            Cell::new(&job.qa_batch_id).fg(Color::DarkGrey),
            badge(job.status.label(), job.status.tone()),
            Cell::new(progress(job.processed_qa_pairs, job.total_qa_pairs)),
            Cell::new(format_timestamp(&job.created_at)),
            Cell::new(job.completed_at.as_deref().map(format_timestamp).unwrap_or_else(|| "-".to_string())),
        ]);
    }
    table
}

pub fn metrics_table(metrics: &[EvalMetric]) -> Table {
    let mut table = new_table(&["Question", "Expected", "Actual", "Scores"]);
    for metric in metrics {
        let scores = metric
            .scores()
            .iter()
            .map(|(key, score)| format!("{}: {}", metric_display_name(key), score.badge()))
            .collect::<Vec<_>>()
            .join("\n");
        let scores = match (scores.is_empty(), metric.evaluation_status()) {
            (true, Some(status)) => status.to_string(),
            (true, None) => "-".to_string(),
            (false, _) => scores,
        };

        table.add_row(vec![
            Cell::new(truncate(&metric.question, 60)),
            Cell::new(truncate(&metric.expected_answer, 60)),
            Cell::new(truncate(metric.actual_answer.as_deref().unwrap_or("-"), 60)),
            Cell::new(scores),
        ]);
    }
    table
}

pub fn overall_table(overall: &OverallMetrics) -> Table {
    let mut table = new_table(&["Metric", "Average", "Pass rate", "Range", "Passed"]);
    for (key, summary) in overall.ordered() {
        let pass_tone = if summary.pass_rate >= 0.5 { Tone::Success } else { Tone::Danger };
        table.add_row(vec![
            Cell::new(metric_display_name(key)).fg(Color::Cyan),
            Cell::new(format_percent(summary.average_score)),
            badge(&format_percent(summary.pass_rate), pass_tone),
            Cell::new(format!(
                "{} - {}",
                format_percent(summary.min_score),
                format_percent(summary.max_score)
            )),
            Cell::new(progress(summary.total_passed, summary.total_evaluated)),
        ]);
    }
    table
}

pub fn popular_repos_table() -> Table {
    let mut table = new_table(&["Repository", "URL"]);
    for (name, url) in POPULAR_REPOS {
        table.add_row(vec![Cell::new(name).fg(Color::Cyan), Cell::new(url)]);
    }
    table
}
