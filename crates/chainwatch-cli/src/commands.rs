//! One-shot command handlers

use crate::config::ChainwatchConfig;
use crate::render::{self, pagination_footer};
use crate::watch;
use anyhow::{Result, anyhow, bail};
use chainwatch_client::listing::{EvalJobListing, QaBatchListing};
use chainwatch_client::{ChainClient, ClientError, Listing, PageFetcher};
use chainwatch_core::models::QaBatch;
use chainwatch_core::{PageRequest, PagedResult};
use chainwatch_poll::{FileDetailSource, OverallMetricsSource, RefreshInterval};
use clap::Args;
use comfy_table::{Cell, Color, Table};
use tracing::info;

/// Page sizes offered for the files view
pub const FILE_PAGE_SIZES: [u32; 4] = [10, 20, 50, 100];

/// Everything a command needs
pub struct App {
    pub client: ChainClient,
    pub config: ChainwatchConfig,
}

impl App {
    pub fn interval(&self, requested: Option<RefreshInterval>) -> RefreshInterval {
        requested.unwrap_or(self.config.refresh.default_interval)
    }
}

/// Paging and watch options shared by the list commands
#[derive(Args, Debug, Clone)]
pub struct ViewArgs {
    /// Page to show (1-based)
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Items per page (defaults depend on the list)
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Keep the view open and refresh it periodically
    #[arg(short, long)]
    pub watch: bool,

    /// Refresh cadence in watch mode: short or long
    #[arg(long, value_name = "INTERVAL")]
    pub interval: Option<RefreshInterval>,
}

impl ViewArgs {
    pub fn page_request<L: Listing>(&self) -> PageRequest {
        PageRequest::new(self.page.max(1), self.page_size.unwrap_or(L::DEFAULT_PAGE_SIZE))
    }
}

/// Watch options of the single-item views
#[derive(Args, Debug, Clone)]
pub struct DetailArgs {
    /// Keep the view open and refresh it periodically
    #[arg(short, long)]
    pub watch: bool,

    /// Refresh cadence in watch mode: short or long
    #[arg(long, value_name = "INTERVAL")]
    pub interval: Option<RefreshInterval>,
}

/// Wrap a backend error with what was being attempted
fn failed(action: &'static str) -> impl FnOnce(ClientError) -> anyhow::Error {
    move |e| anyhow!("{}: {}", action, e.user_message())
}

pub fn print_page<T>(page: &PagedResult<T>, noun: &str, render: fn(&[T]) -> Table) {
    if page.is_empty() {
        println!("No {} found.", noun);
    } else {
        println!("{}", render(&page.items));
    }
    println!("{}", pagination_footer(page));
}

pub async fn ingest(app: &App, repo_url: Option<String>, list_popular: bool) -> Result<()> {
    let Some(repo_url) = repo_url else {
        println!("Popular repositories:");
        println!("{}", render::popular_repos_table());
        return Ok(());
    };
    if list_popular {
        println!("{}", render::popular_repos_table());
    }

    println!("Ingesting {} ...", repo_url.trim());
    let repo_id = app
        .client
        .ingest_repo(&repo_url)
        .await
        .map_err(failed("Failed to ingest repo"))?;
    info!(%repo_id, "Repository ingested");

    println!("Repository id: {}", repo_id);
    println!("Browse its files with: chainwatch files {}", repo_id);
    Ok(())
}

/// Show one page of a listing, or keep it refreshed with `--watch`
pub async fn list<L: Listing>(
    app: &App,
    resource_id: String,
    view: &ViewArgs,
    noun: &'static str,
    render: fn(&[L::Item]) -> Table,
) -> Result<()> {
    let page = view.page_request::<L>();
    if view.watch {
        return watch::watch_list::<L>(app, resource_id, page, app.interval(view.interval), noun, render).await;
    }

    let fetcher = PageFetcher::<L>::new(app.client.clone());
    match fetcher.fetch_in_range(Some(&resource_id), page).await? {
        Some(result) => print_page(&result, noun, render),
        None => println!("Nothing to show without an id."),
    }
    Ok(())
}

pub async fn files(app: &App, repo_id: String, view: &ViewArgs) -> Result<()> {
    if let Some(size) = view.page_size {
        if !FILE_PAGE_SIZES.contains(&size) {
            bail!("Page size for files must be one of {:?}", FILE_PAGE_SIZES);
        }
    }
    list::<chainwatch_client::FileListing>(app, repo_id, view, "files", render::files_table).await
}

pub async fn file(app: &App, file_id: String, detail: &DetailArgs) -> Result<()> {
    if detail.watch {
        return watch::watch_detail(
            app,
            FileDetailSource::new(app.client.clone()),
            file_id,
            app.interval(detail.interval),
            "file",
            render::file_detail,
        )
        .await;
    }

    let file = app.client.get_file(&file_id).await.map_err(failed("Failed to load file"))?;
    println!("{}", render::file_detail(&file));
    Ok(())
}

pub async fn create_batch(app: &App, repo_id: String) -> Result<()> {
    let batch_id = app
        .client
        .create_qa_batch(&repo_id)
        .await
        .map_err(failed("Failed to create Q&A batch"))?;

    match batch_id {
        Some(id) => println!("Created Q&A batch {}", id),
        None => println!("Q&A batch creation started"),
    }
    // Show the new batch right away
    let page = PageRequest::first(QaBatchListing::DEFAULT_PAGE_SIZE);
    let batches = app.client.list_qa_batches(&repo_id, page).await?;
    print_page(&batches, "batches", render::batches_table);
    Ok(())
}

pub async fn archive_pair(app: &App, qa_id: String) -> Result<()> {
    app.client
        .archive_qa_pair(&qa_id)
        .await
        .map_err(failed("Failed to archive Q&A pair"))?;
    println!("Archived Q&A pair {}", qa_id);
    Ok(())
}

/// Look a batch up among the repository's batches, page by page
async fn find_batch(app: &App, repo_id: &str, batch_id: &str) -> Result<Option<QaBatch>> {
    let mut request = Some(PageRequest::first(QaBatchListing::DEFAULT_PAGE_SIZE));
    while let Some(page) = request {
        let batches = app
            .client
            .list_qa_batches(repo_id, page)
            .await
            .map_err(failed("Failed to load Q&A batches"))?;
        if let Some(batch) = batches.items.iter().find(|b| b.id == batch_id) {
            return Ok(Some(batch.clone()));
        }
        request = batches.next_page();
    }
    Ok(None)
}

/// The batch to evaluate, if it exists and is running or completed
async fn eval_candidate(app: &App, repo_id: &str, batch_id: Option<&str>) -> Result<QaBatch> {
    let Some(batch_id) = batch_id.map(str::trim).filter(|id| !id.is_empty()) else {
        bail!("Please select a Q&A batch");
    };
    let Some(batch) = find_batch(app, repo_id, batch_id).await? else {
        bail!("Q&A batch {} not found in repository {}", batch_id, repo_id);
    };
    if !batch.is_eval_candidate() {
        bail!(
            "Q&A batch {} is {}; only running or completed batches can be evaluated",
            batch.id,
            batch.status.label()
        );
    }
    Ok(batch)
}

pub async fn create_eval(app: &App, repo_id: String, batch_id: Option<String>) -> Result<()> {
    let batch_id = eval_candidate(app, &repo_id, batch_id.as_deref()).await?.id;
    let eval_job_id = app
        .client
        .create_eval_job(&batch_id, &repo_id)
        .await
        .map_err(failed("Failed to create eval job"))?;

    match eval_job_id {
        Some(id) => println!("Created eval job {}", id),
        None => println!("Eval job creation started"),
    }
    let page = PageRequest::first(EvalJobListing::DEFAULT_PAGE_SIZE);
    let jobs = app.client.list_eval_jobs(&repo_id, page).await?;
    print_page(&jobs, "eval jobs", render::jobs_table);
    Ok(())
}

pub async fn overall(app: &App, eval_job_id: String, detail: &DetailArgs) -> Result<()> {
    if detail.watch {
        return watch::watch_detail(
            app,
            OverallMetricsSource::new(app.client.clone()),
            eval_job_id,
            app.interval(detail.interval),
            "overall metrics",
            render_overall,
        )
        .await;
    }

    let overall = app
        .client
        .overall_metrics(&eval_job_id)
        .await
        .map_err(failed("Failed to load overall metrics"))?;
    println!("{}", render_overall(&overall));
    Ok(())
}

fn render_overall(overall: &chainwatch_core::models::OverallMetrics) -> String {
    if overall.metrics_summary.is_empty() {
        return "No metrics evaluated yet.".to_string();
    }
    format!(
        "Evaluated questions: {}\n{}",
        overall.total_evaluated,
        render::overall_table(overall)
    )
}

pub async fn translate(app: &App, text: String, language: String) -> Result<()> {
    let translated = app
        .client
        .translate(&text, &language)
        .await
        .map_err(failed("Translation failed"))?;
    println!("{}", translated);
    Ok(())
}

pub async fn translate_chain(app: &App, text: String, languages: Vec<String>) -> Result<()> {
    let results = app
        .client
        .translate_chain(&text, &languages)
        .await
        .map_err(failed("Translation failed"))?;

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Language").fg(Color::White),
        Cell::new("Translation").fg(Color::White),
    ]);
    for (language, translated) in results {
        table.add_row(vec![Cell::new(language).fg(Color::Cyan), Cell::new(translated)]);
    }
    println!("{}", table);
    Ok(())
}
