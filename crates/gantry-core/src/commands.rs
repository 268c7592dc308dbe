use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, anyhow, bail};
use chrono::NaiveDate;
use gantry_shared::TaskPatch;
use tracing::{debug, info, instrument};

use crate::backlog::HttpBacklogClient;
use crate::cli::{ChartArgs, Command, ConfigureArgs, EditArgs, OptionsArgs, ViewArgs};
use crate::config::{self, Config, Credentials, DEFAULT_DOMAIN};
use crate::coordinator::{EditOutcome, GanttState, describe_task, task_row};
use crate::datetime::{Clock, SystemClock, parse_date_expr};
use crate::error::GanttError;
use crate::render::Renderer;
use crate::sort::{SortColumn, SortDirection, SortState};
use crate::timeline::Window;
use crate::vocab::StatusVocabulary;

#[instrument(skip(cfg, renderer, command))]
pub fn dispatch(
    cfg: &Config,
    renderer: &Renderer,
    command: Option<Command>,
    rc_override: Option<&Path>,
) -> anyhow::Result<()> {
    let command = command.unwrap_or_else(|| {
        debug!("no explicit command, using chart");
        Command::Chart(ChartArgs::default())
    });

    match command {
        Command::Configure(args) => cmd_configure(cfg, args, rc_override),
        Command::Version => {
            println!("gantry {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to start async runtime")?;
            runtime.block_on(dispatch_remote(cfg, renderer, other, &SystemClock))
        }
    }
}

async fn dispatch_remote(
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
    clock: &impl Clock,
) -> anyhow::Result<()> {
    match command {
        Command::Chart(args) => cmd_chart(cfg, renderer, args, clock).await,
        Command::Options(args) => cmd_options(cfg, renderer, args, clock).await,
        Command::Keys(args) => cmd_keys(cfg, args, clock).await,
        Command::Edit(args) => cmd_edit(cfg, args, clock).await,
        Command::Configure(_) | Command::Version => Ok(()),
    }
}

#[instrument(skip(cfg, renderer, args, clock))]
async fn cmd_chart(
    cfg: &Config,
    renderer: &Renderer,
    args: ChartArgs,
    clock: &impl Clock,
) -> anyhow::Result<()> {
    let (_, mut state) = load_state(cfg, &args.view, clock).await?;

    if let Some(raw) = args.sort.as_deref() {
        let column: SortColumn = raw.parse()?;
        let direction = if args.desc {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        state.set_sort(SortState::new(column, direction));
    }

    let chart = state.chart(clock);
    if args.json {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, &chart)?;
        writeln!(out)?;
        return Ok(());
    }

    let window = state.window();
    let today = clock.today();
    let today_fraction = window
        .contains(today)
        .then(|| (today - window.start).num_days() as f64 / window.day_count() as f64);
    renderer.print_chart(&chart, today_fraction)
}

#[instrument(skip(cfg, renderer, args, clock))]
async fn cmd_options(
    cfg: &Config,
    renderer: &Renderer,
    args: OptionsArgs,
    clock: &impl Clock,
) -> anyhow::Result<()> {
    let view = ViewArgs {
        start: args.start.clone(),
        ..ViewArgs::default()
    };
    let (_, state) = load_state(cfg, &view, clock).await?;

    let task = match args.issue.as_deref() {
        Some(reference) => Some(
            state
                .find_task(reference)
                .ok_or_else(|| anyhow!("no task matches {reference}"))?,
        ),
        None => None,
    };

    let options = state.options(task);
    if args.json {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, &options)?;
        writeln!(out)?;
        return Ok(());
    }
    renderer.print_options(&options)
}

#[instrument(skip(cfg, args, clock))]
async fn cmd_keys(cfg: &Config, args: ViewArgs, clock: &impl Clock) -> anyhow::Result<()> {
    let (_, state) = load_state(cfg, &args, clock).await?;
    let text = state.issue_key_lines();
    if !text.is_empty() {
        println!("{text}");
    }
    info!(lines = text.lines().count(), "printed issue keys");
    Ok(())
}

#[instrument(skip(cfg, args, clock), fields(issue = %args.issue))]
async fn cmd_edit(cfg: &Config, args: EditArgs, clock: &impl Clock) -> anyhow::Result<()> {
    let today = clock.today();
    let patch = edit_patch(&args, today)?;
    if patch.is_empty() {
        bail!("nothing to change; pass at least one field to edit");
    }

    let (client, mut state) = load_state(cfg, &ViewArgs::default(), clock).await?;
    let outcome = state
        .submit_edit(&client, &args.issue, &patch)
        .await
        .map_err(surface)
        .with_context(|| format!("failed to update {}", args.issue))?;

    let mut out = io::stdout().lock();
    match outcome {
        EditOutcome::Updated(task) if args.json => {
            serde_json::to_writer_pretty(&mut out, &task_row(&task, &state.window(), today))?;
            writeln!(out)?;
        }
        EditOutcome::Updated(task) => writeln!(out, "Updated {}", describe_task(&task))?,
        EditOutcome::Removed { issue_key, .. } => {
            writeln!(out, "Updated {issue_key}; it has no assignee and left the chart")?
        }
        EditOutcome::Unchanged => writeln!(out, "Nothing sent; no field mapped to a Backlog value")?,
    }
    Ok(())
}

#[instrument(skip(cfg, args))]
fn cmd_configure(cfg: &Config, args: ConfigureArgs, rc_override: Option<&Path>) -> anyhow::Result<()> {
    let space = args.space.trim().to_string();
    let api_key = args.api_key.trim().to_string();
    if space.is_empty() || api_key.is_empty() {
        return Err(surface(GanttError::Validation(
            "space id and API key cannot be empty".to_string(),
        )));
    }

    let domain = args
        .domain
        .or_else(|| cfg.get("backlog.domain"))
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_DOMAIN.to_string());

    let path = config::rc_write_target(rc_override)?;
    config::save_credentials(
        &path,
        &Credentials {
            space,
            api_key,
            domain,
        },
    )?;
    println!("Saved Backlog credentials to {}", path.display());
    Ok(())
}

/// Builds the client, fetches everything and applies the view flags.
async fn load_state(
    cfg: &Config,
    view: &ViewArgs,
    clock: &impl Clock,
) -> anyhow::Result<(HttpBacklogClient, GanttState)> {
    let window = view_window(view, cfg.window_months(), clock.today())?;

    let client = HttpBacklogClient::from_config(cfg).map_err(surface)?;
    debug!(base_url = client.base_url(), "using backlog space");

    let mut state = GanttState::new(
        StatusVocabulary::from_config(cfg),
        window,
        cfg.dev_config(),
    );
    state
        .refresh(&client)
        .await
        .map_err(surface)
        .context("failed to load backlog data")?;

    if !view.assignees.is_empty() {
        state.select_assignees(view.assignees.iter().cloned());
    }
    if !view.projects.is_empty() {
        state.select_projects(view.projects.iter().cloned());
    }

    Ok((client, state))
}

/// `--start` (default today), then any month steps counted from it.
fn view_window(view: &ViewArgs, months: u32, today: NaiveDate) -> anyhow::Result<Window> {
    let start = match view.start.as_deref() {
        Some(raw) => parse_date_expr(raw, today)
            .with_context(|| format!("invalid --start value: {raw}"))?,
        None => today,
    };
    let window = Window::new(start, months);
    let steps = i32::from(view.next_month) - i32::from(view.prev_month);
    Ok(if steps == 0 {
        window
    } else {
        window.shift_months(steps)
    })
}

fn edit_patch(args: &EditArgs, today: NaiveDate) -> anyhow::Result<TaskPatch> {
    let date = |raw: &str| -> anyhow::Result<String> {
        Ok(parse_date_expr(raw, today)?.format("%Y-%m-%d").to_string())
    };

    let start_date = match (&args.start, args.clear_start) {
        (_, true) => Some(None),
        (Some(raw), false) => Some(Some(date(raw)?)),
        (None, false) => None,
    };
    let end_date = match (&args.due, args.clear_due) {
        (_, true) => Some(None),
        (Some(raw), false) => Some(Some(date(raw)?)),
        (None, false) => None,
    };

    Ok(TaskPatch {
        assignee: args.assignee.clone(),
        status: args.status.clone(),
        priority: args.priority.clone(),
        resolution: args.resolution.clone(),
        start_date,
        end_date,
        comment: args.comment.clone(),
    })
}

fn surface(err: GanttError) -> anyhow::Error {
    anyhow!(err.user_message())
}
