use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "gantry",
    version,
    about = "Gantt charts for Backlog issues",
    disable_help_subcommand = true,
    infer_subcommands = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "gantryrc", global = true)]
    pub gantryrc: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Draw the Gantt chart for the selected tasks.
    Chart(ChartArgs),
    /// List filter and edit choices.
    Options(OptionsArgs),
    /// Print `KEY title` for every visible task.
    Keys(ViewArgs),
    /// Update one issue and push it to Backlog.
    Edit(EditArgs),
    /// Store the space id and API key in the rc file.
    Configure(ConfigureArgs),
    Version,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ViewArgs {
    /// Window start; defaults to today.
    #[arg(long)]
    pub start: Option<String>,

    /// Step the window back one month per flag, to the 1st.
    #[arg(long, action = ArgAction::Count, conflicts_with = "next_month")]
    pub prev_month: u8,

    /// Step the window forward one month per flag, to the 1st.
    #[arg(long, action = ArgAction::Count)]
    pub next_month: u8,

    #[arg(long = "assignee", action = ArgAction::Append)]
    pub assignees: Vec<String>,

    #[arg(long = "project", action = ArgAction::Append)]
    pub projects: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ChartArgs {
    #[command(flatten)]
    pub view: ViewArgs,

    /// project, title, assignee, start, end or status
    #[arg(long)]
    pub sort: Option<String>,

    #[arg(long, requires = "sort")]
    pub desc: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OptionsArgs {
    /// Include the status choices for this issue's project.
    #[arg(long)]
    pub issue: Option<String>,

    #[arg(long)]
    pub start: Option<String>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EditArgs {
    /// Issue id or key, e.g. PROJ-12.
    pub issue: String,

    #[arg(long)]
    pub assignee: Option<String>,

    #[arg(long)]
    pub status: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,

    #[arg(long)]
    pub resolution: Option<String>,

    #[arg(long, conflicts_with = "clear_start")]
    pub start: Option<String>,

    #[arg(long)]
    pub clear_start: bool,

    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,

    #[arg(long)]
    pub clear_due: bool,

    #[arg(long)]
    pub comment: Option<String>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigureArgs {
    #[arg(long)]
    pub space: String,

    #[arg(long = "api-key")]
    pub api_key: String,

    #[arg(long)]
    pub domain: Option<String>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest
                .split_once('=')
                .or_else(|| rest.split_once(':'))
                .map(|(k, v)| (format!("rc.{k}"), v.to_string()));

            if let Some((k, v)) = parsed {
                debug!(key = %k, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{Command, GlobalCli, preprocess_args};

    fn args(items: &[&str]) -> Vec<OsString> {
        items.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&args(&[
            "gantry",
            "chart",
            "rc.chart.months=6",
            "rc.color:off",
            "--json",
        ]))
        .unwrap();

        assert_eq!(pre.cleaned_args, args(&["gantry", "chart", "--json"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.chart.months".to_string(), "6".to_string()),
                ("rc.color".to_string(), "off".to_string()),
            ]
        );
    }

    #[test]
    fn parses_chart_filters_and_abbreviated_subcommand() {
        let cli = GlobalCli::parse_from(args(&[
            "gantry",
            "-vv",
            "char",
            "--assignee",
            "Alice",
            "--assignee",
            "Bob",
            "--sort",
            "start",
            "--desc",
            "--rc",
            "color=off",
        ]));

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.rc_overrides[0].key, "color");
        let Some(Command::Chart(chart)) = cli.command else {
            panic!("expected chart command");
        };
        assert_eq!(chart.view.assignees, vec!["Alice", "Bob"]);
        assert_eq!(chart.sort.as_deref(), Some("start"));
        assert!(chart.desc);
    }

    #[test]
    fn edit_rejects_setting_and_clearing_a_date() {
        let result = GlobalCli::try_parse_from(args(&[
            "gantry",
            "edit",
            "PROJ-1",
            "--start",
            "today",
            "--clear-start",
        ]));
        assert!(result.is_err());
    }
}
