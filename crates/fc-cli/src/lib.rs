#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use fc_chain::{Connector, FilterChain, Predicate};
use fc_eval::TableQuery;
use fc_io::{IoError, read_chain_json, read_path, write_csv_string};
use fc_types::Row;
use fc_view::{SortConfig, SortDirection, ViewConfig, ViewError, sort_rows};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("predicate {0:?} must look like column:operator:value")]
    InvalidPredicate(String),
    #[error("{flag} expects a positive number, got {value:?}")]
    InvalidNumber { flag: &'static str, value: String },
    #[error("sort {0:?} must look like column[:asc|:desc]")]
    InvalidSort(String),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    View(#[from] ViewError),
    #[error(transparent)]
    File(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub input: Option<PathBuf>,
    pub tab: Option<String>,
    pub chain_file: Option<PathBuf>,
    /// Predicates from `--where` / `--or`, in command-line order.
    pub steps: Vec<(Connector, Predicate)>,
    pub search: String,
    pub config: Option<PathBuf>,
    pub sort: Option<SortConfig>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub columns: Option<Vec<String>>,
    pub output: Option<PathBuf>,
    pub help: bool,
}

/// Parses `column:operator:value`. The value keeps any further colons.
pub fn parse_predicate(spec: &str) -> Result<Predicate, CliError> {
    let mut parts = spec.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(column), Some(operator), Some(value)) if !column.is_empty() && !operator.is_empty() => {
            Ok(Predicate::new(column, operator, value))
        }
        _ => Err(CliError::InvalidPredicate(spec.to_owned())),
    }
}

fn parse_sort(spec: &str) -> Result<SortConfig, CliError> {
    let (column, direction) = match spec.rsplit_once(':') {
        Some((column, "asc")) => (column, SortDirection::Asc),
        Some((column, "desc")) => (column, SortDirection::Desc),
        _ => (spec, SortDirection::Asc),
    };
    if column.is_empty() {
        return Err(CliError::InvalidSort(spec.to_owned()));
    }
    Ok(SortConfig {
        column: column.to_owned(),
        direction,
    })
}

fn parse_count(flag: &'static str, value: &str) -> Result<usize, CliError> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CliError::InvalidNumber {
            flag,
            value: value.to_owned(),
        }),
    }
}

pub fn parse_args<I>(args: I) -> Result<CliArgs, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut out = CliArgs::default();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let mut value_for = |flag: &str| {
            args.next()
                .ok_or_else(|| CliError::Usage(format!("{flag} requires a value")))
        };
        match arg.as_str() {
            "--input" => out.input = Some(PathBuf::from(value_for("--input")?)),
            "--tab" => out.tab = Some(value_for("--tab")?),
            "--chain" => out.chain_file = Some(PathBuf::from(value_for("--chain")?)),
            "--where" | "--and" => {
                let predicate = parse_predicate(&value_for(&arg)?)?;
                out.steps.push((Connector::And, predicate));
            }
            "--or" => {
                let predicate = parse_predicate(&value_for("--or")?)?;
                out.steps.push((Connector::Or, predicate));
            }
            "--search" => out.search = value_for("--search")?,
            "--config" => out.config = Some(PathBuf::from(value_for("--config")?)),
            "--sort" => out.sort = Some(parse_sort(&value_for("--sort")?)?),
            "--page" => out.page = Some(parse_count("--page", &value_for("--page")?)?),
            "--page-size" => {
                out.page_size = Some(parse_count("--page-size", &value_for("--page-size")?)?);
            }
            "--columns" => {
                let list = value_for("--columns")?;
                out.columns = Some(
                    list.split(',')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(str::to_owned)
                        .collect(),
                );
            }
            "--output" => out.output = Some(PathBuf::from(value_for("--output")?)),
            "--help" | "-h" => out.help = true,
            other => return Err(CliError::Usage(format!("unknown argument: {other}"))),
        }
    }

    if !out.help && out.input.is_none() {
        return Err(CliError::Usage("--input is required".to_owned()));
    }

    Ok(out)
}

/// Chain from `--chain` (if any) followed by the command-line predicates.
pub fn build_chain(args: &CliArgs) -> Result<FilterChain, CliError> {
    let mut chain = match &args.chain_file {
        Some(path) => read_chain_json(&std::fs::read_to_string(path)?)?.normalized(),
        None => FilterChain::new(),
    };

    for (connector, predicate) in &args.steps {
        chain = chain.append(predicate.clone());
        chain = chain.set_connector(chain.len() - 1, *connector);
    }
    Ok(chain)
}

fn load_config(args: &CliArgs) -> Result<ViewConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => ViewConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => ViewConfig::default(),
    };
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    if let Some(sort) = &args.sort {
        config.sort = Some(sort.clone());
    }
    if let Some(columns) = &args.columns {
        config.visible_columns = Some(columns.clone());
    }
    config.validate()?;
    Ok(config)
}

/// Date stamped on export file names. Always the UTC calendar date.
#[must_use]
pub fn export_date() -> NaiveDate {
    Utc::now().date_naive()
}

#[must_use]
pub fn export_file_name(date: NaiveDate) -> String {
    format!("data_export_{}.csv", date.format("%Y-%m-%d"))
}

fn resolve_output(path: &Path, today: NaiveDate) -> PathBuf {
    if path.is_dir() {
        path.join(export_file_name(today))
    } else {
        path.to_path_buf()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub total_rows: usize,
    pub matched_rows: usize,
    pub exported_rows: usize,
    /// CSV text when no output path was given.
    pub csv: Option<String>,
    pub written_to: Option<PathBuf>,
}

pub fn run(args: &CliArgs, today: NaiveDate) -> Result<RunReport, CliError> {
    let input = args
        .input
        .as_deref()
        .ok_or_else(|| CliError::Usage("--input is required".to_owned()))?;

    let config = load_config(args)?;
    let table = read_path(input, args.tab.as_deref())?;
    let query = TableQuery::new(args.search.clone(), build_chain(args)?);
    info!(chain = %query.chain, search = %query.search, "applying filters");

    let matched = query.apply(&table.rows);
    let matched_rows = matched.len();
    info!(total = table.len(), matched = matched_rows, "filtered table");

    let (rows, columns): (Vec<Row>, Vec<String>) = match args.page {
        Some(page) => {
            let view = config.page(&matched, &table.columns, page)?;
            debug!(
                page = view.window.page,
                total_pages = view.window.total_pages,
                "selected page"
            );
            (view.rows, view.columns)
        }
        None => {
            let rows = match &config.sort {
                Some(sort) => sort_rows(&matched, sort),
                None => matched,
            };
            (rows, config.resolve_columns(&table.columns))
        }
    };

    let mut report = RunReport {
        total_rows: table.len(),
        matched_rows,
        exported_rows: 0,
        csv: None,
        written_to: None,
    };

    if rows.is_empty() {
        warn!("no rows matched; nothing to export");
        return Ok(report);
    }

    let csv = write_csv_string(&rows, &columns, &config.display_names)?;
    report.exported_rows = rows.len();

    match &args.output {
        Some(path) => {
            let target = resolve_output(path, today);
            std::fs::write(&target, csv)?;
            info!(path = %target.display(), rows = rows.len(), "wrote export");
            report.written_to = Some(target);
        }
        None => report.csv = Some(csv),
    }

    Ok(report)
}

pub fn print_help() {
    println!(
        "filterchain --input <rows.csv|rows.json> [options]\n\n\
         Options:\n  \
         --tab <name>              table to use from a tabbed JSON payload\n  \
         --chain <file.json>       filter chain as a JSON array of entries\n  \
         --where <col:op:value>    append a predicate joined with AND (alias --and)\n  \
         --or <col:op:value>       append a predicate joined with OR\n  \
         --search <term>           free-text match across all columns, applied first\n  \
         --config <view.json>      display names, hidden columns, page size, sort\n  \
         --sort <col[:asc|:desc]>  sort the result\n  \
         --page <n>                export only page n\n  \
         --page-size <n>           rows per page (default 20)\n  \
         --columns <a,b,c>         columns to export\n  \
         --output <path>           file or directory for the CSV (stdout otherwise)\n\n\
         Operators: equals, not-equals, contains, greater-than, less-than.\n\
         Predicates are folded strictly left to right: a OR b AND c means (a OR b) AND c."
    );
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use fc_chain::{Connector, Operator, Predicate};
    use fc_view::{SortConfig, SortDirection};

    use super::{
        CliError, build_chain, export_date, export_file_name, parse_args, parse_predicate, run,
    };

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| (*a).to_owned()).collect()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).expect("date")
    }

    #[test]
    fn predicate_value_keeps_colons() {
        let predicate = parse_predicate("url:contains:https://example").expect("predicate");
        assert_eq!(
            predicate,
            Predicate::new("url", Operator::Contains, "https://example")
        );
        assert!(matches!(
            parse_predicate("name:equals"),
            Err(CliError::InvalidPredicate(_))
        ));
        assert!(matches!(
            parse_predicate(":equals:x"),
            Err(CliError::InvalidPredicate(_))
        ));
    }

    #[test]
    fn parse_args_collects_steps_in_order() {
        let parsed = parse_args(args(&[
            "--input", "rows.csv", "--where", "a:equals:1", "--or", "b:equals:1", "--and",
            "c:equals:1", "--sort", "n:desc", "--page", "2",
        ]))
        .expect("args");

        let connectors: Vec<Connector> = parsed.steps.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            connectors,
            vec![Connector::And, Connector::Or, Connector::And]
        );
        assert_eq!(
            parsed.sort,
            Some(SortConfig {
                column: "n".to_owned(),
                direction: SortDirection::Desc
            })
        );
        assert_eq!(parsed.page, Some(2));
    }

    #[test]
    fn parse_args_rejects_bad_input() {
        assert!(matches!(
            parse_args(args(&["--where", "a:equals:1"])),
            Err(CliError::Usage(_))
        ));
        assert!(matches!(
            parse_args(args(&["--input", "x.csv", "--page", "0"])),
            Err(CliError::InvalidNumber { flag: "--page", .. })
        ));
        assert!(matches!(
            parse_args(args(&["--input"])),
            Err(CliError::Usage(_))
        ));
        assert!(matches!(
            parse_args(args(&["--input", "x.csv", "--bogus"])),
            Err(CliError::Usage(_))
        ));
        assert!(parse_args(args(&["--help"])).expect("help").help);
    }

    #[test]
    fn first_step_never_carries_a_connector() {
        let parsed = parse_args(args(&["--input", "x.csv", "--or", "a:equals:1", "--or", "b:equals:1"]))
            .expect("args");
        let chain = build_chain(&parsed).expect("chain");
        let connectors: Vec<Option<Connector>> = chain.iter().map(|e| e.connector).collect();
        assert_eq!(connectors, vec![None, Some(Connector::Or)]);
    }

    #[test]
    fn missing_value_error_names_the_flag_given() {
        let err = parse_args(args(&["--input", "x.csv", "--and"])).expect_err("missing value");
        assert!(matches!(err, CliError::Usage(ref msg) if msg == "--and requires a value"));
    }

    #[test]
    fn chain_file_is_normalized_before_flag_steps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let chain_path = dir.path().join("chain.json");
        std::fs::write(
            &chain_path,
            r#"[
                {"column": "a", "operator": "equals", "value": "1", "connector": "OR"},
                {"column": "b", "operator": "equals", "value": "1"}
            ]"#,
        )
        .expect("write chain");

        let chain_arg = chain_path.to_string_lossy().into_owned();
        let parsed = parse_args(args(&[
            "--input", "x.csv", "--chain", &chain_arg, "--or", "c:equals:1", "--where",
            "d:equals:1",
        ]))
        .expect("args");
        let chain = build_chain(&parsed).expect("chain");

        let columns: Vec<&str> = chain.iter().map(|e| e.predicate.column.as_str()).collect();
        assert_eq!(columns, vec!["a", "b", "c", "d"]);
        let connectors: Vec<Option<Connector>> = chain.iter().map(|e| e.connector).collect();
        assert_eq!(
            connectors,
            vec![
                None,
                Some(Connector::And),
                Some(Connector::Or),
                Some(Connector::And)
            ]
        );
    }

    #[test]
    fn export_date_follows_utc_calendar() {
        let before = chrono::Utc::now().date_naive();
        let stamped = export_date();
        let after = chrono::Utc::now().date_naive();
        assert!(before <= stamped && stamped <= after);
    }

    #[test]
    fn export_file_name_uses_iso_date() {
        assert_eq!(export_file_name(today()), "data_export_2026-10-19.csv");
    }

    #[test]
    fn run_filters_sorts_and_writes_into_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("rows.csv");
        std::fs::write(
            &input,
            "name,tier,revenue\nacme,gold,10\nbeta,silver,50\ngamma,gold,30\ndelta,bronze,5\n",
        )
        .expect("write input");
        let config = dir.path().join("view.json");
        std::fs::write(
            &config,
            r#"{"display_names":{"name":"Name"},"hidden_columns":["tier"]}"#,
        )
        .expect("write config");

        let input_arg = input.display().to_string();
        let config_arg = config.display().to_string();
        let output_arg = dir.path().display().to_string();
        let parsed = parse_args(args(&[
            "--input",
            &input_arg,
            "--config",
            &config_arg,
            "--where",
            "tier:equals:GOLD",
            "--or",
            "revenue:greater-than:40",
            "--where",
            "name:not-equals:acme",
            "--sort",
            "revenue:desc",
            "--output",
            &output_arg,
        ]))
        .expect("args");

        let report = run(&parsed, today()).expect("run");
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.matched_rows, 2);

        let written = report.written_to.expect("written");
        assert_eq!(written, dir.path().join("data_export_2026-10-19.csv"));
        let csv = std::fs::read_to_string(written).expect("read export");
        assert_eq!(csv, "Name,revenue\nbeta,50\ngamma,30\n");
    }

    #[test]
    fn run_without_matches_exports_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("rows.json");
        std::fs::write(&input, r#"[{"name":"acme","n":1}]"#).expect("write input");

        let input_arg = input.display().to_string();
        let parsed = parse_args(args(&["--input", &input_arg, "--where", "n:greater-than:abc"]))
            .expect("args");
        let report = run(&parsed, today()).expect("run");
        assert_eq!(report.matched_rows, 0);
        assert_eq!(report.csv, None);
        assert_eq!(report.written_to, None);
    }

    #[test]
    fn run_pages_to_stdout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("rows.csv");
        std::fs::write(&input, "n\n1\n2\n3\n4\n5\n").expect("write input");

        let input_arg = input.display().to_string();
        let parsed = parse_args(args(&[
            "--input", &input_arg, "--page-size", "2", "--page", "3",
        ]))
        .expect("args");
        let report = run(&parsed, today()).expect("run");
        assert_eq!(report.exported_rows, 1);
        assert_eq!(report.csv.as_deref(), Some("n\n5\n"));
    }
}
