#![forbid(unsafe_code)]

use fc_cli::{export_date, parse_args, print_help, run};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        print_help();
        return Ok(());
    }

    let report = run(&args, export_date())?;
    if let Some(csv) = report.csv {
        print!("{csv}");
    }
    if let Some(path) = report.written_to {
        eprintln!(
            "exported {} of {} matching rows ({} total) to {}",
            report.exported_rows,
            report.matched_rows,
            report.total_rows,
            path.display()
        );
    }

    Ok(())
}
