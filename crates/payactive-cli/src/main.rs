use std::process::ExitCode;
use std::time::Instant;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use colored::Colorize;
use payactive_core::{config, day, ElasticClient, ObjectLoginLog, Pipeline, RunReport, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "payactive")]
#[command(author, version, about = "Daily active paying users per platform/channel segment")]
struct Cli {
    #[arg(
        short,
        long,
        value_parser = parse_day_arg,
        help = "Date. The default date is yesterday. The format is YYYY-MM-DD"
    )]
    day: Option<NaiveDate>,

    #[arg(long, help = "Compute counts without writing documents")]
    dry_run: bool,

    #[arg(long, help = "Output run summary as JSON")]
    json: bool,

    #[arg(long, help = "Enable debug logging")]
    debug: bool,

    #[arg(long, help = "Show processing time")]
    benchmark: bool,
}

fn parse_day_arg(s: &str) -> std::result::Result<NaiveDate, String> {
    day::parse_day(s).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    #[cfg(unix)]
    if let Err(e) = install_interrupt_handler() {
        tracing::warn!(error = %e, "could not install interrupt handler");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("{}", format!("Error: {:#}", e).red());
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "payactive=debug,payactive_core=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(unix)]
fn install_interrupt_handler() -> std::io::Result<()> {
    use signal_hook::consts::SIGINT;
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT])?;
    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            tracing::info!("CTL-C Pressed.");
            eprintln!("{}", "Interrupted.".yellow());
            std::process::exit(130);
        }
    });
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    config::load_dotenv();
    // Validate everything before any store client exists.
    let settings = Settings::from_env()?;
    settings.log_summary();

    let day = cli.day.unwrap_or_else(day::yesterday);
    tracing::info!(%day, dry_run = cli.dry_run, "Process start.");

    let start = Instant::now();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = rt.block_on(async {
        let search = ElasticClient::new(&settings.elastic)?;
        let logins = ObjectLoginLog::from_source(&settings.login_source)?;
        let pipeline = Pipeline::new(&settings.job, &search, &logins, &search);
        let report = pipeline.run(day, cli.dry_run).await?;
        Ok::<_, anyhow::Error>(report)
    })?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if cli.benchmark {
        eprintln!(
            "{}",
            format!("  Processing time: {}ms", start.elapsed().as_millis()).bright_black()
        );
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    use comfy_table::{ContentArrangement, Table};

    if report.segments.is_empty() {
        println!(
            "{}",
            format!("No active paying users for {}", report.day).yellow()
        );
        println!(
            "{}",
            format!(
                "  {} paying users, {} login events",
                format_number(report.paying_users),
                format_number(report.login_events)
            )
            .bright_black()
        );
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Segment", "Platform", "Channel", "Active paying", "Document"]);

    for row in &report.segments {
        table.add_row(vec![
            row.segment.clone(),
            row.platform.clone(),
            row.channel.clone(),
            format_number(row.count as usize),
            row.doc_id.clone(),
        ]);
    }

    println!("{table}");

    let total: u64 = report.segments.iter().map(|s| s.count).sum();
    println!(
        "\n{} | Segments: {} | Active paying: {}",
        report.day,
        report.segments.len(),
        format_number(total as usize)
    );
    println!(
        "{}",
        format!(
            "  {} paying users, {} login events, {} skipped lines",
            format_number(report.paying_users),
            format_number(report.login_events),
            format_number(report.skipped_lines)
        )
        .bright_black()
    );

    if report.dry_run {
        println!("{}", "  Dry run: nothing written".yellow());
    } else {
        println!(
            "{}",
            format!("✓ {} documents written", report.written).green()
        );
    }
}

fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn test_parse_day_arg() {
        assert_eq!(
            parse_day_arg("2024-06-15"),
            Ok(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
        );
        assert!(parse_day_arg("06/15/2024").unwrap_err().contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from(["payactive", "-d", "2024-06-15", "--dry-run", "--json"]);
        assert_eq!(cli.day, NaiveDate::from_ymd_opt(2024, 6, 15));
        assert!(cli.dry_run);
        assert!(cli.json);
        assert!(!cli.debug);

        let cli = Cli::parse_from(["payactive"]);
        assert_eq!(cli.day, None);
    }
}
