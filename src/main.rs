use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tracing::{info, Level};

mod aggregate;
mod classify;
mod config;
mod error;
mod forecast;
mod loader;
mod models;
mod monthly;
mod report;

use config::{ReportConfig, SignupConfig};
use loader::SignupTable;
use models::Attribute;
use report::{PROFILE_ATTRIBUTES, SEGMENT_ATTRIBUTES};

#[derive(Parser)]
#[command(name = "funnel-report")]
#[command(about = "Conversion and seminar forecast reports for consultation sign-ups", long_about = None)]
struct Cli {
    /// TOML config file; falls back to $FUNNEL_REPORT_CONFIG, then built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log to stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attribute distributions and plain cross counts
    Distribution {
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Attribute and attribute-pair closing rates
    Conversion {
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Acquisition route and channel closing rates
    Routes {
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Month-by-month funnel and attribute mix
    Monthly {
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Per-seminar funnel and attribute mix
    Seminars {
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Consultant closing rates
    Staff {
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Every sign-up report in sequence
    All {
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Seminar slot consultation forecast
    Forecast {
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy)]
enum SignupReport {
    Distribution,
    Conversion,
    Routes,
    Monthly,
    Seminars,
    Staff,
}

impl SignupReport {
    const ALL: [SignupReport; 6] = [
        SignupReport::Distribution,
        SignupReport::Conversion,
        SignupReport::Routes,
        SignupReport::Monthly,
        SignupReport::Seminars,
        SignupReport::Staff,
    ];

    fn required(self) -> Vec<Attribute> {
        let (base, extra): (&[Attribute], Option<Attribute>) = match self {
            SignupReport::Distribution | SignupReport::Conversion => (&PROFILE_ATTRIBUTES, None),
            SignupReport::Routes => (&SEGMENT_ATTRIBUTES, Some(Attribute::Route)),
            SignupReport::Monthly => (&SEGMENT_ATTRIBUTES, Some(Attribute::Month)),
            SignupReport::Seminars => (&SEGMENT_ATTRIBUTES, Some(Attribute::Seminar)),
            SignupReport::Staff => (&SEGMENT_ATTRIBUTES, Some(Attribute::Staff)),
        };
        base.iter().copied().chain(extra).collect()
    }

    fn build(self, table: &SignupTable, config: &SignupConfig) -> anyhow::Result<String> {
        table.require(&self.required())?;
        Ok(match self {
            SignupReport::Distribution => report::build_distribution_report(table),
            SignupReport::Conversion => report::build_conversion_report(table),
            SignupReport::Routes => report::build_route_report(table, config),
            SignupReport::Monthly => report::build_monthly_report(table),
            SignupReport::Seminars => report::build_seminar_report(table),
            SignupReport::Staff => report::build_staff_report(table, config),
        })
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_signup_reports(
    reports: &[SignupReport],
    csv: Option<PathBuf>,
    config: &SignupConfig,
) -> anyhow::Result<()> {
    let path = csv.unwrap_or_else(|| config.path.clone());
    let table = loader::load_signups(&path, config)?;
    for report in reports {
        info!(report = ?report, records = table.records.len(), "building report");
        print!("{}", report.build(&table, config)?);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = ReportConfig::resolve(cli.config)?;

    match cli.command {
        Commands::Distribution { csv } => {
            run_signup_reports(&[SignupReport::Distribution], csv, &config.signups)?
        }
        Commands::Conversion { csv } => {
            run_signup_reports(&[SignupReport::Conversion], csv, &config.signups)?
        }
        Commands::Routes { csv } => {
            run_signup_reports(&[SignupReport::Routes], csv, &config.signups)?
        }
        Commands::Monthly { csv } => {
            run_signup_reports(&[SignupReport::Monthly], csv, &config.signups)?
        }
        Commands::Seminars { csv } => {
            run_signup_reports(&[SignupReport::Seminars], csv, &config.signups)?
        }
        Commands::Staff { csv } => run_signup_reports(&[SignupReport::Staff], csv, &config.signups)?,
        Commands::All { csv } => run_signup_reports(&SignupReport::ALL, csv, &config.signups)?,
        Commands::Forecast { csv } => {
            let path = csv.unwrap_or_else(|| config.sessions.path.clone());
            let sessions = loader::load_sessions(&path, &config.sessions)?;
            if sessions.is_empty() {
                info!(path = %path.display(), "no sessions inside the forecast window");
            }
            print!(
                "{}",
                report::build_forecast_report(&sessions, &config.sessions)
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Column, SignupRecord};
    use crate::error::ReportError;

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["funnel-report", "routes", "--csv", "export.csv", "-vv"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Routes { csv: Some(ref path) } if path == &PathBuf::from("export.csv")
        ));
    }

    #[test]
    fn cli_runs_without_arguments_beyond_subcommand() {
        let cli = Cli::try_parse_from(["funnel-report", "forecast"]).unwrap();
        assert!(cli.config.is_none());
        assert!(matches!(cli.command, Commands::Forecast { csv: None }));
    }

    #[test]
    fn seminars_report_needs_seminar_column() {
        let cli = Cli::try_parse_from(["funnel-report", "seminars"]).unwrap();
        assert!(matches!(cli.command, Commands::Seminars { csv: None }));
        assert_eq!(
            SignupReport::Seminars.required().last(),
            Some(&Attribute::Seminar)
        );

        let mut columns = Column::ALL.to_vec();
        columns.retain(|column| *column != Column::SeminarDate);
        let table = SignupTable::new(vec![SignupRecord::default()], columns);
        let err = SignupReport::Seminars
            .build(&table, &SignupConfig::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReportError>(),
            Some(ReportError::MissingColumn(name)) if name == "seminar_date"
        ));
        assert!(SignupReport::ALL
            .iter()
            .any(|report| matches!(report, SignupReport::Seminars)));
    }

    #[test]
    fn report_aborts_when_required_column_is_absent() {
        let table = SignupTable::new(
            vec![SignupRecord::default()],
            [Column::Age, Column::Income, Column::Credit, Column::Willingness, Column::Outcome],
        );
        assert!(SignupReport::Conversion
            .build(&table, &SignupConfig::default())
            .is_ok());

        let err = SignupReport::Staff
            .build(&table, &SignupConfig::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReportError>(),
            Some(ReportError::MissingColumn(name)) if name == "job"
        ));
    }
}
