//! Gradebook - student marks tracker
//!
//! Loads a student dataset into memory and answers one query per invocation,
//! printing the result as JSON.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use gradebook::config::{Config, LogFormat};
use gradebook::{
    CatalogQuery, GradebookError, MemoryStudentStore, QueryResult, Result, StudentsService,
};
use tracing::{debug, error};

/// Gradebook - student marks tracker
///
/// Answers the catalog of analytic queries over a JSON dataset of students.
#[derive(Parser, Debug)]
#[command(name = "gradebook")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Student dataset (JSON array, overrides config file)
    #[arg(
        short = 'd',
        long = "data",
        value_name = "FILE",
        env = "GRADEBOOK_DATA",
        global = true
    )]
    data: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error (overrides config file)
    #[arg(
        short = 'l',
        long = "log-level",
        value_name = "LEVEL",
        env = "GRADEBOOK_LOG_LEVEL",
        global = true
    )]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Student summary by id
    Student {
        /// Student id
        id: i64,
    },

    /// All marks of a student in append order
    Marks {
        /// Student id
        id: i64,
    },

    /// Student with an exact phone number
    Phone {
        /// Phone number
        phone: String,
    },

    /// Students whose phone starts with a prefix
    PhonePrefix {
        /// Phone prefix
        prefix: String,
    },

    /// Students with a mark on a date (YYYY-MM-DD)
    MarksDate {
        /// Exam date
        date: NaiveDate,
    },

    /// Students with a mark in a month
    MarksMonth {
        /// Month, 1-12
        month: u32,
        /// Year
        year: i32,
    },

    /// Students with a mark in a subject above a threshold
    GoodSubjectMark {
        /// Subject
        subject: String,
        /// Exclusive lower bound
        threshold: i64,
    },

    /// Students whose every mark is above a threshold
    AllGoodMarks {
        /// Exclusive lower bound
        threshold: i64,
    },

    /// Students whose every mark in a subject is above a threshold
    AllGoodMarksSubject {
        /// Subject
        subject: String,
        /// Exclusive lower bound
        threshold: i64,
    },

    /// Students with fewer than N marks
    FewMarks {
        /// Exclusive upper bound
        n_marks: i64,
    },

    /// Students whose mark count is within [MIN, MAX]
    MarksAmount {
        /// Inclusive lower bound
        min: i64,
        /// Inclusive upper bound
        max: i64,
    },

    /// Marks of a student in a subject
    MarksSubject {
        /// Student id
        id: i64,
        /// Subject
        subject: String,
    },

    /// Marks of a student dated within [FROM, TO]
    MarksAtDates {
        /// Student id
        id: i64,
        /// First date
        from: NaiveDate,
        /// Last date
        to: NaiveDate,
    },

    /// Students averaging above a threshold, best first
    AvgScoreGreater {
        /// Exclusive lower bound
        threshold: i64,
    },

    /// Ids of the N students with the most high marks
    Best {
        /// Number of students
        n: usize,
    },

    /// Ids of the N students with the lowest score sum
    Worst {
        /// Number of students
        n: usize,
    },

    /// Print the effective configuration and exit
    DumpConfig,
}

impl Cli {
    /// Apply CLI argument overrides to the configuration
    fn apply_to_config(&self, config: &mut Config) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(data) = &self.data {
            config.dataset.path = Some(data.clone());
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    if let Some(path) = &cli.config {
        if !path.exists() {
            return Err(GradebookError::Config(format!(
                "Config file {} not found",
                path.display()
            )));
        }
        return Config::from_file(path);
    }

    let default_path = PathBuf::from("gradebook.toml");
    if default_path.exists() {
        return Config::from_file(&default_path);
    }

    Ok(Config::default())
}

fn init_logging(config: &Config) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn open_store(config: &Config) -> Result<MemoryStudentStore> {
    match &config.dataset.path {
        Some(path) => MemoryStudentStore::from_json_file(path),
        None => Ok(MemoryStudentStore::new()),
    }
}

fn execute(command: &Commands, config: &Config) -> Result<QueryResult> {
    let service = StudentsService::new(open_store(config)?, config);
    debug!(students = service.store().len(), "store ready");

    let query = match command {
        Commands::Student { id } => {
            return service
                .get_student(*id)
                .map(|student| QueryResult::Student(Some(student)))
        }
        Commands::Marks { id } => return service.get_marks(*id).map(QueryResult::Marks),
        Commands::DumpConfig => {
            return Err(GradebookError::Config(
                "dump-config does not run a query".to_string(),
            ))
        }
        Commands::Phone { phone } => CatalogQuery::StudentByPhone {
            phone: phone.clone(),
        },
        Commands::PhonePrefix { prefix } => CatalogQuery::StudentsByPhonePrefix {
            prefix: prefix.clone(),
        },
        Commands::MarksDate { date } => CatalogQuery::StudentsMarksDate { date: *date },
        Commands::MarksMonth { month, year } => CatalogQuery::StudentsMarksMonthYear {
            month: *month,
            year: *year,
        },
        Commands::GoodSubjectMark { subject, threshold } => {
            CatalogQuery::StudentsGoodSubjectMark {
                subject: subject.clone(),
                threshold: *threshold,
            }
        }
        Commands::AllGoodMarks { threshold } => CatalogQuery::StudentsAllGoodMarks {
            threshold: *threshold,
        },
        Commands::AllGoodMarksSubject { subject, threshold } => {
            CatalogQuery::StudentsAllGoodMarksSubject {
                subject: subject.clone(),
                threshold: *threshold,
            }
        }
        Commands::FewMarks { n_marks } => CatalogQuery::StudentsFewMarks { n_marks: *n_marks },
        Commands::MarksAmount { min, max } => CatalogQuery::StudentsMarksAmountBetween {
            min: *min,
            max: *max,
        },
        Commands::MarksSubject { id, subject } => CatalogQuery::StudentMarksSubject {
            id: *id,
            subject: subject.clone(),
        },
        Commands::MarksAtDates { id, from, to } => CatalogQuery::StudentMarksAtDates {
            id: *id,
            from: *from,
            to: *to,
        },
        Commands::AvgScoreGreater { threshold } => CatalogQuery::StudentAvgScoreGreater {
            threshold: *threshold,
        },
        Commands::Best { n } => CatalogQuery::BestStudents {
            limit: *n,
            threshold: config.catalog.best_students_threshold,
        },
        Commands::Worst { n } => CatalogQuery::WorstStudents { limit: *n },
    };

    service.query(&query)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    cli.apply_to_config(&mut config);

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    if let Commands::DumpConfig = cli.command {
        return match config.to_toml() {
            Ok(output) => {
                print!("{output}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    init_logging(&config);

    let output = execute(&cli.command, &config).and_then(|result| {
        serde_json::to_string_pretty(&result)
            .map_err(|e| GradebookError::ResultShape(format!("Failed to serialize result: {e}")))
    });

    match output {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
