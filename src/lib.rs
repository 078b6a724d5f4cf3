//! Scoremark: annotation core for music-score symbol marks.
//!
//! A mark is a labelled rectangle of a score image with an optional
//! pixel mask. Marks are linked by directed relationship edges, checked
//! against a dependency grammar over class names, and persisted in the
//! mark list XML format.
//!
//! # Modules
//!
//! - [`geom`]: boxes, rasters, masks, regions and the widget/model scaler
//! - [`model`]: marks, the class catalog, the edge graph and the model
//! - [`selection`]: selectors turning pointer input into regions
//! - [`grammar`]: dependency grammar and edge-proposing parsers
//! - [`io`]: mark list, class list and image files
//! - [`activity`]: annotator activity log writer and analysis
//! - [`session`] and [`keymap`]: headless annotation session
//! - [`validation`]: model validation and error reporting
//! - [`error`]: error types for scoremark operations

pub mod activity;
pub mod config;
pub mod error;
pub mod geom;
pub mod grammar;
pub mod io;
pub mod keymap;
pub mod logging;
pub mod model;
pub mod selection;
pub mod session;
pub mod validation;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

pub use error::ScoremarkError;

use activity::{ActivityLog, LogReport};
use config::Roots;
use geom::Scaler;
use grammar::{DependencyGrammar, LinearPairModel};
use io::MarkList;
use model::AnnotationModel;
use session::AnnotationSession;
use validation::{ValidateOptions, ValidationReport};

/// The scoremark CLI application.
#[derive(Parser)]
#[command(name = "scoremark")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Log progress to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log debugging detail to stderr.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a score's annotations, optionally parse them, and validate.
    Annotate(AnnotateArgs),
    /// Concatenate mark lists into one file.
    MergeMarks(MergeMarksArgs),
    /// Summarize annotator activity logs.
    AnalyzeLog(AnalyzeLogArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(clap::Args)]
struct AnnotateArgs {
    /// Mark list to load.
    #[arg(long)]
    marks: Option<PathBuf>,

    /// Class list; defaults to the one referenced by the mark list.
    #[arg(long = "class-list")]
    class_list: Option<PathBuf>,

    /// Score image; defaults to the one referenced by the mark list.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Dependency grammar over the class names.
    #[arg(long)]
    grammar: Option<PathBuf>,

    /// Add every edge the grammar allows between the loaded marks.
    #[arg(long, requires = "grammar")]
    parse: bool,

    /// JSON pairwise model for proposing edges.
    #[arg(long)]
    classifier: Option<PathBuf>,

    /// Activity log to append to.
    #[arg(long)]
    log: Option<PathBuf>,

    /// Write the resulting mark list here.
    #[arg(short = 'o', long = "out")]
    out: Option<PathBuf>,

    /// Treat warnings as errors (exit non-zero if any warnings).
    #[arg(long)]
    strict: bool,

    /// Output format for the summary.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(flatten)]
    roots: Roots,
}

#[derive(clap::Args)]
struct MergeMarksArgs {
    /// Mark lists to concatenate, in order.
    #[arg(short = 'i', long = "input", required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Output mark list.
    #[arg(short = 'o', long = "out")]
    out: PathBuf,
}

#[derive(clap::Args)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["inputs", "package"])))]
struct AnalyzeLogArgs {
    /// Activity log files.
    #[arg(short = 'i', long = "input", num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Annotation package whose `annotation_logs` directories are read.
    #[arg(short = 'p', long)]
    package: Option<PathBuf>,

    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

/// Run the scoremark CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), ScoremarkError> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.debug);

    match cli.command {
        Some(Commands::Annotate(args)) => run_annotate(args),
        Some(Commands::MergeMarks(args)) => run_merge_marks(args),
        Some(Commands::AnalyzeLog(args)) => run_analyze_log(args),
        None => {
            println!("scoremark {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Annotation core for music-score symbol marks.");
            println!();
            println!("Run 'scoremark --help' for usage information.");
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct AnnotateSummary<'a> {
    marks: usize,
    edges: usize,
    classes: usize,
    image: Option<[usize; 2]>,
    edges_added: usize,
    error_count: usize,
    warning_count: usize,
    validation: &'a ValidationReport,
}

fn run_annotate(args: AnnotateArgs) -> Result<(), ScoremarkError> {
    let input = args.marks.as_deref().map(io::read_mark_list).transpose()?;
    let resolved = match (&input, &args.marks) {
        (Some(list), Some(path)) => io::resolve_refs(&list.refs, path, &args.roots),
        _ => io::ResolvedRefs::default(),
    };

    let mut model = AnnotationModel::new();
    let class_list = args.class_list.clone().or(resolved.class_list);
    if let Some(path) = &class_list {
        model.load_catalog(io::read_class_list(path)?)?;
        tracing::info!(path = %path.display(), classes = model.catalog().len(), "loaded class list");
    }
    let image = args.image.clone().or(resolved.image);
    if let Some(path) = &image {
        model.load_image(io::read_grayscale(path)?);
        tracing::info!(path = %path.display(), "loaded image");
    }
    let refs = input
        .as_ref()
        .map(|list| list.refs.clone())
        .unwrap_or_else(|| io::Refs {
            class_list: class_list.as_deref().map(path_ref),
            image: image.as_deref().map(path_ref),
        });
    if let Some(list) = input {
        model.import_marks(list.marks)?;
    }

    let grammar = match &args.grammar {
        Some(path) => {
            if model.catalog().is_empty() {
                return Err(ScoremarkError::MissingInput(
                    "a class list to check the grammar against".to_string(),
                ));
            }
            Some(DependencyGrammar::from_file(path, model.catalog().names())?)
        }
        None => None,
    };

    let scaler = match model.image() {
        Some(image) => Scaler::identity(image.height(), image.width()),
        None => Scaler::identity(0, 0),
    };
    let log = match &args.log {
        Some(path) => ActivityLog::open(path),
        None => ActivityLog::disabled(),
    };
    let mut session = AnnotationSession::new(model, scaler).with_log(log);
    if let Some(grammar) = grammar {
        session = session.with_grammar(grammar);
    }

    let mut edges_added = 0;
    if args.parse {
        edges_added += session.parse_selected()?;
    }
    if let Some(path) = &args.classifier {
        let pair_model = LinearPairModel::from_json_file(path)?;
        let prefilter = session.grammar.clone();
        edges_added += session.parse_selected_with(&pair_model.parser(prefilter.as_ref()))?;
    }

    let report = session.model.validation_report(&ValidateOptions {
        grammar: session.grammar.as_ref(),
    });
    let summary = AnnotateSummary {
        marks: session.model.len(),
        edges: session.model.graph().len(),
        classes: session.model.catalog().len(),
        image: session.model.image().map(|image| [image.height(), image.width()]),
        edges_added,
        error_count: report.error_count(),
        warning_count: report.warning_count(),
        validation: &report,
    };
    match args.output {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => {
            println!(
                "{} marks, {} edges, {} classes",
                summary.marks, summary.edges, summary.classes
            );
            if let Some([height, width]) = summary.image {
                println!("image: {height}x{width}");
            }
            if args.parse || args.classifier.is_some() {
                println!("edges added: {edges_added}");
            }
            print!("{report}");
        }
    }

    if let Some(out) = &args.out {
        let list = MarkList {
            refs,
            marks: session.model.marks().cloned().collect(),
        };
        io::write_mark_list(out, &list)?;
        tracing::info!(path = %out.display(), marks = list.marks.len(), "wrote mark list");
    }
    session.close();

    if report.error_count() > 0 || (args.strict && report.warning_count() > 0) {
        return Err(ScoremarkError::ValidationFailed {
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            report,
        });
    }
    Ok(())
}

fn run_merge_marks(args: MergeMarksArgs) -> Result<(), ScoremarkError> {
    let mut merged = MarkList::default();
    let mut seen = BTreeSet::new();
    for (idx, path) in args.inputs.iter().enumerate() {
        let list = io::read_mark_list(path)?;
        if idx == 0 {
            merged.refs = list.refs;
        } else if list.refs != merged.refs {
            tracing::warn!(path = %path.display(), "mark list references differ from the first input; keeping the first");
        }
        for mark in list.marks {
            if !seen.insert(mark.id) {
                return Err(ScoremarkError::DuplicateMarkId(mark.id));
            }
            merged.marks.push(mark);
        }
    }

    io::write_mark_list(&args.out, &merged)?;
    println!(
        "Merged {} marks from {} files into {}",
        merged.marks.len(),
        args.inputs.len(),
        args.out.display()
    );
    Ok(())
}

fn run_analyze_log(args: AnalyzeLogArgs) -> Result<(), ScoremarkError> {
    let mut files = args.inputs;
    if let Some(package) = &args.package {
        let found = activity::find_package_logs(package)?;
        if found.is_empty() {
            tracing::warn!(path = %package.display(), "no activity logs found in package");
        }
        files.extend(found);
    }

    let mut events = Vec::new();
    for path in &files {
        events.extend(activity::read_activity_log(path)?);
    }
    tracing::info!(files = files.len(), events = events.len(), "read activity logs");
    let report: LogReport = activity::analyze_logs(&events);

    match args.output {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            print!("{report}");
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ScoremarkError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ScoremarkError::JsonParse {
        path: PathBuf::from("<stdout>"),
        source,
    })?;
    println!("{json}");
    Ok(())
}

fn path_ref(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
