use classopt::config::ServiceConfig;
use classopt::service::AssignmentService;
use classopt::strategy::StrategyKind;
use classopt::{io, summary};
use std::fs::File;

use log::{debug, error, info, warn};

fn main() {
    // Setup logging & parse command line arguments
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!(
        "This is the Classroom Assignment Optimizer (classopt), version {}",
        option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
    );
    let args = parse_cli_args();

    if args.get_one::<String>("OUTPUT").is_none() && !args.get_flag("print") {
        warn!("No OUTPUT file and no --print option given. Assignment will not be exported anywhere.");
    }

    // Configuration: environment snapshot, overridden by command line options
    let mut config = ServiceConfig::from_env();
    if let Some(strategy) = args.get_one::<String>("strategy") {
        config.strategy = StrategyKind::from_name(strategy).unwrap_or_else(|| {
            error!("Unknown strategy name: {}", strategy);
            std::process::exit(exitcode::USAGE)
        });
    }
    if let Some(timeout) = args.get_one::<u64>("timeout") {
        config.timeout_seconds = *timeout;
    }
    if args.get_flag("no_fallback") {
        config.fallback_enabled = false;
    }

    // Open & read input file
    let inpath: &String = args.get_one("INPUT").unwrap();
    debug!("Opening input file {} ...", inpath);
    let file = File::open(inpath).unwrap_or_else(|e| {
        error!("Could not open input file {}: {}", inpath, e);
        std::process::exit(exitcode::NOINPUT)
    });
    let records = classopt::io::simple::read(file).unwrap_or_else(|e| {
        error!("Could not read input file: {}", e);
        std::process::exit(exitcode::DATAERR)
    });
    info!("Read {} student records for class assignment.", records.len());

    let num_classes: usize = *args.get_one("classes").unwrap();

    // Validate the table, build the shared graph and run the assignment
    let mut service = AssignmentService::with_config(records, config).unwrap_or_else(|e| {
        error!("Invalid student data [{}]: {}", e.code(), e);
        std::process::exit(exitcode::DATAERR)
    });
    debug!(
        "Students:\n{}",
        io::debug_list_of_students(service.graph())
    );

    let classes = service.assign(num_classes).unwrap_or_else(|e| {
        error!("Could not compute an assignment [{}]: {}", e.code(), e);
        std::process::exit(1)
    });

    if let Some(last) = service.last_assignment_info() {
        info!(
            "Finished {} assignment in {:.3}s.",
            last.strategy_used, last.metadata.execution_time
        );
        if let Some(solver) = &last.metadata.solver {
            info!(
                "Solver status {} with {} intra-class friendships ({} variables, {} constraints).",
                solver.solver_status,
                solver.objective_value,
                solver.num_variables,
                solver.num_constraints
            );
        }
        if let Some(fallback) = &last.metadata.fallback {
            warn!(
                "Fell back from {} to the greedy heuristic: {}",
                fallback.original_strategy, fallback.fallback_reason
            );
        }
        if let Some(evaluation) = &last.metadata.evaluation {
            info!(
                "Solution quality score: {:.1}/100 ({} friendless, {} unwanted matches, \
                 friendship satisfaction {:.0}%).",
                evaluation.overall_score,
                evaluation.students_without_friends.len(),
                evaluation.not_with_violations.len(),
                evaluation.friendship_satisfaction_rate * 100.0
            );
        }
    }

    // Per-class statistics and cluster diagnostics
    for detail in service.class_details(&classes) {
        info!(
            "Class {}: {} students, male ratio {:.2}, academic {:.2}, behavioral {:.2}",
            detail.class_number,
            detail.size,
            detail.male_ratio,
            detail.academic_score,
            detail.behavioral_score
        );
    }
    let index_classes = service.index_classes(&classes);
    let clusters = summary::analyze_cluster_distribution(service.graph(), &index_classes);
    info!(
        "Clusters: {} total, {} broken across 2+ classes, {} across 3+ classes.",
        clusters.total_clusters, clusters.broken_clusters, clusters.badly_broken_clusters
    );

    // Export & print
    if let Some(outpath) = args.get_one::<String>("OUTPUT") {
        debug!("Opening output file {} ...", outpath);
        match File::create(outpath) {
            Err(e) => error!("Could not open output file {}: {}.", outpath, e),
            Ok(file) => {
                let output = service.summarize(&classes);
                let metadata = service
                    .last_assignment_info()
                    .map(|last| last.metadata.clone());
                let res = match metadata {
                    Some(metadata) => classopt::io::simple::write(file, &output, &metadata),
                    None => Ok(()),
                };
                match res {
                    Ok(_) => debug!("Assignment written to {}.", outpath),
                    Err(e) => error!("Could not write assignment to {}: {}.", outpath, e),
                }
            }
        }
    }

    if args.get_flag("print") {
        print!(
            "The assignment is:\n{}",
            io::format_assignment(service.graph(), &index_classes)
        );
    }
}

/// Helper function to construct and execute parser for command line options
fn parse_cli_args() -> clap::ArgMatches {
    clap::command!()
        .arg(
            clap::Arg::new("classes")
                .short('n')
                .long("classes")
                .help("Number of classes to partition the students into")
                .value_name("NUM_CLASSES")
                .required(true)
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            clap::Arg::new("strategy")
                .short('s')
                .long("strategy")
                .help(
                    "Assignment strategy to use: greedy or cp_sat. Overrides the \
                     ASSIGNMENT_ALGORITHM environment variable.",
                )
                .value_name("STRATEGY"),
        )
        .arg(
            clap::Arg::new("timeout")
                .short('t')
                .long("timeout")
                .help(
                    "Wall-clock timeout for the cp_sat optimizer in seconds. Overrides the \
                     ASSIGNMENT_TIMEOUT environment variable.",
                )
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            clap::Arg::new("no_fallback")
                .long("no-fallback")
                .help(
                    "Fail instead of falling back to the greedy heuristic when the cp_sat \
                     optimizer cannot produce a solution.",
                )
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("print")
                .short('p')
                .long("print")
                .help("Print the calculated class assignment to stdout in a human readable format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("INPUT")
                .help("The student table to read (JSON)")
                .required(true)
                .index(1),
        )
        .arg(
            clap::Arg::new("OUTPUT")
                .help("The file to export the computed assignment to (JSON)")
                .index(2),
        )
        .get_matches()
}
