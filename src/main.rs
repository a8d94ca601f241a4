use clap::{crate_version, value_t, App, AppSettings, Arg, ArgMatches, SubCommand};
use log::info;
use satsteer::formula::dimacs;
use satsteer::select::{self, Policy, SelectorParams, UsedVariables};
use satsteer::solver::ReportFormat;
use satsteer::spectral::{DEFAULT_POWER_ITERATIONS, DEFAULT_RAYLEIGH_DAMPING};
use satsteer::*;
use std::fs;
use std::path::{Path, PathBuf};

fn selector_args<'a, 'b>(cmd: App<'a, 'b>) -> App<'a, 'b> {
    cmd.arg(
        Arg::with_name("policy")
            .long("policy")
            .takes_value(true)
            .possible_values(&Policy::ALL)
            .default_value("spectral")
            .help("literal selection policy"),
    )
    .arg(
        Arg::with_name("power-iters")
            .long("power-iters")
            .takes_value(true)
            .help("power iterations for the spectral scorer [default: 20]"),
    )
    .arg(
        Arg::with_name("damping")
            .long("damping")
            .takes_value(true)
            .help("debit weight of the rayleigh policy [default: 0.15]"),
    )
    .arg(
        Arg::with_name("seed")
            .long("seed")
            .takes_value(true)
            .default_value("12345")
            .help("seed for the random policy"),
    )
}

fn app<'a, 'b>() -> App<'a, 'b> {
    App::new("satsteer")
        .version(crate_version!())
        .about("Steers an external SAT solver with structurally chosen unit clauses")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .global(true)
                .help("more logging (-v debug, -vv trace)"),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .global(true)
                .help("only log warnings and errors"),
        )
        .subcommand(selector_args(
            SubCommand::with_name("run")
                .about("iteratively add unit clauses and re-solve")
                .arg(Arg::with_name("INPUT").help("input file (in CNF)").required(true).index(1))
                .arg(
                    Arg::with_name("solver")
                        .long("solver")
                        .takes_value(true)
                        .env("SATSTEER_SOLVER")
                        .help("solver binary (path or name on PATH)"),
                )
                .arg(
                    Arg::with_name("tag")
                        .long("tag")
                        .takes_value(true)
                        .help("artifact name prefix [default: input file stem]"),
                )
                .arg(
                    Arg::with_name("out")
                        .long("out")
                        .takes_value(true)
                        .default_value("shared")
                        .help("artifact root directory"),
                )
                .arg(
                    Arg::with_name("k-total")
                        .long("k-total")
                        .takes_value(true)
                        .default_value("10")
                        .help("total number of unit clauses to add"),
                )
                .arg(
                    Arg::with_name("k-step")
                        .long("k-step")
                        .takes_value(true)
                        .default_value("1")
                        .help("unit clauses added per iteration"),
                )
                .arg(
                    Arg::with_name("max-iters")
                        .long("max-iters")
                        .takes_value(true)
                        .help("cap on selection iterations"),
                )
                .arg(
                    Arg::with_name("stop")
                        .long("stop")
                        .takes_value(true)
                        .possible_values(&StopPolicy::ALL)
                        .default_value("collapsed")
                        .help("when a solved iteration ends the run"),
                )
                .arg(
                    Arg::with_name("stop-at-baseline")
                        .long("stop-at-baseline")
                        .help("apply the stop policy to the baseline solve too"),
                )
                .arg(
                    Arg::with_name("avoid")
                        .long("avoid")
                        .takes_value(true)
                        .possible_values(&AvoidMode::ALL)
                        .default_value("committed")
                        .help("whether later selections skip committed variables"),
                )
                .arg(
                    Arg::with_name("verdict-marker")
                        .long("verdict-marker")
                        .takes_value(true)
                        .default_value("s ")
                        .help("prefix of the solver's verdict line"),
                )
                .arg(
                    Arg::with_name("conflicts-label")
                        .long("conflicts-label")
                        .takes_value(true)
                        .default_value("c conflicts")
                        .help("label of the solver's conflict count line"),
                )
                .arg(
                    Arg::with_name("cpu-label")
                        .long("cpu-label")
                        .takes_value(true)
                        .default_value("c CPU time")
                        .help("label of the solver's CPU time line"),
                ),
        ))
        .subcommand(selector_args(
            SubCommand::with_name("pick")
                .about("print K selected literals for a CNF file")
                .arg(Arg::with_name("INPUT").help("input file (in CNF)").required(true).index(1))
                .arg(Arg::with_name("K").help("number of literals").required(true).index(2)),
        ))
        .subcommand(
            SubCommand::with_name("apply")
                .about("append unit clauses to a CNF file")
                .setting(AppSettings::AllowNegativeNumbers)
                .arg(Arg::with_name("INPUT").help("input file (in CNF)").required(true).index(1))
                .arg(Arg::with_name("OUTPUT").help("output file").required(true).index(2))
                .arg(
                    Arg::with_name("LITERALS")
                        .help("signed literals to assert")
                        .required(true)
                        .multiple(true)
                        .allow_hyphen_values(true)
                        .index(3),
                ),
        )
        .subcommand(
            SubCommand::with_name("gen")
                .about("write a random k-SAT instance")
                .arg(Arg::with_name("N").help("number of variables").required(true).index(1))
                .arg(Arg::with_name("M").help("number of clauses").required(true).index(2))
                .arg(Arg::with_name("SEED").help("random seed").required(true).index(3))
                .arg(Arg::with_name("OUTPUT").help("output file").required(true).index(4))
                .arg(
                    Arg::with_name("width")
                        .long("width")
                        .takes_value(true)
                        .default_value("3")
                        .help("literals per clause"),
                ),
        )
}

fn main() {
    let matches = app().get_matches();

    let sub = matches.subcommand().1;
    let quiet = matches.is_present("quiet") || sub.map_or(false, |m| m.is_present("quiet"));
    let verbose = matches
        .occurrences_of("verbose")
        .max(sub.map_or(0, |m| m.occurrences_of("verbose")));
    let level = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match matches.subcommand() {
        ("run", Some(m)) => run(m),
        ("pick", Some(m)) => pick(m),
        ("apply", Some(m)) => apply(m),
        ("gen", Some(m)) => gen(m),
        _ => unreachable!("clap requires a subcommand"),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn number<T: std::str::FromStr>(m: &ArgMatches, name: &str) -> Result<T> {
    let raw = m.value_of(name).unwrap_or_default();
    raw.parse()
        .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got '{}'", name, raw)))
}

fn selector_params(m: &ArgMatches) -> Result<SelectorParams> {
    let mut params = SelectorParams::default();
    params.power_iterations = match m.value_of("power-iters") {
        Some(_) => number(m, "power-iters")?,
        None => DEFAULT_POWER_ITERATIONS,
    };
    params.damping = match m.value_of("damping") {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("damping must be a number, got '{}'", raw)))?,
        None => DEFAULT_RAYLEIGH_DAMPING,
    };
    params.seed = number(m, "seed")?;
    Ok(params)
}

fn report_format(m: &ArgMatches) -> ReportFormat {
    let mut format = ReportFormat::default();
    if let Some(marker) = m.value_of("verdict-marker") {
        format.verdict_marker = marker.to_string();
    }
    if let Some(label) = m.value_of("conflicts-label") {
        format.conflicts_label = label.to_string();
    }
    if let Some(label) = m.value_of("cpu-label") {
        format.cpu_time_label = label.to_string();
    }
    format
}

fn policy(m: &ArgMatches) -> Result<Policy> {
    m.value_of("policy").unwrap_or("spectral").parse()
}

fn read_formula(path: &Path) -> Result<Formula> {
    if !path.is_file() {
        return Err(Error::Resource(format!("input CNF not found: {}", path.display())));
    }
    Ok(dimacs::parse_str(&fs::read_to_string(path)?)?)
}

fn run(m: &ArgMatches) -> Result<()> {
    let input = PathBuf::from(m.value_of("INPUT").unwrap_or_default());
    let solver = m
        .value_of("solver")
        .ok_or_else(|| Error::Resource("no solver binary given (--solver or SATSTEER_SOLVER)".into()))?;
    let tag = match m.value_of("tag") {
        Some(tag) => tag.to_string(),
        None => input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "run".to_string()),
    };

    let mut config = RunConfig::new(&input, solver, tag).with_output_root(m.value_of("out").unwrap_or("shared"));
    config.policy = policy(m)?;
    config.selector = selector_params(m)?;
    config.k_total = number(m, "k-total")?;
    config.k_step = number(m, "k-step")?;
    config.max_iterations = match m.value_of("max-iters") {
        Some(_) => Some(number(m, "max-iters")?),
        None => None,
    };
    config.stop = m.value_of("stop").unwrap_or("collapsed").parse()?;
    config.stop_at_baseline = m.is_present("stop-at-baseline");
    config.avoid = m.value_of("avoid").unwrap_or("committed").parse()?;
    config.report = report_format(m);

    let mut controller = Controller::from_config(config)?;
    let outcome = controller.run()?;

    info!("done after {} iterations: {}", outcome.records.len() - 1, outcome.stop);
    println!("CSV written: {}", outcome.records_path.display());
    println!("final CNF:   {}", outcome.final_cnf().display());
    println!("final log:   {}", outcome.final_log().display());
    Ok(())
}

fn pick(m: &ArgMatches) -> Result<()> {
    let k: usize = number(m, "K")?;
    if k == 0 {
        return Err(Error::Config("K must be > 0".into()));
    }
    let params = selector_params(m)?;
    let formula = read_formula(Path::new(m.value_of("INPUT").unwrap_or_default()))?;

    let mut selector = select::build(policy(m)?, &params);
    let literals = selector.select(&formula, k, &UsedVariables::new())?;
    let line: Vec<String> = literals.iter().map(|l| l.to_string()).collect();
    println!("{}", line.join(" "));
    Ok(())
}

fn apply(m: &ArgMatches) -> Result<()> {
    let formula = read_formula(Path::new(m.value_of("INPUT").unwrap_or_default()))?;
    let output = m.value_of("OUTPUT").unwrap_or_default();

    let mut units = vec![];
    for raw in m.values_of("LITERALS").into_iter().flatten() {
        let literal = raw
            .parse::<i64>()
            .ok()
            .and_then(Literal::from_dimacs)
            .filter(|l| l.idx() <= formula.num_variables())
            .ok_or_else(|| Error::Config(format!("not a literal of this formula: '{}'", raw)))?;
        units.push(literal);
    }

    let next = add_units(&formula, &units)?;
    fs::write(output, dimacs::serialize(&next))?;
    println!("wrote {} (added {} unit clauses)", output, units.len());
    Ok(())
}

fn gen(m: &ArgMatches) -> Result<()> {
    let num_vars: usize = number(m, "N")?;
    let num_clauses: usize = number(m, "M")?;
    let seed: u64 = number(m, "SEED")?;
    let width = value_t!(m, "width", usize).map_err(|e| Error::Config(e.to_string()))?;
    let output = m.value_of("OUTPUT").unwrap_or_default();

    let formula = generate::random_ksat(num_vars, num_clauses, width, seed)?;
    fs::write(output, dimacs::serialize(&formula))?;
    info!("wrote {}: {} variables, {} clauses", output, num_vars, num_clauses);
    Ok(())
}
