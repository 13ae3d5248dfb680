use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use converge_core::test_harness::Scenario;
use converge_core::ConvergeConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("converge-sim")
        .version(converge_core::VERSION)
        .about("Convergence simulator")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print reports as JSON"),
        )
        .subcommand_required(true)
        .subcommand(Command::new("list").about("List built-in scenarios"))
        .subcommand(
            Command::new("scenario")
                .about("Run one built-in scenario")
                .arg(
                    Arg::new("name")
                        .required(true)
                        .value_parser(Scenario::ALL.map(Scenario::name))
                        .help("Scenario to run"),
                ),
        )
        .subcommand(Command::new("all").about("Run every built-in scenario"))
}

fn init_logging(config: &ConvergeConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn run(scenarios: &[Scenario], config: &ConvergeConfig, json: bool) -> anyhow::Result<bool> {
    let mut passed = true;

    for scenario in scenarios {
        let report = scenario
            .run(config)
            .await
            .with_context(|| format!("scenario {} failed", scenario.name()))?;

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("{}", report.generate_text());
        }
        passed &= report.passed();
    }

    Ok(passed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ConvergeConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ConvergeConfig::default(),
    };
    init_logging(&config);
    let json = matches.get_flag("json");

    let passed = match matches.subcommand() {
        Some(("list", _)) => {
            for scenario in Scenario::ALL {
                println!("{:<16} {}", scenario.name(), scenario.description());
            }
            true
        }
        Some(("scenario", args)) => {
            let name = args
                .get_one::<String>("name")
                .context("missing scenario name")?;
            let scenario = Scenario::from_name(name).with_context(|| format!("unknown scenario {name}"))?;
            run(&[scenario], &config, json).await?
        }
        Some(("all", _)) => run(&Scenario::ALL, &config, json).await?,
        _ => unreachable!("subcommand is required"),
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}
