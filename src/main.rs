use anyhow::{anyhow, Context};
use clap::{Args, Parser};
use load_profile::core::appliance::Priority;
use load_profile::input::{ingest_for_processing, Configuration};
use load_profile::output::FileOutput;
use load_profile::{run_project_from_input, run_project_with_catalogue_csv, ProjectFlags};
use std::ffi::OsStr;
use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser, Default, Debug)]
#[clap(author, version, about, long_about = None)]
struct LoadProfileArgs {
    #[arg(help = "Path to the input file: a JSON document, or a CSV catalogue with --catalogue-csv")]
    input_file: String,
    #[arg(
        long,
        default_value_t = false,
        help = "Read the input file as a CSV appliance catalogue"
    )]
    catalogue_csv: bool,
    #[arg(
        long,
        help = "JSON file holding the configuration, replacing any in a JSON input"
    )]
    config: Option<String>,
    #[arg(
        long,
        short,
        help = "Directory to write results to (defaults to <input stem>__results)"
    )]
    output_dir: Option<String>,
    #[command(flatten)]
    run_choice: RunChoice,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Write out the average power of appliances with these priorities, e.g. essential,medium"
    )]
    priorities: Option<Vec<String>>,
    #[clap(long, default_value_t = false, help = "Whether to log out spans")]
    log_spans: bool,
    #[arg(long, short, action = clap::ArgAction::Count, help = "Log more detail (repeat for more)")]
    verbose: u8,
}

#[derive(Args, Clone, Copy, Default, Debug)]
#[group(required = false, multiple = false)]
struct RunChoice {
    #[arg(long, help = "Clamp the catalogue and write it out without calculating loads")]
    validate_only: bool,
    #[arg(
        long,
        help = "Also write per-appliance energy and average power for every interval"
    )]
    detailed: bool,
}

fn main() -> anyhow::Result<()> {
    let args = LoadProfileArgs::parse();

    // set up basic tracing
    let tracing_subscriber = {
        let max_level = match args.verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };
        let mut builder = tracing_subscriber::fmt::fmt().with_max_level(max_level);

        if args.log_spans {
            builder = builder.with_span_events(FmtSpan::CLOSE);
        }

        builder.finish()
    };
    tracing::subscriber::set_global_default(tracing_subscriber)
        .context("setting tracing subscriber failed")?;

    let input_file = args.input_file.as_str();
    let input_file_ext = Path::new(input_file).extension().and_then(OsStr::to_str);
    let input_file_stem = match input_file_ext {
        Some(ext) => &input_file[..(input_file.len() - ext.len() - 1)],
        None => input_file,
    };
    let input_file_stem = PathBuf::from(input_file_stem);
    let input_file_name = input_file_stem
        .file_name()
        .and_then(OsStr::to_str)
        .ok_or_else(|| anyhow!("Could not determine a file name from '{input_file}'"))?;

    let output_path = match &args.output_dir {
        Some(dir) => PathBuf::from(dir),
        None => {
            let mut path = input_file_stem.clone().into_os_string();
            path.push("__results");
            PathBuf::from(path)
        }
    };
    fs::create_dir_all(&output_path)?;
    let file_output = FileOutput::new(output_path, format!("{input_file_name}__{{}}.{{}}"));

    let project_flags = (&args).into();
    let priorities = args
        .priorities
        .as_ref()
        .map(|raw| parse_priorities(raw))
        .transpose()?;

    let input = BufReader::new(
        File::open(Path::new(input_file)).with_context(|| format!("Could not open {input_file}"))?,
    );

    let configuration = args
        .config
        .as_ref()
        .map(|config_file| read_configuration(config_file))
        .transpose()?;

    let response = if args.catalogue_csv {
        run_project_with_catalogue_csv(
            input,
            configuration.unwrap_or_default(),
            &file_output,
            &project_flags,
            priorities.as_deref(),
        )?
    } else {
        let mut input_for_processing = ingest_for_processing(input)?;
        if let Some(configuration) = configuration {
            input_for_processing.set_configuration(configuration);
        }
        run_project_from_input(
            input_for_processing,
            &file_output,
            &project_flags,
            priorities.as_deref(),
        )?
    };

    debug!(
        "JSON response: {}",
        serde_json::to_string_pretty(&response)?
    );

    Ok(())
}

fn read_configuration(config_file: &str) -> anyhow::Result<Configuration> {
    let reader = BufReader::new(
        File::open(config_file).with_context(|| format!("Could not open {config_file}"))?,
    );
    serde_json::from_reader(reader)
        .with_context(|| format!("Could not read configuration from {config_file}"))
}

fn parse_priorities(raw: &[String]) -> anyhow::Result<Vec<Priority>> {
    raw.iter()
        .map(|priority| {
            priority
                .trim()
                .parse::<Priority>()
                .map_err(|_| anyhow!("Unknown priority '{priority}'"))
        })
        .collect()
}

impl From<&LoadProfileArgs> for ProjectFlags {
    fn from(args: &LoadProfileArgs) -> Self {
        let mut flags = ProjectFlags::empty();
        if args.run_choice.validate_only {
            flags.insert(ProjectFlags::VALIDATE_ONLY);
        }
        if args.run_choice.detailed {
            flags.insert(ProjectFlags::DETAILED_OUTPUT);
        }
        flags
    }
}
