use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Script to run
    #[arg(short, long)]
    file: PathBuf,

    /// Named script arguments as name=value, referenced as $name in the script
    #[arg(long, num_args = 1.., value_parser = parse_nvarg)]
    nvargs: Vec<(String, String)>,

    /// Print the validated program instead of running it
    #[arg(long)]
    explain: bool,
}

fn parse_nvarg(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, found {s:?}"))
}

fn run(args: Args) -> Result<(), dml::DmlError> {
    let source = std::fs::read_to_string(&args.file)?;
    let nvargs: BTreeMap<String, String> = args.nvargs.into_iter().collect();
    if args.explain {
        print!("{}", dml::explain(&source, &nvargs)?);
        return Ok(());
    }
    dml::run_script(&source, &nvargs)?;
    Ok(())
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
