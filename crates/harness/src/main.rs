//! CLI entry point for the delay-slot hook check.

use std::env;
use std::ffi::OsString;
use std::process::ExitCode;

use delay_slot_harness::logging::init_tracing;
use delay_slot_harness::report::{exit_code, render};
use delay_slot_harness::{ProgramImage, Scenario, ScenarioConfig, Strictness};
use engine_core::{MipsEngineFamily, Permissions};
#[cfg(feature = "unicorn")]
use engine_core::UnicornEngineFamily;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;

const USAGE_TEXT: &str = "\
Usage: delay-slot-check [options]

Runs a MIPS32 countdown loop whose decrement sits in a branch delay slot and
checks that the engine's code hook fires for that instruction.

Options:
      --engine <name>     Engine to check: reference (default) or unicorn
      --map-size <bytes>  Size of the region mapped for the image
                          (default 0x1000; decimal or 0x-prefixed hex)
  -v, --verbose           Print the observed trace, and debug logs to stderr
      --strict            Also check loop count, final pc, and final counter
  -h, --help              Show this help message

Exit status:
  0   the hook fired for the delay slot
  N   engine error code N stopped the scenario
  64  the run completed but the hook missed the delay slot
  65  invalid command line
";

const USAGE_ERROR_EXIT: u8 = 65;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum EngineChoice {
    #[default]
    Reference,
    #[cfg(feature = "unicorn")]
    Unicorn,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct CheckArgs {
    engine: EngineChoice,
    map_size: Option<u64>,
    verbose: bool,
    strict: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum ParseResult {
    Check(CheckArgs),
    Help,
}

fn parse_engine(value: &str) -> Result<EngineChoice, String> {
    match value {
        "reference" => Ok(EngineChoice::Reference),
        #[cfg(feature = "unicorn")]
        "unicorn" => Ok(EngineChoice::Unicorn),
        #[cfg(not(feature = "unicorn"))]
        "unicorn" => Err("engine unicorn requires building with --features unicorn".to_string()),
        other => Err(format!("unknown engine: {other}")),
    }
}

fn parse_size(value: &str) -> Result<u64, String> {
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| format!("invalid size: {value}"))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut parsed = CheckArgs::default();

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Ok(ParseResult::Help);
        }

        if arg == "--verbose" || arg == "-v" {
            parsed.verbose = true;
            continue;
        }

        if arg == "--strict" {
            parsed.strict = true;
            continue;
        }

        if arg == "--engine" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --engine".to_string())?;
            parsed.engine = parse_engine(&value.to_string_lossy())?;
            continue;
        }

        if arg == "--map-size" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --map-size".to_string())?;
            parsed.map_size = Some(parse_size(&value.to_string_lossy())?);
            continue;
        }

        let text = arg.to_string_lossy();
        if text.starts_with('-') {
            return Err(format!("unknown option: {text}"));
        }
        return Err(format!("unexpected argument: {text}"));
    }

    Ok(ParseResult::Check(parsed))
}

fn run_check(args: &CheckArgs) -> u8 {
    init_tracing(args.verbose);

    let strictness = if args.strict {
        Strictness::Full
    } else {
        Strictness::WitnessOnly
    };
    let image = ProgramImage::reference();
    let mut config = ScenarioConfig::for_image(&image).with_strictness(strictness);
    if let Some(size) = args.map_size {
        config = config.with_mapping(config.map_base, size, Permissions::ALL);
    }
    let mut scenario = Scenario::new(image, config);
    let outcome = match args.engine {
        EngineChoice::Reference => scenario.run::<MipsEngineFamily>(),
        #[cfg(feature = "unicorn")]
        EngineChoice::Unicorn => scenario.run::<UnicornEngineFamily>(),
    };

    print!("{}", render(&outcome, scenario.image(), args.verbose));
    exit_code(&outcome.verdict)
}

fn main() -> ExitCode {
    let code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Check(args)) => run_check(&args),
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE_TEXT}");
            USAGE_ERROR_EXIT
        }
    };

    ExitCode::from(code)
}
