// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tracing::{info, Level};

use emotransform::harmonize::{ContainerHarmonizer, Harmonizer};
use emotransform::{Emotion, EmotionError, EmotionTransformEngine, FixedKey, KrumhanslDetector, Settings};

fn print_usage() {
    println!("emotransform - Emotion-driven melody transformation");
    println!();
    println!("Usage: emotransform --emotion <EMOTION> [OPTIONS] <INPUT>");
    println!();
    println!("Options:");
    println!("  --emotion <EMOTION>   Target emotion ({})", Emotion::supported_labels());
    println!("  --out-dir <DIR>       Directory for the transformed score (default: config or .)");
    println!("  --config <FILE>       YAML settings file");
    println!("  --harmonize           Harmonize the result in the configured container");
    println!("  --verbose             Log every rule action");
    println!("  --list-emotions       List supported emotions");
    println!("  --help                Show this help message");
    println!();
    println!("INPUT is a MIDI (.mid) or MusicXML (.xml) file.");
}

/// Parsed command line
#[derive(Debug, Default)]
struct Options {
    emotion: Option<String>,
    input: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    harmonize: bool,
    verbose: bool,
}

enum Command {
    Run(Options),
    ListEmotions,
    Help,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let mut options = Options::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--emotion" => {
                let value = iter.next().ok_or_else(|| anyhow!("--emotion requires a value"))?;
                options.emotion = Some(value.clone());
            }
            "--out-dir" => {
                let value = iter.next().ok_or_else(|| anyhow!("--out-dir requires a directory"))?;
                options.out_dir = Some(PathBuf::from(value));
            }
            "--config" => {
                let value = iter.next().ok_or_else(|| anyhow!("--config requires a file"))?;
                options.config = Some(PathBuf::from(value));
            }
            "--harmonize" => options.harmonize = true,
            "--verbose" | "-v" => options.verbose = true,
            "--list-emotions" => return Ok(Command::ListEmotions),
            "--help" | "-h" => return Ok(Command::Help),
            other if other.starts_with("--") => return Err(anyhow!("Unknown option: {}", other)),
            other => {
                if options.input.is_some() {
                    return Err(anyhow!("Only one input file is accepted (extra: {})", other));
                }
                options.input = Some(PathBuf::from(other));
            }
        }
    }
    Ok(Command::Run(options))
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(options: Options) -> Result<()> {
    let label = options
        .emotion
        .ok_or_else(|| anyhow!("--emotion is required"))?;
    let input = options
        .input
        .ok_or_else(|| anyhow!("An input file is required"))?;

    let emotion = match label.parse::<Emotion>() {
        Ok(emotion) => emotion,
        Err(err @ EmotionError::UnsupportedEmotion(_)) => {
            eprintln!("Please specify one of: {}", Emotion::supported_labels());
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    let settings = match &options.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let out_dir = options.out_dir.unwrap_or_else(|| settings.output_dir.clone());

    let output = match settings.fixed_key()? {
        Some(key) => {
            info!(%key, "using configured key");
            EmotionTransformEngine::with_detector(FixedKey(key))
                .with_rules(settings.rules.clone())
                .transform_file(&input, emotion, &out_dir)
        }
        None => EmotionTransformEngine::with_detector(KrumhanslDetector)
            .with_rules(settings.rules.clone())
            .transform_file(&input, emotion, &out_dir),
    }
    .with_context(|| format!("Failed to transform {:?} to {}", input, emotion))?;

    println!("{}", output.path.display());

    if options.harmonize || settings.harmonizer.enabled {
        let mut harmonizer = ContainerHarmonizer::new(settings.harmonizer.clone());
        harmonizer.start()?;
        let harmonized = harmonizer.harmonize(&output.path, emotion)?;
        println!("{}", harmonized.midi_path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("emotransform - Emotion-driven melody transformation");
        println!("Run with --help for usage information");
        return Ok(());
    }

    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("Error: {}", err);
            print_usage();
            std::process::exit(1);
        }
    };

    match command {
        Command::Help => print_usage(),
        Command::ListEmotions => {
            for emotion in Emotion::SUPPORTED {
                println!("{}", emotion);
            }
        }
        Command::Run(options) => {
            init_logging(options.verbose);
            run(options)?;
        }
    }

    Ok(())
}
