use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use itertools::Itertools;
use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;
use std::path::PathBuf;

use rusty_odf::cmb::{CmbOrgan, CmbParser, parse_cmb_file};
use rusty_odf::config::{self, EditorSettings};
use rusty_odf::ids::HasId;
use rusty_odf::import::apply_cmb;
use rusty_odf::{Organ, OrganFileParser};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[value(rename_all = "lower")]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, arg_required_else_help = true)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Set the log level of the log file
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a summary of an organ definition file
    Info {
        /// Organ definition file. Defaults to the last one used.
        #[arg(value_name = "ODF")]
        odf_file: Option<PathBuf>,
    },
    /// Read an organ definition file and write it back out
    Rewrite {
        /// Organ definition file. Defaults to the last one used.
        #[arg(value_name = "ODF")]
        odf_file: Option<PathBuf>,

        #[arg(short, long, value_name = "OUT")]
        output: PathBuf,
    },
    /// Apply the voicing from a CMB settings file and save the result
    ImportCmb {
        #[arg(value_name = "ODF")]
        odf_file: PathBuf,

        #[arg(value_name = "CMB")]
        cmb_file: PathBuf,

        #[arg(short, long, value_name = "OUT")]
        output: PathBuf,
    },
    /// Print the contents of a CMB settings file
    CmbInfo {
        #[arg(value_name = "CMB")]
        cmb_file: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let loaded_settings = config::load_settings();
    let mut settings = loaded_settings.as_ref().cloned().unwrap_or_default();

    // --- Setup logging ---
    let log_level = match args.log_level {
        LogLevel::Error => LevelFilter::Error,
        LogLevel::Warn => LevelFilter::Warn,
        LogLevel::Info => LevelFilter::Info,
        LogLevel::Debug => LevelFilter::Debug,
        LogLevel::Trace => LevelFilter::Trace,
    };
    CombinedLogger::init(vec![
        TermLogger::new(LevelFilter::Warn, Config::default(), TerminalMode::Stderr, ColorChoice::Auto),
        WriteLogger::new(log_level, Config::default(), File::create(&settings.log_file_name)?),
    ])?;
    if let Err(e) = &loaded_settings {
        log::warn!("[Settings] Could not load settings, using defaults: {}", e);
    }

    match args.command {
        Command::Info { odf_file } => {
            let path = odf_file_or_last(&settings, odf_file)?;
            let organ = OrganFileParser::load(&path)?;
            print_organ_info(&organ);
            settings.last_odf_file = Some(path);
        }
        Command::Rewrite { odf_file, output } => {
            let path = odf_file_or_last(&settings, odf_file)?;
            let organ = OrganFileParser::load(&path)?;
            organ.save(&output)?;
            println!("Wrote {}", output.display());
            settings.last_odf_file = Some(path);
        }
        Command::ImportCmb {
            odf_file,
            cmb_file,
            output,
        } => {
            let mut organ = OrganFileParser::load(&odf_file)?;
            let cmb = parse_cmb_file(&cmb_file).with_context(|| format!("Reading {}", cmb_file.display()))?;
            let summary = apply_cmb(&mut organ, &cmb);
            organ.save(&output)?;
            println!(
                "Applied {} windchest group(s), {} rank(s), {} stop(s) and {} pipe(s); {} entr{} not found.",
                summary.windchest_groups,
                summary.ranks,
                summary.stops,
                summary.pipes,
                summary.missed,
                if summary.missed == 1 { "y" } else { "ies" }
            );
            println!("Wrote {}", output.display());
            settings.last_odf_file = Some(odf_file);
            settings.last_cmb_file = Some(cmb_file);
        }
        Command::CmbInfo { cmb_file } => {
            let mut cmb = CmbOrgan::default();
            let parser = CmbParser::new(&cmb_file, &mut cmb);
            if !parser.is_parsed_ok() {
                return Err(anyhow!("{}: {}", cmb_file.display(), parser.error_text()));
            }
            print_cmb_info(&cmb);
            settings.last_cmb_file = Some(cmb_file);
        }
    }

    if let Err(e) = config::save_settings(&settings) {
        log::warn!("[Settings] Could not save settings: {}", e);
    }
    Ok(())
}

fn odf_file_or_last(settings: &EditorSettings, given: Option<PathBuf>) -> Result<PathBuf> {
    let path = settings
        .resolve_odf_file(given)
        .ok_or_else(|| anyhow!("No ODF file given and none was used before."))?;
    if !path.exists() {
        return Err(anyhow!("File not found: {}", path.display()));
    }
    Ok(path)
}

fn print_organ_info(organ: &Organ) {
    println!("{}", organ.church_name);
    if !organ.organ_builder.is_empty() {
        println!("Built by {} {}", organ.organ_builder, organ.organ_build_date);
    }
    if !organ.using_old_panel_format {
        println!("Uses Panel sections, which are dropped when the file is rewritten");
    }
    for (index, manual) in organ.manuals().iter().enumerate() {
        let number = organ.odf_manual_number_at(index).unwrap_or_default();
        println!(
            "Manual{:03} {:?}: {} stop(s), {} coupler(s), {} divisional(s)",
            number,
            manual.name,
            manual.stops().len(),
            manual.couplers().len(),
            manual.divisionals().len()
        );
        if !manual.stops().is_empty() {
            println!("  {}", manual.stops().iter().map(|s| s.drawstop.button.name()).join(", "));
        }
    }
    let referenced = organ
        .all_stops()
        .flat_map(|s| s.rank_references().iter().map(|r| r.rank))
        .unique()
        .count();
    println!(
        "{} rank(s) ({} referenced by stops), {} windchest group(s), {} enclosure(s)",
        organ.ranks().len(),
        referenced,
        organ.windchest_groups().len(),
        organ.enclosures().len()
    );
    println!(
        "{} tremulant(s), {} switch(es), {} divisional coupler(s), {} general(s), {} reversible piston(s)",
        organ.tremulants().len(),
        organ.switches().len(),
        organ.divisional_couplers().len(),
        organ.generals().len(),
        organ.reversible_pistons().len()
    );
    let unused = organ
        .ranks()
        .iter()
        .filter(|rank| !organ.all_stops().any(|s| s.rank_references().iter().any(|r| r.rank == rank.id())))
        .map(|rank| rank.name.as_str())
        .join(", ");
    if !unused.is_empty() {
        println!("Ranks not used by any stop: {}", unused);
    }
}

fn print_cmb_info(cmb: &CmbOrgan) {
    println!("{} ({})", cmb.church_name, cmb.odf_path);
    for (label, elements) in [
        ("WindchestGroup", &cmb.windchest_groups),
        ("Rank", &cmb.ranks),
        ("Stop", &cmb.stops),
    ] {
        for element in elements {
            let attributes = &element.attributes;
            println!(
                "{}{:03}: amplitude {}, gain {}, tuning {}, correction {}, delay {}, {} pipe(s)",
                label,
                element.number,
                attributes.amplitude,
                attributes.user_gain,
                attributes.manual_tuning,
                attributes.auto_tuning_correction,
                attributes.delay,
                element.pipes.len()
            );
        }
    }
}
