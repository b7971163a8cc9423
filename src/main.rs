use std::{
    path::{Path, PathBuf},
    process,
};

use clap::{Args, Parser, Subcommand};
use gltf2anm::{
    convert::{
        ExportOptions, ExportReport, convert_all_gltf_animations, convert_gltf_to_anm,
        list_gltf_contents,
    },
    profile::{load_canonical_joint_list, load_export_profile, save_export_profile},
};

#[derive(Parser)]
#[command(name = "gltf2anm")]
#[command(about = "glTF skeletal animation to r3d2anmd (v5) exporter")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export one animation to an .anm file
    Export {
        /// Input glTF/GLB file
        input: PathBuf,

        /// Output .anm file
        output: PathBuf,

        /// Animation name (default: first animation)
        #[arg(short, long)]
        animation: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Export every animation into a directory
    ExportAll {
        /// Input glTF/GLB file
        input: PathBuf,

        /// Output directory
        output_dir: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// List animations and skins
    List {
        /// Input glTF/GLB file
        input: PathBuf,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Skin name (default: first skin)
    #[arg(short, long)]
    skin: Option<String>,

    /// Sampling frame rate
    #[arg(short, long)]
    fps: Option<f32>,

    /// Joint list file fixing the exported joint order
    #[arg(long)]
    joints: Option<PathBuf>,

    /// Re-orient joints so local X follows the child bone
    #[arg(long, overrides_with = "no_normalize_orientation")]
    normalize_orientation: bool,

    /// Keep joint orientations even when the profile normalizes them
    #[arg(long)]
    no_normalize_orientation: bool,

    /// Write a .diagnostic.json next to each output
    #[arg(long, overrides_with = "no_diagnostic")]
    diagnostic: bool,

    /// Skip the diagnostic log even when the profile enables it
    #[arg(long)]
    no_diagnostic: bool,

    /// JSON export profile; flags override its values
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Save the effective options as a profile
    #[arg(long)]
    save_profile: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Export {
            input,
            output,
            animation,
            common,
        } => {
            let mut options = resolve_options(&common)?;
            if animation.is_some() {
                options.animation_name = animation;
            }
            let canonical = load_joints(common.joints.as_deref())?;

            tracing::info!("Converting {:?} -> {:?}", input, output);
            let report = convert_gltf_to_anm(&input, &output, &options, canonical.as_deref())?;
            print_report(&report);
        }

        Commands::ExportAll {
            input,
            output_dir,
            common,
        } => {
            let options = resolve_options(&common)?;
            let canonical = load_joints(common.joints.as_deref())?;

            let batch =
                convert_all_gltf_animations(&input, &output_dir, &options, canonical.as_deref())?;
            for (path, report) in &batch.exported {
                println!("{}", path.display());
                print_report(report);
            }
            for (name, error) in &batch.failed {
                eprintln!("Failed: {name}: {error}");
            }
            println!(
                "Exported {} animation(s), {} failed",
                batch.exported.len(),
                batch.failed.len()
            );
        }

        Commands::List { input } => {
            let summary = list_gltf_contents(&input)?;
            println!("Nodes: {}", summary.node_count);
            println!("Animations: {}", summary.animations.len());
            for animation in &summary.animations {
                println!(
                    "  [{}] {} ({} channels, {:.3}s)",
                    animation.index,
                    animation.name.as_deref().unwrap_or("<unnamed>"),
                    animation.channel_count,
                    animation.duration
                );
            }
            println!("Skins: {}", summary.skins.len());
            for skin in &summary.skins {
                println!(
                    "  [{}] {} ({} joints)",
                    skin.index,
                    skin.name.as_deref().unwrap_or("<unnamed>"),
                    skin.joint_count
                );
            }
        }
    }

    Ok(())
}

/// Profile values first, then command-line overrides.
fn resolve_options(common: &CommonArgs) -> anyhow::Result<ExportOptions> {
    let mut options = match &common.profile {
        Some(path) => load_export_profile(path)?,
        None => ExportOptions::default(),
    };
    if let Some(skin) = &common.skin {
        options.skin_name = Some(skin.clone());
    }
    if let Some(fps) = common.fps {
        options.frame_rate = fps;
    }
    if let Some(normalize) = switch(common.normalize_orientation, common.no_normalize_orientation) {
        options.normalize_orientation = normalize;
    }
    if let Some(diagnostic) = switch(common.diagnostic, common.no_diagnostic) {
        options.write_diagnostic = diagnostic;
    }

    if let Some(path) = &common.save_profile {
        save_export_profile(path, &options)?;
        tracing::info!("Saved export profile to {:?}", path);
    }
    Ok(options)
}

/// `--flag` / `--no-flag` pair; `None` keeps the profile value.
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn load_joints(path: Option<&Path>) -> anyhow::Result<Option<Vec<String>>> {
    path.map(load_canonical_joint_list).transpose()
}

fn print_report(report: &ExportReport) {
    println!("Animation: {}", report.animation_name);
    println!(
        "Frames: {} at {} fps ({:.3}s of keys)",
        report.frame_count, report.frame_rate, report.max_key_time
    );
    println!(
        "Joints: {}, Vectors: {}, Rotations: {}",
        report.track_count, report.vector_palette_len, report.quaternion_palette_len
    );
    if let Some(correction) = &report.correction {
        println!(
            "Re-oriented joints: {} ({} skipped)",
            correction.corrected_joints,
            correction.skipped.len()
        );
    }
    println!("Warnings: {}", report.warning_count());
    println!("Size: {} bytes", report.byte_len);
}
