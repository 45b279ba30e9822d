use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use volstack::{
    append_projects, describe_store, resample_project, AppendOptions, ArraySelection,
    CompressionMethod, Interpolation, ResampleOptions, RigidParams, Vec3,
};

#[derive(Parser)]
#[command(name = "volstack", version)]
#[command(about = "Concatenate and resample segmentation project volumes")]
struct Cli {
    /// Log debug detail (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append several projects into one
    Append {
        /// 1 moves every input onto the first input's origin
        #[arg(long, value_name = "0|1", action = ArgAction::Set, default_value = "0", value_parser = BoolishValueParser::new())]
        shift: bool,

        /// 1 pastes inputs at their own extents, 0 stacks them along --axis
        #[arg(long, value_name = "0|1", action = ArgAction::Set, default_value = "1", value_parser = BoolishValueParser::new())]
        preserve: bool,

        /// Stacking axis when extents are not preserved
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
        axis: u8,

        /// Arrays to read, comma separated or "all" (default: Source,Tissue)
        #[arg(long)]
        arrays: Option<ArraySelection>,

        /// Compression of the output arrays (none, deflate, rle, zstd)
        #[arg(long, default_value = "zstd")]
        compression: CompressionMethod,

        /// Input stores followed by the output store
        #[arg(required = true, num_args = 3.., value_name = "PATH")]
        paths: Vec<String>,
    },

    /// Resample a project to a new spacing, optionally under a rigid transform
    Resample {
        /// Output spacing
        #[arg(long, default_value = "1,1,1")]
        spacing: Vec3,

        /// 1 applies the rigid transform given by the next three options
        #[arg(long, value_name = "0|1", action = ArgAction::Set, default_value = "0", value_parser = BoolishValueParser::new())]
        transform: bool,

        #[arg(long, default_value = "0,0,0", allow_hyphen_values = true)]
        translation: Vec3,

        /// Rotation about X, then Y, then Z, in degrees
        #[arg(long, alias = "rotation_angles", default_value = "0,0,0", allow_hyphen_values = true)]
        rotation_angles: Vec3,

        #[arg(long, alias = "rotation_center", default_value = "0,0,0", allow_hyphen_values = true)]
        rotation_center: Vec3,

        /// 1 fits the output to the transformed input
        #[arg(long, value_name = "0|1", action = ArgAction::Set, default_value = "0", value_parser = BoolishValueParser::new())]
        crop: bool,

        /// Kernel for intensity arrays (nearest, linear, cubic)
        #[arg(long, default_value = "cubic")]
        interpolation: Interpolation,

        /// Arrays to read, comma separated or "all" (default: Source,Tissue)
        #[arg(long)]
        arrays: Option<ArraySelection>,

        /// Compression of the output arrays (none, deflate, rle, zstd)
        #[arg(long, default_value = "zstd")]
        compression: CompressionMethod,

        input: String,
        output: String,
    },

    /// Print the geometry and arrays of a store
    Info { store: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "volstack=debug" } else { "volstack=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Append {
            shift,
            preserve,
            axis,
            arrays,
            compression,
            mut paths,
        } => {
            // clap guarantees at least three paths
            let output = paths.pop().context("missing output store")?;
            if preserve {
                info!("preserving extents");
            } else {
                info!(axis, "appending along axis");
            }

            let options = AppendOptions::new(paths, output)
                .with_shift(shift)
                .with_preserve_extents(preserve)
                .with_axis(axis as usize)
                .with_selection(arrays.unwrap_or_default())
                .with_compression(compression);
            append_projects(&options)
                .await
                .with_context(|| format!("failed to append into {}", options.output))?;
        }
        Commands::Resample {
            spacing,
            transform,
            translation,
            rotation_angles,
            rotation_center,
            crop,
            interpolation,
            arrays,
            compression,
            input,
            output,
        } => {
            let mut options = ResampleOptions::new(input, output)
                .with_spacing(spacing)
                .with_crop(crop)
                .with_interpolation(interpolation)
                .with_selection(arrays.unwrap_or_default())
                .with_compression(compression);
            if transform {
                options = options.with_rigid(RigidParams {
                    translation,
                    rotation_angles,
                    rotation_center,
                });
            }
            resample_project(&options)
                .await
                .with_context(|| format!("failed to resample {}", options.input))?;
        }
        Commands::Info { store } => {
            let description = describe_store(&store)
                .await
                .with_context(|| format!("failed to read {}", store))?;
            print!("{}", description);
        }
    }

    info!("done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_append_arguments() {
        let cli = Cli::try_parse_from(["volstack", "append", "--shift", "1", "--preserve", "0", "--axis", "2", "a", "b", "out"]).unwrap();
        match cli.command {
            Commands::Append { shift, preserve, axis, paths, arrays, .. } => {
                assert!(shift);
                assert!(!preserve);
                assert_eq!(axis, 2);
                assert_eq!(paths, vec!["a", "b", "out"]);
                assert!(arrays.is_none());
            }
            _ => panic!("expected append"),
        }

        assert!(Cli::try_parse_from(["volstack", "append", "a", "out"]).is_err());
        assert!(Cli::try_parse_from(["volstack", "append", "--axis", "3", "a", "b", "out"]).is_err());
        assert!(Cli::try_parse_from(["volstack", "append", "--preserve", "2", "a", "b", "out"]).is_err());

        let cli = Cli::try_parse_from(["volstack", "append", "a", "b", "out"]).unwrap();
        match cli.command {
            Commands::Append { shift, preserve, .. } => assert!(!shift && preserve),
            _ => panic!("expected append"),
        }
    }

    #[test]
    fn test_resample_arguments() {
        let cli = Cli::try_parse_from([
            "volstack",
            "resample",
            "--spacing",
            "2,2,0.5",
            "--transform",
            "1",
            "--crop",
            "1",
            "--translation",
            "-1,0,3",
            "--rotation_angles",
            "0,0,90",
            "in",
            "out",
        ])
        .unwrap();
        match cli.command {
            Commands::Resample { spacing, transform, crop, translation, rotation_angles, interpolation, input, .. } => {
                assert_eq!(spacing, Vec3::new(2.0, 2.0, 0.5));
                assert!(transform && crop);
                assert_eq!(input, "in");
                assert_eq!(translation, Vec3::new(-1.0, 0.0, 3.0));
                assert_eq!(rotation_angles, Vec3::new(0.0, 0.0, 90.0));
                assert_eq!(interpolation, Interpolation::Cubic);
            }
            _ => panic!("expected resample"),
        }

        let cli = Cli::try_parse_from(["volstack", "resample", "--crop", "0", "in", "out"]).unwrap();
        match cli.command {
            Commands::Resample { transform, crop, output, .. } => {
                assert!(!transform && !crop);
                assert_eq!(output, "out");
            }
            _ => panic!("expected resample"),
        }
    }
}
