use clap::{Args, Parser, Subcommand, ValueEnum};
use gdata::dataset::ChargeType;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "gdata - build padded machine-learning datasets from Gaussian logs, z-matrix inputs and xyz files.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read a molecule file or a directory of them and save the resulting dataset.
    Read(ReadArgs),
    /// Merge two saved datasets on molecule names.
    Merge(MergeArgs),
    /// Print a summary of a saved dataset.
    Info(InfoArgs),
    /// Write every structure of a saved dataset as an xyz file.
    ExportXyz(ExportArgs),
    /// Convert a saved dataset to principal-axis coordinates.
    PrincipalAxes(PrincipalAxesArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Gaussian output (.log)
    Log,
    /// Gaussian input with a z-matrix or Cartesian molecule specification
    Zmat,
    /// Cartesian xyz
    Xyz,
}

/// Arguments for the `read` subcommand.
#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Format of the input files.
    #[arg(short, long, value_enum)]
    pub format: InputFormat,

    /// A single input file or a directory of input files.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Directory the dataset is saved to.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the padded atom count.
    #[arg(long, value_name = "INT")]
    pub max_atom: Option<usize>,

    /// Override the charge partitioning scheme read from log files.
    #[arg(long, value_name = "mulliken|hirshfeld")]
    pub charge_type: Option<ChargeType>,

    /// Accept log files without a normal-termination marker.
    #[arg(long)]
    pub no_validation: bool,

    /// Treat xyz files as bare atom lines without count and comment lines.
    #[arg(long)]
    pub no_header: bool,

    /// Shrink max_atom to the largest molecule before saving.
    #[arg(long)]
    pub minimise: bool,

    /// Write the files that could not be read to this CSV file.
    #[arg(long, value_name = "PATH")]
    pub failure_report: Option<PathBuf>,
}

/// Arguments for the `merge` subcommand.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// First dataset directory; its molecules come first.
    #[arg(value_name = "A_DIR")]
    pub first: PathBuf,

    /// Second dataset directory.
    #[arg(value_name = "B_DIR")]
    pub second: PathBuf,

    /// Directory the merged dataset is saved to.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Pad the dataset with the smaller max_atom instead of failing.
    #[arg(long)]
    pub repad: bool,
}

/// Arguments for the `info` subcommand.
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Dataset directory.
    #[arg(value_name = "DIR")]
    pub dataset: PathBuf,
}

/// Arguments for the `export-xyz` subcommand.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Dataset directory.
    #[arg(value_name = "DIR")]
    pub dataset: PathBuf,

    /// Directory the xyz files are written to.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Omit the count and comment lines.
    #[arg(long)]
    pub no_header: bool,
}

/// Arguments for the `principal-axes` subcommand.
#[derive(Args, Debug)]
pub struct PrincipalAxesArgs {
    /// Dataset directory.
    #[arg(value_name = "DIR")]
    pub dataset: PathBuf,

    /// Directory the converted dataset is saved to.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_command_parses_overrides() {
        let cli = Cli::try_parse_from([
            "gdata",
            "-vv",
            "read",
            "--format",
            "log",
            "-i",
            "logs",
            "-o",
            "out",
            "--max-atom",
            "29",
            "--charge-type",
            "Hirshfeld",
            "--no-validation",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Read(args) = cli.command else {
            panic!("expected the read command");
        };
        assert_eq!(args.format, InputFormat::Log);
        assert_eq!(args.max_atom, Some(29));
        assert_eq!(args.charge_type, Some(ChargeType::Hirshfeld));
        assert!(args.no_validation);
        assert!(!args.minimise);
    }

    #[test]
    fn merge_command_takes_two_directories() {
        let cli = Cli::try_parse_from(["gdata", "merge", "a", "b", "-o", "c", "--repad"]).unwrap();
        let Commands::Merge(args) = cli.command else {
            panic!("expected the merge command");
        };
        assert_eq!(args.first, PathBuf::from("a"));
        assert_eq!(args.second, PathBuf::from("b"));
        assert!(args.repad);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["gdata", "-q", "-v", "info", "d"]).is_err());
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["gdata", "read", "-f", "pdb", "-i", "x", "-o", "y"]).is_err());
    }

    #[test]
    fn command_names_are_kebab_case() {
        assert!(Cli::try_parse_from(["gdata", "export-xyz", "d", "-o", "x"]).is_ok());
        assert!(Cli::try_parse_from(["gdata", "principal-axes", "d", "-o", "x"]).is_ok());
    }
}
