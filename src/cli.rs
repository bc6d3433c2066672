use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Clone)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Enable verbose logging (-v for debug, -vv for trace)"
    )]
    pub verbose: u8,

    /// Path to the YAML configuration file
    #[arg(
        short = 'c',
        long = "config",
        value_name = "CONFIG_PATH",
        default_value = "config.yaml",
        help = "Configuration file path"
    )]
    pub config_path: PathBuf,

    /// Path to the model artifact, overrides `model.path` from the configuration
    #[arg(
        short = 'm',
        long = "model",
        value_name = "MODEL_PATH",
        help = "Model artifact path"
    )]
    pub model_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["diabetes_predictor"]);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.config_path, PathBuf::from("config.yaml"));
        assert!(cli.model_path.is_none());
    }

    #[test]
    fn model_override_and_verbosity() {
        let cli = Cli::parse_from(["diabetes_predictor", "-vv", "--model", "artifacts/pima.json"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.model_path, Some(PathBuf::from("artifacts/pima.json")));
    }
}
