use anyhow::{Result, bail};
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;

use ani2sprite::config::Config;
use ani2sprite::pipeline::cursor_io;

#[derive(Parser, Debug)]
#[command(name = "ani2sprite")]
#[command(about = "Convert Windows .cur/.ani cursor packs into PNG sprite sheets")]
#[command(version)]
struct Cli {
    /// Cursor folder to convert (may come from the config file instead)
    input_dir: Option<PathBuf>,

    /// Where sprite sheets are written; defaults to <input_dir>/sprites
    output_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let from_file = self.config.is_some();
        let mut config = match self.config {
            Some(path) => Config::load_from_file(path)?,
            None => Config::default(),
        };

        match self.input_dir {
            Some(input) => {
                if !from_file {
                    config.output_dir = input.join("sprites");
                }
                config.input_dir = input;
            }
            None if from_file => {}
            None => bail!("no input folder given (pass <INPUT_DIR> or --config)"),
        }
        if let Some(output) = self.output_dir {
            config.output_dir = output;
        }

        Ok(config)
    }
}

fn main() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(2);
        }
    };

    match cursor_io::run(&config) {
        Ok(batch) => {
            for (file, reason) in &batch.skipped {
                warn!("{} was not converted: {}", file, reason);
            }
            info!(
                "Wrote {} sprite sheets to {}",
                batch.cursors.len(),
                config.output_dir.display()
            );
        }
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn config_from(args: &[&str]) -> Result<Config> {
        let argv = std::iter::once("ani2sprite").chain(args.iter().copied());
        Cli::try_parse_from(argv)?.into_config()
    }

    #[test]
    fn test_positional_dirs() {
        let config = config_from(&["packs/cool", "out/cool"]).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("packs/cool"));
        assert_eq!(config.output_dir, PathBuf::from("out/cool"));

        let config = config_from(&["packs/cool"]).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("packs/cool/sprites"));
    }

    #[test]
    fn test_config_file_supplies_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "input_dir = \"packs/a\"\noutput_dir = \"sheets\"\n").unwrap();
        let path = path.to_string_lossy().into_owned();

        let config = config_from(&["--config", &path]).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("packs/a"));
        assert_eq!(config.output_dir, PathBuf::from("sheets"));

        let config = config_from(&["-c", &path, "packs/b"]).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("packs/b"));
        assert_eq!(config.output_dir, PathBuf::from("sheets"));
    }

    #[test]
    fn test_bad_arguments() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&["a", "b", "c"]).is_err());
        assert!(config_from(&["--frobnicate", "a"]).is_err());
        assert!(config_from(&["a", "--config"]).is_err());
    }
}
