use crate::cli::{Args, DirectionArg, FormatArg};
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Saved settings file, as written by front-ends
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub name: Option<String>,
    pub last_modified: Option<String>,
    pub config: SymmetryConfigJson,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymmetryConfigJson {
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    pub direction: Option<String>,
    pub format: Option<String>,
    pub quality: Option<u8>,
    pub gif_speed: Option<i32>,
    pub auto_orient: Option<bool>,
    pub strip_exif: Option<bool>,
    pub dry_run: Option<bool>,
    pub verbose: Option<bool>,
}

impl Args {
    /// Load configuration from a JSON file and merge with command-line arguments
    /// Command-line arguments take precedence over config file values
    pub fn load_and_merge_config(&mut self) -> Result<()> {
        let cli_args = std::env::args().collect::<Vec<_>>();
        self.load_and_merge_config_with(&cli_args)
    }

    pub fn load_and_merge_config_with(&mut self, cli_args: &[String]) -> Result<()> {
        if let Some(config_path) = self.config_file.clone() {
            let contents = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let config: ConfigFile = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

            self.merge_from_config(config.config, cli_args)?;
            tracing::debug!(path = ?config_path, "Loaded configuration file");
        }

        if self.input.is_none() {
            bail!("No input image given: pass -i/--input or set inputPath in the config file");
        }
        Ok(())
    }

    fn merge_from_config(&mut self, config: SymmetryConfigJson, cli_args: &[String]) -> Result<()> {
        let given = |short: Option<&str>, long: &str| flag_present(cli_args, short, long);

        if !given(Some("-i"), "--input") {
            if let Some(input) = config.input_path {
                self.input = Some(PathBuf::from(input));
            }
        }

        if !given(Some("-o"), "--output") {
            if let Some(output) = config.output_path {
                self.output_dir = PathBuf::from(output);
            }
        }

        if !given(Some("-d"), "--direction") {
            if let Some(direction) = config.direction {
                self.direction = match DirectionArg::from_str(&direction, true) {
                    Ok(direction) => direction,
                    Err(_) => bail!(
                        "Invalid direction '{}' in config file. Valid directions: left, right, top, bottom",
                        direction
                    ),
                };
            }
        }

        if !given(Some("-f"), "--format") {
            if let Some(format) = config.format {
                self.format = match FormatArg::from_str(&format, true) {
                    Ok(format) => Some(format),
                    Err(_) => bail!(
                        "Invalid format '{}' in config file. Valid formats: png, jpeg, webp, gif",
                        format
                    ),
                };
            }
        }

        if !given(None, "--quality") {
            if let Some(quality) = config.quality {
                if !(1..=100).contains(&quality) {
                    bail!("Invalid quality {} in config file, expected 1-100", quality);
                }
                self.quality = quality;
            }
        }

        if !given(None, "--gif-speed") {
            if let Some(speed) = config.gif_speed {
                if !(1..=30).contains(&speed) {
                    bail!("Invalid gifSpeed {} in config file, expected 1-30", speed);
                }
                self.gif_speed = speed;
            }
        }

        // Boolean flags - only apply if currently false (default)
        if !self.auto_orient {
            self.auto_orient = config.auto_orient.unwrap_or(false);
        }

        if !self.strip_exif {
            self.strip_exif = config.strip_exif.unwrap_or(false);
        }

        if !self.dry_run {
            self.dry_run = config.dry_run.unwrap_or(false);
        }

        if !self.verbose {
            self.verbose = config.verbose.unwrap_or(false);
        }

        Ok(())
    }
}

/// True if the flag was written on the command line, either on its own
/// (`--quality 80`, `-d top`) or with an attached value (`--quality=80`, `-dtop`).
fn flag_present(cli_args: &[String], short: Option<&str>, long: &str) -> bool {
    cli_args.iter().skip(1).any(|arg| {
        let long_match = arg == long || arg.starts_with(&format!("{}=", long));
        let short_match = short.is_some_and(|s| arg.starts_with(s) && !arg.starts_with("--"));
        long_match || short_match
    })
}
