use crate::core::model::{JobDescriptor, Platform};
use crate::plugins::registry::CliPlugin;
use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::Path;
use url::Url;

pub struct LegendaryCliPlugin;

impl LegendaryCliPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl CliPlugin for LegendaryCliPlugin {
    fn name(&self) -> &'static str {
        "legendary"
    }

    fn augment_job_command(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new("legendary_platform")
                .long("platform")
                .help_heading("Legendary")
                .help("Platform build to fetch (native|windows)")
                .num_args(1),
        )
        .arg(
            Arg::new("legendary_base_path")
                .long("base-path")
                .help_heading("Legendary")
                .help("Directory the game folder is created in")
                .num_args(1),
        )
        .arg(
            Arg::new("legendary_game_folder")
                .long("game-folder")
                .help_heading("Legendary")
                .help("Existing game folder to verify or reuse")
                .num_args(1),
        )
        .arg(
            Arg::new("legendary_with")
                .long("with")
                .help_heading("Legendary")
                .help("Optional component / install tag (repeatable)")
                .action(ArgAction::Append)
                .num_args(1),
        )
    }

    fn apply_job_matches(&self, matches: &ArgMatches, job: &mut JobDescriptor) -> anyhow::Result<()> {
        if let Some(p) = matches.get_one::<String>("legendary_platform") {
            job.platform = p.parse::<Platform>()?;
        }
        if let Some(p) = matches.get_one::<String>("legendary_base_path") {
            job.destination_root = Some(dir_url(p)?);
        }
        if let Some(p) = matches.get_one::<String>("legendary_game_folder") {
            job.source_root = Some(dir_url(p)?);
        }
        if let Some(values) = matches.get_many::<String>("legendary_with") {
            job.optional_components = Some(values.cloned().collect());
        }
        Ok(())
    }
}

fn dir_url(p: &str) -> anyhow::Result<Url> {
    let path = Path::new(p);
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().context("current_dir")?.join(path)
    };
    Url::from_directory_path(&abs).map_err(|_| anyhow::anyhow!("invalid path: {}", abs.display()))
}
