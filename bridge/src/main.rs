//! Command-line entry point for the Balatro mobile bridge.
//!
//! Installs the signed package and moves save slots between the desktop save
//! directory and the device through `adb`.

use std::path::PathBuf;

use anyhow::Result;
use balatro_bridge::commands;
use balatro_bridge::core::types::{SaveFile, SlotNumber};
use balatro_bridge::exit_codes;
use balatro_bridge::install::InstallFailed;
use balatro_bridge::io::adb::Adb;
use balatro_bridge::io::config::{BridgeConfig, DEFAULT_CONFIG_FILE, load_config};
use balatro_bridge::io::tool::locate_adb;
use balatro_bridge::logging;
use balatro_bridge::sync::{SaveSync, SyncOptions};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "balatro-bridge",
    version,
    about = "Install Balatro mobile and sync save slots over adb"
)]
struct Cli {
    /// Config file (missing file means defaults).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Install a signed APK on the device.
    Install { apk: PathBuf },
    /// Copy a local save slot to the device.
    Push(SlotArgs),
    /// Copy a save slot from the device to the local save directory.
    Pull(SlotArgs),
    /// Read one save file straight off the device.
    Read {
        slot: SlotNumber,
        #[arg(value_enum)]
        file: SaveFile,
        /// Write the file's bytes here.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Stop the adb server.
    KillServer,
}

#[derive(Args)]
struct SlotArgs {
    slot: SlotNumber,
    /// Fail instead of skipping when the slot does not exist at the source.
    #[arg(long)]
    strict: bool,
    /// Local save root (overrides config and platform default).
    #[arg(long)]
    save_root: Option<PathBuf>,
}

impl SlotArgs {
    fn options(&self, cfg: &BridgeConfig) -> SyncOptions {
        SyncOptions {
            ignore_non_existent: !self.strict,
            save_root: self.save_root.clone().or_else(|| cfg.save_root.clone()),
        }
    }
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            let code = err
                .downcast_ref::<InstallFailed>()
                .map_or(exit_codes::INVALID, |failed| failed.code);
            std::process::exit(code);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    let adb = connect(&cfg)?;
    let sync = SaveSync::new(&adb, &adb, cfg.layout());

    match cli.command {
        Command::Install { apk } => commands::install(&adb, &apk),
        Command::Push(args) => commands::push_save(&sync, args.slot, &args.options(&cfg)),
        Command::Pull(args) => commands::pull_save(&sync, args.slot, &args.options(&cfg)),
        Command::Read { slot, file, out } => {
            commands::read_save(&sync, slot, file, out.as_deref())
        }
        Command::KillServer => {
            let code = adb.kill_server()?;
            println!("kill-server: ok={}", code == 0);
            Ok(if code == 0 {
                exit_codes::OK
            } else {
                exit_codes::INVALID
            })
        }
    }
}

fn connect(cfg: &BridgeConfig) -> Result<Adb> {
    let program = locate_adb(cfg.adb_path.as_deref())?;
    Ok(Adb::from_config(program, cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_push_defaults_to_lenient() {
        let cli = Cli::parse_from(["balatro-bridge", "push", "3"]);
        let Command::Push(args) = cli.command else {
            panic!("expected push");
        };
        assert_eq!(args.slot, 3);
        let opts = args.options(&BridgeConfig::default());
        assert!(opts.ignore_non_existent);
        assert_eq!(opts.save_root, None);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn parse_pull_strict_with_save_root() {
        let cli = Cli::parse_from([
            "balatro-bridge",
            "pull",
            "5",
            "--strict",
            "--save-root",
            "/tmp/saves",
        ]);
        let Command::Pull(args) = cli.command else {
            panic!("expected pull");
        };
        let opts = args.options(&BridgeConfig::default());
        assert!(!opts.ignore_non_existent);
        assert_eq!(opts.save_root, Some(PathBuf::from("/tmp/saves")));
    }

    #[test]
    fn cli_save_root_overrides_config() {
        let cfg = BridgeConfig {
            save_root: Some(PathBuf::from("/from/config")),
            ..BridgeConfig::default()
        };
        let cli = Cli::parse_from(["balatro-bridge", "push", "1"]);
        let Command::Push(args) = cli.command else {
            panic!("expected push");
        };
        assert_eq!(
            args.options(&cfg).save_root,
            Some(PathBuf::from("/from/config"))
        );

        let cli = Cli::parse_from(["balatro-bridge", "push", "1", "--save-root", "/cli"]);
        let Command::Push(args) = cli.command else {
            panic!("expected push");
        };
        assert_eq!(args.options(&cfg).save_root, Some(PathBuf::from("/cli")));
    }

    #[test]
    fn parse_read_with_file_kind() {
        let cli = Cli::parse_from(["balatro-bridge", "read", "2", "meta", "--out", "m.jkr"]);
        assert!(matches!(
            cli.command,
            Command::Read {
                slot: 2,
                file: SaveFile::Meta,
                out: Some(_),
            }
        ));
    }

    #[test]
    fn parse_rejects_unknown_file_kind() {
        assert!(Cli::try_parse_from(["balatro-bridge", "read", "2", "settings"]).is_err());
    }

    #[test]
    fn parse_global_config_after_subcommand() {
        let cli = Cli::parse_from(["balatro-bridge", "kill-server", "--config", "alt.toml"]);
        assert!(matches!(cli.command, Command::KillServer));
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
    }
}
