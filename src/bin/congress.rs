use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use congress_core::ChainConfig;
use congress_root::{logging, plan};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "congress")]
#[command(about = "Congress PoSA fork schedule tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Network {
    Mainnet,
    Testnet,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a chain config (JSON or YAML) and print its fork schedule
    Check { config: PathBuf },

    /// Print a preset chain config as JSON
    Preset {
        #[arg(value_enum)]
        network: Network,
    },

    /// Verify the embedded system contract bytecode
    Assets,
}

fn check(path: PathBuf) -> Result<()> {
    let config = ChainConfig::from_file(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    let upgrades = plan::upgrade_plan(&config).context("resolving scheduled upgrades")?;

    println!("chain id        {}", config.chain_id);
    println!("period          {}s", config.congress.period);
    println!("epoch           {}", config.congress.epoch);
    println!("gas cap         {}", config.system_call_gas_cap);
    match config.misard_block {
        Some(block) => println!("migration       block {block} ({} entries)", config.registry.migration_entries.len()),
        None => println!("migration       disabled"),
    }
    match config.dev_verify_block {
        Some(block) => println!("dev verify      block {block}"),
        None => println!("dev verify      disabled"),
    }
    for upgrade in &upgrades {
        println!(
            "upgrade         {} at block {} -> {:?} (0x{}, {} bytes)",
            upgrade.name,
            upgrade.block,
            upgrade.address,
            hex::encode(upgrade.code_hash),
            upgrade.code_size
        );
    }
    info!("{} is valid", path.display());
    Ok(())
}

fn main() -> Result<()> {
    logging::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => check(config)?,
        Commands::Preset { network } => {
            let config = match network {
                Network::Mainnet => ChainConfig::mainnet(),
                Network::Testnet => ChainConfig::testnet(),
            };
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Assets => {
            for asset in plan::asset_report()? {
                println!(
                    "{} v{}: {} bytes, code hash 0x{}",
                    asset.contract,
                    asset.version,
                    asset.code_size,
                    hex::encode(asset.code_hash)
                );
            }
        }
    }
    Ok(())
}
