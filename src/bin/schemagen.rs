//! # Schema Generator
//!
//! Prints the JSON Schema of the application and attachment specs, keyed by
//! resource type, together with the computed fields of each.
//!
//! ## Usage
//!
//! ```bash
//! # YAML (default)
//! cargo run --bin schemagen > schema/resources.yaml
//!
//! # JSON
//! cargo run --bin schemagen -- --json > schema/resources.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use federated_app_controller::resource::schema::resource_schemas;

/// Print the resource schemas of the federated application controller
#[derive(Parser, Debug)]
#[command(name = "schemagen")]
#[command(about = "Print the application and attachment schemas", long_about = None)]
struct Args {
    /// Print JSON instead of YAML
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let schemas = resource_schemas().context("Failed to generate resource schemas")?;

    if args.json {
        let document = serde_json::to_string_pretty(&schemas)
            .context("Failed to serialize resource schemas to JSON")?;
        println!("{document}");
    } else {
        let document = serde_yaml::to_string(&schemas)
            .context("Failed to serialize resource schemas to YAML")?;
        println!("# This file is auto-generated by schemagen");
        println!("# DO NOT EDIT THIS FILE MANUALLY");
        println!("#");
        println!("---");
        print!("{document}");
    }

    Ok(())
}
