use anyhow::Result;
use clap::Args;
use entity_tables::EntityTablesConfig;
use serde::Serialize;
use std::path::Path;

use super::print_json;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {}

#[derive(Debug, Serialize)]
struct ConfigInfo {
    config_file: String,
    data_dir: String,
    sqlite_path: String,
    definitions_path: String,
    definitions_exist: bool,
    transactional_writes: bool,
}

pub fn run(config: &EntityTablesConfig, _args: ConfigArgs, json: bool) -> Result<()> {
    let definitions_path = config.definitions_path();
    let info = ConfigInfo {
        config_file: EntityTablesConfig::config_file_path(),
        data_dir: config.data_dir.clone(),
        sqlite_path: config.sqlite_path(),
        definitions_exist: Path::new(&definitions_path).exists(),
        definitions_path,
        transactional_writes: config.transactional_writes,
    };

    if json {
        return print_json(&info);
    }

    println!("entity-tables Configuration");
    println!("===========================\n");
    println!("Config file:          {}", info.config_file);
    println!("{}", config.summary());
    if !info.definitions_exist {
        println!();
        eprintln!("Tips:");
        eprintln!("  No definitions found; set definitions_path in the config file");
    }
    Ok(())
}
