use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Result;
use crate::storage::disk::StorageType;
use crate::storage::page::DEFAULT_PAGE_CAPACITY;

#[derive(Debug, PartialEq, Deserialize)]
pub struct Config {
    pub log_level: String,

    pub storage_type: StorageType,
    /// path of the page file, the log file lives next to
    /// it with the `.log` extension.
    pub db_file: PathBuf,
    /// number of pages the page file is sized for up front,
    /// doubled every time it runs out.
    pub page_capacity: usize,

    /// replacer capacity, i.e., the number of frames in the buffer pool.
    pub num_frames: usize,
    pub replacer_k: usize,
}

impl Config {
    pub fn new(file: &str) -> Result<Config> {
        let mut cfg = config::Config::builder()
            .set_default("log_level", "info")?
            .set_default("storage_type", "file")?
            .set_default("db_file", "frameio.db")?
            .set_default("page_capacity", DEFAULT_PAGE_CAPACITY as u64)?
            .set_default("num_frames", 10)?
            .set_default("replacer_k", 2)?;
        if !file.is_empty() {
            cfg = cfg.add_source(config::File::with_name(file))
        }
        cfg = cfg.add_source(config::Environment::with_prefix("FRAMEIO"));
        Ok(cfg.build()?.try_deserialize()?)
    }

    pub fn log_level(&self) -> Result<log::LevelFilter> {
        Ok(self.log_level.parse::<log::LevelFilter>()?)
    }
}
