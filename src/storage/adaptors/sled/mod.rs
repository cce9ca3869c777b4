mod sled_record_store;


pub use sled_record_store::*;

use std::path::Path;

use tracing::debug;
use tracing::warn;

use crate::Result;

/// Opens the sled database backing a persistent record store
pub fn init_sled_record_db(db_root_path: impl AsRef<Path> + std::fmt::Debug) -> Result<sled::Db> {
    debug!("init_sled_record_db from path: {:?}", &db_root_path);

    let path = db_root_path.as_ref().join("records");

    ::sled::Config::default()
        .path(&path)
        .cache_capacity(64 * 1024 * 1024) //64MB
        .flush_every_ms(Some(100))
        .use_compression(true)
        .compression_factor(1)
        .mode(::sled::Mode::HighThroughput)
        .open()
        .map_err(|e| {
            warn!("Try to open record DB at this location: {:?} and failed: {:?}", path, e);
            e.into()
        })
}
