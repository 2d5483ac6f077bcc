use frameio::config::Config;
use frameio::error::{Error, Result};
use frameio::storage::buffer::{AccessType, Replacer, SyncLRUKReplacer};
use frameio::storage::disk::{new_page_store, DiskRequest, DiskScheduler};
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = clap::command!()
        .name("lruk-demo")
        .about("Walks through an LRU-K eviction and a scheduled page round trip")
        .arg(
            clap::Arg::new("config")
                .short('c')
                .long("config")
                .help("Configuration file path, defaults and FRAMEIO_* variables apply without it"),
        )
        .get_matches();
    let file = args.get_one::<String>("config").map(String::as_str).unwrap_or("");
    let cfg = Config::new(file)?;
    env_logger::Builder::new().filter_level(cfg.log_level()?).parse_default_env().try_init()?;

    replace(&cfg)?;
    round_trip(&cfg).await
}

/// Frames 2 and 3 are seen fewer than k times, frame 1 more often. With
/// every frame evictable, frame 2 goes first as it's the earliest seen one
/// among the frames with +inf backward k-distance.
fn replace(cfg: &Config) -> Result<()> {
    let replacer = SyncLRUKReplacer::new(cfg.num_frames, cfg.replacer_k)?;
    for frame_id in [1, 2, 3, 1, 1] {
        replacer.record_access(frame_id, AccessType::Unknown)?;
    }
    for frame_id in [1, 2, 3] {
        replacer.set_evictable(frame_id, true)?;
    }
    println!("Size: {}", replacer.size());

    match replacer.evict() {
        Some(frame_id) => println!("Evicted Frame: {}", frame_id),
        None => println!("No victim found."),
    }
    println!("Size after eviction: {}", replacer.size());
    Ok(())
}

async fn round_trip(cfg: &Config) -> Result<()> {
    let store = new_page_store(cfg.storage_type, &cfg.db_file, cfg.page_capacity)?;
    let mut scheduler = DiskScheduler::new(store)?;
    info!("scheduling against {:?} page store", cfg.storage_type);

    let msg = b"hello frameio";
    let mut data = scheduler.create_buffer();
    data[..msg.len()].copy_from_slice(msg);
    let (write, write_done) = DiskRequest::write(0, data);
    let (read, read_done) = DiskRequest::read(0, scheduler.create_buffer());
    scheduler.schedule(vec![write, read])?;

    write_done.await?;
    let page = read_done.await?;
    if &page[..msg.len()] != msg {
        return Err(Error::Internal("page 0 doesn't read back as written".to_string()));
    }
    println!("Page 0: {}", String::from_utf8_lossy(&page[..msg.len()]));

    scheduler.shutdown()
}
