//! Replays a detection dump through the tracker and prints what was counted.
//!
//! usage: replay <dump file> [fps] [lat,lng] [log dir]

use vehcount::stats::parse_day_filter;
use vehcount::{DumpSource, Location, Pipeline, PipelineConfig, SinkConfig};

fn main() -> Result<(), vehcount::Error> {
    env_logger::init();

    let mut args = std::env::args();

    let _ = args.next();
    let in_file_name = match args.next() {
        Some(name) => name,
        None => {
            eprintln!("usage: replay <dump file> [fps] [lat,lng] [log dir]");
            return Ok(());
        }
    };

    let fps = args.next().and_then(|s| s.parse::<f64>().ok()).unwrap_or(30.0);

    let location = args.next().and_then(|s| {
        let (lat, lng) = s.split_once(',')?;

        Some(Location::new(lat.trim().parse().ok()?, lng.trim().parse().ok()?))
    });

    let mut config = PipelineConfig::default();
    if let Some(dir) = args.next() {
        config.sink = SinkConfig::in_dir(dir);
    }

    let pipeline = Pipeline::new(&config);
    let mut source = DumpSource::open(&in_file_name)?.with_fps(fps);

    println!("processing: {}", in_file_name);
    let report = pipeline.analyze(&mut source, location)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    match pipeline.stats(parse_day_filter("all")?) {
        Ok(stats) => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            println!("{}", stats.heatmap_geojson());
        }
        Err(vehcount::Error::NoDataAvailable) => {
            println!("no {} sightings yet", config.sink.filtered_class)
        }
        Err(err) => return Err(err),
    }

    Ok(())
}
