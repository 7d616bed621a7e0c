use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use parkmap_core::{
    Config, Coordinate, MapSession, ParkingSpot, PlacesProvider, StaticLocation, ViewportBox,
    provider_from_config,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "parkmap", version, about = "Nearby-parking finder CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the Geoapify API key used by the places search.
    Configure,

    /// One-shot search for parking spots inside a viewport rectangle.
    Search {
        /// North-east corner as "lat,lng".
        #[arg(long)]
        ne: String,

        /// South-west corner as "lat,lng".
        #[arg(long)]
        sw: String,
    },

    /// Interactive session: feed viewports on stdin, watch results stream back.
    Watch {
        /// Last known location as "lat,lng", used for the initial zoom hint.
        #[arg(long)]
        at: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Search { ne, sw } => search(&ne, &sw).await,
            Command::Watch { at } => watch(at.as_deref()).await,
        }
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Text::new("Geoapify API key:")
        .prompt()
        .context("Failed to read API key")?;
    if api_key.trim().is_empty() {
        bail!("API key must not be empty");
    }

    config.set_api_key(api_key.trim().to_string());
    config.save()?;

    println!(
        "Saved configuration to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

async fn search(ne: &str, sw: &str) -> Result<()> {
    let config = Config::load()?;
    let provider = provider_from_config(&config)?;

    let (ne_lat, ne_lng) = parse_lat_lng(ne)?;
    let (sw_lat, sw_lng) = parse_lat_lng(sw)?;
    let viewport = ViewportBox::new(ne_lat, ne_lng, sw_lat, sw_lng);

    let spots = provider.fetch_spots(&viewport.to_bounding_box()).await?;
    print_spots(&spots);
    Ok(())
}

async fn watch(at: Option<&str>) -> Result<()> {
    let config = Config::load()?;
    let provider = provider_from_config(&config)?;

    let fix = at
        .map(parse_lat_lng)
        .transpose()?
        .map(|(latitude, longitude)| Coordinate { latitude, longitude });

    let (session, mut signals) =
        MapSession::spawn(Arc::from(provider), Arc::new(StaticLocation(fix)));
    let mut state = session.state();

    session.request_initial_zoom();

    println!("Enter one viewport per line as neLat,neLng,swLat,swLng (Ctrl-D to quit).");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match parse_viewport(&line) {
                            Ok(viewport) => session.viewport_changed(viewport),
                            Err(err) => eprintln!("Ignored input: {err:#}"),
                        }
                    }
                    None => break,
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state.borrow_and_update().clone();
                if snapshot.is_loading {
                    println!("Fetching...");
                } else {
                    print_spots(&snapshot.spots);
                }
            }
            Some(notice) = signals.errors.recv() => {
                eprintln!("Error: {notice}");
            }
            Some(zoom) = signals.zooms.recv() => {
                println!(
                    "Start around {:.5}, {:.5} - enter a viewport to search there.",
                    zoom.latitude, zoom.longitude
                );
            }
        }
    }

    Ok(())
}

fn print_spots(spots: &[ParkingSpot]) {
    println!(
        "Found {} parking spot(s) at {}",
        spots.len(),
        Local::now().format("%H:%M:%S")
    );
    for spot in spots {
        println!("  {}", spot.name);
        println!("    {}, {}, {}", spot.address, spot.city, spot.country);
        println!("    Hours: {}", spot.opening_hours);
        println!(
            "    Location: {:.5}, {:.5}",
            spot.location.latitude, spot.location.longitude
        );
    }
}

fn parse_lat_lng(value: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() != 2 {
        bail!("Expected \"lat,lng\", got '{value}'");
    }
    let lat: f64 = parts[0]
        .trim()
        .parse()
        .with_context(|| format!("Invalid latitude in '{value}'"))?;
    let lng: f64 = parts[1]
        .trim()
        .parse()
        .with_context(|| format!("Invalid longitude in '{value}'"))?;
    Ok((lat, lng))
}

fn parse_viewport(line: &str) -> Result<ViewportBox> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() != 4 {
        bail!("expected four comma-separated numbers");
    }
    let mut coords = [0.0_f64; 4];
    for (slot, part) in coords.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse()
            .with_context(|| format!("invalid number '{}'", part.trim()))?;
    }
    Ok(ViewportBox::new(coords[0], coords[1], coords[2], coords[3]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_lat_lng_accepts_spaces() {
        assert_eq!(parse_lat_lng("45.8, 16.0").unwrap(), (45.8, 16.0));
        assert!(parse_lat_lng("45.8").is_err());
        assert!(parse_lat_lng("a,b").is_err());
    }

    #[test]
    fn parse_viewport_requires_four_numbers() {
        let viewport = parse_viewport("45.84,16.02,45.77,15.93").unwrap();
        assert_eq!(viewport, ViewportBox::new(45.84, 16.02, 45.77, 15.93));
        assert!(parse_viewport("1,2,3").is_err());
        assert!(parse_viewport("1,2,3,x").is_err());
    }
}
