use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

use crate::models::{DistrictQuery, LocationCandidate};
use crate::resolver::LocationChooser;

/// Terminal prompt for choosing between metro zones and districts
pub struct ConsoleChooser {
    input: Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsoleChooser {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

impl Default for ConsoleChooser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationChooser for ConsoleChooser {
    async fn choose(&self, district: &DistrictQuery, options: &[String]) -> Vec<String> {
        println!(
            "Both metro zones and regular districts were found for {}. \
             Select the locations to include in the search:",
            district
        );
        for (i, option) in options.iter().enumerate() {
            println!("  {}. {}", i + 1, option);
        }
        println!("Enter numbers separated by commas (blank to skip):");

        let line = match self.input.lock().await.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => String::new(),
            Err(e) => {
                warn!("Could not read selection: {}", e);
                String::new()
            }
        };
        parse_selection(&line, options)
    }

    async fn announce_automatic(&self, district: &DistrictQuery, selected: &[LocationCandidate]) {
        println!("Automatically selected locations for '{}':", district);
        for location in selected {
            println!("  {}", location.name);
        }
        if let Some(first) = selected.first() {
            println!(
                "  ZoI ID: {}  Location ID: {}",
                first.zoi_id.as_deref().unwrap_or("N/A"),
                first.location_id.as_deref().unwrap_or("N/A")
            );
        }
    }
}

/// Map "3, 1" to the labels of options 3 and 1, in that order; junk is ignored
pub fn parse_selection(input: &str, options: &[String]) -> Vec<String> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .filter_map(|n| n.checked_sub(1).and_then(|i| options.get(i)))
        .cloned()
        .collect()
}
