use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use image::Rgb;
use serde::{Deserialize, Serialize};

/// What a loop instance is looking for. Selects the default cascade file and the box
/// color; one loop runs exactly one profile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Car,
    Pedestrian,
}

impl Profile {
    pub fn default_cascade(self) -> &'static str {
        match self {
            Profile::Car => "car_detector.xml",
            Profile::Pedestrian => "pedestrians.xml",
        }
    }

    pub fn color(self) -> Rgb<u8> {
        match self {
            Profile::Car => Rgb([255, 0, 0]),
            Profile::Pedestrian => Rgb([255, 255, 0]),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Car => "car",
            Profile::Pedestrian => "pedestrian",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "car" | "cars" => Ok(Profile::Car),
            "pedestrian" | "pedestrians" => Ok(Profile::Pedestrian),
            other => Err(anyhow!(
                "unknown profile '{}' (expected 'car' or 'pedestrian')",
                other
            )),
        }
    }
}
