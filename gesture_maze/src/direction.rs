use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

/// Maze navigation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// DOM `key`/`code` value of the arrow key for this direction.
    pub fn arrow_key(&self) -> &'static str {
        match self {
            Direction::Up => "ArrowUp",
            Direction::Down => "ArrowDown",
            Direction::Left => "ArrowLeft",
            Direction::Right => "ArrowRight",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Built-in gesture vocabularies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GesturePreset {
    #[default]
    Digits,
    Thumbs,
}

impl GesturePreset {
    fn entries(&self) -> [(&'static str, Direction); 4] {
        match self {
            GesturePreset::Digits => [
                ("one", Direction::Up),
                ("fist", Direction::Down),
                ("two", Direction::Left),
                ("three", Direction::Right),
            ],
            GesturePreset::Thumbs => [
                ("thumbs_up", Direction::Up),
                ("thumbs_down", Direction::Down),
                ("peace", Direction::Left),
                ("stop", Direction::Right),
            ],
        }
    }
}

impl TryFrom<String> for GesturePreset {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "digits" => Ok(Self::Digits),
            "thumbs" => Ok(Self::Thumbs),
            other => Err(format!(
                "{} is not a supported gesture preset. Use either `digits` or `thumbs`.",
                other
            )),
        }
    }
}

/// Case-insensitive gesture label to direction lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GestureMap {
    table: HashMap<String, Direction>,
}

impl GestureMap {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Direction)>,
        S: AsRef<str>,
    {
        let table = entries
            .into_iter()
            .map(|(label, direction)| (label.as_ref().to_lowercase(), direction))
            .collect();
        Self { table }
    }

    pub fn from_preset(preset: GesturePreset) -> Self {
        Self::new(preset.entries())
    }

    pub fn lookup(&self, label: &str) -> Option<Direction> {
        self.table.get(&label.to_lowercase()).copied()
    }

}

impl Default for GestureMap {
    fn default() -> Self {
        Self::from_preset(GesturePreset::default())
    }
}
