use serde::{Deserialize, Serialize};
use tracing::debug;

/// Gameplay identity handed out when a match starts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    Killer,
    Civilian,
    Detective,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Team {
    Killer,
    Innocent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const RED: Color = Color { r: 255, g: 0, b: 0 };
    pub const GREEN: Color = Color { r: 0, g: 255, b: 0 };
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255 };
}

impl Role {
    pub fn team(self) -> Team {
        match self {
            Role::Killer => Team::Killer,
            Role::Civilian | Role::Detective => Team::Innocent,
        }
    }

    pub fn color(self) -> Color {
        match self {
            Role::Killer => Color::RED,
            Role::Civilian => Color::GREEN,
            Role::Detective => Color::BLUE,
        }
    }

    /// Ability hook. None of the roles carry an effect on the lobby side yet,
    /// so this only records the use.
    pub fn use_ability(self, player_id: &str) {
        debug!(role = ?self, player_id, "ability used");
    }
}
