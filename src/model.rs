use serde::Serialize;

/// One team's software entry for a given year. `(team, year)` is the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Software {
    pub team: String,
    pub description: String,
    pub year: i64,
}

impl Software {
    pub fn new(team: impl Into<String>, description: impl Into<String>, year: i64) -> Self {
        Software {
            team: team.into(),
            description: description.into(),
            year,
        }
    }
}
