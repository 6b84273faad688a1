use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use tracing::info;

use super::domain::{UserId, UserProfile, UserRole, DEFAULT_RATING};
use super::repository::{DirectoryError, UserDirectory};

/// Failure while seeding the directory from a roster export.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("failed to read roster: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid roster CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("roster line {line}: {reason}")]
    Row { line: usize, reason: String },
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    role: UserRole,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    phone: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    available: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    rating: Option<String>,
}

impl RosterRow {
    fn into_profile(self, line: usize) -> Result<UserProfile, RosterError> {
        let is_available = match self.available.as_deref().map(str::to_ascii_lowercase) {
            None => true,
            Some(value) => match value.as_str() {
                "true" | "yes" | "1" => true,
                "false" | "no" | "0" => false,
                other => {
                    return Err(RosterError::Row {
                        line,
                        reason: format!("'{other}' is not a boolean availability flag"),
                    })
                }
            },
        };

        let rating = match self.rating.as_deref() {
            None => DEFAULT_RATING,
            Some(raw) => raw.parse::<f32>().map_err(|_| RosterError::Row {
                line,
                reason: format!("'{raw}' is not a numeric rating"),
            })?,
        };

        let mut profile = UserProfile::new(
            UserId(self.id),
            self.first_name,
            self.last_name,
            self.email,
            self.role,
        );
        profile.phone = self.phone;
        profile.is_available = is_available;
        profile.rating = rating;

        profile
            .normalized()
            .map_err(|reason| RosterError::Row { line, reason })
    }
}

/// Parse `id,first_name,last_name,email,role,phone,available,rating` rows.
pub fn parse_roster<R: Read>(reader: R) -> Result<Vec<UserProfile>, RosterError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut profiles = Vec::new();

    for (index, record) in csv_reader.deserialize::<RosterRow>().enumerate() {
        let row = record?;
        // header occupies line 1
        profiles.push(row.into_profile(index + 2)?);
    }

    Ok(profiles)
}

/// Load a roster file into the directory, returning how many profiles were added.
pub fn seed_from_path<D, P>(directory: &D, path: P) -> Result<usize, RosterError>
where
    D: UserDirectory + ?Sized,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let profiles = parse_roster(File::open(path)?)?;
    let count = profiles.len();
    for profile in profiles {
        directory.insert(profile)?;
    }
    info!(path = %path.display(), count, "directory seeded from roster");
    Ok(count)
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const ROSTER: &str = "id,first_name,last_name,email,role,phone,available,rating\n\
        cl-1,Wanjiru,Kamau,WANJIRU@example.com,cleaner,+254700000001,true,4.8\n\
        cl-2,Otieno,Odhiambo,otieno@example.com,cleaner,,no,\n\
        cu-1,Amina,Hassan,amina@example.com,client,,,\n";

    #[test]
    fn parses_roster_rows_with_defaults() {
        let profiles = parse_roster(Cursor::new(ROSTER)).expect("roster parses");
        assert_eq!(profiles.len(), 3);

        let first = &profiles[0];
        assert_eq!(first.email, "wanjiru@example.com");
        assert_eq!(first.role, UserRole::Cleaner);
        assert!(first.is_available);
        assert!((first.rating - 4.8).abs() < f32::EPSILON);

        let second = &profiles[1];
        assert!(!second.is_available);
        assert!(second.phone.is_none());
        assert!((second.rating - DEFAULT_RATING).abs() < f32::EPSILON);

        assert_eq!(profiles[2].role, UserRole::Client);
    }

    #[test]
    fn reports_line_of_bad_rating() {
        let csv = "id,first_name,last_name,email,role,phone,available,rating\n\
            cl-1,Wanjiru,Kamau,w@example.com,cleaner,,true,7.5\n";
        match parse_roster(Cursor::new(csv)) {
            Err(RosterError::Row { line, reason }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("between 0 and 5"));
            }
            other => panic!("expected row error, got {other:?}"),
        }
    }
}
