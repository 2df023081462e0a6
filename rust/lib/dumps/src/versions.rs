//! Marabunta version listing.

use chrono::NaiveDateTime;

const UNKNOWN: &str = "unknown";

/// Newest row of a database's `marabunta_version` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub date_done: Option<NaiveDateTime>,
    pub number: String,
}

/// One line of the version table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseVersion {
    pub database: String,
    pub version: Option<VersionRecord>,
}

impl DatabaseVersion {
    pub fn number(&self) -> &str {
        self.version.as_ref().map_or(UNKNOWN, |v| v.number.as_str())
    }

    pub fn date_done(&self) -> Option<NaiveDateTime> {
        self.version.as_ref().and_then(|v| v.date_done)
    }

    pub fn install_date(&self) -> String {
        self.date_done()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}

/// Render the table printed by `list-versions`: most recently migrated
/// databases first, databases without a known date last.
pub fn render_table(mut rows: Vec<DatabaseVersion>) -> String {
    rows.sort_by(|a, b| b.date_done().cmp(&a.date_done()));

    let name_width = rows
        .iter()
        .map(|r| r.database.len())
        .chain(["DB Name".len()])
        .max()
        .unwrap_or_default()
        + 1;
    let version_width = rows
        .iter()
        .map(|r| r.number().len())
        .chain(["Version".len()])
        .max()
        .unwrap_or_default()
        + 1;
    let date_width = "2018-01-01".len();

    let mut out = String::new();
    let header = format!(
        "{:<nw$} {:<vw$} {}",
        "DB Name",
        "Version",
        "Install date",
        nw = name_width,
        vw = version_width
    );
    out.push_str(&header);
    out.push('\n');
    out.push_str(&"=".repeat(4 + name_width + version_width + date_width));
    out.push('\n');

    for row in &rows {
        let line = format!(
            "{:<nw$} {:<vw$} {}",
            row.database,
            row.number(),
            row.install_date(),
            nw = name_width,
            vw = version_width
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(y, m, d).and_then(|d| d.and_hms_opt(10, 0, 0))
    }

    fn row(db: &str, number: Option<&str>, date: Option<NaiveDateTime>) -> DatabaseVersion {
        DatabaseVersion {
            database: db.to_string(),
            version: number.map(|n| VersionRecord {
                date_done: date,
                number: n.to_string(),
            }),
        }
    }

    #[test]
    fn test_sorted_newest_first_unknown_last() {
        let table = render_table(vec![
            row("legacy", None, None),
            row("old_prod", Some("11.0.1"), at(2018, 3, 1)),
            row("prod", Some("11.0.12"), at(2019, 6, 15)),
        ]);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines[0], "DB Name   Version  Install date");
        assert_eq!(lines[1], "=".repeat(4 + 9 + 8 + 10));
        assert_eq!(lines[2], "prod      11.0.12  2019-06-15");
        assert_eq!(lines[3], "old_prod  11.0.1   2018-03-01");
        assert_eq!(lines[4], "legacy    unknown  unknown");
    }

    #[test]
    fn test_empty_table_has_header() {
        let table = render_table(Vec::new());
        assert_eq!(table.lines().count(), 2);
    }
}
