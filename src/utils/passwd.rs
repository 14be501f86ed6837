//! Utilities for reading passwd and group entries
//!
//! Makes use of getent to also pick up name service sources, if available, and
//! falls back to scanning the flat files
use std::path::{Path, PathBuf};

use crate::utils::qx;

/// Matches the structure of man 5 passwd
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Passwd {
    pub user: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
    pub shell: String,
}

/// Matches the structure of man 5 group
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub gid: u32,
    pub members: Vec<String>,
}

/// Read passwd database entries, optionally only the one for `name`
pub fn load_users(name: Option<&str>) -> eyre::Result<Vec<Passwd>> {
    let db = getent_or_file("passwd", name, "/etc/passwd")?;
    let users = parse_passwd(&db);

    Ok(match name {
        Some(name) => users.into_iter().filter(|u| u.user == name).collect(),
        None => users,
    })
}

/// Read group database entries, optionally only the one for `name`
pub fn load_groups(name: Option<&str>) -> eyre::Result<Vec<Group>> {
    let db = getent_or_file("group", name, "/etc/group")?;
    let groups = parse_groups(&db);

    Ok(match name {
        Some(name) => groups.into_iter().filter(|g| g.name == name).collect(),
        None => groups,
    })
}

// getent works better for domain joined systems and systems with weird
// /etc/nsswitch.conf, but fall back to directly reading the file
fn getent_or_file(database: &str, key: Option<&str>, file: &str) -> eyre::Result<String> {
    let mut args = vec![database];
    args.extend(key);

    let answer = match qx("getent", &args) {
        Ok((e, s)) if e.success() && !s.trim().is_empty() => Some(s),
        _ => {
            tracing::debug!("getent {database} gave no answer, scanning {file}");
            None
        }
    };

    answer_or_file(answer, Path::new(file))
}

/// The name service's answer if there was one, otherwise the flat file
fn answer_or_file(answer: Option<String>, file: &Path) -> eyre::Result<String> {
    match answer {
        Some(db) => Ok(db),
        None => Ok(String::from_utf8_lossy(&std::fs::read(file)?).to_string()),
    }
}

pub fn parse_passwd(db: &str) -> Vec<Passwd> {
    db.lines()
        .filter_map(|row| -> Option<Passwd> {
            let mut options = row.split(':');
            let user = options.next()?.to_string();
            let _password = options.next()?;
            let uid = options.next()?.parse::<u32>().ok()?;
            let gid = options.next()?.parse::<u32>().ok()?;
            let _gecos = options.next()?;
            let home = PathBuf::from(options.next()?);
            let shell = options.next()?.to_string();

            Some(Passwd {
                user,
                uid,
                gid,
                home,
                shell,
            })
        })
        .collect()
}

pub fn parse_groups(db: &str) -> Vec<Group> {
    db.lines()
        .filter_map(|row| -> Option<Group> {
            let mut options = row.split(':');
            let name = options.next()?.to_string();
            let _password = options.next()?;
            let gid = options.next()?.parse().ok()?;
            let members = options
                .next()?
                .split(',')
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>();

            Some(Group { name, gid, members })
        })
        .collect()
}
