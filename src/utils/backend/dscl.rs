//! Directory services backend, driving `dscl` against the local node
//!
//! Nothing here allocates IDs by itself, so UniqueID and PrimaryGroupID are
//! picked with [`next_id`]. A password only becomes usable for login once the
//! record's AuthenticationAuthority carries the `;ShadowHash;` marker, which is
//! written before and checked after setting it
use std::{
    collections::HashMap,
    fmt::Write,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    process::Command,
};

use nix::unistd::{Gid, Uid, chown};

use crate::{
    pcre,
    utils::{
        backend::{AccountBackend, NewAccount, Password, Removal, RotationOutcome, Strategy},
        backend::{first_success, name_service_has_user},
        error::AccountError,
        ids::{next_id, parse_dscl_ids},
        passwd::parse_groups,
        platform::Platform,
        qx,
        regex::DSCL_ATTRIBUTE,
        require, run, run_labelled,
    },
};

const NODE: &str = ".";

pub const AUTHENTICATION_AUTHORITY: &str = "AuthenticationAuthority";
pub const SHADOW_HASH: &str = ";ShadowHash;";

/// Attributes shown to the operator after a change. Must never include
/// ShadowHashData
const REPORTED_ATTRIBUTES: &[&str] = &[
    "RecordName",
    "UniqueID",
    "PrimaryGroupID",
    "NFSHomeDirectory",
    "UserShell",
    AUTHENTICATION_AUTHORITY,
];

#[derive(Clone, Copy, Debug, Default)]
pub struct DirectoryServiceBackend;

fn user_record(name: &str) -> String {
    format!("/Users/{name}")
}

fn group_record(name: &str) -> String {
    format!("/Groups/{name}")
}

fn dscl<I: IntoIterator<Item = S>, S: AsRef<std::ffi::OsStr>>(args: I) -> Command {
    let mut cmd = Command::new("dscl");
    cmd.arg(NODE).args(args);
    cmd
}

impl DirectoryServiceBackend {
    fn read_attribute(&self, record: &str, attribute: &str) -> Option<String> {
        let (status, out) = qx("dscl", &[NODE, "-read", record, attribute]).ok()?;
        if !status.success() {
            return None;
        }

        parse_dscl_attributes(&out).remove(attribute)
    }

    /// Next free ID in `path`'s `attribute` namespace
    fn allocate(&self, path: &str, attribute: &str) -> Result<u32, AccountError> {
        let listing = run(&mut dscl(["-list", path, attribute]))?;
        let id = next_id(parse_dscl_ids(&String::from_utf8_lossy(&listing.stdout)))?;
        tracing::info!("Allocated {attribute} {id} under {path}");
        Ok(id)
    }

    fn group_id(&self, name: &str) -> Result<u32, AccountError> {
        self.read_attribute(&group_record(name), "PrimaryGroupID")
            .and_then(|gid| gid.trim().parse().ok())
            .ok_or_else(|| {
                AccountError::precondition(format!("group '{name}' has no usable PrimaryGroupID"))
            })
    }

    /// Create `record` and fill in its attributes. A half written record is
    /// deleted again before the error is handed back
    fn create_record(
        &self,
        record: &str,
        attributes: &[(&str, String)],
    ) -> Result<(), AccountError> {
        run(&mut dscl(["-create", record]))?;

        let filled = attributes.iter().try_for_each(|(key, value)| {
            run(&mut dscl(["-create", record, *key, value.as_str()])).map(drop)
        });

        if let Err(e) = filled {
            self.discard_record(record);
            return Err(e);
        }

        Ok(())
    }

    fn discard_record(&self, record: &str) {
        match run(&mut dscl(["-delete", record])) {
            Ok(_) => tracing::info!("Removed partially created record {record}"),
            Err(e) => tracing::warn!("Could not remove partially created record {record}: {e}"),
        }
    }

    /// The name service caches directory lookups; make sure the next existence
    /// check sees what was just written
    fn flush_cache(&self) {
        if let Err(e) = run(Command::new("dscacheutil").arg("-flushcache")) {
            tracing::warn!("Could not flush the directory services cache: {e}");
        }
    }

    fn create_home(&self, account: &NewAccount, uid: u32, gid: u32) -> Result<(), AccountError> {
        let createhomedir = || -> Result<(), AccountError> {
            require("createhomedir")?;
            run(Command::new("createhomedir").args(["-c", "-u", account.name.as_str()]))?;
            if account.home.is_dir() {
                Ok(())
            } else {
                Err(AccountError::rejected(
                    "createhomedir",
                    format!("{} was not created", account.home.display()),
                ))
            }
        };

        let by_hand = || -> Result<(), AccountError> {
            std::fs::create_dir_all(&account.home)
                .map_err(|e| AccountError::filesystem("create", &account.home, e))?;
            chown(&account.home, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid))).map_err(
                |e| AccountError::filesystem("change ownership of", &account.home, e.into()),
            )?;
            std::fs::set_permissions(&account.home, PermissionsExt::from_mode(0o755))
                .map_err(|e| AccountError::filesystem("set permissions on", &account.home, e))
        };

        let strategies: [Strategy<'_, ()>; 2] =
            [("createhomedir", &createhomedir), ("mkdir", &by_hand)];
        let (via, ()) = first_success(&strategies)?;
        tracing::info!("Created {} via {via}", account.home.display());

        Ok(())
    }
}

/// Where group membership questions are asked, most authoritative first
#[derive(Clone, Copy, Debug)]
struct GroupLookup<'a> {
    dseditgroup: &'a str,
    dscl: &'a str,
    group_file: &'a Path,
}

impl GroupLookup<'static> {
    fn system() -> Self {
        Self {
            dseditgroup: "dseditgroup",
            dscl: "dscl",
            group_file: Path::new("/etc/group"),
        }
    }
}

impl GroupLookup<'_> {
    /// Whether `name` exists, along with which source answered
    fn resolve(&self, name: &str) -> Result<(&'static str, bool), AccountError> {
        let dseditgroup = || -> Result<bool, AccountError> {
            require(self.dseditgroup)?;
            let (status, _) = qx(self.dseditgroup, &["-o", "read", name])
                .map_err(|e| AccountError::rejected("dseditgroup -o read", e.to_string()))?;
            Ok(status.success())
        };

        let dscl_read = || -> Result<bool, AccountError> {
            require(self.dscl)?;
            let (status, _) = qx(self.dscl, &[NODE, "-read", group_record(name).as_str()])
                .map_err(|e| AccountError::rejected("dscl . -read", e.to_string()))?;
            Ok(status.success())
        };

        let flat_file = || -> Result<bool, AccountError> {
            let db = std::fs::read_to_string(self.group_file)
                .map_err(|e| AccountError::filesystem("read", self.group_file, e))?;
            Ok(parse_groups(&db).iter().any(|g| g.name == name))
        };

        let strategies: [Strategy<'_, bool>; 3] = [
            ("dseditgroup", &dseditgroup),
            ("dscl", &dscl_read),
            ("group file", &flat_file),
        ];

        first_success(&strategies)
    }
}

impl AccountBackend for DirectoryServiceBackend {
    fn platform(&self) -> Platform {
        Platform::DirectoryService
    }

    fn user_exists(&self, name: &str) -> Result<bool, AccountError> {
        name_service_has_user(name)
    }

    fn group_exists(&self, name: &str) -> Result<bool, AccountError> {
        let (via, exists) = GroupLookup::system().resolve(name)?;
        tracing::debug!("Group {name} exists: {exists} (answered by {via})");

        Ok(exists)
    }

    fn home_dir_of(&self, name: &str) -> Option<PathBuf> {
        self.read_attribute(&user_record(name), "NFSHomeDirectory")
            .map(|home| home.trim().to_string())
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
    }

    fn create_group(&self, name: &str) -> Result<(), AccountError> {
        let gid = self.allocate("/Groups", "PrimaryGroupID")?;

        self.create_record(
            &group_record(name),
            &[
                ("PrimaryGroupID", gid.to_string()),
                ("RealName", name.to_string()),
                ("Password", "*".to_string()),
            ],
        )?;
        self.flush_cache();

        Ok(())
    }

    fn create_user(&self, account: &NewAccount) -> Result<(), AccountError> {
        let uid = self.allocate("/Users", "UniqueID")?;
        let gid = self.group_id(&account.group)?;
        let record = user_record(&account.name);

        self.create_record(
            &record,
            &[
                ("UserShell", account.shell.clone()),
                ("RealName", account.name.clone()),
                ("UniqueID", uid.to_string()),
                ("PrimaryGroupID", gid.to_string()),
                ("NFSHomeDirectory", account.home.display().to_string()),
            ],
        )?;
        self.flush_cache();

        if let Err(e) = self.create_home(account, uid, gid) {
            self.discard_record(&record);
            self.flush_cache();
            return Err(e);
        }

        Ok(())
    }

    fn set_password(&self, name: &str, password: &Password) -> Result<(), AccountError> {
        let record = user_record(name);

        if self.read_attribute(&record, AUTHENTICATION_AUTHORITY).is_none() {
            tracing::info!("Enabling password authentication for {name}");
            run(&mut dscl(["-create", record.as_str(), AUTHENTICATION_AUTHORITY, SHADOW_HASH]))?;
        }

        run_labelled(
            &mut dscl(["-passwd", record.as_str(), password.expose()]),
            &format!("dscl . -passwd {record} <redacted>"),
        )?;

        match self.read_attribute(&record, AUTHENTICATION_AUTHORITY) {
            Some(authority) if has_shadow_hash(&authority) => Ok(()),
            Some(authority) => Err(AccountError::ConfigurationInconsistent(format!(
                "{AUTHENTICATION_AUTHORITY} for {name} is '{authority}' after setting the password, expected {SHADOW_HASH}"
            ))),
            None => Err(AccountError::ConfigurationInconsistent(format!(
                "{AUTHENTICATION_AUTHORITY} for {name} is missing after setting the password"
            ))),
        }
    }

    fn force_rotation(&self, name: &str) -> RotationOutcome {
        const VIA: &str = "pwpolicy -setpolicy newPasswordRequired=1";

        let requested = require("pwpolicy").and_then(|()| {
            run(Command::new("pwpolicy").args(["-u", name, "-setpolicy", "newPasswordRequired=1"]))
        });

        // pwpolicy happily accepts the flag on systems that then ignore it, so
        // the best this backend can say is that it asked
        match requested {
            Ok(_) => RotationOutcome::Attempted { via: VIA },
            Err(e) => RotationOutcome::Failed(e),
        }
    }

    fn delete_user(&self, name: &str) -> Result<Removal, AccountError> {
        run(&mut dscl(["-delete", user_record(name).as_str()]))?;
        self.flush_cache();

        Ok(Removal::RecordOnly)
    }

    fn report(&self, name: &str) -> String {
        let mut report = String::new();
        let record = user_record(name);

        let mut args = vec![NODE, "-read", record.as_str()];
        args.extend(REPORTED_ATTRIBUTES);

        match qx("dscl", &args) {
            Ok((status, out)) if status.success() => {
                let _ = writeln!(report, "dscl . -read {record}:");
                let _ = writeln!(report, "{}", out.trim_end());
            }
            _ => {
                let _ = writeln!(report, "dscl: no directory record for {name}");
            }
        }

        match qx("id", &[name]) {
            Ok((status, id)) if status.success() => {
                let _ = writeln!(report, "id: {}", id.trim());
            }
            _ => {
                let _ = writeln!(report, "id: {name} does not resolve");
            }
        }

        match qx("pwpolicy", &["-u", name, "-getpolicy"]) {
            Ok((status, policy)) if status.success() => {
                let _ = writeln!(report, "pwpolicy: {}", policy.trim());
                if policy.contains("newPasswordRequired=1") {
                    let _ = writeln!(
                        report,
                        "rotation: must change at next login (requested, not guaranteed)"
                    );
                }
            }
            _ => {
                let _ = writeln!(report, "pwpolicy: no policy information");
            }
        }

        report
    }
}

/// Whether an AuthenticationAuthority value enables shadow hash passwords
pub fn has_shadow_hash(authority: &str) -> bool {
    authority.split_whitespace().any(|entry| entry.starts_with(SHADOW_HASH))
}

/// Split `dscl . -read` output into attribute name and value. Values spread
/// over several lines are joined with a space
pub fn parse_dscl_attributes(out: &str) -> HashMap<String, String> {
    let mut attributes: HashMap<String, String> = HashMap::new();
    let mut current: Option<String> = None;

    for line in out.lines() {
        if line.starts_with(' ') {
            if let Some(value) = current.as_ref().and_then(|key| attributes.get_mut(key)) {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(line.trim());
            }
            continue;
        }

        let Some(caps) = pcre!(line =~ m/DSCL_ATTRIBUTE/).into_iter().next() else {
            current = None;
            continue;
        };

        let key = caps[1].to_string();
        let value = caps.get(2).map(|v| v.as_str().trim().to_string()).unwrap_or_default();
        attributes.insert(key.clone(), value);
        current = Some(key);
    }

    attributes
}

#[cfg(test)]
mod tests {
    use super::*;

    const READ_OUTPUT: &str = "\
AuthenticationAuthority: ;ShadowHash;HASHLIST:<SALTED-SHA512-PBKDF2,SRP-RFC5054-4096-SHA512-PBKDF2> ;Kerberosv5;;alice@LKDC:SHA1.0123456789ABCDEF;LKDC:SHA1.0123456789ABCDEF;
NFSHomeDirectory: /Users/alice
PrimaryGroupID: 501
RealName:
 Alice
 Liddell
RecordName: alice
UniqueID: 502
UserShell: /bin/zsh
";

    #[test]
    fn parses_attributes() {
        let attrs = parse_dscl_attributes(READ_OUTPUT);

        assert_eq!(attrs["NFSHomeDirectory"], "/Users/alice");
        assert_eq!(attrs["UniqueID"], "502");
        assert_eq!(attrs["RealName"], "Alice Liddell");
        assert!(has_shadow_hash(&attrs[AUTHENTICATION_AUTHORITY]));
    }

    #[test]
    fn native_attribute_names_keep_their_prefix() {
        let attrs = parse_dscl_attributes("dsAttrTypeNative:_writers_passwd: alice\n");
        assert_eq!(attrs["dsAttrTypeNative:_writers_passwd"], "alice");
    }

    #[test]
    fn shadow_hash_marker() {
        assert!(has_shadow_hash(";ShadowHash;"));
        assert!(has_shadow_hash(";DisabledUser; ;ShadowHash;HASHLIST:<SALTED-SHA512-PBKDF2>"));
        assert!(!has_shadow_hash(";DisabledUser;"));
        assert!(!has_shadow_hash(""));
    }

    const MISSING: &str = "acct-rs-no-such-tool";

    #[test]
    fn missing_directory_tools_fall_back_to_the_group_file() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let group_file = dir.path().join("group");
        std::fs::write(&group_file, "wheel:*:0:root\ndev_group:*:501:\n")?;

        let lookup = GroupLookup {
            dseditgroup: MISSING,
            dscl: MISSING,
            group_file: &group_file,
        };

        assert_eq!(lookup.resolve("dev_group")?, ("group file", true));
        assert_eq!(lookup.resolve("staff")?, ("group file", false));
        Ok(())
    }

    #[test]
    fn dscl_answers_when_dseditgroup_is_missing() -> eyre::Result<()> {
        let lookup = GroupLookup {
            dseditgroup: MISSING,
            dscl: "true",
            group_file: Path::new("/acct-rs/does/not/exist"),
        };
        assert_eq!(lookup.resolve("dev_group")?, ("dscl", true));

        let lookup = GroupLookup {
            dscl: "false",
            ..lookup
        };
        assert_eq!(lookup.resolve("dev_group")?, ("dscl", false));
        Ok(())
    }

    #[test]
    fn dseditgroup_is_asked_first() -> eyre::Result<()> {
        let lookup = GroupLookup {
            dseditgroup: "true",
            dscl: MISSING,
            group_file: Path::new("/acct-rs/does/not/exist"),
        };
        assert_eq!(lookup.resolve("dev_group")?, ("dseditgroup", true));
        Ok(())
    }

    #[test]
    fn no_source_at_all_is_an_error() {
        let lookup = GroupLookup {
            dseditgroup: MISSING,
            dscl: MISSING,
            group_file: Path::new("/acct-rs/does/not/exist"),
        };
        assert!(matches!(
            lookup.resolve("dev_group"),
            Err(AccountError::Filesystem { .. })
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn rotation_without_pwpolicy_is_reported() {
        match DirectoryServiceBackend.force_rotation("alice") {
            RotationOutcome::Failed(AccountError::CapabilityMissing(tool)) => {
                assert_eq!(tool, "pwpolicy");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn record_paths() {
        assert_eq!(user_record("alice"), "/Users/alice");
        assert_eq!(group_record("dev_group"), "/Groups/dev_group");
        assert_eq!(
            crate::utils::command_line(&dscl(["-read", "/Users/alice"])),
            "dscl . -read /Users/alice"
        );
    }
}
