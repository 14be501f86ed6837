//! In-memory backend for exercising the lifecycle without touching the host's
//! account database. Home directories are real directories, normally under a
//! temporary directory used as the home base
use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use crate::utils::{
    backend::{AccountBackend, NewAccount, Password, Removal, RotationOutcome},
    error::AccountError,
    ids::next_id,
    platform::Platform,
};

#[derive(Clone, Debug)]
pub struct FakeUser {
    pub uid: u32,
    pub group: String,
    pub home: PathBuf,
    pub shell: String,
    pub password: Option<String>,
    pub must_change: bool,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub users: BTreeMap<String, FakeUser>,
    pub groups: BTreeMap<String, u32>,
}

#[derive(Debug)]
pub struct FakeBackend {
    pub platform: Platform,
    pub home_base: PathBuf,
    /// Whether removing a record also removes the home directory
    pub cascade: bool,
    /// Whether rotation primitives are available
    pub rotation_available: bool,
    /// Reject passwords equal to this value, like a password policy would
    pub rejected_password: Option<String>,
    /// Lookup answers that differ from the record, keyed by user
    pub home_overrides: HashMap<String, Option<PathBuf>>,
    pub state: RefCell<FakeState>,
    mutations: RefCell<Vec<String>>,
}

impl FakeBackend {
    pub fn new(platform: Platform, home_base: &Path) -> Self {
        Self {
            platform,
            home_base: home_base.to_path_buf(),
            cascade: platform == Platform::Linux,
            rotation_available: true,
            rejected_password: None,
            home_overrides: HashMap::new(),
            state: RefCell::new(FakeState::default()),
            mutations: RefCell::new(Vec::new()),
        }
    }

    /// Seed an existing account, bypassing the lifecycle
    pub fn with_user(self, name: &str, home: &Path) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let uid = next_id(state.users.values().map(|u| u.uid)).expect("free uid");
            state.users.insert(
                name.to_string(),
                FakeUser {
                    uid,
                    group: "staff".to_string(),
                    home: home.to_path_buf(),
                    shell: "/bin/sh".to_string(),
                    password: None,
                    must_change: false,
                },
            );
        }
        self
    }

    pub fn user(&self, name: &str) -> Option<FakeUser> {
        self.state.borrow().users.get(name).cloned()
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.state.borrow().groups.contains_key(name)
    }

    /// Every mutating call made so far, in order
    pub fn mutations(&self) -> Vec<String> {
        self.mutations.borrow().clone()
    }

    fn record(&self, call: String) {
        self.mutations.borrow_mut().push(call);
    }
}

impl AccountBackend for FakeBackend {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn home_base(&self) -> &Path {
        &self.home_base
    }

    fn user_exists(&self, name: &str) -> Result<bool, AccountError> {
        Ok(self.state.borrow().users.contains_key(name))
    }

    fn group_exists(&self, name: &str) -> Result<bool, AccountError> {
        Ok(self.has_group(name))
    }

    fn home_dir_of(&self, name: &str) -> Option<PathBuf> {
        if let Some(home) = self.home_overrides.get(name) {
            return home.clone();
        }
        self.user(name).map(|u| u.home)
    }

    fn create_group(&self, name: &str) -> Result<(), AccountError> {
        self.record(format!("create_group {name}"));
        let mut state = self.state.borrow_mut();
        let gid = next_id(state.groups.values().copied())?;
        state.groups.insert(name.to_string(), gid);
        Ok(())
    }

    fn create_user(&self, account: &NewAccount) -> Result<(), AccountError> {
        self.record(format!("create_user {}", account.name));

        let mut state = self.state.borrow_mut();
        if !state.groups.contains_key(&account.group) {
            return Err(AccountError::rejected(
                format!("create_user {}", account.name),
                format!("group '{}' does not exist", account.group),
            ));
        }

        std::fs::create_dir_all(&account.home)
            .map_err(|e| AccountError::filesystem("create", &account.home, e))?;

        let uid = next_id(state.users.values().map(|u| u.uid))?;
        state.users.insert(
            account.name.clone(),
            FakeUser {
                uid,
                group: account.group.clone(),
                home: account.home.clone(),
                shell: account.shell.clone(),
                password: None,
                must_change: false,
            },
        );
        Ok(())
    }

    fn set_password(&self, name: &str, password: &Password) -> Result<(), AccountError> {
        self.record(format!("set_password {name}"));

        if self.rejected_password.as_deref() == Some(password.expose()) {
            return Err(AccountError::rejected(
                format!("set_password {name}"),
                "password does not satisfy policy",
            ));
        }

        let mut state = self.state.borrow_mut();
        let user = state
            .users
            .get_mut(name)
            .ok_or_else(|| AccountError::rejected("set_password", format!("no user {name}")))?;
        user.password = Some(password.expose().to_string());
        Ok(())
    }

    fn force_rotation(&self, name: &str) -> RotationOutcome {
        self.record(format!("force_rotation {name}"));

        if !self.rotation_available {
            return RotationOutcome::Failed(AccountError::CapabilityMissing("chage".into()));
        }

        if let Some(user) = self.state.borrow_mut().users.get_mut(name) {
            user.must_change = true;
        }

        match self.platform {
            Platform::Linux => RotationOutcome::Enforced { via: "fake expire" },
            Platform::DirectoryService => RotationOutcome::Attempted { via: "fake expire" },
        }
    }

    fn delete_user(&self, name: &str) -> Result<Removal, AccountError> {
        self.record(format!("delete_user {name}"));

        let user = self
            .state
            .borrow_mut()
            .users
            .remove(name)
            .ok_or_else(|| AccountError::rejected("delete_user", format!("no user {name}")))?;

        if self.cascade {
            let _ = std::fs::remove_dir_all(&user.home);
            Ok(Removal::Cascaded)
        } else {
            Ok(Removal::RecordOnly)
        }
    }

    fn report(&self, name: &str) -> String {
        match self.user(name) {
            Some(u) if u.must_change => format!(
                "{name}:{}:{}:{}\nrotation: must change at next login\n",
                u.uid,
                u.group,
                u.home.display()
            ),
            Some(u) => format!("{name}:{}:{}:{}\n", u.uid, u.group, u.home.display()),
            None => format!("no entry for {name}\n"),
        }
    }
}
