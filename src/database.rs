use crate::error::{DatabaseError, Error, StdIoError, TomlDeError, TomlSerError};
use crate::user::User;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// User store collaborator. `update_reset_key` returning `Ok` means the key is committed
/// and visible to every later read.
pub trait UserRepository: Send + Sync {
    fn get_user(&self, user_id: &Uuid) -> Result<Option<User>, Error>;
    fn find_user(&self, identifier: &str) -> Result<Option<User>, Error>;
    fn update_reset_key(&self, user_id: &Uuid, reset_key: &str) -> Result<(), Error>;
}

#[derive(Serialize, Deserialize, Default)]
struct UsersFile {
    #[serde(default)]
    users: Vec<User>,
}

/// In-memory store, optionally backed by a TOML file that every commit rewrites.
#[derive(Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
    path: Option<PathBuf>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let users_file: UsersFile = if path.exists() {
            let toml_string = fs::read_to_string(path)
                .map_err(|err| DatabaseError::Read(StdIoError(err)))?;
            toml::from_str(&toml_string).map_err(|err| DatabaseError::Parse(TomlDeError(err)))?
        } else {
            UsersFile::default()
        };
        info!("Loaded {} users from {}", users_file.users.len(), path.display());
        Ok(Self {
            users: RwLock::new(
                users_file
                    .users
                    .into_iter()
                    .map(|user| (*user.get_id(), user))
                    .collect(),
            ),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn insert_user(&self, user: User) -> Result<(), Error> {
        let mut users = self.users.write();
        let _ = users.insert(*user.get_id(), user);
        self.commit(&users)
    }

    fn commit(&self, users: &HashMap<Uuid, User>) -> Result<(), Error> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let mut sorted: Vec<User> = users.values().cloned().collect();
        sorted.sort_by(|a, b| a.get_name().cmp(b.get_name()));
        let toml_string = toml::to_string(&UsersFile { users: sorted })
            .map_err(|err| DatabaseError::Serialise(TomlSerError(err)))?;
        fs::write(path, toml_string).map_err(|err| DatabaseError::Write(StdIoError(err)))?;
        debug!("Committed {} users to {}", users.len(), path.display());
        Ok(())
    }
}

impl UserRepository for MemoryUserRepository {
    fn get_user(&self, user_id: &Uuid) -> Result<Option<User>, Error> {
        Ok(self.users.read().get(user_id).cloned())
    }

    fn find_user(&self, identifier: &str) -> Result<Option<User>, Error> {
        let identifier = identifier.trim();
        Ok(self
            .users
            .read()
            .values()
            .find(|user| user.matches(identifier))
            .cloned())
    }

    fn update_reset_key(&self, user_id: &Uuid, reset_key: &str) -> Result<(), Error> {
        let mut users = self.users.write();
        match users.get_mut(user_id) {
            Some(user) => user.set_reset_key(reset_key.to_string()),
            None => return Err(DatabaseError::UserNotFound(*user_id).into()),
        }
        self.commit(&users)
    }
}
