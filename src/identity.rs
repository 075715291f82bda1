use crate::model::melody::Identity;
use crate::util::now_unix_ms;
use anyhow::{Result, anyhow, bail};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

const MIN_PASSWORD_LEN: usize = 6;

/// Supplies the signed-in user and the sign in/up/out operations.
pub trait IdentityProvider {
    fn current_identity(&self) -> Option<Identity>;

    fn sign_in(&self, email: &str, password: &str) -> Result<Identity>;

    /// Create an account and sign it in.
    fn sign_up(&self, email: &str, password: &str) -> Result<Identity>;

    fn sign_out(&self) -> Result<()>;

    /// Receive the new identity (or `None`) after every sign in, sign up and sign out.
    fn subscribe(&self) -> Receiver<Option<Identity>>;
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct Account {
    id: String,
    email: String,
    password_hash: String,
    created_at: u64,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct AccountsFile {
    accounts: Vec<Account>,
    /// Id of the account that is signed in, kept across restarts.
    session: Option<String>,
}

impl AccountsFile {
    fn identity_for(&self, id: &str) -> Option<Identity> {
        self.accounts.iter().find(|a| a.id == id).map(|a| Identity {
            id: a.id.clone(),
            email: a.email.clone(),
        })
    }
}

fn hash_password(email: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update([0u8]);
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 16 hex chars derived from the email and the sign-up time.
fn account_id(email: &str, created_at: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(created_at.to_le_bytes());
    let mut id = format!("{:x}", hasher.finalize());
    id.truncate(16);
    id
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Accounts stored in a local JSON file.
#[derive(Debug)]
pub struct LocalIdentityProvider {
    path: PathBuf,
    state: Mutex<AccountsFile>,
    observers: Mutex<Vec<Sender<Option<Identity>>>>,
}

impl LocalIdentityProvider {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| anyhow!("Failed to create {}: {}", dir.display(), e))?;
        }

        let state = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;
            serde_json::from_str(&raw)
                .map_err(|e| anyhow!("Corrupt accounts file {}: {}", path.display(), e))?
        } else {
            AccountsFile::default()
        };

        debug!(
            "Loaded {} local accounts from {}",
            state.accounts.len(),
            path.display()
        );

        Ok(Self {
            path,
            state: Mutex::new(state),
            observers: Mutex::new(Vec::new()),
        })
    }

    /// Same temp-file-then-rename dance as the melody store.
    fn persist(&self, state: &AccountsFile) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(state)?)
            .map_err(|e| anyhow!("Failed to write {}: {}", tmp.display(), e))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| anyhow!("Failed to replace {}: {}", self.path.display(), e))
    }

    fn notify(&self, identity: Option<Identity>) {
        let Ok(mut observers) = self.observers.lock() else {
            warn!("Failed to lock identity observers..!");
            return;
        };
        observers.retain(|tx| tx.send(identity.clone()).is_ok());
    }

    /// Point the session at `id` and persist; on failure nothing changes.
    fn start_session(&self, state: &mut AccountsFile, id: &str) -> Result<Identity> {
        let identity = state
            .identity_for(id)
            .ok_or_else(|| anyhow!("Unknown account..!"))?;

        let previous = state.session.replace(id.to_owned());
        if let Err(why) = self.persist(state) {
            state.session = previous;
            return Err(why);
        }

        Ok(identity)
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn current_identity(&self) -> Option<Identity> {
        let state = self.state.lock().ok()?;
        let id = state.session.as_deref()?;
        state.identity_for(id)
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        let email = normalize_email(email);

        let identity = {
            let Ok(mut state) = self.state.lock() else {
                bail!("Failed to lock accounts..!")
            };

            let id = state
                .accounts
                .iter()
                .find(|a| a.email == email && a.password_hash == hash_password(&email, password))
                .map(|a| a.id.clone())
                .ok_or_else(|| anyhow!("Invalid login credentials"))?;

            self.start_session(&mut state, &id)?
        };

        info!("Signed in as {}..!", identity.email);
        self.notify(Some(identity.clone()));

        Ok(identity)
    }

    fn sign_up(&self, email: &str, password: &str) -> Result<Identity> {
        let email = normalize_email(email);

        if !email.contains('@') {
            bail!("Unable to validate email address: invalid format");
        }

        if password.len() < MIN_PASSWORD_LEN {
            bail!("Password should be at least {} characters", MIN_PASSWORD_LEN);
        }

        let identity = {
            let Ok(mut state) = self.state.lock() else {
                bail!("Failed to lock accounts..!")
            };

            if state.accounts.iter().any(|a| a.email == email) {
                bail!("User already registered");
            }

            let created_at = now_unix_ms();
            let id = account_id(&email, created_at);

            state.accounts.push(Account {
                id: id.clone(),
                email: email.clone(),
                password_hash: hash_password(&email, password),
                created_at,
            });

            match self.start_session(&mut state, &id) {
                Ok(identity) => identity,
                Err(why) => {
                    state.accounts.pop();
                    return Err(why);
                }
            }
        };

        info!("Registered {}..!", identity.email);
        self.notify(Some(identity.clone()));

        Ok(identity)
    }

    fn sign_out(&self) -> Result<()> {
        {
            let Ok(mut state) = self.state.lock() else {
                bail!("Failed to lock accounts..!")
            };

            if state.session.is_none() {
                debug!("Sign out without a session..!");
                return Ok(());
            }

            let previous = state.session.take();
            if let Err(why) = self.persist(&state) {
                state.session = previous;
                return Err(why);
            }
        }

        info!("Signed out..!");
        self.notify(None);

        Ok(())
    }

    fn subscribe(&self) -> Receiver<Option<Identity>> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut observers) = self.observers.lock() {
            observers.push(tx);
        }
        rx
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sign_up_signs_in() {
        env_logger::try_init().unwrap_or(());

        let dir = tempdir().unwrap();
        let provider = LocalIdentityProvider::open(dir.path().join("accounts.json")).unwrap();
        assert!(provider.current_identity().is_none());

        let me = provider.sign_up("Player@Example.com ", "hunter22").unwrap();
        assert_eq!(me.email, "player@example.com");
        assert_eq!(provider.current_identity(), Some(me));
    }

    #[test]
    fn session_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.json");

        let me = LocalIdentityProvider::open(&path)
            .unwrap()
            .sign_up("a@b.c", "secret1")
            .unwrap();

        let provider = LocalIdentityProvider::open(&path).unwrap();
        assert_eq!(provider.current_identity(), Some(me));

        provider.sign_out().unwrap();
        let provider = LocalIdentityProvider::open(&path).unwrap();
        assert!(provider.current_identity().is_none());
    }

    #[test]
    fn sign_in_checks_password() {
        let dir = tempdir().unwrap();
        let provider = LocalIdentityProvider::open(dir.path().join("accounts.json")).unwrap();
        let me = provider.sign_up("a@b.c", "secret1").unwrap();
        provider.sign_out().unwrap();

        assert!(provider.sign_in("a@b.c", "wrong-pass").is_err());
        assert!(provider.current_identity().is_none());
        assert!(provider.sign_in("nobody@b.c", "secret1").is_err());

        assert_eq!(provider.sign_in("A@B.C", "secret1").unwrap(), me);
        assert_eq!(provider.current_identity(), Some(me));
    }

    #[test]
    fn sign_up_rejections() {
        let dir = tempdir().unwrap();
        let provider = LocalIdentityProvider::open(dir.path().join("accounts.json")).unwrap();

        assert!(provider.sign_up("not-an-email", "secret1").is_err());
        assert!(provider.sign_up("a@b.c", "123").is_err());
        assert!(provider.current_identity().is_none());

        provider.sign_up("a@b.c", "secret1").unwrap();
        provider.sign_out().unwrap();
        assert!(provider.sign_up("a@b.c", "another1").is_err());
        assert!(provider.current_identity().is_none());
    }

    #[test]
    fn subscribers_hear_changes() {
        let dir = tempdir().unwrap();
        let provider = LocalIdentityProvider::open(dir.path().join("accounts.json")).unwrap();
        let rx = provider.subscribe();

        let me = provider.sign_up("a@b.c", "secret1").unwrap();
        provider.sign_out().unwrap();
        assert!(provider.sign_in("a@b.c", "nope-nope").is_err());

        let seen: Vec<Option<Identity>> = rx.try_iter().collect();
        assert_eq!(seen, vec![Some(me), None]);
    }

    #[test]
    fn failed_write_keeps_accounts_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        let provider = LocalIdentityProvider::open(&path).unwrap();
        let me = provider.sign_up("a@b.c", "secret1").unwrap();

        // A directory squatting on the temp path makes the next write fail
        let tmp = dir.path().join("accounts.json.tmp");
        fs::create_dir(&tmp).unwrap();

        assert!(provider.sign_out().is_err());
        assert_eq!(provider.current_identity(), Some(me.clone()));
        assert!(provider.sign_up("d@e.f", "secret2").is_err());

        let reopened = LocalIdentityProvider::open(&path).unwrap();
        assert_eq!(reopened.current_identity(), Some(me));

        fs::remove_dir(&tmp).unwrap();
        provider.sign_out().unwrap();
        assert!(LocalIdentityProvider::open(&path).unwrap().current_identity().is_none());
    }

    #[test]
    fn digests_are_lowercase_hex() {
        let hash = hash_password("a@b.c", "secret1");
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, hash_password("a@b.c", "secret2"));

        let id = account_id("a@b.c", 1_700_000_000_000);
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        assert_ne!(id, account_id("a@b.c", 1_700_000_000_001));
    }
}
