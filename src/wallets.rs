use crate::signer::LocalSigner;
use alloy_primitives::Address;
use chrono::Utc;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    io::{
        ErrorKind,
        Write,
    },
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
};

pub const WALLET_FILE: &str = "wallet.json";
pub const WALLET_CHAIN: &str = "base";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    pub chain: String,
    pub created_at: String,
}

impl WalletRecord {
    pub fn from_signer(signer: &LocalSigner, agent_name: Option<String>) -> Self {
        Self {
            agent_name,
            address: signer.address().to_string(),
            private_key: Some(signer.private_key_hex()),
            chain: WALLET_CHAIN.to_string(),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn address(&self) -> Result<Address> {
        Address::from_str(&self.address)
            .map_err(|e| eyre!("Wallet record holds an invalid address '{}': {e}", self.address))
    }

    pub fn agent_name_or_default(&self) -> &str {
        self.agent_name.as_deref().unwrap_or("Agent")
    }

    /// `None` for watch-only records.
    pub fn signer(&self) -> Result<Option<LocalSigner>> {
        let Some(private_key) = self.private_key.as_deref() else {
            return Ok(None);
        };
        let signer = LocalSigner::from_private_key(private_key)
            .wrap_err("Wallet record holds an unreadable private key")?;
        let address = self.address()?;
        if signer.address() != address {
            return Err(eyre!(
                "Wallet record address {} does not match its private key ({})",
                address,
                signer.address()
            ));
        }
        Ok(Some(signer))
    }
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created(WalletRecord),
    AlreadyExists(WalletRecord),
}

#[derive(Debug)]
pub struct WalletStore {
    path: PathBuf,
}

impl WalletStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_home(home: &Path) -> Self {
        Self::new(home.join(WALLET_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<WalletRecord>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).wrap_err_with(|| {
                    format!("Failed to read wallet file {}", self.path.display())
                });
            }
        };
        let record = serde_json::from_slice::<WalletRecord>(&data).wrap_err_with(|| {
            format!("Failed to parse wallet file {}", self.path.display())
        })?;
        Ok(Some(record))
    }

    pub fn load_required(&self) -> Result<WalletRecord> {
        self.load()?.ok_or_else(|| {
            eyre!(
                "No wallet found at {}. Run: clawsvegas generate",
                self.path.display()
            )
        })
    }

    /// Writes `record` only if no wallet file exists yet. Never overwrites.
    pub fn create(&self, record: WalletRecord) -> Result<CreateOutcome> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).wrap_err_with(|| {
                    format!("Failed to create wallet directory {}", parent.display())
                })?;
            }
        }

        let json = serde_json::to_vec_pretty(&record)
            .wrap_err("Failed to serialize wallet record")?;

        let mut file = match open_exclusive(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let existing = self.load_required()?;
                tracing::warn!(address = %existing.address, "wallet already exists, refusing to overwrite");
                return Ok(CreateOutcome::AlreadyExists(existing));
            }
            Err(e) => {
                return Err(e).wrap_err_with(|| {
                    format!("Failed to create wallet file {}", self.path.display())
                });
            }
        };
        file.write_all(&json)
            .wrap_err("Failed to write wallet record")?;
        tracing::info!(address = %record.address, path = %self.path.display(), "wallet created");
        Ok(CreateOutcome::Created(record))
    }
}

#[cfg(unix)]
fn open_exclusive(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_exclusive(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create_new(true).open(path)
}

pub fn default_home_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".clawsvegas"))
}

pub fn resolve_home_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_home_dir(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn load__returns_none_when_no_wallet_exists() {
        // given
        let dir = TempDir::new("clawsvegas-wallet").unwrap();
        let store = WalletStore::in_home(dir.path());

        // when
        let record = store.load().unwrap();

        // then
        assert!(record.is_none());
    }

    #[test]
    fn create__persists_record_that_round_trips_to_signer() {
        // given
        let dir = TempDir::new("clawsvegas-wallet").unwrap();
        let store = WalletStore::in_home(dir.path());
        let signer = LocalSigner::random();
        let record = WalletRecord::from_signer(&signer, Some("MyBot".to_string()));

        // when
        let outcome = store.create(record.clone()).unwrap();

        // then
        assert!(matches!(outcome, CreateOutcome::Created(_)));
        let loaded = store.load_required().unwrap();
        assert_eq!(loaded, record);
        let restored = loaded.signer().unwrap().unwrap();
        assert_eq!(restored.address(), signer.address());
    }

    #[test]
    fn create__refuses_to_overwrite_existing_wallet() {
        // given
        let dir = TempDir::new("clawsvegas-wallet").unwrap();
        let store = WalletStore::in_home(dir.path());
        let first = WalletRecord::from_signer(&LocalSigner::random(), None);
        store.create(first.clone()).unwrap();
        let second = WalletRecord::from_signer(&LocalSigner::random(), None);

        // when
        let outcome = store.create(second).unwrap();

        // then
        match outcome {
            CreateOutcome::AlreadyExists(existing) => assert_eq!(existing, first),
            other => panic!("expected existing wallet, got {other:?}"),
        }
        assert_eq!(store.load_required().unwrap(), first);
    }

    #[test]
    fn create__makes_missing_home_directory() {
        let dir = TempDir::new("clawsvegas-wallet").unwrap();
        let store = WalletStore::in_home(&dir.path().join("nested").join("home"));
        let record = WalletRecord::from_signer(&LocalSigner::random(), None);

        store.create(record).unwrap();

        assert!(store.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn create__restricts_file_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new("clawsvegas-wallet").unwrap();
        let store = WalletStore::in_home(dir.path());
        store
            .create(WalletRecord::from_signer(&LocalSigner::random(), None))
            .unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();

        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn signer__is_none_for_watch_only_record() {
        // given
        let record = WalletRecord {
            agent_name: None,
            address: LocalSigner::random().address().to_string(),
            private_key: None,
            chain: WALLET_CHAIN.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        // then
        assert!(record.signer().unwrap().is_none());
    }

    #[test]
    fn signer__rejects_key_that_does_not_derive_address() {
        // given
        let mut record = WalletRecord::from_signer(&LocalSigner::random(), None);
        record.address = LocalSigner::random().address().to_string();

        // then
        assert!(record.signer().is_err());
    }

    #[test]
    fn record__serializes_with_camel_case_keys() {
        let record = WalletRecord::from_signer(&LocalSigner::random(), Some("Bot".to_string()));

        let json = serde_json::to_value(&record).unwrap();

        assert!(json.get("privateKey").is_some());
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["agentName"], "Bot");
        assert_eq!(json["chain"], "base");
    }

    #[test]
    fn resolve_home_dir__uses_explicit_path() {
        let resolved = resolve_home_dir(Some("/tmp/clawsvegas")).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/clawsvegas"));
    }
}
