//! Per-tenant settings with write-through JSON persistence.

use std::{
    collections::{BTreeMap, BTreeSet},
    ffi::OsString,
    path::{Path, PathBuf},
};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    config::TenantDefaults,
    domain::{ChannelId, SubjectId, TenantId},
    errors::Error,
    event::{Category, CategoryGroup, CategoryToggles},
    Result,
};

/// Settings of one tenant (guild).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantConfig {
    pub tenant_id: TenantId,
    pub destination_channel_id: Option<ChannelId>,
    pub enabled_categories: CategoryToggles,
    pub excluded_subjects: BTreeSet<SubjectId>,
    pub command_prefix: String,
}

impl TenantConfig {
    pub fn with_defaults(tenant_id: TenantId, defaults: &TenantDefaults) -> Self {
        Self {
            tenant_id,
            destination_channel_id: None,
            enabled_categories: defaults.categories,
            excluded_subjects: BTreeSet::new(),
            command_prefix: defaults.command_prefix.clone(),
        }
    }

    pub fn allows(&self, category: Category) -> bool {
        self.enabled_categories.allows(category)
    }

    pub fn is_excluded(&self, subject: SubjectId) -> bool {
        self.excluded_subjects.contains(&subject)
    }
}

// ============== On-disk document ==============

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TenantRecord {
    #[serde(default)]
    destination_channel_id: Option<ChannelId>,
    #[serde(default)]
    enabled_categories: CategoryToggles,
    #[serde(default)]
    excluded_subjects: BTreeSet<SubjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command_prefix: Option<String>,
}

impl From<&TenantConfig> for TenantRecord {
    fn from(c: &TenantConfig) -> Self {
        Self {
            destination_channel_id: c.destination_channel_id,
            enabled_categories: c.enabled_categories,
            excluded_subjects: c.excluded_subjects.clone(),
            command_prefix: Some(c.command_prefix.clone()),
        }
    }
}

/// `{ "tenants": { "<guild id>": { ... } } }`.
///
/// The `server_log_channels` / `log_*` / `prefix` fields are the older
/// single-document layout where category flags were global; they are read on
/// load and never written back.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    tenants: BTreeMap<String, TenantRecord>,

    #[serde(default, skip_serializing)]
    server_log_channels: BTreeMap<String, u64>,
    #[serde(default, skip_serializing)]
    prefix: Option<String>,
    #[serde(default, skip_serializing)]
    log_messages: Option<bool>,
    #[serde(default, skip_serializing)]
    log_members: Option<bool>,
    #[serde(default, skip_serializing)]
    log_channels: Option<bool>,
    #[serde(default, skip_serializing)]
    log_roles: Option<bool>,
    #[serde(default, skip_serializing)]
    log_voice: Option<bool>,
    #[serde(default, skip_serializing)]
    log_presence: Option<bool>,
}

impl ConfigDocument {
    fn legacy_defaults(&self, defaults: &TenantDefaults) -> TenantDefaults {
        let d = defaults.categories;
        TenantDefaults {
            command_prefix: self
                .prefix
                .clone()
                .unwrap_or_else(|| defaults.command_prefix.clone()),
            categories: CategoryToggles {
                messages: self.log_messages.unwrap_or(d.messages),
                members: self.log_members.unwrap_or(d.members),
                channels: self.log_channels.unwrap_or(d.channels),
                roles: self.log_roles.unwrap_or(d.roles),
                voice: self.log_voice.unwrap_or(d.voice),
                presence: self.log_presence.unwrap_or(d.presence),
            },
        }
    }
}

// ============== Store ==============

/// Concurrent tenant config store.
///
/// Each tenant's entry is mutated under its map shard lock, so two tenants never
/// wait on each other's in-memory updates. File writes are serialized and always
/// snapshot the map inside the write lock, so the file ends at the newest state.
pub struct TenantConfigStore {
    path: PathBuf,
    defaults: TenantDefaults,
    tenants: DashMap<TenantId, TenantConfig>,
    persist_lock: Mutex<()>,
}

impl TenantConfigStore {
    /// Empty store backed by `path` (nothing is read).
    pub fn new(path: impl Into<PathBuf>, defaults: TenantDefaults) -> Self {
        Self {
            path: path.into(),
            defaults,
            tenants: DashMap::new(),
            persist_lock: Mutex::new(()),
        }
    }

    /// Load the document at `path`. A missing or empty file yields an empty store;
    /// a malformed one is an error so it never gets overwritten.
    pub async fn load(path: impl Into<PathBuf>, defaults: TenantDefaults) -> Result<Self> {
        let store = Self::new(path, defaults);

        let txt = match tokio::fs::read_to_string(&store.path).await {
            Ok(txt) => txt,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %store.path.display(), "No tenant config file yet; starting empty");
                return Ok(store);
            }
            Err(e) => return Err(Error::Io(e)),
        };
        if txt.trim().is_empty() {
            return Ok(store);
        }

        let doc: ConfigDocument = serde_json::from_str(&txt)?;
        store.import(doc);
        info!(
            path = %store.path.display(),
            tenants = store.tenants.len(),
            "Loaded tenant config"
        );
        Ok(store)
    }

    fn import(&self, doc: ConfigDocument) {
        let legacy = doc.legacy_defaults(&self.defaults);
        for (key, channel) in &doc.server_log_channels {
            let Some(tenant_id) = parse_tenant_key(key) else {
                continue;
            };
            let mut cfg = TenantConfig::with_defaults(tenant_id, &legacy);
            cfg.destination_channel_id = Some(ChannelId(*channel));
            self.tenants.insert(tenant_id, cfg);
        }

        for (key, rec) in doc.tenants {
            let Some(tenant_id) = parse_tenant_key(&key) else {
                continue;
            };
            let cfg = TenantConfig {
                tenant_id,
                destination_channel_id: rec.destination_channel_id,
                enabled_categories: rec.enabled_categories,
                excluded_subjects: rec.excluded_subjects,
                command_prefix: rec
                    .command_prefix
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or_else(|| self.defaults.command_prefix.clone()),
            };
            self.tenants.insert(tenant_id, cfg);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn defaults(&self) -> &TenantDefaults {
        &self.defaults
    }

    /// Current settings, or the defaults when the tenant was never configured.
    pub fn get(&self, tenant_id: TenantId) -> TenantConfig {
        self.tenants
            .get(&tenant_id)
            .map(|c| c.value().clone())
            .unwrap_or_else(|| TenantConfig::with_defaults(tenant_id, &self.defaults))
    }

    pub fn destination(&self, tenant_id: TenantId) -> Option<ChannelId> {
        self.tenants
            .get(&tenant_id)
            .and_then(|c| c.destination_channel_id)
    }

    pub fn command_prefix(&self, tenant_id: TenantId) -> String {
        self.tenants
            .get(&tenant_id)
            .map(|c| c.command_prefix.clone())
            .unwrap_or_else(|| self.defaults.command_prefix.clone())
    }

    /// All configured tenants, ordered by id.
    pub fn tenants(&self) -> Vec<TenantConfig> {
        let mut out: Vec<TenantConfig> = self.tenants.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|c| c.tenant_id);
        out
    }

    pub async fn set_destination_channel(&self, tenant_id: TenantId, channel_id: ChannelId) {
        self.mutate(tenant_id, |c| c.destination_channel_id = Some(channel_id));
        info!(tenant_id = %tenant_id, channel_id = %channel_id, "Destination channel set");
        self.persist_logged().await;
    }

    /// Returns whether a destination was configured before.
    pub async fn remove_destination_channel(&self, tenant_id: TenantId) -> bool {
        let had = self.mutate(tenant_id, |c| c.destination_channel_id.take().is_some());
        if had {
            info!(tenant_id = %tenant_id, "Destination channel removed");
        }
        self.persist_logged().await;
        had
    }

    /// Flip a category group by name and return its new value.
    ///
    /// Unknown names are rejected before anything is mutated.
    pub async fn toggle_category(&self, tenant_id: TenantId, name: &str) -> Result<bool> {
        let group: CategoryGroup = name.parse()?;
        Ok(self.toggle_group(tenant_id, group).await)
    }

    pub async fn toggle_group(&self, tenant_id: TenantId, group: CategoryGroup) -> bool {
        let now = self.mutate(tenant_id, |c| c.enabled_categories.toggle(group));
        info!(tenant_id = %tenant_id, group = %group, enabled = now, "Category toggled");
        self.persist_logged().await;
        now
    }

    /// Returns `true` when the subject was not excluded before.
    pub async fn exclude_subject(&self, tenant_id: TenantId, subject: SubjectId) -> bool {
        let inserted = self.mutate(tenant_id, |c| c.excluded_subjects.insert(subject));
        debug!(tenant_id = %tenant_id, subject = %subject, inserted, "Subject excluded");
        self.persist_logged().await;
        inserted
    }

    /// Returns `true` when the subject was excluded before.
    pub async fn include_subject(&self, tenant_id: TenantId, subject: SubjectId) -> bool {
        let removed = self.mutate(tenant_id, |c| c.excluded_subjects.remove(&subject));
        debug!(tenant_id = %tenant_id, subject = %subject, removed, "Subject included");
        self.persist_logged().await;
        removed
    }

    pub async fn set_command_prefix(&self, tenant_id: TenantId, prefix: &str) {
        let prefix = prefix.trim().to_string();
        self.mutate(tenant_id, |c| c.command_prefix = prefix);
        self.persist_logged().await;
    }

    fn mutate<R>(&self, tenant_id: TenantId, f: impl FnOnce(&mut TenantConfig) -> R) -> R {
        let mut entry = self
            .tenants
            .entry(tenant_id)
            .or_insert_with(|| TenantConfig::with_defaults(tenant_id, &self.defaults));
        f(entry.value_mut())
    }

    /// Rewrite the whole document: temp file first, then rename over the target.
    pub async fn persist(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;

        let doc = self.snapshot();
        let bytes = serde_json::to_vec_pretty(&doc)?;
        let tmp = tmp_path(&self.path);
        let fail = |e: std::io::Error| {
            Error::ConfigPersistence(format!("{}: {e}", self.path.display()))
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(fail)?;
            }
        }
        tokio::fs::write(&tmp, &bytes).await.map_err(fail)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(fail)?;
        Ok(())
    }

    /// The in-memory change stands either way; the next mutation retries the write.
    async fn persist_logged(&self) {
        if let Err(e) = self.persist().await {
            error!(error = %e, "Tenant config not persisted");
        }
    }

    fn snapshot(&self) -> ConfigDocument {
        let tenants = self
            .tenants
            .iter()
            .map(|e| (e.key().0.to_string(), TenantRecord::from(e.value())))
            .collect();
        ConfigDocument {
            tenants,
            ..ConfigDocument::default()
        }
    }
}

fn parse_tenant_key(key: &str) -> Option<TenantId> {
    match key.trim().parse::<u64>() {
        Ok(id) => Some(TenantId(id)),
        Err(_) => {
            warn!(key, "Ignoring tenant config entry with a non-numeric id");
            None
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn temp_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("guildlog-tenant-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let p = dir.join(format!("{name}.json"));
        let _ = std::fs::remove_file(&p);
        p
    }

    #[tokio::test]
    async fn unknown_tenant_gets_defaults() {
        let store = TenantConfigStore::new(temp_file("defaults"), TenantDefaults::default());
        let cfg = store.get(TenantId(1));
        assert_eq!(cfg.destination_channel_id, None);
        assert_eq!(cfg.command_prefix, "!");
        assert!(cfg.enabled_categories.messages);
        assert!(store.tenants().is_empty());
    }

    #[tokio::test]
    async fn set_destination_is_write_through() {
        let path = temp_file("write_through");
        let store = TenantConfigStore::new(&path, TenantDefaults::default());
        store
            .set_destination_channel(TenantId(10), ChannelId(99))
            .await;
        store
            .set_destination_channel(TenantId(10), ChannelId(99))
            .await;

        let reloaded = TenantConfigStore::load(&path, TenantDefaults::default())
            .await
            .unwrap();
        assert_eq!(reloaded.destination(TenantId(10)), Some(ChannelId(99)));
        assert!(!tmp_path(&path).exists());
    }

    #[tokio::test]
    async fn toggle_twice_restores_persisted_state() {
        let path = temp_file("toggle");
        let store = TenantConfigStore::new(&path, TenantDefaults::default());
        let before = store.get(TenantId(5));

        assert!(!store.toggle_category(TenantId(5), "voice").await.unwrap());
        assert!(store.toggle_category(TenantId(5), "voice").await.unwrap());

        let reloaded = TenantConfigStore::load(&path, TenantDefaults::default())
            .await
            .unwrap();
        assert_eq!(reloaded.get(TenantId(5)), before);
    }

    #[tokio::test]
    async fn invalid_category_mutates_nothing() {
        let path = temp_file("invalid");
        let store = TenantConfigStore::new(&path, TenantDefaults::default());
        let err = store.toggle_category(TenantId(5), "bogus").await.unwrap_err();
        assert!(matches!(err, Error::InvalidCategory { .. }));
        assert!(store.tenants().is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn exclusion_is_idempotent() {
        let store = TenantConfigStore::new(temp_file("exclude"), TenantDefaults::default());
        let t = TenantId(3);
        assert!(store.exclude_subject(t, SubjectId(7)).await);
        assert!(!store.exclude_subject(t, SubjectId(7)).await);
        assert!(store.get(t).is_excluded(SubjectId(7)));

        assert!(store.include_subject(t, SubjectId(7)).await);
        assert!(!store.include_subject(t, SubjectId(7)).await);
        assert!(!store.get(t).is_excluded(SubjectId(7)));
    }

    #[tokio::test]
    async fn remove_destination_reports_previous_state() {
        let store = TenantConfigStore::new(temp_file("remove"), TenantDefaults::default());
        assert!(!store.remove_destination_channel(TenantId(1)).await);
        store.set_destination_channel(TenantId(1), ChannelId(2)).await;
        assert!(store.remove_destination_channel(TenantId(1)).await);
        assert_eq!(store.destination(TenantId(1)), None);
    }

    #[tokio::test]
    async fn concurrent_mutations_of_many_tenants_all_land_on_disk() {
        let path = temp_file("concurrent");
        let store = Arc::new(TenantConfigStore::new(&path, TenantDefaults::default()));

        let mut handles = Vec::new();
        for i in 0..16u64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .set_destination_channel(TenantId(i), ChannelId(1000 + i))
                    .await;
                store.exclude_subject(TenantId(i), SubjectId(i)).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let reloaded = TenantConfigStore::load(&path, TenantDefaults::default())
            .await
            .unwrap();
        assert_eq!(reloaded.tenants().len(), 16);
        for i in 0..16u64 {
            let cfg = reloaded.get(TenantId(i));
            assert_eq!(cfg.destination_channel_id, Some(ChannelId(1000 + i)));
            assert!(cfg.is_excluded(SubjectId(i)));
        }
    }

    #[tokio::test]
    async fn imports_legacy_document() {
        let path = temp_file("legacy");
        std::fs::write(
            &path,
            r#"{
                "token": "secret",
                "prefix": "?",
                "log_messages": true,
                "log_voice": false,
                "server_log_channels": { "111": 222, "not-a-guild": 1 }
            }"#,
        )
        .unwrap();

        let store = TenantConfigStore::load(&path, TenantDefaults::default())
            .await
            .unwrap();
        let cfg = store.get(TenantId(111));
        assert_eq!(cfg.destination_channel_id, Some(ChannelId(222)));
        assert_eq!(cfg.command_prefix, "?");
        assert!(!cfg.enabled_categories.voice);
        assert!(cfg.enabled_categories.messages);
        assert_eq!(store.tenants().len(), 1);

        // Rewriting drops the legacy fields, including the credential.
        store.persist().await.unwrap();
        let txt = std::fs::read_to_string(&path).unwrap();
        assert!(!txt.contains("secret"));
        assert!(txt.contains("\"111\""));
    }

    #[tokio::test]
    async fn malformed_document_is_an_error() {
        let path = temp_file("malformed");
        std::fs::write(&path, "{ not json").unwrap();
        let err = TenantConfigStore::load(&path, TenantDefaults::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Json(_)));
    }

    #[tokio::test]
    async fn persistence_failure_keeps_in_memory_change() {
        // A directory where the file should be makes the rename fail.
        let path = temp_file("blocked");
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("occupant"), "x").unwrap();

        let store = TenantConfigStore::new(&path, TenantDefaults::default());
        store.set_destination_channel(TenantId(1), ChannelId(2)).await;
        assert_eq!(store.destination(TenantId(1)), Some(ChannelId(2)));
        assert!(matches!(
            store.persist().await,
            Err(Error::ConfigPersistence(_))
        ));

        let _ = std::fs::remove_dir_all(&path);
        let _ = std::fs::remove_file(tmp_path(&path));
    }
}
