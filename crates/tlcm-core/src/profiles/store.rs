//! Profile Store
//!
//! The profile list lives in one JSON document (`~/.tlcm/profiles.json` by
//! default). Every mutation is a full read-modify-write cycle: load all,
//! apply one change, write all back atomically. A missing document is an
//! empty store.
//!
//! The store assumes it is the only writer. There is no file locking, so a
//! concurrent external edit between the read and the write of a cycle is
//! lost.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use super::recovery::Recovery;
use super::{AuthType, ProfileRecord};
use crate::common::atomic::temp_path_for;
use crate::common::{write_atomic, AppError, AppResult};

/// Fields every entry must carry as strings
const REQUIRED_FIELDS: [&str; 4] = ["name", "server", "username", "auth_type"];

pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every profile, in stored order.
    pub fn load(&self) -> AppResult<Vec<ProfileRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if temp_path_for(&self.path).exists() {
            warn!(
                "Ignoring leftover {:?} from an interrupted save",
                temp_path_for(&self.path)
            );
        }

        parse_document(&self.path, &content)
    }

    /// Overwrite the document with `records`.
    pub fn save(&self, records: &[ProfileRecord]) -> AppResult<()> {
        let mut json = serde_json::to_string_pretty(records)?;
        json.push('\n');
        write_atomic(&self.path, json.as_bytes())?;

        info!("Wrote {} profiles to {:?}", records.len(), self.path);
        Ok(())
    }

    pub fn get(&self, name: &str) -> AppResult<ProfileRecord> {
        self.load()?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| AppError::NotFound(name.to_string()))
    }

    /// Append a new profile.
    pub fn add(&self, record: ProfileRecord) -> AppResult<()> {
        let mut records = self.load()?;

        if records.iter().any(|p| p.name == record.name) {
            return Err(AppError::DuplicateName(record.name));
        }

        info!("Adding profile '{}'", record.name);
        records.push(record);
        self.save(&records)
    }

    /// Replace the profile called `original_name` in place. The new record may
    /// carry a different name as long as no other profile uses it.
    pub fn update(&self, original_name: &str, record: ProfileRecord) -> AppResult<()> {
        let mut records = self.load()?;

        let idx = records
            .iter()
            .position(|p| p.name == original_name)
            .ok_or_else(|| AppError::NotFound(original_name.to_string()))?;

        if record.name != original_name
            && records
                .iter()
                .enumerate()
                .any(|(i, p)| i != idx && p.name == record.name)
        {
            return Err(AppError::DuplicateName(record.name));
        }

        if records[idx] == record {
            return Ok(());
        }

        info!("Updating profile '{}'", original_name);
        records[idx] = record;
        self.save(&records)
    }

    /// Remove the profile called `name`. Returns the removed record so the
    /// caller can clean up its per-profile configuration; `None` when no such
    /// profile existed.
    pub fn delete(&self, name: &str) -> AppResult<Option<ProfileRecord>> {
        let mut records = self.load()?;

        let Some(idx) = records.iter().position(|p| p.name == name) else {
            return Ok(None);
        };

        let removed = records.remove(idx);
        info!("Deleting profile '{}'", name);
        self.save(&records)?;
        Ok(Some(removed))
    }

    /// Inspect the document without touching it. A damaged document yields a
    /// [`Recovery`] in its initial state.
    pub fn check(&self) -> AppResult<Option<Recovery>> {
        match self.load() {
            Ok(_) => Ok(None),
            Err(e) if e.needs_recovery() => {
                warn!("Profile document needs recovery: {}", e);
                Ok(Some(Recovery::detected(self.path.clone(), &e)))
            }
            Err(e) => Err(e),
        }
    }
}

fn parse_document(path: &Path, content: &str) -> AppResult<Vec<ProfileRecord>> {
    let value: Value = serde_json::from_str(content).map_err(|e| AppError::Corruption {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let Value::Array(entries) = value else {
        return Err(AppError::Corruption {
            path: path.to_path_buf(),
            reason: format!("expected a list of profiles, found {}", kind_of(&value)),
        });
    };

    let schema = |index: usize, detail: String| AppError::Schema {
        path: path.to_path_buf(),
        index,
        detail,
    };

    let mut records: Vec<ProfileRecord> = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let Some(fields) = entry.as_object() else {
            return Err(schema(index, format!("expected an object, found {}", kind_of(&entry))));
        };

        for field in REQUIRED_FIELDS {
            match fields.get(field) {
                None => return Err(schema(index, format!("missing field '{}'", field))),
                Some(Value::String(_)) => {}
                Some(other) => {
                    return Err(schema(
                        index,
                        format!("field '{}' must be a string, found {}", field, kind_of(other)),
                    ))
                }
            }
        }

        if let Some(label) = fields.get("auth_type").and_then(Value::as_str) {
            if !AuthType::LABELS.contains(&label) {
                return Err(schema(index, format!("unknown auth_type '{}'", label)));
            }
        }

        let mut record: ProfileRecord =
            serde_json::from_value(entry).map_err(|e| schema(index, e.to_string()))?;

        if records.iter().any(|p| p.name == record.name) {
            return Err(schema(index, format!("duplicate profile name '{}'", record.name)));
        }

        if record.auth_type == AuthType::Password {
            record.auto_connect = false;
        }
        records.push(record);
    }

    Ok(records)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ProfileStore {
        ProfileStore::new(dir.path().join("profiles.json"))
    }

    fn sample() -> Vec<ProfileRecord> {
        vec![
            ProfileRecord::password("Office", "tl.example.com", "alice"),
            ProfileRecord::ssh_key("Lab", "lab.example.com", "bob", "/home/bob/.ssh/id_rsa", true),
            ProfileRecord::ssh_key("Cluster", "hpc.example.com", "carol", "/keys/c", false),
        ]
    }

    #[test]
    fn test_missing_document_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.load().unwrap().is_empty());
        assert!(store.check().unwrap().is_none());
    }

    #[test]
    fn test_save_load_round_trip_preserves_order() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn test_add_appends() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        for profile in sample() {
            store.add(profile).unwrap();
        }
        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn test_duplicate_add_fails_and_leaves_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add(ProfileRecord::password("A", "s1", "u1")).unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        let err = store
            .add(ProfileRecord::password("A", "other", "other"))
            .unwrap_err();

        assert!(matches!(err, AppError::DuplicateName(ref n) if n == "A"));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add(ProfileRecord::password("office", "s", "u")).unwrap();
        store.add(ProfileRecord::password("Office", "s", "u")).unwrap();
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn test_update_replaces_in_place() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&sample()).unwrap();

        let replacement = ProfileRecord::password("Lab 2", "lab2.example.com", "bob");
        store.update("Lab", replacement.clone()).unwrap();

        let records = store.load().unwrap();
        assert_eq!(records[1], replacement);
        assert_eq!(records[0].name, "Office");
        assert_eq!(records[2].name, "Cluster");
    }

    #[test]
    fn test_update_unchanged_record_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&sample()).unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        store.update("Lab", sample()[1].clone()).unwrap();
        store.update("Lab", sample()[1].clone()).unwrap();

        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn test_update_missing_profile() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&sample()).unwrap();

        let err = store
            .update("Nope", ProfileRecord::password("Nope", "s", "u"))
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref n) if n == "Nope"));
    }

    #[test]
    fn test_rename_onto_existing_name_fails() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add(ProfileRecord::password("A", "s1", "u1")).unwrap();
        store.add(ProfileRecord::password("B", "s2", "u2")).unwrap();

        let err = store
            .update("A", ProfileRecord::password("B", "s3", "u3"))
            .unwrap_err();

        assert!(matches!(err, AppError::DuplicateName(ref n) if n == "B"));
        assert_eq!(store.get("A").unwrap(), ProfileRecord::password("A", "s1", "u1"));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&sample()).unwrap();

        let removed = store.delete("Lab").unwrap();
        assert_eq!(removed.map(|p| p.name), Some("Lab".to_string()));
        assert!(store.delete("Lab").unwrap().is_none());

        let names: Vec<String> = store.load().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Office", "Cluster"]);
    }

    #[test]
    fn test_delete_on_missing_document_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.delete("ghost").unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_invalid_syntax_is_corruption() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "[{\"name\": ").unwrap();

        assert!(matches!(store.load(), Err(AppError::Corruption { .. })));
    }

    #[test]
    fn test_non_list_document_is_corruption() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"name": "A"}"#).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, AppError::Corruption { ref reason, .. } if reason.contains("an object")));
    }

    #[test]
    fn test_missing_required_field_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            r#"[{"name":"A","server":"s","username":"u","auth_type":"Password"},
                {"name":"B","username":"u","auth_type":"Password"}]"#,
        )
        .unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(
            err,
            AppError::Schema { index: 1, ref detail, .. } if detail.contains("server")
        ));
    }

    #[test]
    fn test_unknown_auth_type_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            r#"[{"name":"A","server":"s","username":"u","auth_type":"Kerberos"}]"#,
        )
        .unwrap();

        assert!(matches!(store.load(), Err(AppError::Schema { index: 0, .. })));
    }

    #[test]
    fn test_duplicate_names_in_document_are_schema_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            r#"[{"name":"A","server":"s","username":"u","auth_type":"Password"},
                {"name":"A","server":"t","username":"v","auth_type":"Password"}]"#,
        )
        .unwrap();

        assert!(matches!(store.load(), Err(AppError::Schema { index: 1, .. })));
    }

    #[test]
    fn test_load_forces_auto_connect_off_for_password() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            r#"[{"name":"A","server":"s","username":"u","auth_type":"Password","auto_connect":true}]"#,
        )
        .unwrap();

        assert!(!store.load().unwrap()[0].auto_connect);
    }

    #[test]
    fn test_corrupt_document_blocks_mutations() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "not json").unwrap();

        assert!(store.add(ProfileRecord::password("A", "s", "u")).is_err());
        assert!(store.delete("A").is_err());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "not json");
        assert!(store.check().unwrap().is_some());
    }

    #[test]
    fn test_leftover_temp_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&sample()).unwrap();
        fs::write(temp_path_for(store.path()), "half-written").unwrap();

        assert_eq!(store.load().unwrap(), sample());
        store.save(&sample()[..1]).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }
}
