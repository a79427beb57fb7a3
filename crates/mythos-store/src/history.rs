//! History facade.
//!
//! [`History`] is the only type that opens multi-table transactions. Every
//! compound operation (create, regenerate in place, delete, import, wipe)
//! runs inside a single [`Database::transaction`], so callers never observe
//! a creation without its images and outputs or the other way round.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::archive::{self, ExportArchive, ImportMode, ImportSource};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::live::SubscriptionId;
use crate::models::{
    now_millis, AnalysisParams, Creation, CreationParams, CreationPatch, CreationType,
    GenerationParams, Image, OutputData, ReimagineParams, TextOutput,
};
use crate::scope::Table;

/// Everything needed to record one creation event.
#[derive(Debug, Clone)]
pub struct NewCreation {
    pub name: String,
    pub params: CreationParams,
    pub output: OutputData,
    /// Generated or reimagined result.
    pub result_image: Option<String>,
    /// Analysed image, or the source of a reimagining.
    pub source_image: Option<String>,
}

impl NewCreation {
    pub fn generated(
        name: impl Into<String>,
        params: GenerationParams,
        output: OutputData,
        result_image: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            params: CreationParams::Generated(params),
            output,
            result_image: Some(result_image.into()),
            source_image: None,
        }
    }

    pub fn analyzed(
        name: impl Into<String>,
        params: AnalysisParams,
        output: OutputData,
        source_image: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            params: CreationParams::Analyzed(params),
            output,
            result_image: None,
            source_image: Some(source_image.into()),
        }
    }

    pub fn reimagined(
        name: impl Into<String>,
        params: ReimagineParams,
        output: OutputData,
        result_image: impl Into<String>,
        source_image: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            params: CreationParams::Reimagined(params),
            output,
            result_image: Some(result_image.into()),
            source_image: Some(source_image.into()),
        }
    }

    /// Reject image combinations that would leave an image unreferenced.
    fn validate(&self) -> Result<()> {
        let invalid = match self.params.kind() {
            CreationType::Generated => self.source_image.is_some(),
            CreationType::Analyzed => self.result_image.is_some(),
            CreationType::Reimagined => false,
        };
        if invalid {
            return Err(StoreError::InvalidCreation(format!(
                "{} creations do not take that image combination",
                self.params.kind()
            )));
        }
        Ok(())
    }
}

/// Ids minted by [`History::add_creation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCreation {
    pub creation_id: Uuid,
    /// The creation's `image_id`: the result, or the source for analyses.
    pub image_id: Option<Uuid>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    pub creations_imported: usize,
    pub images_imported: usize,
    pub outputs_imported: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub creations: u64,
    pub images: u64,
    pub outputs: u64,
}

/// Mutation and query surface over the local store.
pub struct History {
    db: Database,
}

impl History {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open_at(path)?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn into_database(self) -> Database {
        self.db
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn creation(&self, id: Uuid) -> Result<Option<Creation>> {
        self.db.read(|s| s.get_creation(id))
    }

    /// All creations, newest first.
    pub fn creations(&self) -> Result<Vec<Creation>> {
        self.db.read(|s| s.list_creations())
    }

    pub fn image(&self, id: Uuid) -> Result<Option<Image>> {
        self.db.read(|s| s.get_image(id))
    }

    pub fn output(&self, id: Uuid) -> Result<Option<TextOutput>> {
        self.db.read(|s| s.get_output(id))
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.db.read(|s| {
            Ok(StoreStats {
                creations: s.count(Table::Creations)?,
                images: s.count(Table::Images)?,
                outputs: s.count(Table::TextOutputs)?,
            })
        })
    }

    /// Deliver the full creation list (newest first) now and after every
    /// change to the creations table.
    pub fn subscribe_creations<F>(&mut self, deliver: F) -> Result<SubscriptionId>
    where
        F: FnMut(Vec<Creation>) + Send + 'static,
    {
        self.db
            .subscribe(Table::Creations, |s| s.list_creations(), deliver)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.db.unsubscribe(id)
    }

    // -----------------------------------------------------------------------
    // Creation lifecycle
    // -----------------------------------------------------------------------

    /// Insert a creation with its images and text output in one transaction.
    pub fn add_creation(&mut self, draft: NewCreation) -> Result<CreatedCreation> {
        draft.validate()?;
        let kind = draft.params.kind();

        let created = self.db.transaction(&Table::ALL, |s| {
            let result_id = match &draft.result_image {
                Some(uri) => Some(insert_image(s, uri)?),
                None => None,
            };
            let source_id = match &draft.source_image {
                Some(uri) => Some(insert_image(s, uri)?),
                None => None,
            };

            let output = TextOutput {
                id: Uuid::new_v4(),
                data: draft.output.clone(),
            };
            s.add_output(&output)?;

            let (image_id, original_image_id) = match kind {
                CreationType::Analyzed => (source_id, None),
                CreationType::Reimagined => (result_id, source_id),
                CreationType::Generated => (result_id, None),
            };

            let now = now_millis();
            let creation = Creation {
                id: Uuid::new_v4(),
                name: draft.name.clone(),
                params: draft.params.clone(),
                created_at: now,
                updated_at: now,
                is_translated: false,
                image_id,
                original_image_id,
                output_id: Some(output.id),
            };
            s.add_creation(&creation)?;

            Ok(CreatedCreation {
                creation_id: creation.id,
                image_id,
            })
        })?;

        info!(creation_id = %created.creation_id, kind = %kind, "creation added");
        Ok(created)
    }

    pub fn update_creation_name(&mut self, id: Uuid, name: &str) -> Result<()> {
        self.patch(
            id,
            CreationPatch {
                name: Some(name.to_string()),
                ..Default::default()
            },
        )
    }

    pub fn update_creation_params(&mut self, id: Uuid, params: CreationParams) -> Result<()> {
        self.patch(
            id,
            CreationPatch {
                params: Some(params),
                ..Default::default()
            },
        )
    }

    pub fn update_creation_name_and_params(
        &mut self,
        id: Uuid,
        name: &str,
        params: CreationParams,
    ) -> Result<()> {
        self.patch(
            id,
            CreationPatch {
                name: Some(name.to_string()),
                params: Some(params),
                ..Default::default()
            },
        )
    }

    /// Best-effort flag toggle: failures are logged here and still returned.
    pub fn update_creation_translated_status(&mut self, id: Uuid, translated: bool) -> Result<()> {
        self.patch(
            id,
            CreationPatch {
                is_translated: Some(translated),
                ..Default::default()
            },
        )
        .map_err(|e| {
            warn!(creation_id = %id, error = %e, "failed to update translated status");
            e
        })
    }

    fn patch(&mut self, id: Uuid, patch: CreationPatch) -> Result<()> {
        self.db.transaction(&[Table::Creations], |s| {
            if let Some(params) = &patch.params {
                let current = s
                    .get_creation(id)?
                    .ok_or_else(|| StoreError::not_found(Table::Creations.name(), id))?;
                ensure_same_kind(&current, params)?;
            }
            s.update_creation(id, &patch, now_millis())
        })?;
        debug!(creation_id = %id, "creation updated");
        Ok(())
    }

    /// Regenerate in place: swap the creation's image and text output for
    /// new rows and repoint it, keeping its id.
    pub fn update_creation_image_and_output(
        &mut self,
        id: Uuid,
        params: CreationParams,
        image_data_uri: &str,
        output: OutputData,
    ) -> Result<Creation> {
        let updated = self.db.transaction(&Table::ALL, |s| {
            let current = s
                .get_creation(id)?
                .ok_or_else(|| StoreError::not_found(Table::Creations.name(), id))?;
            ensure_same_kind(&current, &params)?;

            if let Some(old_image) = current.image_id {
                s.delete_image(old_image)?;
            }
            if let Some(old_output) = current.output_id {
                s.delete_output(old_output)?;
            }

            let image_id = insert_image(s, image_data_uri)?;
            let new_output = TextOutput {
                id: Uuid::new_v4(),
                data: output,
            };
            s.add_output(&new_output)?;

            let patch = CreationPatch {
                params: Some(params),
                image_id: Some(image_id),
                output_id: Some(new_output.id),
                ..Default::default()
            };
            s.update_creation(id, &patch, now_millis())?;

            s.get_creation(id)?
                .ok_or_else(|| StoreError::not_found(Table::Creations.name(), id))
        })?;

        info!(creation_id = %id, "creation regenerated");
        Ok(updated)
    }

    /// Delete a creation and every image and output it owns.
    ///
    /// Returns `false` when the creation does not exist. Linked rows that
    /// are already gone are skipped.
    pub fn delete_creation(&mut self, id: Uuid) -> Result<bool> {
        let deleted = self.db.transaction(&Table::ALL, |s| {
            let Some(creation) = s.get_creation(id)? else {
                return Ok(false);
            };
            for image_id in creation.owned_image_ids() {
                s.delete_image(image_id)?;
            }
            if let Some(output_id) = creation.output_id {
                s.delete_output(output_id)?;
            }
            s.delete_creation(id)
        })?;

        if deleted {
            info!(creation_id = %id, "creation deleted");
        } else {
            debug!(creation_id = %id, "delete skipped, creation not found");
        }
        Ok(deleted)
    }

    // -----------------------------------------------------------------------
    // Bulk
    // -----------------------------------------------------------------------

    /// Serialize every row into the ZIP export format.
    pub fn export_data(&self) -> Result<ExportArchive> {
        let (creations, outputs, images) = self
            .db
            .read(|s| Ok((s.list_creations()?, s.list_outputs()?, s.list_images()?)))?;

        let bytes = archive::encode_archive(&creations, &outputs, &images)?;

        info!(
            creations = creations.len(),
            outputs = outputs.len(),
            images = images.len(),
            size = bytes.len(),
            "data exported"
        );

        Ok(ExportArchive {
            file_name: archive::export_file_name(),
            bytes,
        })
    }

    /// Import an archive or legacy JSON export.
    ///
    /// The file is fully validated and decoded first; the clear (in
    /// [`ImportMode::Replace`]) and every insert-or-replace then happen in a
    /// single transaction.
    pub fn import_data(&mut self, source: &ImportSource, mode: ImportMode) -> Result<ImportStats> {
        let payload = archive::decode(source)?;

        let stats = self.db.transaction(&Table::ALL, |s| {
            if mode == ImportMode::Replace {
                for table in Table::ALL {
                    s.clear(table)?;
                }
            }
            Ok(ImportStats {
                images_imported: s.bulk_put_images(&payload.images)?,
                outputs_imported: s.bulk_put_outputs(&payload.outputs)?,
                creations_imported: s.bulk_put_creations(&payload.creations)?,
            })
        })?;

        info!(
            file = %source.file_name,
            ?mode,
            creations = stats.creations_imported,
            images = stats.images_imported,
            outputs = stats.outputs_imported,
            "data imported"
        );
        Ok(stats)
    }

    /// Truncate all three tables atomically.
    pub fn clear_all_data(&mut self) -> Result<()> {
        self.db.transaction(&Table::ALL, |s| {
            for table in Table::ALL {
                s.clear(table)?;
            }
            Ok(())
        })?;
        warn!("all creation data cleared");
        Ok(())
    }
}

fn insert_image(scope: &crate::Scope<'_>, uri: &str) -> Result<Uuid> {
    let image = Image {
        id: Uuid::new_v4(),
        image_data_uri: uri.to_string(),
    };
    scope.add_image(&image)?;
    Ok(image.id)
}

fn ensure_same_kind(current: &Creation, params: &CreationParams) -> Result<()> {
    if current.kind() != params.kind() {
        return Err(StoreError::InvalidCreation(format!(
            "cannot change a {} creation into {}",
            current.kind(),
            params.kind()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::archive::DataUri;

    const PNG: &str = "data:image/png;base64,iVBORw0KGgo=";
    const JPEG: &str = "data:image/jpeg;base64,/9j/4AAQ";

    fn history() -> History {
        History::new(Database::open_in_memory().unwrap())
    }

    fn generated(h: &mut History, name: &str) -> CreatedCreation {
        h.add_creation(NewCreation::generated(
            name,
            GenerationParams {
                culture: "Griega".into(),
                entity: name.into(),
                style: "Oil painting".into(),
                ..Default::default()
            },
            OutputData::Prompt {
                prompt: format!("{name} on Olympus"),
            },
            PNG,
        ))
        .unwrap()
    }

    fn reimagined(h: &mut History) -> CreatedCreation {
        h.add_creation(NewCreation::reimagined(
            "Odin reimagined",
            ReimagineParams {
                culture: "Nórdica".into(),
                entity: "Odin".into(),
                ..Default::default()
            },
            OutputData::DerivedPrompt {
                derived_prompt: "Odin, cyberpunk".into(),
            },
            PNG,
            JPEG,
        ))
        .unwrap()
    }

    fn analyzed(h: &mut History) -> CreatedCreation {
        h.add_creation(NewCreation::analyzed(
            "Ra analysis",
            AnalysisParams {
                culture: "Egipcia".into(),
                entity: "Ra".into(),
                details: String::new(),
            },
            OutputData::Analysis {
                analysis: "Sun disc".into(),
                visual_style: "Relief".into(),
            },
            JPEG,
        ))
        .unwrap()
    }

    fn add_failure_trigger(h: &History, table: &str, when: &str) {
        h.database()
            .conn()
            .execute_batch(&format!(
                "CREATE TRIGGER fail_{table} BEFORE INSERT ON {table} {when}
                 BEGIN SELECT RAISE(ABORT, 'forced failure'); END;"
            ))
            .unwrap();
    }

    fn drop_failure_trigger(h: &History, table: &str) {
        h.database()
            .conn()
            .execute_batch(&format!("DROP TRIGGER fail_{table};"))
            .unwrap();
    }

    #[test]
    fn add_creation_links_rows_per_type() {
        let mut h = history();

        let g = generated(&mut h, "Zeus");
        let c = h.creation(g.creation_id).unwrap().unwrap();
        assert_eq!(c.kind(), CreationType::Generated);
        assert_eq!(c.image_id, g.image_id);
        assert!(c.original_image_id.is_none());
        assert!(!c.is_translated);
        assert_eq!(h.image(c.image_id.unwrap()).unwrap().unwrap().image_data_uri, PNG);

        let a = analyzed(&mut h);
        let c = h.creation(a.creation_id).unwrap().unwrap();
        // the analysed image is the creation's image
        assert_eq!(h.image(c.image_id.unwrap()).unwrap().unwrap().image_data_uri, JPEG);
        assert!(c.original_image_id.is_none());

        let r = reimagined(&mut h);
        let c = h.creation(r.creation_id).unwrap().unwrap();
        assert_eq!(h.image(c.image_id.unwrap()).unwrap().unwrap().image_data_uri, PNG);
        assert_eq!(
            h.image(c.original_image_id.unwrap()).unwrap().unwrap().image_data_uri,
            JPEG
        );
        assert!(matches!(
            h.output(c.output_id.unwrap()).unwrap().unwrap().data,
            OutputData::DerivedPrompt { .. }
        ));

        let stats = h.stats().unwrap();
        assert_eq!((stats.creations, stats.images, stats.outputs), (3, 4, 3));
    }

    #[test]
    fn add_creation_rejects_orphaning_drafts() {
        let mut h = history();
        let mut draft = NewCreation::analyzed(
            "x",
            AnalysisParams::default(),
            OutputData::Prompt { prompt: "p".into() },
            JPEG,
        );
        draft.result_image = Some(PNG.into());
        assert!(matches!(
            h.add_creation(draft),
            Err(StoreError::InvalidCreation(_))
        ));
        assert_eq!(h.stats().unwrap(), StoreStats::default());
    }

    #[test]
    fn add_creation_is_atomic_at_every_step() {
        // (table, condition): fail the first or second image insert, the
        // output insert, or the creation insert.
        let steps = [
            ("images", ""),
            ("images", "WHEN (SELECT COUNT(*) FROM images) >= 1"),
            ("text_outputs", ""),
            ("creations", ""),
        ];

        for (table, when) in steps {
            let mut h = history();
            add_failure_trigger(&h, table, when);

            let draft = NewCreation::reimagined(
                "Odin",
                ReimagineParams::default(),
                OutputData::Prompt { prompt: "p".into() },
                PNG,
                JPEG,
            );
            assert!(h.add_creation(draft).is_err(), "step {table} {when}");
            assert_eq!(h.stats().unwrap(), StoreStats::default(), "step {table} {when}");

            drop_failure_trigger(&h, table);
            reimagined(&mut h);
            assert_eq!(h.stats().unwrap().creations, 1);
        }
    }

    #[test]
    fn delete_reimagined_removes_all_owned_rows() {
        let mut h = history();
        let keep = generated(&mut h, "Athena");
        let r = reimagined(&mut h);

        let before = h.stats().unwrap();
        assert!(h.delete_creation(r.creation_id).unwrap());
        let after = h.stats().unwrap();

        assert_eq!(before.images - after.images, 2);
        assert_eq!(before.outputs - after.outputs, 1);
        assert_eq!(before.creations - after.creations, 1);

        // what remains is exactly the other creation's rows
        let c = h.creation(keep.creation_id).unwrap().unwrap();
        assert!(h.image(c.image_id.unwrap()).unwrap().is_some());
        assert_eq!(after, StoreStats { creations: 1, images: 1, outputs: 1 });

        assert!(!h.delete_creation(r.creation_id).unwrap());
    }

    #[test]
    fn delete_tolerates_missing_links() {
        let mut h = history();
        let g = generated(&mut h, "Hera");
        let c = h.creation(g.creation_id).unwrap().unwrap();
        h.database()
            .conn()
            .execute("DELETE FROM images WHERE id = ?1", [c.image_id.unwrap().to_string()])
            .unwrap();

        assert!(h.delete_creation(g.creation_id).unwrap());
        assert_eq!(h.stats().unwrap(), StoreStats::default());
    }

    #[test]
    fn updates_bump_updated_at_only_on_creation_row() {
        let mut h = history();
        let g = generated(&mut h, "Apollo");
        let before = h.creation(g.creation_id).unwrap().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        h.update_creation_name(g.creation_id, "Phoebus").unwrap();
        h.update_creation_translated_status(g.creation_id, true).unwrap();

        let after = h.creation(g.creation_id).unwrap().unwrap();
        assert_eq!(after.name, "Phoebus");
        assert!(after.is_translated);
        assert!(after.updated_at > before.updated_at);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.image_id, before.image_id);
        assert_eq!(after.output_id, before.output_id);

        let params = CreationParams::Generated(GenerationParams {
            entity: "Apollo".into(),
            culture: "Romana".into(),
            ..Default::default()
        });
        h.update_creation_name_and_params(g.creation_id, "Apolo", params.clone())
            .unwrap();
        let after = h.creation(g.creation_id).unwrap().unwrap();
        assert_eq!(after.name, "Apolo");
        assert_eq!(after.params, params);
    }

    #[test]
    fn update_rejects_missing_id_and_type_change() {
        let mut h = history();
        let missing = Uuid::new_v4();
        assert!(matches!(
            h.update_creation_name(missing, "x"),
            Err(StoreError::NotFound { .. })
        ));
        assert!(h.update_creation_translated_status(missing, true).is_err());

        let g = generated(&mut h, "Ares");
        let err = h
            .update_creation_params(g.creation_id, CreationParams::Analyzed(AnalysisParams::default()))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidCreation(_)));
    }

    #[test]
    fn regenerate_in_place_swaps_image_and_output() {
        let mut h = history();
        let g = generated(&mut h, "Hermes");
        let old = h.creation(g.creation_id).unwrap().unwrap();

        let params = CreationParams::Generated(GenerationParams {
            entity: "Hermes".into(),
            style: "Watercolor".into(),
            ..Default::default()
        });
        let updated = h
            .update_creation_image_and_output(
                g.creation_id,
                params.clone(),
                JPEG,
                OutputData::Prompt {
                    prompt: "Hermes, watercolor".into(),
                },
            )
            .unwrap();

        assert_eq!(updated.id, old.id);
        assert_eq!(updated.params, params);
        assert_ne!(updated.image_id, old.image_id);
        assert_ne!(updated.output_id, old.output_id);
        assert!(h.image(old.image_id.unwrap()).unwrap().is_none());
        assert!(h.output(old.output_id.unwrap()).unwrap().is_none());
        assert_eq!(
            h.image(updated.image_id.unwrap()).unwrap().unwrap().image_data_uri,
            JPEG
        );
        assert_eq!(h.stats().unwrap(), StoreStats { creations: 1, images: 1, outputs: 1 });
    }

    #[test]
    fn regenerate_failure_keeps_old_rows() {
        let mut h = history();
        let g = generated(&mut h, "Hades");
        let old = h.creation(g.creation_id).unwrap().unwrap();
        add_failure_trigger(&h, "text_outputs", "");

        let result = h.update_creation_image_and_output(
            g.creation_id,
            old.params.clone(),
            JPEG,
            OutputData::Prompt { prompt: "new".into() },
        );
        assert!(result.is_err());
        assert_eq!(h.creation(g.creation_id).unwrap().unwrap(), old);
        assert!(h.image(old.image_id.unwrap()).unwrap().is_some());
        assert!(h.output(old.output_id.unwrap()).unwrap().is_some());
    }

    #[test]
    fn export_then_replace_import_round_trips() {
        let mut h = history();
        generated(&mut h, "Poseidon");
        analyzed(&mut h);
        reimagined(&mut h);
        let original = h.creations().unwrap();
        let export = h.export_data().unwrap();
        assert!(export.file_name.ends_with(".zip"));

        let mut fresh = history();
        generated(&mut fresh, "To be replaced");
        let source = ImportSource {
            file_name: export.file_name.clone(),
            mime_type: Some("application/zip".into()),
            bytes: export.bytes,
        };
        let stats = fresh.import_data(&source, ImportMode::Replace).unwrap();
        assert_eq!(stats.creations_imported, 3);

        let imported = fresh.creations().unwrap();
        assert_eq!(imported.len(), original.len());
        for c in &original {
            let twin = imported.iter().find(|i| i.id == c.id).unwrap();
            assert_eq!(twin.name, c.name);
            assert_eq!(twin.kind(), c.kind());
            assert_eq!(twin.params, c.params);
            for image_id in twin.owned_image_ids() {
                let image = fresh.image(image_id).unwrap().unwrap();
                assert!(DataUri::parse(&image.image_data_uri).is_some());
                assert_eq!(image, h.image(image_id).unwrap().unwrap());
            }
        }
        assert_eq!(fresh.stats().unwrap(), h.stats().unwrap());
    }

    #[test]
    fn merge_import_is_idempotent() {
        let mut h = history();
        generated(&mut h, "Artemis");
        reimagined(&mut h);
        let export = h.export_data().unwrap();
        let source = ImportSource {
            file_name: "export.zip".into(),
            mime_type: None,
            bytes: export.bytes,
        };

        let mut target = history();
        let local = generated(&mut target, "Local");
        target.import_data(&source, ImportMode::Merge).unwrap();
        let once_stats = target.stats().unwrap();
        let once = target.creations().unwrap();

        target.import_data(&source, ImportMode::Merge).unwrap();
        assert_eq!(target.stats().unwrap(), once_stats);
        assert_eq!(target.creations().unwrap(), once);
        assert!(target.creation(local.creation_id).unwrap().is_some());
    }

    #[test]
    fn invalid_import_writes_nothing() {
        let mut h = history();
        generated(&mut h, "Demeter");
        let before = h.stats().unwrap();

        let bad = ImportSource {
            file_name: "backup.json".into(),
            mime_type: None,
            bytes: br#"{"creations": []}"#.to_vec(),
        };
        assert!(matches!(
            h.import_data(&bad, ImportMode::Replace),
            Err(StoreError::Archive(_))
        ));
        assert_eq!(h.stats().unwrap(), before);
    }

    #[test]
    fn clear_all_and_live_gallery() {
        let mut h = history();
        let gallery = Arc::new(Mutex::new(Vec::new()));
        let sink = gallery.clone();
        h.subscribe_creations(move |list| {
            *sink.lock().unwrap() = list.into_iter().map(|c| c.name).collect();
        })
        .unwrap();

        generated(&mut h, "First");
        std::thread::sleep(std::time::Duration::from_millis(2));
        generated(&mut h, "Second");
        assert_eq!(*gallery.lock().unwrap(), vec!["Second", "First"]);

        h.clear_all_data().unwrap();
        assert!(gallery.lock().unwrap().is_empty());
        assert_eq!(h.stats().unwrap(), StoreStats::default());
    }
}
