//! Wiring of the admission pipeline from configuration.

use anyhow::{Context, Result};
use segadmit_common::config::MetadataBackend;
use segadmit_common::{Config, SegmentCrc, SegmentKey, SegmentMetadata, SegmentName, TableName, Timestamp};
use segadmit_meta_store::{MemoryMetaStore, RedbMetaStore, VersionedMetadataStore};
use segadmit_storage::{SegmentFsRegistry, SegmentPlacer, final_segment_uri};
use segadmit_upload::{AdmitRequest, LoggingResourceManager, UploadCoordinator, UploadHeaders};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Load the TOML config file, falling back to defaults if it does not exist
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&config_str)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

/// Log level; an explicit CLI value wins over the config file
pub fn log_level(cli: Option<String>, config: &Config) -> String {
    cli.unwrap_or_else(|| config.logging.level.clone())
}

/// Metadata database path; relative paths live under the data directory
pub fn metadata_path(config: &Config) -> PathBuf {
    config.storage.data_dir.join(&config.metadata.path)
}

/// Open the configured metadata store
pub fn open_store(config: &Config) -> Result<Arc<dyn VersionedMetadataStore>> {
    let store: Arc<dyn VersionedMetadataStore> = match config.metadata.backend {
        MetadataBackend::Memory => Arc::new(MemoryMetaStore::new()),
        MetadataBackend::Redb => {
            let path = metadata_path(config);
            Arc::new(
                RedbMetaStore::open(&path).with_context(|| {
                    format!("failed to open metadata store at {}", path.display())
                })?,
            )
        }
    };
    info!("Using {} metadata store", store.name());
    Ok(store)
}

/// Build a coordinator over `store` with local placement
pub fn build_coordinator(
    config: &Config,
    store: Arc<dyn VersionedMetadataStore>,
) -> UploadCoordinator {
    let placer = SegmentPlacer::new(Arc::new(SegmentFsRegistry::with_local()));
    UploadCoordinator::new(
        store,
        placer,
        Arc::new(LoggingResourceManager),
        config.upload.clone(),
    )
}

/// Parameters of the `admit` command
#[derive(Debug, Default)]
pub struct AdmitParams {
    pub table: String,
    pub segment: String,
    pub file: PathBuf,
    pub crc: Option<u64>,
    pub creation_time: Option<u64>,
    pub final_uri: Option<String>,
    pub download_uri: Option<String>,
    pub headers: UploadHeaders,
    pub no_move: bool,
    pub no_parallel_push_protection: bool,
}

/// Build the admission request for `params`, computing the crc if not given
pub fn admit_request(config: &Config, params: AdmitParams) -> Result<AdmitRequest> {
    let key = segment_key(&params.table, &params.segment)?;
    let crc = match params.crc {
        Some(crc) => crc,
        None => {
            SegmentCrc::compute_file(&params.file)
                .with_context(|| format!("failed to checksum {}", params.file.display()))?
                .value
        }
    };
    let creation_time = params
        .creation_time
        .map_or_else(Timestamp::now, Timestamp::from_millis);
    let final_uri = match params.final_uri {
        Some(uri) => uri,
        None => final_segment_uri(&config.storage.segment_root, &key)?,
    };

    let mut request = AdmitRequest::new(
        key.table,
        SegmentMetadata::new(key.segment, crc, creation_time),
        params.file,
        final_uri,
    )
    .with_headers(params.headers)
    .with_move_to_final_location(config.upload.move_to_final_location && !params.no_move)
    .with_parallel_push_protection(
        config.upload.parallel_push_protection && !params.no_parallel_push_protection,
    );
    if let Some(uri) = params.download_uri {
        request = request.with_download_uri(uri);
    }
    Ok(request)
}

pub fn segment_key(table: &str, segment: &str) -> Result<SegmentKey> {
    Ok(SegmentKey::new(
        TableName::new(table)?,
        SegmentName::new(segment)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use segadmit_upload::AdmitOutcome;

    fn config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.metadata.path = dir.join("meta.redb");
        config.storage.segment_root = format!("file://{}", dir.join("segments").display());
        config
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_config(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(missing.upload.lock_timeout_ms, 600_000);

        let path = dir.path().join("controller.toml");
        std::fs::write(
            &path,
            "[upload]\nlock_timeout_ms = 1000\n\n[metadata]\nbackend = \"memory\"\n",
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.upload.lock_timeout_ms, 1000);
        assert_eq!(config.metadata.backend, MetadataBackend::Memory);

        std::fs::write(&path, "[upload\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[tokio::test]
    async fn test_admit_through_redb() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let staging = dir.path().join("upload.seg");
        std::fs::write(&staging, b"segment bytes").unwrap();

        let store = open_store(&config).unwrap();
        let coordinator = build_coordinator(&config, store.clone());
        let request = admit_request(
            &config,
            AdmitParams {
                table: "events".to_string(),
                segment: "seg_0".to_string(),
                file: staging.clone(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            request.metadata.crc,
            SegmentCrc::compute(b"segment bytes").value
        );

        let outcome = coordinator.admit_segment(request).await.unwrap();
        assert!(matches!(outcome, AdmitOutcome::Created(_)));
        let placed = dir.path().join("segments").join("events_OFFLINE").join("seg_0");
        assert_eq!(std::fs::read(placed).unwrap(), b"segment bytes");

        let key = segment_key("events", "seg_0").unwrap();
        assert!(store.read(&key).await.unwrap().is_some());
    }

    #[test]
    fn test_metadata_path() {
        let mut config = Config::default();
        config.storage.data_dir = PathBuf::from("/srv/segadmit");
        config.metadata.path = PathBuf::from("meta.redb");
        assert_eq!(metadata_path(&config), PathBuf::from("/srv/segadmit/meta.redb"));

        config.metadata.path = PathBuf::from("/elsewhere/meta.redb");
        assert_eq!(metadata_path(&config), PathBuf::from("/elsewhere/meta.redb"));
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(segment_key("", "seg").is_err());
        assert!(segment_key("events", "a/b").is_err());
        assert!(segment_key("events", ".").is_err());
        assert!(segment_key("events", "..").is_err());
    }

    #[tokio::test]
    async fn test_dot_segment_rejected_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let staging = dir.path().join("upload.seg");
        std::fs::write(&staging, b"segment bytes").unwrap();

        for segment in [".", ".."] {
            let result = admit_request(
                &config,
                AdmitParams {
                    table: "events".to_string(),
                    segment: segment.to_string(),
                    file: staging.clone(),
                    ..Default::default()
                },
            );
            assert!(result.is_err(), "{segment:?} accepted");
        }
        // Nothing was placed and no metadata store was created
        assert!(!dir.path().join("segments").exists());
        assert!(!dir.path().join("meta.redb").exists());
        assert_eq!(std::fs::read(&staging).unwrap(), b"segment bytes");
    }

    #[test]
    fn test_log_level_precedence() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        assert_eq!(log_level(None, &config), "debug");
        // An explicit level equal to the default still wins
        assert_eq!(log_level(Some("info".to_string()), &config), "info");
        assert_eq!(log_level(Some("trace".to_string()), &config), "trace");
    }
}
