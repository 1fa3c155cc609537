use std::path::{Path, PathBuf};
use std::sync::Arc;

use remote_runner::errors::RunnerError;
use remote_runner::fs::mock::MockFileSystem;
use remote_runner::fs::FileSystem;
use remote_runner::store::{DropZone, QueueItem};
use remote_runner_test_utils::{init_tracing, mock_drop_zone, SPOOL};
use tempfile::tempdir;
use uuid::Uuid;

#[test]
fn persisted_item_reads_back_identically() {
    init_tracing();
    let (_fs, zone) = mock_drop_zone();

    let mut item = zone.create_item("C:\\Models\\Tower.doc", "/modules/exports.toml", "SheetExport");
    item.add_argument("--sheets");
    item.add_argument("A101,A102");

    let path = zone.persist(&item).unwrap();
    assert_eq!(path, item.item_path());
    assert_eq!(path, Path::new(SPOOL).join(format!("{}.job", item.id())));

    let scanned = zone.scan_all().unwrap();
    assert_eq!(scanned, vec![item]);
}

#[test]
fn persist_leaves_no_temp_file_behind() {
    let (fs, zone) = mock_drop_zone();
    let item = zone.create_item("/docs/a.doc", "m.toml", "T");
    zone.persist(&item).unwrap();

    let names = fs.list(SPOOL);
    assert_eq!(names, vec![format!("{}.job", item.id())]);
}

#[test]
fn mark_complete_is_idempotent() {
    let (_fs, zone) = mock_drop_zone();
    let item = zone.create_item("/docs/a.doc", "m.toml", "T");
    zone.persist(&item).unwrap();
    assert!(!zone.is_complete(&item));

    zone.mark_complete(&item).unwrap();
    assert!(zone.is_complete(&item));

    zone.mark_complete(&item).unwrap();
    assert!(zone.is_complete(&item));
}

#[test]
fn applicability_ignores_case_only() {
    let item = QueueItem::create("C:\\Models\\Tower.DOC", "m", "T", SPOOL);

    assert!(item.is_applicable_to("c:\\models\\tower.doc"));
    assert!(item.is_applicable_to("C:\\Models\\Tower.DOC"));
    assert!(!item.is_applicable_to("C:/Models/Tower.doc"));
    assert!(!item.is_applicable_to("C:\\Models\\Tower.doc "));
}

#[test]
fn scan_skips_malformed_descriptors() {
    init_tracing();
    let (fs, zone) = mock_drop_zone();

    let good: Vec<QueueItem> = (0..3)
        .map(|i| {
            let item = zone.create_item(format!("/docs/{i}.doc"), "m.toml", "T");
            zone.persist(&item).unwrap();
            item
        })
        .collect();

    fs.add_file(format!("{SPOOL}/{}.job", Uuid::now_v7()), "this is = = not toml");
    fs.add_file(format!("{SPOOL}/{}.job", Uuid::now_v7()), "target_resource = \"/docs/x\"\n");

    let scanned = zone.scan_all().unwrap();
    assert_eq!(scanned.len(), good.len());
    assert_eq!(scanned, good);
}

#[test]
fn scan_ignores_temp_and_foreign_files() {
    let (fs, zone) = mock_drop_zone();
    let item = zone.create_item("/docs/a.doc", "m.toml", "T");
    zone.persist(&item).unwrap();

    fs.add_file(format!("{SPOOL}/.{}.job.tmp", Uuid::now_v7()), "partial");
    fs.add_file(format!("{SPOOL}/notes.txt"), "hello");

    assert_eq!(zone.scan_all().unwrap(), vec![item]);
}

#[test]
fn scan_skips_descriptor_whose_id_disagrees_with_file_name() {
    let (fs, zone) = mock_drop_zone();
    let item = zone.create_item("/docs/a.doc", "m.toml", "T");
    let text = item.to_toml().unwrap();
    fs.add_file(format!("{SPOOL}/{}.job", Uuid::now_v7()), text);

    assert!(zone.scan_all().unwrap().is_empty());
}

#[test]
fn scan_skips_descriptors_with_non_canonical_names() {
    init_tracing();
    let (fs, zone) = mock_drop_zone();
    let item = zone.create_item("/docs/a.doc", "m.toml", "T");
    let text = item.to_toml().unwrap();
    let upper_id = item.id().to_string().to_uppercase();

    fs.add_file(format!("{SPOOL}/{upper_id}.JOB"), text.clone());
    fs.add_file(format!("{SPOOL}/{upper_id}.job"), text.clone());
    fs.add_file(format!("{SPOOL}/{}.JOB", item.id()), text.clone());
    fs.add_file(format!("{SPOOL}/{}.job", item.id().simple()), text);

    assert!(zone.scan_all().unwrap().is_empty());
    assert_eq!(fs.list(SPOOL).len(), 4);
}

#[test]
fn every_scanned_item_is_deleted_by_mark_complete() {
    let (fs, zone) = mock_drop_zone();
    let item = zone.create_item("/docs/a.doc", "m.toml", "T");
    zone.persist(&item).unwrap();
    fs.add_file(
        format!("{SPOOL}/{}.JOB", item.id().to_string().to_uppercase()),
        item.to_toml().unwrap(),
    );

    for scanned in zone.scan_all().unwrap() {
        zone.mark_complete(&scanned).unwrap();
    }
    assert!(zone.scan_all().unwrap().is_empty());
    assert!(zone.is_complete(&item));
}

#[test]
fn scan_prunes_stale_temp_files_only() {
    init_tracing();
    let (fs, zone) = mock_drop_zone();
    let item = zone.create_item("/docs/a.doc", "m.toml", "T");
    zone.persist(&item).unwrap();

    // Minted in 2022: left behind by a publish that never renamed.
    let stale = "017f22e2-79b0-7cc3-98c4-dc0c0c07398f";
    let fresh = Uuid::now_v7();
    fs.add_file(format!("{SPOOL}/.{stale}.job.tmp"), "partial");
    fs.add_file(format!("{SPOOL}/.{fresh}.job.tmp"), "in flight");
    fs.add_file(format!("{SPOOL}/.{}.job.tmp", Uuid::nil()), "no timestamp");
    fs.add_file(format!("{SPOOL}/.notes.tmp"), "not ours");

    assert_eq!(zone.scan_all().unwrap(), vec![item.clone()]);

    let mut names = fs.list(SPOOL);
    names.sort();
    let mut expected = vec![
        format!(".{fresh}.job.tmp"),
        format!(".{}.job.tmp", Uuid::nil()),
        ".notes.tmp".to_string(),
        format!("{}.job", item.id()),
    ];
    expected.sort();
    assert_eq!(names, expected);
}

#[test]
fn scan_returns_items_in_creation_order() {
    let (_fs, zone) = mock_drop_zone();
    let ids: Vec<Uuid> = (0..5)
        .map(|i| {
            let item = zone.create_item("/docs/a.doc", "m.toml", format!("T{i}"));
            zone.persist(&item).unwrap();
            item.id()
        })
        .collect();

    let scanned: Vec<Uuid> = zone.scan_all().unwrap().iter().map(|i| i.id()).collect();
    assert_eq!(scanned, ids);
}

#[test]
fn scan_of_missing_directory_is_empty() {
    let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
    let zone = DropZone::new("/nowhere", fs);
    assert!(zone.scan_all().unwrap().is_empty());
}

#[test]
fn scan_of_unreadable_directory_is_a_store_error() {
    let fs = MockFileSystem::new();
    fs.add_file(SPOOL, "a file, not a directory");
    let zone = DropZone::new(SPOOL, Arc::new(fs));

    let err = zone.scan_all().unwrap_err();
    assert!(matches!(err, RunnerError::StoreIo { .. }), "got {err:?}");
}

#[test]
fn scanned_items_are_rebound_to_the_scanned_directory() {
    let fs = MockFileSystem::new();
    let recorded_root = PathBuf::from("/mnt/share/spool");
    let item = QueueItem::create("/docs/a.doc", "m.toml", "T", &recorded_root);
    fs.add_file(
        format!("{SPOOL}/{}.job", item.id()),
        item.to_toml().unwrap(),
    );

    let zone = DropZone::new(SPOOL, Arc::new(fs));
    let scanned = zone.scan_all().unwrap();
    assert_eq!(scanned.len(), 1);
    assert_eq!(scanned[0].store_root(), Path::new(SPOOL));

    zone.mark_complete(&scanned[0]).unwrap();
    assert!(zone.scan_all().unwrap().is_empty());
}

#[test]
fn on_disk_drop_zone_publishes_and_deletes() {
    init_tracing();
    let dir = tempdir().unwrap();
    let root = dir.path().join("spool");
    let zone = DropZone::on_disk(&root);

    let item = zone.create_item("/docs/a.doc", "m.toml", "T");
    let path = zone.persist(&item).unwrap();
    assert!(path.is_file());

    let leftovers: Vec<_> = std::fs::read_dir(&root)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(leftovers, vec![format!("{}.job", item.id())]);

    assert_eq!(zone.scan_all().unwrap(), vec![item.clone()]);
    zone.mark_complete(&item).unwrap();
    assert!(!path.exists());
}
