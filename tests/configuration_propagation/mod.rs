use std::fs;

use d_coord::ConfigTree;
use d_coord::View;
use tempfile::tempdir;

use crate::commons::store_in;
use crate::commons::MASTER_TREE;
use crate::commons::PEER_LOCAL_TREE;

#[test]
fn peer_follows_master_snapshot() {
    let dir = tempdir().unwrap();
    let master = store_in(&dir.path().join("master"));
    master.set_remote_tree(ConfigTree::parse(MASTER_TREE).unwrap());
    let version = master.generate_new_version();

    let peer = store_in(&dir.path().join("peer"));
    peer.merge_with_local(&ConfigTree::parse(PEER_LOCAL_TREE).unwrap());
    peer.load_remote_from_compressed_buffer(&master.compressed_data())
        .unwrap();

    assert_eq!(peer.version(), version);
    assert_eq!(peer.name().as_deref(), Some("Production"));
    assert_eq!(peer.refresh_time(), 120);

    // Local options shadow the published ones in the merged view only
    assert_eq!(peer.get_option("/DIRAC/Setup").as_deref(), Some("Certification"));
    assert_eq!(
        peer.extract_option("/DIRAC/Setup", View::Remote).as_deref(),
        Some("Production")
    );
    assert_eq!(
        peer.get_option("/Resources/Sites/LCG/LCG.CERN.ch/CE").as_deref(),
        Some("ce1.cern.ch, ce2.cern.ch")
    );

    assert_eq!(
        peer.servers(),
        vec![
            "dips://peer:9135/Configuration/Server".to_string(),
            "dips://master:9135/Configuration/Server".to_string(),
        ]
    );
    // The peer republishes exactly what it received
    assert_eq!(peer.compressed_data(), master.compressed_data());
}

#[test]
fn corrupted_snapshot_keeps_previous_remote() {
    let dir = tempdir().unwrap();
    let master = store_in(dir.path());
    master.set_remote_tree(ConfigTree::parse(MASTER_TREE).unwrap());

    let peer = store_in(dir.path());
    peer.load_remote_from_compressed_buffer(&master.compressed_data())
        .unwrap();
    let before = peer.version();

    assert!(peer.load_remote_from_compressed_buffer(b"not zlib").is_err());
    assert_eq!(peer.version(), before);
    assert_eq!(peer.name().as_deref(), Some("Production"));
}

#[test]
fn persisted_remote_survives_a_restart() {
    let dir = tempdir().unwrap();
    let master = store_in(dir.path());
    master.set_remote_tree(ConfigTree::parse(MASTER_TREE).unwrap());
    let first = master.generate_new_version();
    let target = master.write_remote_configuration_to_disk(None).unwrap();
    assert_eq!(target, dir.path().join("etc/Production.cfg"));

    master.set_option_in(
        d_coord::Layer::Remote,
        "/DIRAC/Setup",
        "Production-2",
    );
    master.generate_new_version();
    master
        .write_remote_configuration_to_disk(Some(first.as_str()))
        .unwrap();

    // The replaced file went to a dated archive tagged with its version
    let mut archives = Vec::new();
    for year in fs::read_dir(dir.path().join("etc/csbackup")).unwrap() {
        for month in fs::read_dir(year.unwrap().path()).unwrap() {
            for archive in fs::read_dir(month.unwrap().path()).unwrap() {
                archives.push(archive.unwrap().file_name().into_string().unwrap());
            }
        }
    }
    assert_eq!(archives, vec![format!("Production.{first}.zip")]);

    let restarted = store_in(dir.path());
    assert!(restarted.load_file(&target).unwrap());
    assert_eq!(
        restarted.extract_option("/DIRAC/Setup", View::Local).as_deref(),
        Some("Production-2")
    );
}
