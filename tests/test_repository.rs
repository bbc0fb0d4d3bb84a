mod common;

use chrono::{Duration, Utc};
use revstore::*;

// ---------------------------------------------------------------------------
// create / open / exists
// ---------------------------------------------------------------------------

#[test]
fn create_starts_at_revision_zero() {
    let dir = tempfile::tempdir().unwrap();
    let repo = common::create_repo(dir.path());
    let latest = repo.latest_revision().unwrap();
    assert_eq!(latest.number(), 0);
    assert!(latest.files_at("/").unwrap().is_empty());
    assert!(latest.directories_at("/").unwrap().is_empty());
    assert_eq!(repo.location(), dir.path().join("repo.git"));
}

#[test]
fn create_twice_is_a_collision() {
    let dir = tempfile::tempdir().unwrap();
    let _repo = common::create_repo(dir.path());
    let err = GitRepository::create(dir.path().join("repo.git"), &BackendConfig::default())
        .unwrap_err();
    assert!(matches!(err.as_conflict(), Some(Conflict::Collision(_))));
}

#[test]
fn create_over_plain_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("occupied");
    std::fs::write(&location, b"not a repository").unwrap();
    match GitRepository::create(&location, &BackendConfig::default()) {
        Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::AlreadyExists),
        other => panic!("expected io error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn exists_probe() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("repo.git");
    assert!(!GitRepository::exists(&location));
    assert!(!GitRepository::exists(dir.path()));
    let _repo = common::create_repo(dir.path());
    assert!(GitRepository::exists(&location));
}

#[test]
fn open_existing() {
    let dir = tempfile::tempdir().unwrap();
    let repo = common::repo_with_files(dir.path());
    drop(repo);

    let repo = GitRepository::open(dir.path().join("repo.git"), &BackendConfig::default()).unwrap();
    assert_eq!(repo.latest_revision().unwrap().number(), 1);
    assert!(repo.latest_revision().unwrap().path_exists("/dir/a.txt").unwrap());
}

#[test]
fn open_missing_errors() {
    let dir = tempfile::tempdir().unwrap();
    let err = GitRepository::open(dir.path().join("nope.git"), &BackendConfig::default())
        .unwrap_err();
    assert!(matches!(err, Error::RepositoryNotFound(_)));
}

#[test]
fn open_with_other_branch_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let _repo = common::create_repo(dir.path());
    let config = BackendConfig {
        branch: "other".into(),
        ..Default::default()
    };
    assert!(matches!(
        GitRepository::open(dir.path().join("repo.git"), &config),
        Err(Error::RepositoryNotFound(_))
    ));
}

#[test]
fn create_with_invalid_branch_errors() {
    let dir = tempfile::tempdir().unwrap();
    let config = BackendConfig {
        branch: "bad branch".into(),
        ..Default::default()
    };
    assert!(matches!(
        GitRepository::create(dir.path().join("repo.git"), &config),
        Err(Error::InvalidPath(_))
    ));
}

#[test]
fn custom_branch_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = BackendConfig {
        branch: "course/2024".into(),
        author: "admin".into(),
        ..Default::default()
    };
    let location = dir.path().join("repo.git");
    let repo = GitRepository::create(&location, &config).unwrap();
    assert_eq!(repo.revision(0).unwrap().author().unwrap().as_deref(), Some("admin"));
    drop(repo);

    let repo = GitRepository::open(&location, &config).unwrap();
    common::add_files(&repo, "bob", &[("/x.txt", b"x")]);
    assert_eq!(repo.backend().config().branch, "course/2024");
    assert_eq!(repo.latest_revision().unwrap().number(), 1);
}

// ---------------------------------------------------------------------------
// revisions
// ---------------------------------------------------------------------------

#[test]
fn revision_beyond_youngest_errors() {
    let dir = tempfile::tempdir().unwrap();
    let repo = common::repo_with_files(dir.path());
    assert!(repo.revision(1).is_ok());
    assert!(matches!(repo.revision(2), Err(Error::RevisionDoesNotExist(2))));
}

#[test]
fn revision_outliving_repository_is_closed() {
    let dir = tempfile::tempdir().unwrap();
    let repo = common::repo_with_files(dir.path());
    let rev = repo.latest_revision().unwrap();
    let clone = repo.clone();
    drop(repo);
    // a clone keeps the backend alive
    assert!(rev.path_exists("/hello.txt").unwrap());
    drop(clone);
    assert!(matches!(rev.files_at("/"), Err(Error::RepositoryClosed)));
    assert!(matches!(rev.author(), Err(Error::RepositoryClosed)));
}

#[test]
fn revision_at_or_before_far_past_is_zero() {
    let dir = tempfile::tempdir().unwrap();
    let repo = common::repo_with_files(dir.path());
    let past = Utc::now() - Duration::days(365);
    assert_eq!(repo.revision_at_or_before(past).unwrap().number(), 0);
}

#[test]
fn revision_at_or_before_future_is_youngest() {
    let dir = tempfile::tempdir().unwrap();
    let repo = common::repo_with_files(dir.path());
    common::add_files(&repo, "bob", &[("/more.txt", b"more")]);
    let future = Utc::now() + Duration::hours(1);
    assert_eq!(repo.revision_at_or_before(future).unwrap().number(), 2);
}

#[test]
fn revision_at_or_before_is_maximal() {
    let dir = tempfile::tempdir().unwrap();
    let repo = common::repo_with_files(dir.path());
    common::add_files(&repo, "bob", &[("/more.txt", b"more")]);

    let t = repo.revision(1).unwrap().timestamp().unwrap();
    let found = repo.revision_at_or_before(t).unwrap();
    assert!(found.number() >= 1);
    assert!(found.timestamp().unwrap() <= t);
    if found.number() < 2 {
        assert!(repo.revision(found.number() + 1).unwrap().timestamp().unwrap() > t);
    }
}

#[test]
fn revision_at_or_before_parsed_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let repo = common::repo_with_files(dir.path());
    let t = parse_timestamp("2001-02-03T04:05:06Z").unwrap();
    assert_eq!(repo.revision_at_or_before(t).unwrap().number(), 0);
    assert!(matches!(
        parse_timestamp("last tuesday"),
        Err(Error::InvalidTimestamp(_))
    ));
}

// ---------------------------------------------------------------------------
// transactions and reads
// ---------------------------------------------------------------------------

#[test]
fn begin_transaction_requires_user() {
    let dir = tempfile::tempdir().unwrap();
    let repo = common::create_repo(dir.path());
    assert!(matches!(
        repo.begin_transaction("", "anonymous"),
        Err(Error::MissingActor)
    ));
    let txn = repo.begin_transaction("alice", "").unwrap();
    assert_eq!(txn.user_id(), "alice");
    assert!(txn.is_empty());
}

#[test]
fn read_file_contents_preserves_order() {
    let dir = tempfile::tempdir().unwrap();
    let repo = common::repo_with_files(dir.path());
    let files = repo.latest_revision().unwrap().files_at("/dir").unwrap();
    let entries = vec![files["b.txt"].clone(), files["a.txt"].clone(), files["b.txt"].clone()];
    let contents = repo.read_file_contents(&entries).unwrap();
    assert_eq!(
        contents,
        vec![b"bbb".to_vec(), b"aaa".to_vec(), b"bbb".to_vec()]
    );
}

#[test]
fn read_file_content_reads_listed_revision() {
    let dir = tempfile::tempdir().unwrap();
    let repo = common::repo_with_files(dir.path());
    let old = repo.latest_revision().unwrap().files_at("/").unwrap()["hello.txt"].clone();

    let mut txn = repo.begin_transaction("bob", "bye").unwrap();
    txn.remove("/hello.txt", 1).unwrap();
    common::committed(repo.commit(txn).unwrap());

    assert!(!repo.latest_revision().unwrap().path_exists("/hello.txt").unwrap());
    assert_eq!(repo.read_file_content(&old).unwrap(), b"hello");
}

#[test]
fn read_missing_file_is_file_does_not_exist() {
    let dir = tempfile::tempdir().unwrap();
    let repo = common::repo_with_files(dir.path());
    let mut entry = repo.latest_revision().unwrap().files_at("/").unwrap()["hello.txt"].clone();
    entry.name = "ghost.txt".into();

    let err = repo.read_file_content(&entry).unwrap_err();
    assert_eq!(
        err.as_conflict(),
        Some(&Conflict::FileDoesNotExist("/ghost.txt".into()))
    );
    assert!(repo.read_file_contents(&[entry]).is_err());
}

#[test]
fn reading_a_directory_is_file_does_not_exist() {
    let dir = tempfile::tempdir().unwrap();
    let repo = common::repo_with_files(dir.path());
    let mut entry = repo.latest_revision().unwrap().files_at("/").unwrap()["hello.txt"].clone();
    entry.name = "dir".into();
    assert!(matches!(
        repo.read_file_content(&entry).unwrap_err().as_conflict(),
        Some(Conflict::FileDoesNotExist(p)) if p == "/dir"
    ));
}
