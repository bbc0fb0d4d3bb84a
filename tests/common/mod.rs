use std::path::Path;

use revstore::*;

pub fn create_repo(dir: &Path) -> GitRepository {
    GitRepository::create(dir.join("repo.git"), &BackendConfig::default()).unwrap()
}

/// Commit `files` as new files by `user`, returning the new revision.
#[allow(dead_code)]
pub fn add_files(repo: &GitRepository, user: &str, files: &[(&str, &[u8])]) -> u64 {
    let mut txn = repo.begin_transaction(user, "add files").unwrap();
    for (path, data) in files {
        txn.add(path, data.to_vec(), "text/plain").unwrap();
    }
    committed(repo.commit(txn).unwrap())
}

/// The revision of a commit expected to go through.
#[allow(dead_code)]
pub fn committed(outcome: CommitOutcome) -> u64 {
    match outcome {
        CommitOutcome::Committed { revision } => revision,
        CommitOutcome::Conflicts(txn) => panic!("unexpected conflicts: {:?}", txn.conflicts()),
    }
}

/// The conflicts of a commit expected to be rejected.
#[allow(dead_code)]
pub fn rejected(outcome: CommitOutcome) -> Vec<Conflict> {
    match outcome {
        CommitOutcome::Committed { revision } => panic!("unexpectedly committed r{}", revision),
        CommitOutcome::Conflicts(txn) => txn.conflicts().to_vec(),
    }
}

#[allow(dead_code)]
pub fn repo_with_files(dir: &Path) -> GitRepository {
    let repo = create_repo(dir);
    add_files(
        &repo,
        "alice",
        &[
            ("/hello.txt", b"hello"),
            ("/dir/a.txt", b"aaa"),
            ("/dir/b.txt", b"bbb"),
        ],
    );
    repo
}
