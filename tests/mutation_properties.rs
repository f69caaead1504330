//! Pipeline behavior against the in-memory forge.

use std::sync::Arc;

use ghtree::core::types::{BlobContent, BranchName, Oid, RefUpdatePolicy};
use ghtree::forge::mock::{FailOn, MockForge, OperationKind};
use ghtree::forge::ForgeError;
use ghtree::repo::{locate_entry, CommitOptions, Repository, RepositorySettings};

fn main_branch() -> BranchName {
    BranchName::new("main").unwrap()
}

fn seeded() -> MockForge {
    let forge = MockForge::new("o", "r");
    forge.seed_commit(
        "main",
        &[
            ("README.md", b"readme".as_slice()),
            ("docs/guide.md", b"guide".as_slice()),
            ("docs/api/index.md", b"api".as_slice()),
        ],
        "init",
    );
    forge
}

fn repository(forge: &MockForge) -> Repository {
    Repository::new(Arc::new(forge.clone()), "o", "r")
}

mod round_trip {
    use super::*;

    #[tokio::test]
    async fn text_write_reads_back() {
        let forge = seeded();
        let mut repo = repository(&forge);
        repo.write(&main_branch(), "notes/today.md", "hello", CommitOptions::message("notes"))
            .await
            .unwrap();

        let file = repo.read(&main_branch(), "notes/today.md").await.unwrap().unwrap();
        assert_eq!(file.content, BlobContent::Text("hello".into()));
        assert_eq!(
            repo.read(&main_branch(), "docs/guide.md").await.unwrap().unwrap().content,
            BlobContent::Text("guide".into())
        );
    }

    #[tokio::test]
    async fn binary_write_reads_back_unchanged() {
        let forge = seeded();
        let mut repo = repository(&forge);
        let bytes = vec![0x89, b'P', b'N', b'G', 0x00, 0xff, 0xfe];
        repo.write(&main_branch(), "img.png", bytes.clone(), CommitOptions::message("img"))
            .await
            .unwrap();

        let file = repo.read(&main_branch(), "img.png").await.unwrap().unwrap();
        assert_eq!(file.content, BlobContent::Binary(bytes.clone()));
        assert_eq!(forge.file_at("main", "img.png"), Some(bytes));
    }

    #[tokio::test]
    async fn binary_that_happens_to_be_text_reads_back_equal() {
        let forge = seeded();
        let mut repo = repository(&forge);
        let written = BlobContent::Binary(b"plain ascii".to_vec());
        repo.write(&main_branch(), "data.bin", written.clone(), CommitOptions::message("data"))
            .await
            .unwrap();

        let file = repo.read(&main_branch(), "data.bin").await.unwrap().unwrap();
        assert_eq!(file.content, written);
        assert_eq!(file.content.as_bytes(), b"plain ascii");
    }

    #[tokio::test]
    async fn overwrite_keeps_single_entry() {
        let forge = seeded();
        let mut repo = repository(&forge);
        repo.write(&main_branch(), "README.md", "v2", CommitOptions::message("v2"))
            .await
            .unwrap();

        let tree = forge.flat_tree("main");
        assert_eq!(tree.iter().filter(|e| e.path == "README.md").count(), 1);
        assert_eq!(forge.file_at("main", "README.md"), Some(b"v2".to_vec()));
    }
}

mod tree_edits {
    use super::*;

    #[tokio::test]
    async fn remove_directory_drops_descendants_and_recomputes_parents() {
        let forge = seeded();
        let before = forge.flat_tree("main");
        let docs_before = locate_entry(&before, "docs").and_then(|e| e.sha.clone());

        let mut repo = repository(&forge);
        repo.remove(&main_branch(), "docs/api").await.unwrap();

        let after = forge.flat_tree("main");
        assert!(after.iter().all(|e| !e.path.starts_with("docs/api")));
        assert!(locate_entry(&after, "docs/guide.md").is_some());
        let docs_after = locate_entry(&after, "docs").and_then(|e| e.sha.clone());
        assert!(docs_after.is_some());
        assert_ne!(docs_before, docs_after);
    }

    #[tokio::test]
    async fn move_directory_preserves_blobs() {
        let forge = seeded();
        let blob = locate_entry(&forge.flat_tree("main"), "docs/guide.md")
            .and_then(|e| e.sha.clone())
            .unwrap();

        let mut repo = repository(&forge);
        repo.move_path(&main_branch(), "docs", "manual").await.unwrap();

        let after = forge.flat_tree("main");
        assert!(locate_entry(&after, "docs").is_none());
        assert_eq!(
            locate_entry(&after, "manual/guide.md").and_then(|e| e.sha.clone()),
            Some(blob)
        );
        assert_eq!(forge.file_at("main", "manual/api/index.md"), Some(b"api".to_vec()));
        let tip = forge.ref_sha("main").unwrap();
        assert_eq!(forge.commit_message(&tip).unwrap(), "Moved docs to manual");
    }

    #[tokio::test]
    async fn removing_absent_path_still_commits() {
        let forge = seeded();
        let before = forge.ref_sha("main").unwrap();
        let mut repo = repository(&forge);
        let outcome = repo.remove(&main_branch(), "nope.txt").await.unwrap();

        assert_eq!(outcome.parent, before);
        assert_eq!(forge.ref_sha("main"), Some(outcome.commit.clone()));
        assert_eq!(forge.commit_tree(&outcome.commit), forge.commit_tree(&before));
    }
}

mod history {
    use super::*;

    #[tokio::test]
    async fn sequential_writes_form_linear_history() {
        let forge = seeded();
        let root = forge.ref_sha("main").unwrap();
        let mut repo = repository(&forge);

        let first = repo
            .write(&main_branch(), "a", "1", CommitOptions::message("one"))
            .await
            .unwrap();
        let second = repo
            .write(&main_branch(), "b", "2", CommitOptions::message("two"))
            .await
            .unwrap();

        assert_eq!(first.parent, root);
        assert_eq!(second.parent, first.commit);
        assert_eq!(forge.commit_parents(&second.commit), Some(vec![first.commit.clone()]));
        assert_eq!(forge.commit_parents(&first.commit), Some(vec![root]));
    }

    #[tokio::test]
    async fn second_mutation_reuses_cached_tip() {
        let forge = seeded();
        let mut repo = repository(&forge);
        repo.write(&main_branch(), "a", "1", CommitOptions::message("one"))
            .await
            .unwrap();
        forge.clear_operations();

        repo.write(&main_branch(), "b", "2", CommitOptions::message("two"))
            .await
            .unwrap();
        assert!(!forge.operation_kinds().contains(&OperationKind::GetRef));
    }

    #[tokio::test]
    async fn resolve_tip_queries_remote_once() {
        let forge = seeded();
        let mut repo = repository(&forge);
        let a = repo.resolve_tip(&main_branch()).await.unwrap();
        let b = repo.resolve_tip(&main_branch()).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(forge.operation_kinds(), vec![OperationKind::GetRef]);
    }

    #[tokio::test]
    async fn switching_branch_refetches_tip() {
        let forge = seeded();
        forge.seed_commit("dev", &[("d", b"d".as_slice())], "dev");
        let mut repo = repository(&forge);

        let main = repo.resolve_tip(&main_branch()).await.unwrap();
        let dev = repo.resolve_tip(&BranchName::new("dev").unwrap()).await.unwrap();

        assert_ne!(main, dev);
        assert_eq!(
            forge.operation_kinds(),
            vec![OperationKind::GetRef, OperationKind::GetRef]
        );
    }
}

mod concurrency {
    use super::*;

    fn cas(forge: &MockForge) -> Repository {
        repository(forge).with_settings(RepositorySettings {
            ref_update: RefUpdatePolicy::CompareAndSwap,
            ..RepositorySettings::default()
        })
    }

    #[tokio::test]
    async fn compare_and_swap_detects_interleaved_writer() {
        let forge = seeded();
        let mut alice = cas(&forge);
        let mut bob = cas(&forge);

        alice.resolve_tip(&main_branch()).await.unwrap();
        bob.write(&main_branch(), "bob.txt", "b", CommitOptions::message("bob"))
            .await
            .unwrap();
        let bobs_tip = forge.ref_sha("main").unwrap();

        let err = alice
            .write(&main_branch(), "alice.txt", "a", CommitOptions::message("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::Conflict { .. }));
        assert_eq!(forge.ref_sha("main"), Some(bobs_tip.clone()));
        assert!(alice.tip().sha().is_none());

        // A retry reads the new tip and succeeds.
        let retry = alice
            .write(&main_branch(), "alice.txt", "a", CommitOptions::message("alice"))
            .await
            .unwrap();
        assert_eq!(retry.parent, bobs_tip);
        assert_eq!(forge.file_at("main", "bob.txt"), Some(b"b".to_vec()));
        assert_eq!(forge.file_at("main", "alice.txt"), Some(b"a".to_vec()));
    }

    #[tokio::test]
    async fn fast_forward_rejects_stale_parent() {
        let forge = seeded();
        let mut alice = repository(&forge);
        let mut bob = repository(&forge);

        alice.resolve_tip(&main_branch()).await.unwrap();
        bob.write(&main_branch(), "bob.txt", "b", CommitOptions::message("bob"))
            .await
            .unwrap();

        let err = alice
            .write(&main_branch(), "alice.txt", "a", CommitOptions::message("alice"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert_eq!(forge.file_at("main", "alice.txt"), None);
    }
}

mod failures {
    use super::*;

    async fn write_failing_at(kind: OperationKind) -> (MockForge, Oid, ForgeError) {
        let forge = seeded().fail_on(FailOn::status(kind, 500));
        let before = forge.ref_sha("main").unwrap();
        let mut repo = repository(&forge);
        let err = repo
            .write(&main_branch(), "x.txt", "x", CommitOptions::message("x"))
            .await
            .unwrap_err();
        (forge, before, err)
    }

    #[tokio::test]
    async fn each_stage_failure_halts_pipeline() {
        let stages = [
            OperationKind::GetRef,
            OperationKind::CreateBlob,
            OperationKind::GetCommit,
            OperationKind::CreateTree,
            OperationKind::CreateCommit,
            OperationKind::UpdateRef,
        ];
        for (index, stage) in stages.iter().enumerate() {
            let (forge, before, err) = write_failing_at(*stage).await;
            assert_eq!(err.status(), Some(500), "stage {:?}", stage);
            assert_eq!(forge.ref_sha("main"), Some(before), "stage {:?}", stage);

            let kinds = forge.operation_kinds();
            assert_eq!(kinds.last(), Some(stage), "stage {:?}", stage);
            assert_eq!(kinds.len(), index + 1, "stage {:?}", stage);
        }
    }

    #[tokio::test]
    async fn missing_branch_is_not_found() {
        let forge = seeded();
        let mut repo = repository(&forge);
        let err = repo
            .write(
                &BranchName::new("ghost").unwrap(),
                "a",
                "a",
                CommitOptions::message("m"),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn branches_span_pages() {
        let forge = seeded().with_page_size(2);
        for name in ["a", "b", "c", "d"] {
            forge.seed_commit(name, &[("f", name.as_bytes())], name);
        }
        let repo = repository(&forge);

        let names: Vec<String> = repo
            .list_branches()
            .await
            .unwrap()
            .iter()
            .filter_map(|r| r.branch().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "main"]);
        assert_eq!(
            forge
                .operation_kinds()
                .iter()
                .filter(|k| **k == OperationKind::ListRefs)
                .count(),
            3
        );
    }
}
