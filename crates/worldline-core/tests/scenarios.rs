//! # Scenario Tiers
//!
//! End-to-end sessions through the public API.
//!
//! ## Tiers
//! - S0: Branch, merge and delete
//! - S1: Reset (soft vs hard) and collection
//! - S2: Failures leave the graph untouched
//! - S3: Persistence round trip and command surface

use std::sync::Arc;
use worldline_core::{
    CommandRunner, GitEngine, GraphLayout, Head, ManualClock, MERGE_UP_TO_DATE, Position,
    ResetMode, WorldSnapshot, WorldlineError,
};

fn at(x: i64, y: i64) -> WorldSnapshot {
    WorldSnapshot::new(Position::planar(x, y))
}

fn engine() -> GitEngine {
    GitEngine::with_clock(&at(0, 0), Arc::new(ManualClock::stepping(10_000, 100))).expect("init")
}

// =============================================================================
// TIER S0: BRANCH, MERGE AND DELETE
// =============================================================================

mod s0_merge {
    use super::*;

    /// S0.1: feature branch merged back into main.
    #[test]
    fn feature_branch_merge() {
        let mut engine = engine();
        let root = engine.current_commit_id().cloned().expect("root");
        let a = engine.commit("a", &at(1, 0)).expect("commit a");
        engine.create_branch("feat").expect("branch");
        engine.checkout("feat").expect("checkout feat");
        let b = engine.commit("b", &at(2, 0)).expect("commit b");
        engine.checkout("main").expect("checkout main");

        engine.merge("feat").expect("merge");

        assert_eq!(engine.head(), &Head::Attached("main".to_string()));
        assert!(!engine.graph().refs().contains_branch("feat"));
        assert_eq!(engine.branch_names(), vec!["main"]);

        let merge = engine.graph().head_commit().expect("merge commit");
        assert_eq!(merge.parents, vec![a.clone(), b.clone()]);
        assert_eq!(merge.message, "Merge branch 'feat' into main");

        let history: Vec<_> = engine.log(10).iter().map(|c| c.id.clone()).collect();
        assert_eq!(history, vec![merge.id.clone(), a, root]);

        let reachable = engine
            .graph()
            .store()
            .reachable_from(engine.graph().refs().branch("main"));
        assert!(reachable.contains(&b));
    }

    /// S0.2: merging a branch already at HEAD changes nothing.
    #[test]
    fn merge_up_to_date() {
        let mut engine = engine();
        engine.commit("a", &at(1, 0)).expect("commit");
        engine.create_branch("same").expect("branch");
        let before = engine.commit_count();

        assert_eq!(engine.merge("same").as_deref(), Ok(MERGE_UP_TO_DATE));
        assert_eq!(engine.commit_count(), before);
    }

    /// S0.3: merge while detached moves HEAD only.
    #[test]
    fn merge_into_detached_head() {
        let mut engine = engine();
        let a = engine.commit("a", &at(1, 0)).expect("commit");
        engine.checkout_new_branch("feat").expect("branch");
        engine.commit("f", &at(3, 0)).expect("commit");
        engine.checkout(a.as_str()).expect("detach");

        let status = engine.merge("feat").expect("merge");
        assert!(status.starts_with("Merged 'feat' into HEAD"));
        assert!(engine.head().is_detached());
        assert_eq!(engine.graph().refs().branch("main"), Some(&a));
    }
}

// =============================================================================
// TIER S1: RESET AND COLLECTION
// =============================================================================

mod s1_reset {
    use super::*;

    /// S1.1: hard reset on a three-commit chain drops the newest commit.
    #[test]
    fn hard_reset_drops_newest() {
        let mut engine = engine();
        let middle = at(1, 1).with_cell("chest", "open");
        engine.commit("middle", &middle).expect("commit");
        let newest = engine.commit("newest", &at(2, 2)).expect("commit");

        let restored = engine
            .reset("HEAD~1", ResetMode::Hard, &at(50, 50))
            .expect("reset");

        assert_eq!(restored, middle);
        assert_eq!(engine.commit_count(), 2);
        assert!(engine.commit_record(&newest).is_none());
    }

    /// S1.2: soft reset keeps the live position but restores content.
    #[test]
    fn soft_reset_contrast() {
        let mut engine = engine();
        let target = at(1, 1).with_cell("lamp", "lit");
        let id = engine.commit("target", &target).expect("commit");
        engine.commit("later", &at(9, 9)).expect("commit");

        let live = at(-4, 7);
        let soft = engine.reset(id.as_str(), ResetMode::Soft, &live).expect("soft");
        assert_eq!(soft.position, live.position);
        assert_eq!(soft.cells, target.cells);

        let hard = engine.reset(id.as_str(), ResetMode::Hard, &live).expect("hard");
        assert_eq!(hard, target);
    }

    /// S1.3: hard reset keeps commits another branch still needs.
    #[test]
    fn hard_reset_keeps_commits_on_other_branches() {
        let mut engine = engine();
        engine.commit("a", &at(1, 0)).expect("commit");
        let b = engine.commit("b", &at(2, 0)).expect("commit");
        engine.create_branch("keep").expect("branch");

        engine.reset("HEAD~1", ResetMode::Hard, &at(0, 0)).expect("reset");
        assert!(engine.commit_record(&b).is_some());
    }

    /// S1.4: a floating detached commit dies once HEAD leaves it.
    #[test]
    fn detached_commit_collected_after_leaving() {
        let mut engine = engine();
        let root = engine.current_commit_id().cloned().expect("root");
        engine.checkout(root.as_str()).expect("detach");
        let floating = engine.commit("float", &at(5, 5)).expect("commit");

        assert!(engine.garbage_collect().is_noop());
        engine.checkout("main").expect("reattach");
        let report = engine.garbage_collect();
        assert_eq!(report.removed, vec![floating]);
    }
}

// =============================================================================
// TIER S2: FAILURES LEAVE THE GRAPH UNTOUCHED
// =============================================================================

mod s2_failures {
    use super::*;

    /// S2.1: unknown checkout target.
    #[test]
    fn checkout_nonexistent() {
        let mut engine = engine();
        let before = engine.export();

        assert!(matches!(
            engine.checkout("nonexistent"),
            Err(WorldlineError::TargetNotFound(_))
        ));
        assert_eq!(engine.export(), before);
    }

    /// S2.2: bad relative targets.
    #[test]
    fn bad_relative_reset() {
        let mut engine = engine();
        engine.commit("a", &at(1, 0)).expect("commit");
        let before = engine.export();

        for target in ["HEAD~9", "HEAD~abc", "HEAD~"] {
            assert!(matches!(
                engine.reset(target, ResetMode::Hard, &at(0, 0)),
                Err(WorldlineError::TargetNotFound(_))
            ));
        }
        assert_eq!(engine.export(), before);
    }

    /// S2.3: malformed import keeps the old graph.
    #[test]
    fn malformed_import_is_atomic() {
        let mut engine = engine();
        engine.commit("a", &at(1, 0)).expect("commit");
        let before = engine.export();

        let mut broken = before.clone();
        broken.head = Head::Attached("nowhere".to_string());

        assert!(matches!(
            engine.import(broken),
            Err(WorldlineError::ImportMalformed(_))
        ));
        assert_eq!(engine.export(), before);
    }

    /// S2.4: merge of an unknown branch.
    #[test]
    fn merge_unknown_branch() {
        let mut engine = engine();
        assert_eq!(
            engine.merge("ghost"),
            Err(WorldlineError::BranchNotFound("ghost".to_string()))
        );
        assert_eq!(engine.commit_count(), 1);
    }
}

// =============================================================================
// TIER S3: ROUND TRIP AND COMMAND SURFACE
// =============================================================================

mod s3_surface {
    use super::*;

    /// S3.1: JSON export/import keeps HEAD, branches and colors.
    #[test]
    fn json_round_trip() {
        let mut engine = engine();
        engine.commit("a", &at(1, 0)).expect("commit");
        engine.checkout_new_branch("feat").expect("branch");
        engine.commit("b", &at(2, 0).with_cell("k", "v")).expect("commit");

        let json = serde_json::to_string(&engine.export()).expect("json");
        let document = serde_json::from_str(&json).expect("parse");

        let mut restored = super::engine();
        let state = restored.import(document).expect("import");

        assert_eq!(state, engine.current_state().expect("state"));
        assert_eq!(restored.branch_names(), engine.branch_names());
        assert_eq!(restored.branch_color("feat"), engine.branch_color("feat"));
        assert_eq!(restored.head(), engine.head());
    }

    /// S3.2: a scripted session through the command surface.
    #[test]
    fn scripted_session() {
        let runner = CommandRunner::new();
        let mut engine = engine();

        let script = [
            "git commit -m \"first\"",
            "git checkout -b feat",
            "git commit -m \"on feat\"",
            "git checkout main",
            "git merge feat",
        ];
        for (step, line) in script.iter().enumerate() {
            let live = at(step as i64, 0);
            let outcome = runner.run(&mut engine, line, &live);
            assert!(!outcome.failed, "{} -> {}", line, outcome.output);
        }

        assert_eq!(engine.branch_names(), vec!["main"]);
        assert!(engine.graph().head_commit().expect("head").is_merge());

        let layout = GraphLayout::compute(engine.graph());
        assert_eq!(layout.nodes().len(), engine.commit_count());
        assert_eq!(layout.max_depth(), 3);
    }
}
