//! End-to-end review flows across the engine, the daily gate and a backend.

use chrono::NaiveDate;
use revisit_core::{
    DayState, GateCommit, LearningStep, MemoryBackend, PersistenceBackend, ReinsertionConfig, ReviewAction,
    ReviewItem, ReviewSession, ReviewerConfig, ShortTermEngine, Snapshot,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn items(ids: &[&str]) -> Vec<ReviewItem> {
    ids.iter().map(|id| ReviewItem::new(*id, format!("question {}", id), format!("answer {}", id))).collect()
}

#[test]
fn test_forgotten_head_moves_behind_short_queue() {
    let forced = Snapshot {
        dynamic_sequence: vec!["b".into(), "a".into(), "c".into()],
        ..Snapshot::default()
    };

    for seed in 0..20 {
        let mut engine = ShortTermEngine::seeded(ReinsertionConfig::default(), seed);
        engine.initialize(&items(&["a", "b", "c"]), Some(&forced));

        let result = engine.apply_action("b", ReviewAction::Forgotten).unwrap();
        let b = engine.item_state("b").unwrap();
        assert_eq!(b.review_count, 1);
        assert_eq!(b.wrong_count, 1);
        assert_eq!(b.learning_step, LearningStep::AfterForgotten);
        assert_eq!(result.inserted_at, Some(2));
        assert_eq!(engine.sequence(), &["a".to_string(), "c".to_string(), "b".to_string()]);
        assert_eq!(engine.next_item().map(String::as_str), Some("a"));
    }
}

#[test]
fn test_gate_commits_once_after_recovery() {
    init_tracing();
    let config = ReviewerConfig::default();
    let today = date("2024-09-10");
    let mut session = ReviewSession::open("vocab", items(&["a", "b", "c"]), MemoryBackend::new(), &config, today, Some(42))
        .unwrap();

    let forgot = session.review("a", ReviewAction::Forgotten).unwrap().gate.unwrap();
    assert_eq!(forgot.to, DayState::NeedTwoConsecutive);
    assert_eq!(forgot.commit, Some(GateCommit::Wrong));

    let first = session.review("a", ReviewAction::Recognized).unwrap().gate.unwrap();
    assert_eq!(first.to, DayState::OneConsecutive);
    assert_eq!(first.commit, None);
    assert_eq!(session.book().get("a").unwrap().consecutive_day_count, 0);

    let second = session.review("a", ReviewAction::Recognized).unwrap().gate.unwrap();
    assert_eq!(second.to, DayState::Completed);
    assert_eq!(second.commit, Some(GateCommit::Correct));

    let record = session.book().get("a").unwrap();
    assert_eq!(record.consecutive_day_count, 1);
    assert!((record.easiness_factor - 2.3).abs() < 1e-9);
    assert_eq!(record.due_date, Some(date("2024-09-11")));
}

#[test]
fn test_full_day_then_next_day() {
    init_tracing();
    let backend = MemoryBackend::new();
    let config = ReviewerConfig::default();
    let day_one = date("2024-09-10");

    let mut session = ReviewSession::open("vocab.json", items(&["a", "b", "c", "d"]), backend, &config, day_one, Some(9))
        .unwrap();

    let mut guard = 0;
    while let Some(id) = session.next_daily_card().cloned() {
        let action = if id == "c" && session.gate().progress().card_state(&id).state == DayState::Initial {
            ReviewAction::Forgotten
        } else {
            ReviewAction::Recognized
        };
        session.review(&id, action).unwrap();
        guard += 1;
        assert!(guard < 50, "day never finished");
    }

    let progress = session.gate().progress();
    assert_eq!(progress.completed_card_ids.len(), 4);
    assert!(progress.dynamic_sequence.is_empty());
    session.persist().unwrap();

    let records = session.backend().load_records("vocab").unwrap();
    assert_eq!(records.len(), 4);
    let c = records.iter().find(|r| r.item_id == "c").unwrap();
    assert_eq!(c.consecutive_day_count, 1);
    assert!(c.easiness_factor < 2.5);

    // Everything was reviewed today and comes due again tomorrow.
    let suggestion = session.daily_suggestion();
    assert_eq!(suggestion.new_cards, 0);
    assert_eq!(suggestion.due_cards, 0);

    let batch = session.rollover(date("2024-09-11")).unwrap();
    assert_eq!(batch.selected.len(), 4);
    assert_eq!(batch.remaining_due, 0);
}
