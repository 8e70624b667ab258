//! Property tests for the scheduling engines.

use chrono::NaiveDate;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use revisit_core::{
    LearningStep, LongTermConfig, LongTermScheduler, ReinsertionConfig, ReviewAction, ReviewItem, ShortTermEngine,
};

fn items(count: usize) -> Vec<ReviewItem> {
    (0..count).map(|i| ReviewItem::new(format!("item-{}", i), "", "")).collect()
}

fn action(recognized: bool) -> ReviewAction {
    if recognized {
        ReviewAction::Recognized
    } else {
        ReviewAction::Forgotten
    }
}

proptest! {
    #[test]
    fn review_count_matches_number_of_actions(seed in any::<u64>(), outcomes in prop::collection::vec(any::<bool>(), 0..40)) {
        let mut engine = ShortTermEngine::seeded(ReinsertionConfig::default(), seed);
        engine.initialize(&items(5), None);

        for recognized in &outcomes {
            engine.apply_action("item-2", action(*recognized)).unwrap();
        }
        prop_assert_eq!(engine.item_state("item-2").unwrap().review_count as usize, outcomes.len());
    }

    #[test]
    fn forgotten_always_resets(seed in any::<u64>(), prefix in prop::collection::vec(any::<bool>(), 0..10)) {
        let mut engine = ShortTermEngine::seeded(ReinsertionConfig::default(), seed);
        engine.initialize(&items(30), None);
        for recognized in &prefix {
            engine.apply_action("item-0", action(*recognized)).unwrap();
        }

        let result = engine.apply_action("item-0", ReviewAction::Forgotten).unwrap();
        prop_assert!(!result.state.mastered);
        prop_assert_eq!(result.state.learning_step, LearningStep::AfterForgotten);

        let raw = result.raw_index.unwrap();
        prop_assert!((8..=12).contains(&raw));
        // 29 other items keep the draw unclamped
        prop_assert_eq!(result.inserted_at, Some(raw));
    }

    #[test]
    fn recovery_reinsertion_stays_in_range(seed in any::<u64>()) {
        let mut engine = ShortTermEngine::seeded(ReinsertionConfig::default(), seed);
        engine.initialize(&items(30), None);

        engine.apply_action("item-7", ReviewAction::Forgotten).unwrap();
        let result = engine.apply_action("item-7", ReviewAction::Recognized).unwrap();

        prop_assert_eq!(result.state.learning_step, LearningStep::AfterRecognized);
        let raw = result.raw_index.unwrap();
        prop_assert!((15..=20).contains(&raw));
        prop_assert_eq!(result.inserted_at, Some(raw));
    }

    #[test]
    fn first_recognition_masters(seed in any::<u64>(), target in 0usize..8) {
        let mut engine = ShortTermEngine::seeded(ReinsertionConfig::default(), seed);
        engine.initialize(&items(8), None);
        let id = format!("item-{}", target);

        let result = engine.apply_action(&id, ReviewAction::Recognized).unwrap();
        prop_assert_eq!(result.state.review_count, 1);
        prop_assert!(result.state.mastered);
        prop_assert!(!engine.sequence().contains(&id));
    }

    #[test]
    fn queue_holds_exactly_the_unmastered_items(
        seed in any::<u64>(),
        steps in prop::collection::vec((0usize..6, any::<bool>()), 0..60),
    ) {
        let mut engine = ShortTermEngine::seeded(ReinsertionConfig::default(), seed);
        engine.initialize(&items(6), None);

        for (target, recognized) in steps {
            engine.apply_action(&format!("item-{}", target), action(recognized)).unwrap();
        }

        let mut queued: Vec<String> = engine.sequence().to_vec();
        queued.sort();
        let before_dedup = queued.len();
        queued.dedup();
        prop_assert_eq!(queued.len(), before_dedup);

        let unmastered: Vec<String> = engine
            .item_states()
            .values()
            .filter(|s| !s.mastered)
            .map(|s| s.item_id.clone())
            .collect();
        prop_assert_eq!(queued, unmastered);
    }

    #[test]
    fn snapshot_restore_is_observationally_identical(
        seed in any::<u64>(),
        steps in prop::collection::vec((0usize..10, any::<bool>()), 0..30),
    ) {
        let mut engine = ShortTermEngine::seeded(ReinsertionConfig::default(), seed);
        engine.initialize(&items(10), None);
        for (target, recognized) in steps {
            engine.apply_action(&format!("item-{}", target), action(recognized)).unwrap();
        }

        let snapshot = engine.snapshot();
        let json = serde_json::to_value(&snapshot).unwrap();
        let restored = ShortTermEngine::restore_value(json, ReinsertionConfig::default(), StdRng::seed_from_u64(seed));

        prop_assert_eq!(restored.item_states(), engine.item_states());
        prop_assert_eq!(restored.sequence(), engine.sequence());
        prop_assert_eq!(restored.mastered_count(), engine.mastered_count());
        prop_assert_eq!(restored.total_count(), engine.total_count());
    }

    #[test]
    fn long_term_bounds_hold(outcomes in prop::collection::vec(any::<bool>(), 1..30)) {
        let scheduler = LongTermScheduler::new(LongTermConfig::default());
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut record = scheduler.new_record("q", start);

        for (day, correct) in outcomes.iter().enumerate() {
            if record.mastered {
                break;
            }
            let date = start + chrono::Days::new(day as u64);
            scheduler.apply_review(&mut record, *correct, true, date);

            prop_assert!(record.easiness_factor >= 1.3 - 1e-9);
            prop_assert!(record.easiness_factor <= 2.5 + 1e-9);
            if record.mastered {
                prop_assert_eq!(record.interval_days, 0);
                prop_assert!(record.consecutive_day_count >= 7);
            } else {
                prop_assert!(record.interval_days >= 1);
                prop_assert!(record.consecutive_day_count <= 6);
            }
            prop_assert_eq!(record.last_reviewed, Some(date));
        }
    }
}
