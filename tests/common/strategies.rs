#![allow(dead_code)]

use proptest::prelude::*;
use taskmarket_core::models::Task;
use taskmarket_core::state_machine::TaskPhase;

/// Ledger-assigned ids and usernames
pub fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}"
}

pub fn worker_list_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(key_strategy(), 0..6)
}

pub fn phase_strategy() -> impl Strategy<Value = TaskPhase> {
    prop_oneof![
        Just(TaskPhase::Open),
        Just(TaskPhase::Finished),
        key_strategy().prop_map(|next_round_task_id| TaskPhase::Advanced { next_round_task_id }),
    ]
}

/// Structurally valid task records in any phase
pub fn task_strategy() -> impl Strategy<Value = Task> {
    (
        key_strategy(),
        any::<u64>(),
        key_strategy(),
        key_strategy(),
        worker_list_strategy(),
        1u32..1_000,
        phase_strategy(),
    )
        .prop_map(
            |(task_id, bonus, root_model_id, posted_user, accepted_users, round, phase)| {
                let (is_complete, next_round_task_id) = phase.to_record();
                Task {
                    task_id,
                    bonus,
                    root_model_id,
                    posted_user,
                    accepted_users,
                    models: Vec::new(),
                    is_complete,
                    round,
                    next_round_task_id: next_round_task_id.to_string(),
                }
            },
        )
}
